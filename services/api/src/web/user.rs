//! services/api/src/web/user.rs
//!
//! Profile endpoints for the logged-in user.

use axum::{extract::State, response::IntoResponse, Extension};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::extract::ApiJson;
use crate::web::middleware::CurrentUser;
use crate::web::response::{ApiMessage, Reply};
use crate::web::state::AppState;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub is_account_verified: bool,
    /// Documents other users have shared with this user.
    pub shared_files: Vec<Uuid>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDataResponse {
    pub user_data: UserData,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedResponse {
    pub is_account_verified: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct UploadProfileRequest {
    #[serde(default)]
    pub url: String,
}

/// GET /api/user/data/user-data - The logged-in user's profile
#[utoipa::path(
    get,
    path = "/api/user/data/user-data",
    responses(
        (status = 200, description = "Profile of the current user", body = UserDataResponse),
        (status = 401, description = "Not logged in", body = ApiMessage)
    )
)]
pub async fn user_data_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.db.get_user_by_id(user_id).await?;
    let user_data = UserData {
        user_id: user.id,
        name: user.name,
        email: user.email,
        avatar_url: user.avatar_url,
        is_account_verified: user.is_account_verified,
        shared_files: user.shared_files.into_iter().collect(),
    };
    Ok(Reply::ok("User data fetched", UserDataResponse { user_data }))
}

/// GET /api/user/data/is-account-verified
#[utoipa::path(
    get,
    path = "/api/user/data/is-account-verified",
    responses(
        (status = 200, description = "Verification status", body = VerifiedResponse),
        (status = 401, description = "Not logged in", body = ApiMessage)
    )
)]
pub async fn is_account_verified_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.db.get_user_by_id(user_id).await?;
    Ok(Reply::ok(
        "Verification status fetched",
        VerifiedResponse {
            is_account_verified: user.is_account_verified,
        },
    ))
}

/// POST /api/user/upload-profile - Store the URL of an uploaded profile picture
#[utoipa::path(
    post,
    path = "/api/user/upload-profile",
    request_body = UploadProfileRequest,
    responses(
        (status = 200, description = "Profile picture saved", body = ApiMessage),
        (status = 400, description = "Missing URL", body = ApiMessage),
        (status = 401, description = "Not logged in", body = ApiMessage)
    )
)]
pub async fn upload_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    ApiJson(req): ApiJson<UploadProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let url = req.url.trim();
    if url.is_empty() {
        return Err(ApiError::invalid("Profile picture URL is required"));
    }
    state.db.set_avatar_url(user_id, url).await?;
    info!(%user_id, "profile picture updated");
    Ok(Reply::message("Profile picture updated"))
}
