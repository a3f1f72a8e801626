//! services/api/src/web/routes.rs
//!
//! Builds the complete HTTP application: public and protected API routes,
//! CORS, request tracing and the Swagger UI.

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiError;
use crate::web::{auth, comments, documents, middleware::require_auth, rest::ApiDoc, state::AppState, user};

const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Assembles the router for the given state.
pub fn router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = app_state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| {
            ApiError::Internal(format!(
                "Invalid CORS origin '{}': {}",
                app_state.config.cors_origin, e
            ))
        })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/password-reset-otp", post(auth::send_reset_otp_handler))
        .route("/auth/reset-password", post(auth::reset_password_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/verification-email", post(auth::send_verification_email_handler))
        .route("/auth/verify-email", post(auth::verify_email_handler))
        .route("/user/data/user-data", get(user::user_data_handler))
        .route("/user/data/is-account-verified", get(user::is_account_verified_handler))
        .route("/user/upload-profile", post(user::upload_profile_handler))
        .route("/pdf/upload-pdf", post(documents::upload_pdf_handler))
        .route("/pdf/my-pdf", get(documents::my_pdfs_handler))
        .route("/pdf/invited-pdf", get(documents::invited_pdfs_handler))
        .route("/pdf/shared-pdf", get(documents::shared_pdfs_handler))
        .route("/pdf/details", get(documents::pdf_details_handler))
        .route("/pdf/pdf-owner", post(documents::pdf_owner_handler))
        .route("/pdf/collaboration-access", get(documents::collaboration_access_handler))
        .route("/pdf/collaborate/{pdf_id}/{share_id}", get(documents::collaborate_handler))
        .route("/pdf/delete-pdf", delete(documents::delete_pdf_handler))
        .route("/pdf/share-access", post(documents::share_access_handler))
        .route("/pdf/remove-access", post(documents::remove_access_handler))
        .route("/pdf/shared-user-list", post(documents::shared_user_list_handler))
        .route("/pdf/upload-comments", post(comments::upload_comment_handler))
        .route("/pdf/fetch-comments", get(comments::fetch_comments_handler))
        .route("/pdf/comment-thread", get(comments::comment_thread_handler))
        .route("/pdf/delete-comment", delete(comments::delete_comment_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}
