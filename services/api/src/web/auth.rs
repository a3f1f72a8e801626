//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: signup, login and logout, plus the one-time-code
//! flows for email verification and password reset.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Extension,
};
use chrono::{Duration, Utc};
use codoc_core::{notifications, ConflictKind, CoreError, PortError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::extract::ApiJson;
use crate::web::middleware::{session_id_from_headers, CurrentUser, SESSION_COOKIE};
use crate::web::response::{ApiMessage, Reply};
use crate::web::state::AppState;

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
const PASSWORD_MIN_CHARS: usize = 10;
const PASSWORD_MAX_CHARS: usize = 24;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ResetOtpRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct VerifyEmailRequest {
    #[serde(default)]
    pub otp: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(EMAIL_PATTERN).expect("Invalid email regex"));

fn validate_email(email: &str) -> Result<(), ApiError> {
    if !EMAIL_REGEX.is_match(email) {
        return Err(ApiError::invalid("Please provide a valid email address"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    let length = password.chars().count();
    if !(PASSWORD_MIN_CHARS..=PASSWORD_MAX_CHARS).contains(&length) {
        return Err(ApiError::invalid(format!(
            "Password must be between {} and {} characters long",
            PASSWORD_MIN_CHARS, PASSWORD_MAX_CHARS
        )));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })
}

fn session_cookie(session_id: &str, max_age: Duration) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        session_id,
        max_age.num_seconds()
    )
}

/// Creates an auth session for `user_id` and returns the `Set-Cookie` value.
async fn start_session(state: &AppState, user_id: Uuid) -> Result<String, ApiError> {
    let ttl = Duration::try_days(state.config.session_ttl_days)
        .ok_or_else(|| ApiError::Internal("Session lifetime out of range".to_string()))?;
    let expires_at = Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| ApiError::Internal("Session expiry out of range".to_string()))?;
    let auth_session_id = Uuid::new_v4().to_string();
    state
        .db
        .create_auth_session(&auth_session_id, user_id, expires_at)
        .await?;
    Ok(session_cookie(&auth_session_id, ttl))
}

//=========================================================================================
// Account Handlers
//=========================================================================================

/// POST /api/auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created and logged in", body = AuthResponse),
        (status = 400, description = "Missing fields, invalid input or email taken", body = ApiMessage),
        (status = 500, description = "Internal server error", body = ApiMessage)
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim();
    let email = normalize_email(&req.email);
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::invalid("Please provide all the fields"));
    }
    validate_email(&email)?;
    validate_password(&req.password)?;

    // 1. Hash the password and create the user
    let password_hash = hash_password(&req.password)?;
    let user = state
        .db
        .create_user(name, &email, &password_hash)
        .await
        .map_err(|e| match e {
            PortError::Conflict(_) => ApiError::Core(CoreError::Conflict(ConflictKind::EmailTaken)),
            other => other.into(),
        })?;
    info!(user_id = %user.id, "user signed up");

    // 2. Log the new user in
    let cookie = start_session(&state, user.id).await?;

    // 3. Say hello; a failed mail does not fail the signup
    notifications::deliver(state.notifier.as_ref(), notifications::welcome(&user)).await;

    let response = AuthResponse {
        user_id: user.id,
        name: user.name,
        email: user.email,
    };
    Ok((
        [(header::SET_COOKIE, cookie)],
        Reply::created("User registered successfully", response),
    ))
}

/// POST /api/auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Invalid email or password", body = ApiMessage),
        (status = 500, description = "Internal server error", body = ApiMessage)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::invalid("Please provide all the fields"));
    }
    let rejected = || ApiError::invalid("Invalid email or password");

    // 1. Get credentials by email
    let creds = state
        .db
        .get_credentials_by_email(&email)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => rejected(),
            other => other.into(),
        })?;

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Authentication error".to_string())
    })?;
    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(rejected());
    }

    // 3. Create the session and answer with the profile
    let cookie = start_session(&state, creds.user_id).await?;
    let user = state.db.get_user_by_id(creds.user_id).await?;
    info!(user_id = %user.id, "user logged in");

    let response = AuthResponse {
        user_id: user.id,
        name: user.name,
        email: user.email,
    };
    Ok((
        [(header::SET_COOKIE, cookie)],
        Reply::ok("Logged in successfully", response),
    ))
}

/// POST /api/auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Logout successful", body = ApiMessage)
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(auth_session_id) = session_id_from_headers(&headers) {
        state.db.delete_auth_session(auth_session_id).await?;
    }
    Ok((
        [(header::SET_COOKIE, session_cookie("", Duration::zero()))],
        Reply::message("Logged out"),
    ))
}

//=========================================================================================
// One-Time Code Handlers
//=========================================================================================

/// POST /api/auth/verification-email - Mail a fresh email verification code
#[utoipa::path(
    post,
    path = "/api/auth/verification-email",
    responses(
        (status = 200, description = "Verification code sent", body = ApiMessage),
        (status = 400, description = "Account already verified", body = ApiMessage),
        (status = 401, description = "Not logged in", body = ApiMessage)
    )
)]
pub async fn send_verification_email_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    state.codes.send_verification_code(user_id).await?;
    Ok(Reply::message("Verification OTP sent to your email"))
}

/// POST /api/auth/verify-email - Verify the account with the mailed code
#[utoipa::path(
    post,
    path = "/api/auth/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified", body = ApiMessage),
        (status = 400, description = "Invalid or expired code, or already verified", body = ApiMessage),
        (status = 401, description = "Not logged in", body = ApiMessage)
    )
)]
pub async fn verify_email_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    ApiJson(req): ApiJson<VerifyEmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.otp.trim().is_empty() {
        return Err(ApiError::invalid("Please provide all the fields"));
    }
    state.codes.verify_email(user_id, req.otp.trim()).await?;
    Ok(Reply::message("Email verified successfully"))
}

/// POST /api/auth/password-reset-otp - Mail a password reset code
///
/// Answers the same way whether or not the email belongs to an account.
#[utoipa::path(
    post,
    path = "/api/auth/password-reset-otp",
    request_body = ResetOtpRequest,
    responses(
        (status = 200, description = "Code sent if the account exists", body = ApiMessage),
        (status = 400, description = "Missing email", body = ApiMessage)
    )
)]
pub async fn send_reset_otp_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ResetOtpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);
    if email.is_empty() {
        return Err(ApiError::invalid("Email is required"));
    }
    state.codes.send_reset_code(&email).await?;
    Ok(Reply::message(
        "If an account exists for this email, a reset OTP has been sent",
    ))
}

/// POST /api/auth/reset-password - Set a new password with a reset code
#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = ApiMessage),
        (status = 400, description = "Invalid input, or an invalid or expired code", body = ApiMessage),
        (status = 404, description = "No account for this email", body = ApiMessage)
    )
)]
pub async fn reset_password_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.otp.trim().is_empty() || req.new_password.is_empty() {
        return Err(ApiError::invalid("Please provide all the fields"));
    }
    validate_password(&req.new_password)?;
    let password_hash = hash_password(&req.new_password)?;
    state
        .codes
        .reset_password(&email, req.otp.trim(), &password_hash)
        .await?;
    Ok(Reply::message("Password has been reset successfully"))
}
