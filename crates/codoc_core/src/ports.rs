//! crates/codoc_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or mail servers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    AuthSession, Comment, Document, NewComment, NewDocument, OtpPurpose, User, UserCredentials,
};
use crate::otp::OneTimeCode;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unique constraint violated: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    /// Fails with `PortError::Conflict` when the email is already registered.
    async fn create_user(&self, name: &str, email: &str, hashed_password: &str)
        -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn find_user_by_email(&self, email: &str) -> PortResult<Option<User>>;

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    /// Unknown ids are skipped.
    async fn get_users_by_ids(&self, user_ids: &[Uuid]) -> PortResult<Vec<User>>;

    async fn update_password(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()>;

    async fn mark_account_verified(&self, user_id: Uuid) -> PortResult<()>;

    async fn set_avatar_url(&self, user_id: Uuid, avatar_url: &str) -> PortResult<()>;

    // --- Auth Methods ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<AuthSession>;

    /// Returns the owning user, or `PortError::Unauthorized` for unknown or expired sessions.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- One-Time Codes ---
    async fn get_one_time_code(&self, user_id: Uuid, purpose: OtpPurpose)
        -> PortResult<OneTimeCode>;

    async fn put_one_time_code(
        &self,
        user_id: Uuid,
        purpose: OtpPurpose,
        code: &OneTimeCode,
    ) -> PortResult<()>;

    // --- Document Management ---
    /// Fails with `PortError::Conflict` when the share token is already taken.
    async fn create_document(&self, document: NewDocument) -> PortResult<Document>;

    async fn get_document_by_id(&self, document_id: Uuid) -> PortResult<Document>;

    async fn share_token_exists(&self, share_token: &str) -> PortResult<bool>;

    async fn list_documents_by_owner(&self, owner_id: Uuid) -> PortResult<Vec<Document>>;

    /// Unknown ids are skipped.
    async fn get_documents_by_ids(&self, document_ids: &[Uuid]) -> PortResult<Vec<Document>>;

    /// Removes the document together with its share edges and comments.
    async fn delete_document(&self, document_id: Uuid) -> PortResult<()>;

    // --- Sharing (one edge per document/user pair) ---
    /// Returns `false` when the edge already existed.
    async fn add_share(&self, document_id: Uuid, user_id: Uuid) -> PortResult<bool>;

    /// Returns `false` when there was no edge to remove.
    async fn remove_share(&self, document_id: Uuid, user_id: Uuid) -> PortResult<bool>;

    // --- Comment Management ---
    async fn insert_comment(&self, comment: NewComment) -> PortResult<Comment>;

    async fn get_comment_by_id(&self, comment_id: Uuid) -> PortResult<Comment>;

    /// Newest first.
    async fn list_comments_by_document(&self, document_id: Uuid) -> PortResult<Vec<Comment>>;

    /// Deletes exactly one record. Returns `false` if it did not exist.
    async fn delete_comment(&self, comment_id: Uuid) -> PortResult<bool>;
}

/// A plain-text message addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Delivers a single message. Callers log failures; nothing is retried.
    async fn send(&self, notification: Notification) -> PortResult<()>;
}
