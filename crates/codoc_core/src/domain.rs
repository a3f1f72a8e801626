//! crates/codoc_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;

/// A shareable PDF document. The bytes live in external blob storage; the
/// core only keeps the metadata handed over at upload time.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub share_token: String,
    /// Users granted access. The owner is never a member.
    pub shared_with: BTreeSet<Uuid>,
    pub metadata: DocumentMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }

    pub fn is_shared_with(&self, user_id: Uuid) -> bool {
        self.shared_with.contains(&user_id)
    }
}

/// Blob metadata supplied by the storage collaborator. Never revalidated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub name: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub file_hash: String,
    /// Client-side last-modified timestamp, in milliseconds since the epoch.
    pub last_modified: i64,
}

/// Everything needed to persist a freshly uploaded document.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub owner_id: Uuid,
    pub share_token: String,
    pub metadata: DocumentMetadata,
}

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub is_account_verified: bool,
    /// Documents shared *to* this user (the reverse index of `Document::shared_with`).
    pub shared_files: BTreeSet<Uuid>,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

/// The public face of a grantee, as listed to document collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grantee {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl From<User> for Grantee {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            avatar_url: user.avatar_url,
        }
    }
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// A comment anchored to a page of a document. Replies point at their parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: Uuid,
    pub document_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
    /// Rich text body, stored verbatim.
    pub content: String,
    /// 1-based page number.
    pub page: i32,
    pub parent_comment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_root(&self) -> bool {
        self.parent_comment_id.is_none()
    }
}

/// A validated comment, ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub document_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
    pub content: String,
    pub page: i32,
    pub parent_comment_id: Option<Uuid>,
}

/// The two independent one-time-code flows a user can go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OtpPurpose {
    VerifyEmail,
    ResetPassword,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::VerifyEmail => "verify_email",
            OtpPurpose::ResetPassword => "reset_password",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "verify_email" => Some(OtpPurpose::VerifyEmail),
            "reset_password" => Some(OtpPurpose::ResetPassword),
            _ => None,
        }
    }
}
