//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Queries are checked at runtime (`query_as::<_, Record>`), so building the
//! service never needs a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use codoc_core::domain::{
    AuthSession, Comment, Document, DocumentMetadata, NewComment, NewDocument, OtpPurpose, User,
    UserCredentials,
};
use codoc_core::ports::{DatabaseService, PortError, PortResult};
use codoc_core::OneTimeCode;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn conflict_or_unexpected(e: sqlx::Error) -> PortError {
    match e.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => PortError::Conflict(db_err.to_string()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const USER_COLUMNS: &str = "u.id, u.name, u.email, u.avatar_url, u.is_account_verified, u.created_at, \
     COALESCE(array_agg(s.document_id) FILTER (WHERE s.document_id IS NOT NULL), '{}'::uuid[]) AS shared_files";

const DOCUMENT_COLUMNS: &str = "d.id, d.owner_id, d.share_token, d.name, d.url, d.content_type, \
     d.size_bytes, d.file_hash, d.last_modified, d.created_at, d.updated_at, \
     COALESCE(array_agg(s.user_id) FILTER (WHERE s.user_id IS NOT NULL), '{}'::uuid[]) AS shared_with";

const COMMENT_COLUMNS: &str = "id, document_id, author_id, author_name, author_avatar_url, content, \
     page, parent_comment_id, created_at, updated_at";

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    name: String,
    email: String,
    avatar_url: Option<String>,
    is_account_verified: bool,
    created_at: DateTime<Utc>,
    shared_files: Vec<Uuid>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            avatar_url: self.avatar_url,
            is_account_verified: self.is_account_verified,
            shared_files: self.shared_files.into_iter().collect(),
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct AuthSessionRecord {
    id: String,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}
impl AuthSessionRecord {
    fn to_domain(self) -> AuthSession {
        AuthSession {
            id: self.id,
            user_id: self.user_id,
            expires_at: self.expires_at,
        }
    }
}

#[derive(FromRow)]
struct OneTimeCodeRecord {
    state: String,
    code: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}
impl OneTimeCodeRecord {
    fn to_domain(self) -> PortResult<OneTimeCode> {
        match (self.state.as_str(), self.code, self.expires_at) {
            ("active", Some(code), Some(expires_at)) => Ok(OneTimeCode::Active { code, expires_at }),
            ("consumed", _, _) => Ok(OneTimeCode::Consumed),
            (state, _, _) => Err(PortError::Unexpected(format!(
                "malformed one-time code row in state '{}'",
                state
            ))),
        }
    }
}

#[derive(FromRow)]
struct DocumentRecord {
    id: Uuid,
    owner_id: Uuid,
    share_token: String,
    name: String,
    url: String,
    content_type: String,
    size_bytes: i64,
    file_hash: String,
    last_modified: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    shared_with: Vec<Uuid>,
}
impl DocumentRecord {
    fn to_domain(self) -> Document {
        Document {
            id: self.id,
            owner_id: self.owner_id,
            share_token: self.share_token,
            shared_with: self.shared_with.into_iter().collect(),
            metadata: DocumentMetadata {
                name: self.name,
                url: self.url,
                content_type: self.content_type,
                size_bytes: self.size_bytes,
                file_hash: self.file_hash,
                last_modified: self.last_modified,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CommentRecord {
    id: Uuid,
    document_id: Uuid,
    author_id: Uuid,
    author_name: String,
    author_avatar_url: Option<String>,
    content: String,
    page: i32,
    parent_comment_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl CommentRecord {
    fn to_domain(self) -> Comment {
        Comment {
            id: self.id,
            document_id: self.document_id,
            author_id: self.author_id,
            author_name: self.author_name,
            author_avatar_url: self.author_avatar_url,
            content: self.content,
            page: self.page,
            parent_comment_id: self.parent_comment_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    // --- User Management ---
    async fn create_user(&self, name: &str, email: &str, hashed_password: &str) -> PortResult<User> {
        let user_id = Uuid::new_v4();
        sqlx::query("INSERT INTO users (id, name, email, hashed_password) VALUES ($1, $2, $3, $4)")
            .bind(user_id)
            .bind(name)
            .bind(email)
            .bind(hashed_password)
            .execute(&self.pool)
            .await
            .map_err(conflict_or_unexpected)?;
        self.get_user_by_id(user_id).await
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users u \
             LEFT JOIN document_shares s ON s.user_id = u.id \
             WHERE u.id = $1 GROUP BY u.id"
        );
        let record = sqlx::query_as::<_, UserRecord>(&query)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_unexpected(format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn find_user_by_email(&self, email: &str) -> PortResult<Option<User>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users u \
             LEFT JOIN document_shares s ON s.user_id = u.id \
             WHERE u.email = $1 GROUP BY u.id"
        );
        let record = sqlx::query_as::<_, UserRecord>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.map(UserRecord::to_domain))
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected("User not found".to_string()))?;
        Ok(record.to_domain())
    }

    async fn get_users_by_ids(&self, user_ids: &[Uuid]) -> PortResult<Vec<User>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users u \
             LEFT JOIN document_shares s ON s.user_id = u.id \
             WHERE u.id = ANY($1) GROUP BY u.id ORDER BY u.id"
        );
        let records = sqlx::query_as::<_, UserRecord>(&query)
            .bind(user_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn update_password(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()> {
        let result = sqlx::query("UPDATE users SET hashed_password = $1 WHERE id = $2")
            .bind(hashed_password)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    async fn mark_account_verified(&self, user_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("UPDATE users SET is_account_verified = TRUE WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    async fn set_avatar_url(&self, user_id: Uuid, avatar_url: &str) -> PortResult<()> {
        let result = sqlx::query("UPDATE users SET avatar_url = $1 WHERE id = $2")
            .bind(avatar_url)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    // --- Auth Methods ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<AuthSession> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3) \
             RETURNING id, user_id, expires_at",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT id, user_id, expires_at FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record
            .map(|r| r.to_domain().user_id)
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    // --- One-Time Codes ---
    async fn get_one_time_code(&self, user_id: Uuid, purpose: OtpPurpose) -> PortResult<OneTimeCode> {
        let record = sqlx::query_as::<_, OneTimeCodeRecord>(
            "SELECT state, code, expires_at FROM one_time_codes WHERE user_id = $1 AND purpose = $2",
        )
        .bind(user_id)
        .bind(purpose.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        match record {
            Some(record) => record.to_domain(),
            None => Ok(OneTimeCode::NoneIssued),
        }
    }

    async fn put_one_time_code(
        &self,
        user_id: Uuid,
        purpose: OtpPurpose,
        code: &OneTimeCode,
    ) -> PortResult<()> {
        let (state, value, expires_at) = match code {
            OneTimeCode::NoneIssued => {
                sqlx::query("DELETE FROM one_time_codes WHERE user_id = $1 AND purpose = $2")
                    .bind(user_id)
                    .bind(purpose.as_str())
                    .execute(&self.pool)
                    .await
                    .map_err(unexpected)?;
                return Ok(());
            }
            OneTimeCode::Active { code, expires_at } => ("active", Some(code.as_str()), Some(*expires_at)),
            OneTimeCode::Consumed => ("consumed", None, None),
        };
        sqlx::query(
            "INSERT INTO one_time_codes (user_id, purpose, state, code, expires_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id, purpose) DO UPDATE \
             SET state = EXCLUDED.state, code = EXCLUDED.code, \
                 expires_at = EXCLUDED.expires_at, updated_at = NOW()",
        )
        .bind(user_id)
        .bind(purpose.as_str())
        .bind(state)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    // --- Document Management ---
    async fn create_document(&self, document: NewDocument) -> PortResult<Document> {
        let document_id = Uuid::new_v4();
        let metadata = &document.metadata;
        sqlx::query(
            "INSERT INTO documents \
             (id, owner_id, share_token, name, url, content_type, size_bytes, file_hash, last_modified) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(document_id)
        .bind(document.owner_id)
        .bind(&document.share_token)
        .bind(&metadata.name)
        .bind(&metadata.url)
        .bind(&metadata.content_type)
        .bind(metadata.size_bytes)
        .bind(&metadata.file_hash)
        .bind(metadata.last_modified)
        .execute(&self.pool)
        .await
        .map_err(conflict_or_unexpected)?;
        self.get_document_by_id(document_id).await
    }

    async fn get_document_by_id(&self, document_id: Uuid) -> PortResult<Document> {
        let query = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d \
             LEFT JOIN document_shares s ON s.document_id = d.id \
             WHERE d.id = $1 GROUP BY d.id"
        );
        let record = sqlx::query_as::<_, DocumentRecord>(&query)
            .bind(document_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_unexpected(format!("Document {} not found", document_id)))?;
        Ok(record.to_domain())
    }

    async fn share_token_exists(&self, share_token: &str) -> PortResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM documents WHERE share_token = $1)")
                .bind(share_token)
                .fetch_one(&self.pool)
                .await
                .map_err(unexpected)?;
        Ok(exists)
    }

    async fn list_documents_by_owner(&self, owner_id: Uuid) -> PortResult<Vec<Document>> {
        let query = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d \
             LEFT JOIN document_shares s ON s.document_id = d.id \
             WHERE d.owner_id = $1 GROUP BY d.id ORDER BY d.created_at DESC"
        );
        let records = sqlx::query_as::<_, DocumentRecord>(&query)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_documents_by_ids(&self, document_ids: &[Uuid]) -> PortResult<Vec<Document>> {
        let query = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d \
             LEFT JOIN document_shares s ON s.document_id = d.id \
             WHERE d.id = ANY($1) GROUP BY d.id ORDER BY d.created_at DESC"
        );
        let records = sqlx::query_as::<_, DocumentRecord>(&query)
            .bind(document_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn delete_document(&self, document_id: Uuid) -> PortResult<()> {
        // Share edges and comments go with it through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Document {} not found", document_id)));
        }
        Ok(())
    }

    // --- Sharing ---
    async fn add_share(&self, document_id: Uuid, user_id: Uuid) -> PortResult<bool> {
        let result = sqlx::query(
            "INSERT INTO document_shares (document_id, user_id) VALUES ($1, $2) \
             ON CONFLICT (document_id, user_id) DO NOTHING",
        )
        .bind(document_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn remove_share(&self, document_id: Uuid, user_id: Uuid) -> PortResult<bool> {
        let result = sqlx::query("DELETE FROM document_shares WHERE document_id = $1 AND user_id = $2")
            .bind(document_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    // --- Comment Management ---
    async fn insert_comment(&self, comment: NewComment) -> PortResult<Comment> {
        let query = format!(
            "INSERT INTO comments \
             (id, document_id, author_id, author_name, author_avatar_url, content, page, parent_comment_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {COMMENT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, CommentRecord>(&query)
            .bind(Uuid::new_v4())
            .bind(comment.document_id)
            .bind(comment.author_id)
            .bind(&comment.author_name)
            .bind(&comment.author_avatar_url)
            .bind(&comment.content)
            .bind(comment.page)
            .bind(comment.parent_comment_id)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_comment_by_id(&self, comment_id: Uuid) -> PortResult<Comment> {
        let query = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1");
        let record = sqlx::query_as::<_, CommentRecord>(&query)
            .bind(comment_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_unexpected(format!("Comment {} not found", comment_id)))?;
        Ok(record.to_domain())
    }

    async fn list_comments_by_document(&self, document_id: Uuid) -> PortResult<Vec<Comment>> {
        let query = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE document_id = $1 \
             ORDER BY created_at DESC, seq DESC"
        );
        let records = sqlx::query_as::<_, CommentRecord>(&query)
            .bind(document_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn delete_comment(&self, comment_id: Uuid) -> PortResult<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }
}
