//! crates/codoc_core/src/memory.rs
//!
//! In-memory implementations of the ports. They back the test suites and let
//! the API run without PostgreSQL or SMTP (`STORAGE=memory`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::{
    AuthSession, Comment, Document, DocumentMetadata, NewComment, NewDocument, OtpPurpose, User,
    UserCredentials,
};
use crate::otp::OneTimeCode;
use crate::ports::{DatabaseService, Notification, NotificationService, PortError, PortResult};

//=========================================================================================
// Database
//=========================================================================================

struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    hashed_password: String,
    avatar_url: Option<String>,
    is_account_verified: bool,
    created_at: DateTime<Utc>,
}

struct DocumentRow {
    id: Uuid,
    owner_id: Uuid,
    share_token: String,
    metadata: DocumentMetadata,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    users: BTreeMap<Uuid, UserRow>,
    auth_sessions: HashMap<String, AuthSession>,
    codes: HashMap<(Uuid, OtpPurpose), OneTimeCode>,
    documents: BTreeMap<Uuid, DocumentRow>,
    /// `(document_id, user_id)` edges; both directions of sharing are read from here.
    shares: BTreeSet<(Uuid, Uuid)>,
    /// Insertion sequence plus record, so equal timestamps still sort stably.
    comments: Vec<(u64, Comment)>,
    next_seq: u64,
}

impl State {
    fn user(&self, row: &UserRow) -> User {
        User {
            id: row.id,
            name: row.name.clone(),
            email: row.email.clone(),
            avatar_url: row.avatar_url.clone(),
            is_account_verified: row.is_account_verified,
            shared_files: self
                .shares
                .iter()
                .filter(|(_, user_id)| *user_id == row.id)
                .map(|(document_id, _)| *document_id)
                .collect(),
            created_at: row.created_at,
        }
    }

    fn document(&self, row: &DocumentRow) -> Document {
        Document {
            id: row.id,
            owner_id: row.owner_id,
            share_token: row.share_token.clone(),
            shared_with: self
                .shares
                .iter()
                .filter(|(document_id, _)| *document_id == row.id)
                .map(|(_, user_id)| *user_id)
                .collect(),
            metadata: row.metadata.clone(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    fn user_row_mut(&mut self, user_id: Uuid) -> PortResult<&mut UserRow> {
        self.users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }
}

/// A `DatabaseService` that keeps everything in process memory.
#[derive(Default)]
pub struct InMemoryDatabase {
    state: Mutex<State>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> PortResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| PortError::Unexpected("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl DatabaseService for InMemoryDatabase {
    async fn create_user(&self, name: &str, email: &str, hashed_password: &str) -> PortResult<User> {
        let mut state = self.state()?;
        if state.users.values().any(|u| u.email == email) {
            return Err(PortError::Conflict(format!("email {} already registered", email)));
        }
        let row = UserRow {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
            avatar_url: None,
            is_account_verified: false,
            created_at: Utc::now(),
        };
        let user = state.user(&row);
        state.users.insert(row.id, row);
        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let state = self.state()?;
        state
            .users
            .get(&user_id)
            .map(|row| state.user(row))
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn find_user_by_email(&self, email: &str) -> PortResult<Option<User>> {
        let state = self.state()?;
        Ok(state
            .users
            .values()
            .find(|row| row.email == email)
            .map(|row| state.user(row)))
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let state = self.state()?;
        state
            .users
            .values()
            .find(|row| row.email == email)
            .map(|row| UserCredentials {
                user_id: row.id,
                email: row.email.clone(),
                hashed_password: row.hashed_password.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("User with email {} not found", email)))
    }

    async fn get_users_by_ids(&self, user_ids: &[Uuid]) -> PortResult<Vec<User>> {
        let state = self.state()?;
        Ok(user_ids
            .iter()
            .filter_map(|id| state.users.get(id))
            .map(|row| state.user(row))
            .collect())
    }

    async fn update_password(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()> {
        let mut state = self.state()?;
        state.user_row_mut(user_id)?.hashed_password = hashed_password.to_string();
        Ok(())
    }

    async fn mark_account_verified(&self, user_id: Uuid) -> PortResult<()> {
        let mut state = self.state()?;
        state.user_row_mut(user_id)?.is_account_verified = true;
        Ok(())
    }

    async fn set_avatar_url(&self, user_id: Uuid, avatar_url: &str) -> PortResult<()> {
        let mut state = self.state()?;
        state.user_row_mut(user_id)?.avatar_url = Some(avatar_url.to_string());
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<AuthSession> {
        let session = AuthSession {
            id: session_id.to_string(),
            user_id,
            expires_at,
        };
        self.state()?
            .auth_sessions
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let state = self.state()?;
        match state.auth_sessions.get(session_id) {
            Some(session) if session.expires_at > Utc::now() => Ok(session.user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.state()?.auth_sessions.remove(session_id);
        Ok(())
    }

    async fn get_one_time_code(&self, user_id: Uuid, purpose: OtpPurpose) -> PortResult<OneTimeCode> {
        Ok(self
            .state()?
            .codes
            .get(&(user_id, purpose))
            .cloned()
            .unwrap_or_default())
    }

    async fn put_one_time_code(
        &self,
        user_id: Uuid,
        purpose: OtpPurpose,
        code: &OneTimeCode,
    ) -> PortResult<()> {
        self.state()?.codes.insert((user_id, purpose), code.clone());
        Ok(())
    }

    async fn create_document(&self, document: NewDocument) -> PortResult<Document> {
        let mut state = self.state()?;
        if state
            .documents
            .values()
            .any(|d| d.share_token == document.share_token)
        {
            return Err(PortError::Conflict(format!(
                "share token {} already in use",
                document.share_token
            )));
        }
        let now = Utc::now();
        let row = DocumentRow {
            id: Uuid::new_v4(),
            owner_id: document.owner_id,
            share_token: document.share_token,
            metadata: document.metadata,
            created_at: now,
            updated_at: now,
        };
        let created = state.document(&row);
        state.documents.insert(row.id, row);
        Ok(created)
    }

    async fn get_document_by_id(&self, document_id: Uuid) -> PortResult<Document> {
        let state = self.state()?;
        state
            .documents
            .get(&document_id)
            .map(|row| state.document(row))
            .ok_or_else(|| PortError::NotFound(format!("Document {} not found", document_id)))
    }

    async fn share_token_exists(&self, share_token: &str) -> PortResult<bool> {
        Ok(self
            .state()?
            .documents
            .values()
            .any(|d| d.share_token == share_token))
    }

    async fn list_documents_by_owner(&self, owner_id: Uuid) -> PortResult<Vec<Document>> {
        let state = self.state()?;
        let mut documents: Vec<Document> = state
            .documents
            .values()
            .filter(|row| row.owner_id == owner_id)
            .map(|row| state.document(row))
            .collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents)
    }

    async fn get_documents_by_ids(&self, document_ids: &[Uuid]) -> PortResult<Vec<Document>> {
        let state = self.state()?;
        Ok(document_ids
            .iter()
            .filter_map(|id| state.documents.get(id))
            .map(|row| state.document(row))
            .collect())
    }

    async fn delete_document(&self, document_id: Uuid) -> PortResult<()> {
        let mut state = self.state()?;
        if state.documents.remove(&document_id).is_none() {
            return Err(PortError::NotFound(format!("Document {} not found", document_id)));
        }
        state.shares.retain(|(d, _)| *d != document_id);
        state.comments.retain(|(_, c)| c.document_id != document_id);
        Ok(())
    }

    async fn add_share(&self, document_id: Uuid, user_id: Uuid) -> PortResult<bool> {
        let mut state = self.state()?;
        if !state.documents.contains_key(&document_id) {
            return Err(PortError::NotFound(format!("Document {} not found", document_id)));
        }
        if !state.users.contains_key(&user_id) {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(state.shares.insert((document_id, user_id)))
    }

    async fn remove_share(&self, document_id: Uuid, user_id: Uuid) -> PortResult<bool> {
        Ok(self.state()?.shares.remove(&(document_id, user_id)))
    }

    async fn insert_comment(&self, comment: NewComment) -> PortResult<Comment> {
        let mut state = self.state()?;
        let now = Utc::now();
        let created = Comment {
            id: Uuid::new_v4(),
            document_id: comment.document_id,
            author_id: comment.author_id,
            author_name: comment.author_name,
            author_avatar_url: comment.author_avatar_url,
            content: comment.content,
            page: comment.page,
            parent_comment_id: comment.parent_comment_id,
            created_at: now,
            updated_at: now,
        };
        let seq = state.next_seq;
        state.next_seq += 1;
        state.comments.push((seq, created.clone()));
        Ok(created)
    }

    async fn get_comment_by_id(&self, comment_id: Uuid) -> PortResult<Comment> {
        self.state()?
            .comments
            .iter()
            .find(|(_, c)| c.id == comment_id)
            .map(|(_, c)| c.clone())
            .ok_or_else(|| PortError::NotFound(format!("Comment {} not found", comment_id)))
    }

    async fn list_comments_by_document(&self, document_id: Uuid) -> PortResult<Vec<Comment>> {
        let state = self.state()?;
        let mut matching: Vec<&(u64, Comment)> = state
            .comments
            .iter()
            .filter(|(_, c)| c.document_id == document_id)
            .collect();
        matching.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a))
        });
        Ok(matching.into_iter().map(|(_, c)| c.clone()).collect())
    }

    async fn delete_comment(&self, comment_id: Uuid) -> PortResult<bool> {
        let mut state = self.state()?;
        let before = state.comments.len();
        state.comments.retain(|(_, c)| c.id != comment_id);
        Ok(state.comments.len() != before)
    }
}

//=========================================================================================
// Notifications
//=========================================================================================

/// A `NotificationService` that records every message instead of sending it.
/// Built with [`InMemoryOutbox::failing`] it rejects every message instead.
#[derive(Default)]
pub struct InMemoryOutbox {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// A snapshot of everything delivered so far, oldest first.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, address: &str) -> Vec<Notification> {
        self.sent().into_iter().filter(|n| n.to == address).collect()
    }
}

#[async_trait]
impl NotificationService for InMemoryOutbox {
    async fn send(&self, notification: Notification) -> PortResult<()> {
        if self.fail {
            return Err(PortError::Unexpected("outbox configured to fail".to_string()));
        }
        self.sent
            .lock()
            .map_err(|_| PortError::Unexpected("outbox lock poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}
