//! crates/codoc_core/src/comments.rs
//!
//! The comment store: flat comment records with optional parent pointers.
//! Nesting is rebuilt by readers via [`crate::thread::build_thread`].

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::access;
use crate::domain::{Comment, NewComment};
use crate::error::{CoreError, CoreResult};
use crate::ports::{DatabaseService, PortError};
use crate::thread::{build_thread, ThreadNode};

/// A comment as submitted by an author, before validation.
#[derive(Debug, Clone, Default)]
pub struct CommentDraft {
    pub document_id: Uuid,
    pub content: String,
    pub page: i64,
    pub parent_comment_id: Option<Uuid>,
    /// Display name to show next to the comment. Falls back to the author's
    /// profile name when absent or blank.
    pub author_name: Option<String>,
    pub author_avatar_url: Option<String>,
}

#[derive(Clone)]
pub struct CommentStore {
    db: Arc<dyn DatabaseService>,
}

impl CommentStore {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    /// Validates and persists a comment written by `author_id`, who must have
    /// access to the document. A reply's parent must live in the same document.
    pub async fn create(&self, author_id: Uuid, draft: CommentDraft) -> CoreResult<Comment> {
        if draft.content.trim().is_empty() {
            return Err(CoreError::invalid("Comment content is required"));
        }
        let page = i32::try_from(draft.page)
            .ok()
            .filter(|page| *page >= 1)
            .ok_or_else(|| CoreError::invalid("Page must be a positive integer"))?;

        access::authorize(self.db.as_ref(), draft.document_id, author_id).await?;

        if let Some(parent_id) = draft.parent_comment_id {
            let parent = self
                .db
                .get_comment_by_id(parent_id)
                .await
                .map_err(|e| match e {
                    PortError::NotFound(_) => CoreError::invalid("Parent comment does not exist"),
                    other => other.into(),
                })?;
            if parent.document_id != draft.document_id {
                return Err(CoreError::invalid(
                    "Parent comment belongs to a different document",
                ));
            }
        }

        let author = self.db.get_user_by_id(author_id).await?;
        let author_name = draft
            .author_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(author.name);
        let author_avatar_url = draft
            .author_avatar_url
            .filter(|url| !url.trim().is_empty())
            .or(author.avatar_url);

        let comment = self
            .db
            .insert_comment(NewComment {
                document_id: draft.document_id,
                author_id,
                author_name,
                author_avatar_url,
                content: draft.content,
                page,
                parent_comment_id: draft.parent_comment_id,
            })
            .await?;
        info!(comment_id = %comment.id, document_id = %comment.document_id, "comment created");
        Ok(comment)
    }

    /// Every comment on the document, newest first.
    pub async fn list_by_document(&self, document_id: Uuid) -> CoreResult<Vec<Comment>> {
        Ok(self.db.list_comments_by_document(document_id).await?)
    }

    /// Comments anchored to one page, newest first.
    pub async fn list_by_page(&self, document_id: Uuid, page: i32) -> CoreResult<Vec<Comment>> {
        let mut comments = self.list_by_document(document_id).await?;
        comments.retain(|comment| comment.page == page);
        Ok(comments)
    }

    /// The document's comments as reply trees.
    pub async fn thread(&self, document_id: Uuid) -> CoreResult<Vec<ThreadNode>> {
        Ok(build_thread(self.list_by_document(document_id).await?))
    }

    /// Deletes exactly one comment. Replies to it stay in place.
    pub async fn delete(&self, comment_id: Uuid, requester_id: Uuid) -> CoreResult<()> {
        let comment = self
            .db
            .get_comment_by_id(comment_id)
            .await
            .map_err(|e| match e {
                PortError::NotFound(_) => CoreError::not_found("Comment not found or already deleted"),
                other => other.into(),
            })?;
        if comment.author_id != requester_id {
            return Err(CoreError::Forbidden);
        }
        if !self.db.delete_comment(comment_id).await? {
            return Err(CoreError::not_found("Comment not found or already deleted"));
        }
        info!(%comment_id, "comment deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessLedger;
    use crate::domain::{Document, DocumentMetadata, User};
    use crate::memory::{InMemoryDatabase, InMemoryOutbox};

    struct Fixture {
        db: Arc<InMemoryDatabase>,
        store: CommentStore,
        owner: User,
        document: Document,
    }

    async fn fixture() -> Fixture {
        let db = Arc::new(InMemoryDatabase::new());
        let ledger = AccessLedger::new(db.clone(), Arc::new(InMemoryOutbox::new()), "http://localhost");
        let owner = db.create_user("Owner", "owner@example.com", "h").await.unwrap();
        let document = ledger
            .upload(
                owner.id,
                DocumentMetadata {
                    name: "notes.pdf".to_string(),
                    url: "https://files.example.com/notes.pdf".to_string(),
                    content_type: "application/pdf".to_string(),
                    size_bytes: 10,
                    file_hash: "abc".to_string(),
                    last_modified: 1,
                },
            )
            .await
            .unwrap();
        Fixture {
            store: CommentStore::new(db.clone()),
            db,
            owner,
            document,
        }
    }

    fn draft(document_id: Uuid, content: &str, page: i64, parent: Option<Uuid>) -> CommentDraft {
        CommentDraft {
            document_id,
            content: content.to_string(),
            page,
            parent_comment_id: parent,
            author_name: Some("Reviewer".to_string()),
            author_avatar_url: None,
        }
    }

    #[tokio::test]
    async fn rejects_empty_content_and_bad_pages() {
        let f = fixture().await;
        for (content, page) in [("", 1), ("   ", 1), ("ok", 0), ("ok", -3), ("ok", i64::MAX)] {
            let err = f
                .store
                .create(f.owner.id, draft(f.document.id, content, page, None))
                .await
                .unwrap_err();
            assert!(matches!(err, CoreError::InvalidInput(_)), "{content:?} on page {page}");
        }
        assert!(f.store.list_by_document(f.document.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn strangers_cannot_comment() {
        let f = fixture().await;
        let stranger = f.db.create_user("S", "s@example.com", "h").await.unwrap();
        let err = f
            .store
            .create(stranger.id, draft(f.document.id, "hi", 1, None))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden));
    }

    #[tokio::test]
    async fn parent_must_exist_in_the_same_document() {
        let f = fixture().await;
        let err = f
            .store
            .create(f.owner.id, draft(f.document.id, "reply", 1, Some(Uuid::new_v4())))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));

        let other_doc = AccessLedger::new(f.db.clone(), Arc::new(InMemoryOutbox::new()), "http://localhost")
            .upload(f.owner.id, f.document.metadata.clone())
            .await
            .unwrap();
        let elsewhere = f
            .store
            .create(f.owner.id, draft(other_doc.id, "root", 1, None))
            .await
            .unwrap();
        let err = f
            .store
            .create(f.owner.id, draft(f.document.id, "reply", 1, Some(elsewhere.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn author_details_fall_back_to_the_profile() {
        let f = fixture().await;
        f.db.set_avatar_url(f.owner.id, "https://img.example.com/me.png").await.unwrap();
        let mut anonymous = draft(f.document.id, "hello", 2, None);
        anonymous.author_name = Some("  ".to_string());

        let comment = f.store.create(f.owner.id, anonymous).await.unwrap();
        assert_eq!(comment.author_name, "Owner");
        assert_eq!(comment.author_avatar_url.as_deref(), Some("https://img.example.com/me.png"));
        assert_eq!(comment.page, 2);
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_filters_by_page() {
        let f = fixture().await;
        let first = f.store.create(f.owner.id, draft(f.document.id, "one", 1, None)).await.unwrap();
        let second = f.store.create(f.owner.id, draft(f.document.id, "two", 2, None)).await.unwrap();
        let third = f.store.create(f.owner.id, draft(f.document.id, "three", 1, None)).await.unwrap();

        let all: Vec<Uuid> = f.store.list_by_document(f.document.id).await.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(all, vec![third.id, second.id, first.id]);

        let page_one: Vec<Uuid> = f.store.list_by_page(f.document.id, 1).await.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(page_one, vec![third.id, first.id]);
    }

    #[tokio::test]
    async fn only_the_author_deletes_and_replies_survive() {
        let f = fixture().await;
        let guest = f.db.create_user("Guest", "guest@example.com", "h").await.unwrap();
        f.db.add_share(f.document.id, guest.id).await.unwrap();

        let root = f.store.create(f.owner.id, draft(f.document.id, "root", 1, None)).await.unwrap();
        let reply = f.store.create(guest.id, draft(f.document.id, "reply", 1, Some(root.id))).await.unwrap();

        let err = f.store.delete(root.id, guest.id).await.unwrap_err();
        assert!(matches!(err, CoreError::Forbidden));

        f.store.delete(root.id, f.owner.id).await.unwrap();
        let remaining = f.store.list_by_document(f.document.id).await.unwrap();
        assert_eq!(remaining, vec![reply.clone()]);

        let thread = f.store.thread(f.document.id).await.unwrap();
        assert_eq!(thread.len(), 1);
        assert!(thread[0].orphaned);
        assert_eq!(thread[0].comment.id, reply.id);

        let err = f.store.delete(root.id, f.owner.id).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
