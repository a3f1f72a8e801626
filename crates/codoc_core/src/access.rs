//! crates/codoc_core/src/access.rs
//!
//! The access control ledger: document ownership, share grants and the
//! authorization check every document-scoped operation goes through.
//!
//! Sharing is stored as one edge per `(document, user)` pair, so a document's
//! `shared_with` set and a user's `shared_files` set are two views of the same
//! records and cannot drift apart.

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{Document, DocumentMetadata, Grantee, NewDocument};
use crate::error::{ConflictKind, CoreError, CoreResult};
use crate::notifications;
use crate::ports::{DatabaseService, NotificationService, PortError};

const SHARE_TOKEN_LEN: usize = 12;
const SHARE_TOKEN_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Authorized,
    Forbidden,
}

/// Generates an unguessable alphanumeric share token.
pub fn generate_share_token<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SHARE_TOKEN_LEN)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}

/// Loads the document and decides whether `user_id` may see it.
pub(crate) async fn decide(
    db: &dyn DatabaseService,
    document_id: Uuid,
    user_id: Uuid,
) -> CoreResult<(Document, AccessDecision)> {
    let document = db
        .get_document_by_id(document_id)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => CoreError::not_found("PDF not found"),
            other => other.into(),
        })?;
    let decision = if document.is_owned_by(user_id) || document.is_shared_with(user_id) {
        AccessDecision::Authorized
    } else {
        AccessDecision::Forbidden
    };
    Ok((document, decision))
}

/// Like [`decide`], but a `Forbidden` decision becomes an error.
pub(crate) async fn authorize(
    db: &dyn DatabaseService,
    document_id: Uuid,
    user_id: Uuid,
) -> CoreResult<Document> {
    match decide(db, document_id, user_id).await? {
        (document, AccessDecision::Authorized) => Ok(document),
        (_, AccessDecision::Forbidden) => Err(CoreError::Forbidden),
    }
}

fn validate_metadata(metadata: &DocumentMetadata) -> CoreResult<()> {
    let blank = [
        &metadata.name,
        &metadata.url,
        &metadata.content_type,
        &metadata.file_hash,
    ]
    .iter()
    .any(|field| field.trim().is_empty());
    if blank || metadata.size_bytes <= 0 || metadata.last_modified <= 0 {
        return Err(CoreError::invalid("Please provide all the fields"));
    }
    Ok(())
}

//=========================================================================================
// The Ledger Service
//=========================================================================================

#[derive(Clone)]
pub struct AccessLedger {
    db: Arc<dyn DatabaseService>,
    notifier: Arc<dyn NotificationService>,
    public_base_url: String,
}

impl AccessLedger {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        notifier: Arc<dyn NotificationService>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            notifier,
            public_base_url: public_base_url.into(),
        }
    }

    /// Records a newly uploaded document owned by `owner_id`.
    pub async fn upload(&self, owner_id: Uuid, metadata: DocumentMetadata) -> CoreResult<Document> {
        validate_metadata(&metadata)?;
        self.db.get_user_by_id(owner_id).await?;

        for _ in 0..SHARE_TOKEN_ATTEMPTS {
            let share_token = generate_share_token(&mut rand::thread_rng());
            if self.db.share_token_exists(&share_token).await? {
                continue;
            }
            let new_document = NewDocument {
                owner_id,
                share_token,
                metadata: metadata.clone(),
            };
            match self.db.create_document(new_document).await {
                Ok(document) => {
                    info!(document_id = %document.id, %owner_id, "document uploaded");
                    return Ok(document);
                }
                // Lost a race for the token; draw another one.
                Err(PortError::Conflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(CoreError::Internal(
            "could not generate a unique share token".to_string(),
        ))
    }

    pub async fn check_access(&self, document_id: Uuid, user_id: Uuid) -> CoreResult<AccessDecision> {
        let (_, decision) = decide(self.db.as_ref(), document_id, user_id).await?;
        Ok(decision)
    }

    /// Returns the document if `user_id` may see it, `Forbidden` otherwise.
    pub async fn require_access(&self, document_id: Uuid, user_id: Uuid) -> CoreResult<Document> {
        authorize(self.db.as_ref(), document_id, user_id).await
    }

    /// Whether `user_id` owns the document. Users who may not see the document
    /// get `NotFound`, so the answer does not reveal that it exists.
    pub async fn is_owner(&self, document_id: Uuid, user_id: Uuid) -> CoreResult<bool> {
        match decide(self.db.as_ref(), document_id, user_id).await? {
            (document, AccessDecision::Authorized) => Ok(document.is_owned_by(user_id)),
            (_, AccessDecision::Forbidden) => Err(CoreError::not_found("PDF not found")),
        }
    }

    /// Grants the user registered under `grantee_email` access to the document
    /// and mails them the collaboration link.
    pub async fn grant(&self, document_id: Uuid, granter_id: Uuid, grantee_email: &str) -> CoreResult<Grantee> {
        let grantee_email = grantee_email.trim();
        if grantee_email.is_empty() {
            return Err(CoreError::invalid("Please provide an email"));
        }

        let (document, _) = decide(self.db.as_ref(), document_id, granter_id).await?;
        if !document.is_owned_by(granter_id) {
            return Err(CoreError::Forbidden);
        }
        let granter = self.db.get_user_by_id(granter_id).await?;
        let grantee = self
            .db
            .find_user_by_email(grantee_email)
            .await?
            .ok_or_else(|| CoreError::not_found("User with this email does not exist"))?;

        if grantee.id == granter_id {
            return Err(CoreError::Conflict(ConflictKind::SelfShare));
        }
        if document.is_shared_with(grantee.id) {
            return Err(CoreError::Conflict(ConflictKind::AlreadyShared));
        }
        if !self.db.add_share(document_id, grantee.id).await? {
            return Err(CoreError::Conflict(ConflictKind::AlreadyShared));
        }
        info!(%document_id, grantee_id = %grantee.id, "access granted");

        let link = notifications::collaboration_link(&self.public_base_url, document.id, &document.share_token);
        let message = notifications::access_granted(&grantee, &granter, &document, &link);
        notifications::deliver(self.notifier.as_ref(), message).await;

        Ok(grantee.into())
    }

    /// Removes `grantee_id` from the document. Only the owner, or the grantee
    /// leaving on their own, may do this. Returns whether anything was removed;
    /// revoking a non-member is a successful no-op.
    pub async fn revoke(&self, document_id: Uuid, revoker_id: Uuid, grantee_id: Uuid) -> CoreResult<bool> {
        let (document, _) = decide(self.db.as_ref(), document_id, revoker_id).await?;
        if !document.is_owned_by(revoker_id) && revoker_id != grantee_id {
            return Err(CoreError::Forbidden);
        }

        let removed = self.db.remove_share(document_id, grantee_id).await?;
        if !removed {
            return Ok(false);
        }
        info!(%document_id, %grantee_id, %revoker_id, "access revoked");

        if revoker_id != grantee_id {
            let revoker = self.db.get_user_by_id(revoker_id).await?;
            match self.db.get_user_by_id(grantee_id).await {
                Ok(grantee) => {
                    let message = notifications::access_revoked(&grantee, &revoker, &document);
                    notifications::deliver(self.notifier.as_ref(), message).await;
                }
                Err(e) => warn!(%grantee_id, error = %e, "revoked user could not be loaded for notice"),
            }
        }
        Ok(true)
    }

    /// Public details of everyone the document is shared with.
    pub async fn list_grantees(&self, document_id: Uuid) -> CoreResult<Vec<Grantee>> {
        let document = self.db.get_document_by_id(document_id).await?;
        let ids: Vec<Uuid> = document.shared_with.iter().copied().collect();
        let users = self.db.get_users_by_ids(&ids).await?;
        Ok(users.into_iter().map(Grantee::from).collect())
    }

    /// Deletes the document and every share edge pointing at it. Owner only.
    pub async fn delete(&self, document_id: Uuid, requester_id: Uuid) -> CoreResult<()> {
        let (document, _) = decide(self.db.as_ref(), document_id, requester_id).await?;
        if !document.is_owned_by(requester_id) {
            return Err(CoreError::Forbidden);
        }
        self.db.delete_document(document_id).await?;
        info!(%document_id, "document deleted");
        Ok(())
    }

    pub async fn owned_documents(&self, user_id: Uuid) -> CoreResult<Vec<Document>> {
        Ok(self.db.list_documents_by_owner(user_id).await?)
    }

    /// Documents other users have shared with `user_id`.
    pub async fn shared_with_me(&self, user_id: Uuid) -> CoreResult<Vec<Document>> {
        let user = self.db.get_user_by_id(user_id).await?;
        let ids: Vec<Uuid> = user.shared_files.iter().copied().collect();
        Ok(self.db.get_documents_by_ids(&ids).await?)
    }

    /// Documents `user_id` owns and has shared with at least one other user.
    pub async fn shared_by_me(&self, user_id: Uuid) -> CoreResult<Vec<Document>> {
        let owned = self.db.list_documents_by_owner(user_id).await?;
        Ok(owned
            .into_iter()
            .filter(|document| !document.shared_with.is_empty())
            .collect())
    }

    /// Resolves a collaboration link. A token that does not belong to the
    /// document is reported exactly like a missing document.
    pub async fn open_collaboration_link(
        &self,
        document_id: Uuid,
        share_token: &str,
        user_id: Uuid,
    ) -> CoreResult<Document> {
        let (document, decision) = decide(self.db.as_ref(), document_id, user_id).await?;
        if document.share_token != share_token {
            return Err(CoreError::not_found("PDF not found"));
        }
        match decision {
            AccessDecision::Authorized => Ok(document),
            AccessDecision::Forbidden => Err(CoreError::Forbidden),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::User;
    use crate::memory::{InMemoryDatabase, InMemoryOutbox};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Fixture {
        db: Arc<InMemoryDatabase>,
        outbox: Arc<InMemoryOutbox>,
        ledger: AccessLedger,
        owner: User,
        guest: User,
        document: Document,
    }

    fn metadata() -> DocumentMetadata {
        DocumentMetadata {
            name: "thesis.pdf".to_string(),
            url: "https://files.example.com/thesis.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size_bytes: 52_000,
            file_hash: "9f86d081".to_string(),
            last_modified: 1_700_000_000_000,
        }
    }

    async fn fixture_with(outbox: InMemoryOutbox) -> Fixture {
        let db = Arc::new(InMemoryDatabase::new());
        let outbox = Arc::new(outbox);
        let ledger = AccessLedger::new(db.clone(), outbox.clone(), "https://codoc.test");
        let owner = db.create_user("Owner", "owner@example.com", "h").await.unwrap();
        let guest = db.create_user("Guest", "guest@example.com", "h").await.unwrap();
        let document = ledger.upload(owner.id, metadata()).await.unwrap();
        Fixture {
            db,
            outbox,
            ledger,
            owner,
            guest,
            document,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(InMemoryOutbox::new()).await
    }

    async fn members(f: &Fixture) -> Vec<Uuid> {
        f.db.get_document_by_id(f.document.id)
            .await
            .unwrap()
            .shared_with
            .into_iter()
            .collect()
    }

    #[test]
    fn share_tokens_are_alphanumeric() {
        let mut rng = StdRng::seed_from_u64(1);
        let token = generate_share_token(&mut rng);
        assert_eq!(token.len(), SHARE_TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_share_token(&mut rng));
    }

    #[tokio::test]
    async fn upload_rejects_incomplete_metadata() {
        let f = fixture().await;
        let mut bad = metadata();
        bad.url = "  ".to_string();
        assert!(matches!(
            f.ledger.upload(f.owner.id, bad).await,
            Err(CoreError::InvalidInput(_))
        ));
        let mut bad = metadata();
        bad.size_bytes = 0;
        assert!(matches!(
            f.ledger.upload(f.owner.id, bad).await,
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn grant_updates_both_views_and_mails_the_link() {
        let f = fixture().await;
        let grantee = f
            .ledger
            .grant(f.document.id, f.owner.id, "guest@example.com")
            .await
            .unwrap();
        assert_eq!(grantee.id, f.guest.id);

        assert_eq!(members(&f).await, vec![f.guest.id]);
        let guest = f.db.get_user_by_id(f.guest.id).await.unwrap();
        assert!(guest.shared_files.contains(&f.document.id));

        let mail = f.outbox.sent_to("guest@example.com");
        assert_eq!(mail.len(), 1);
        let link = format!(
            "https://codoc.test/pdf/collaborate/{}/{}",
            f.document.id, f.document.share_token
        );
        assert!(mail[0].body.contains(&link));
    }

    #[tokio::test]
    async fn grant_to_unknown_email_changes_nothing() {
        let f = fixture().await;
        let err = f
            .ledger
            .grant(f.document.id, f.owner.id, "ghost@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
        assert!(members(&f).await.is_empty());
        assert!(f.db.get_user_by_id(f.guest.id).await.unwrap().shared_files.is_empty());
        assert!(f.outbox.sent().is_empty());
    }

    #[tokio::test]
    async fn self_share_and_duplicate_share_conflict() {
        let f = fixture().await;
        let err = f
            .ledger
            .grant(f.document.id, f.owner.id, "owner@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(ConflictKind::SelfShare)));

        f.ledger
            .grant(f.document.id, f.owner.id, "guest@example.com")
            .await
            .unwrap();
        let err = f
            .ledger
            .grant(f.document.id, f.owner.id, "guest@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(ConflictKind::AlreadyShared)));
        assert_eq!(members(&f).await, vec![f.guest.id]);
    }

    #[tokio::test]
    async fn only_the_owner_can_grant_or_delete() {
        let f = fixture().await;
        let third = f.db.create_user("Third", "third@example.com", "h").await.unwrap();
        f.ledger
            .grant(f.document.id, f.owner.id, "guest@example.com")
            .await
            .unwrap();

        let err = f
            .ledger
            .grant(f.document.id, f.guest.id, "third@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden));
        assert!(!f.db.get_document_by_id(f.document.id).await.unwrap().is_shared_with(third.id));

        let err = f.ledger.delete(f.document.id, f.guest.id).await.unwrap_err();
        assert!(matches!(err, CoreError::Forbidden));
        assert!(f.db.get_document_by_id(f.document.id).await.is_ok());
    }

    #[tokio::test]
    async fn grant_then_revoke_round_trips() {
        let f = fixture().await;
        let before = members(&f).await;

        f.ledger
            .grant(f.document.id, f.owner.id, "guest@example.com")
            .await
            .unwrap();
        assert!(f.ledger.revoke(f.document.id, f.owner.id, f.guest.id).await.unwrap());

        assert_eq!(members(&f).await, before);
        assert!(f.db.get_user_by_id(f.guest.id).await.unwrap().shared_files.is_empty());
        assert_eq!(
            f.ledger.check_access(f.document.id, f.guest.id).await.unwrap(),
            AccessDecision::Forbidden
        );
        assert_eq!(f.outbox.sent_to("guest@example.com").len(), 2);
    }

    #[tokio::test]
    async fn revoking_a_non_member_is_a_quiet_no_op() {
        let f = fixture().await;
        let removed = f.ledger.revoke(f.document.id, f.owner.id, f.guest.id).await.unwrap();
        assert!(!removed);
        assert!(f.outbox.sent().is_empty());

        let removed = f.ledger.revoke(f.document.id, f.owner.id, Uuid::new_v4()).await.unwrap();
        assert!(!removed);
    }

    #[tokio::test]
    async fn grantees_may_leave_but_not_evict_others() {
        let f = fixture().await;
        let third = f.db.create_user("Third", "third@example.com", "h").await.unwrap();
        f.ledger.grant(f.document.id, f.owner.id, "guest@example.com").await.unwrap();
        f.ledger.grant(f.document.id, f.owner.id, "third@example.com").await.unwrap();

        let err = f
            .ledger
            .revoke(f.document.id, f.guest.id, third.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden));

        assert!(f.ledger.revoke(f.document.id, f.guest.id, f.guest.id).await.unwrap());
        assert_eq!(members(&f).await, vec![third.id]);
    }

    #[tokio::test]
    async fn owner_never_becomes_a_member() {
        let f = fixture().await;
        let third = f.db.create_user("Third", "third@example.com", "h").await.unwrap();
        let steps: [(&str, bool); 6] = [
            ("guest@example.com", true),
            ("owner@example.com", true),
            ("third@example.com", true),
            ("guest@example.com", false),
            ("owner@example.com", false),
            ("third@example.com", true),
        ];
        for (email, grant) in steps {
            if grant {
                let _ = f.ledger.grant(f.document.id, f.owner.id, email).await;
            } else {
                let user = f.db.find_user_by_email(email).await.unwrap().unwrap();
                f.ledger.revoke(f.document.id, f.owner.id, user.id).await.unwrap();
            }
            let document = f.db.get_document_by_id(f.document.id).await.unwrap();
            assert!(!document.is_shared_with(f.owner.id));
        }
        assert_eq!(members(&f).await, vec![third.id]);
    }

    #[tokio::test]
    async fn check_access_covers_owner_member_stranger_and_missing() {
        let f = fixture().await;
        let stranger = f.db.create_user("S", "s@example.com", "h").await.unwrap();
        f.ledger.grant(f.document.id, f.owner.id, "guest@example.com").await.unwrap();

        assert_eq!(f.ledger.check_access(f.document.id, f.owner.id).await.unwrap(), AccessDecision::Authorized);
        assert_eq!(f.ledger.check_access(f.document.id, f.guest.id).await.unwrap(), AccessDecision::Authorized);
        assert_eq!(f.ledger.check_access(f.document.id, stranger.id).await.unwrap(), AccessDecision::Forbidden);
        assert!(matches!(
            f.ledger.check_access(Uuid::new_v4(), f.owner.id).await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn ownership_is_only_answered_for_readers() {
        let f = fixture().await;
        assert!(f.ledger.is_owner(f.document.id, f.owner.id).await.unwrap());
        assert!(matches!(
            f.ledger.is_owner(f.document.id, f.guest.id).await,
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            f.ledger.is_owner(Uuid::new_v4(), f.guest.id).await,
            Err(CoreError::NotFound(_))
        ));

        f.ledger
            .grant(f.document.id, f.owner.id, "guest@example.com")
            .await
            .unwrap();
        assert!(!f.ledger.is_owner(f.document.id, f.guest.id).await.unwrap());
    }

    #[tokio::test]
    async fn notification_failure_keeps_the_grant() {
        let f = fixture_with(InMemoryOutbox::failing()).await;
        f.ledger
            .grant(f.document.id, f.owner.id, "guest@example.com")
            .await
            .unwrap();
        assert_eq!(members(&f).await, vec![f.guest.id]);
    }

    #[tokio::test]
    async fn delete_clears_every_reverse_index() {
        let f = fixture().await;
        let third = f.db.create_user("Third", "third@example.com", "h").await.unwrap();
        f.ledger.grant(f.document.id, f.owner.id, "guest@example.com").await.unwrap();
        f.ledger.grant(f.document.id, f.owner.id, "third@example.com").await.unwrap();

        f.ledger.delete(f.document.id, f.owner.id).await.unwrap();

        for user_id in [f.guest.id, third.id] {
            assert!(f.db.get_user_by_id(user_id).await.unwrap().shared_files.is_empty());
        }
        assert!(matches!(
            f.ledger.check_access(f.document.id, f.owner.id).await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn listings_split_owned_shared_and_invited() {
        let f = fixture().await;
        let quiet = f.ledger.upload(f.owner.id, metadata()).await.unwrap();
        f.ledger.grant(f.document.id, f.owner.id, "guest@example.com").await.unwrap();

        assert_eq!(f.ledger.owned_documents(f.owner.id).await.unwrap().len(), 2);
        let shared: Vec<Uuid> = f.ledger.shared_by_me(f.owner.id).await.unwrap().iter().map(|d| d.id).collect();
        assert_eq!(shared, vec![f.document.id]);
        assert_ne!(quiet.share_token, f.document.share_token);

        let invited: Vec<Uuid> = f.ledger.shared_with_me(f.guest.id).await.unwrap().iter().map(|d| d.id).collect();
        assert_eq!(invited, vec![f.document.id]);

        let grantees = f.ledger.list_grantees(f.document.id).await.unwrap();
        assert_eq!(grantees.len(), 1);
        assert_eq!(grantees[0].email, "guest@example.com");
    }

    #[tokio::test]
    async fn collaboration_link_needs_the_right_token_and_access() {
        let f = fixture().await;
        let token = f.document.share_token.clone();

        let err = f
            .ledger
            .open_collaboration_link(f.document.id, "wrong", f.owner.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));

        let err = f
            .ledger
            .open_collaboration_link(f.document.id, &token, f.guest.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden));

        f.ledger.grant(f.document.id, f.owner.id, "guest@example.com").await.unwrap();
        let opened = f
            .ledger
            .open_collaboration_link(f.document.id, &token, f.guest.id)
            .await
            .unwrap();
        assert_eq!(opened.id, f.document.id);
    }
}
