//! End-to-end collaboration flows through the core services, backed by the
//! in-memory adapters.

use std::sync::Arc;

use codoc_core::memory::{InMemoryDatabase, InMemoryOutbox};
use codoc_core::{
    build_thread, thread, AccessDecision, AccessLedger, CommentDraft, CommentStore, CoreError,
    DatabaseService, DocumentMetadata,
};

fn metadata() -> DocumentMetadata {
    DocumentMetadata {
        name: "design-review.pdf".to_string(),
        url: "https://files.example.com/design-review.pdf".to_string(),
        content_type: "application/pdf".to_string(),
        size_bytes: 4_096,
        file_hash: "e3b0c442".to_string(),
        last_modified: 1_714_000_000_000,
    }
}

#[tokio::test]
async fn share_comment_reply_then_revoke() {
    let db = Arc::new(InMemoryDatabase::new());
    let outbox = Arc::new(InMemoryOutbox::new());
    let ledger = AccessLedger::new(db.clone(), outbox.clone(), "https://codoc.test");
    let comments = CommentStore::new(db.clone());

    let alice = db.create_user("Alice", "alice@example.com", "h").await.unwrap();
    let bob = db.create_user("Bob", "bob@example.com", "h").await.unwrap();
    let doc = ledger.upload(alice.id, metadata()).await.unwrap();

    // A grants B.
    ledger.grant(doc.id, alice.id, "bob@example.com").await.unwrap();
    let shared = db.get_document_by_id(doc.id).await.unwrap();
    assert_eq!(shared.shared_with.iter().copied().collect::<Vec<_>>(), vec![bob.id]);
    let bob_now = db.get_user_by_id(bob.id).await.unwrap();
    assert_eq!(bob_now.shared_files.iter().copied().collect::<Vec<_>>(), vec![doc.id]);

    // B writes a root comment and a reply to it.
    let c1 = comments
        .create(
            bob.id,
            CommentDraft {
                document_id: doc.id,
                content: "<p>Section 2 needs a diagram</p>".to_string(),
                page: 3,
                author_name: Some("Bob".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let c2 = comments
        .create(
            bob.id,
            CommentDraft {
                document_id: doc.id,
                content: "<p>Or a table</p>".to_string(),
                page: 3,
                parent_comment_id: Some(c1.id),
                author_name: Some("Bob".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let feed = comments.list_by_document(doc.id).await.unwrap();
    assert_eq!(feed.len(), 2);
    let forest = build_thread(feed);
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].comment.id, c1.id);
    assert_eq!(forest[0].replies.len(), 1);
    assert_eq!(forest[0].replies[0].comment.id, c2.id);
    assert_eq!(
        thread::walk(&forest)
            .iter()
            .map(|(depth, c)| (*depth, c.id))
            .collect::<Vec<_>>(),
        vec![(0, c1.id), (1, c2.id)]
    );

    // A revokes B: access is gone, the comments stay.
    assert!(ledger.revoke(doc.id, alice.id, bob.id).await.unwrap());
    assert_eq!(
        ledger.check_access(doc.id, bob.id).await.unwrap(),
        AccessDecision::Forbidden
    );
    let remaining: Vec<_> = comments
        .list_by_document(doc.id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(remaining, vec![c2.id, c1.id]);

    // B can no longer add to the discussion.
    let err = comments
        .create(
            bob.id,
            CommentDraft {
                document_id: doc.id,
                content: "one more thing".to_string(),
                page: 1,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden));

    let to_bob = outbox.sent_to("bob@example.com");
    assert_eq!(to_bob.len(), 2);
    assert!(to_bob[0].body.contains(&doc.share_token));
    assert!(to_bob[1].subject.contains("Revoked"));
}

#[tokio::test]
async fn grant_to_an_unknown_email_leaves_both_sides_untouched() {
    let db = Arc::new(InMemoryDatabase::new());
    let ledger = AccessLedger::new(db.clone(), Arc::new(InMemoryOutbox::new()), "https://codoc.test");
    let alice = db.create_user("Alice", "alice@example.com", "h").await.unwrap();
    let bob = db.create_user("Bob", "bob@example.com", "h").await.unwrap();
    let doc = ledger.upload(alice.id, metadata()).await.unwrap();

    let err = ledger
        .grant(doc.id, alice.id, "carol@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    assert!(db.get_document_by_id(doc.id).await.unwrap().shared_with.is_empty());
    for user_id in [alice.id, bob.id] {
        assert!(db.get_user_by_id(user_id).await.unwrap().shared_files.is_empty());
    }
}
