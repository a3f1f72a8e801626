//! services/api/src/web/comments.rs
//!
//! Comment endpoints. Comments are stored flat; the thread endpoint returns
//! the reconstructed reply trees in reading order.

use axum::{
    extract::State,
    response::IntoResponse,
    Extension,
};
use chrono::{DateTime, Utc};
use codoc_core::{Comment, CommentDraft, ThreadNode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::documents::PdfIdQuery;
use crate::web::extract::{ApiJson, ApiQuery};
use crate::web::middleware::CurrentUser;
use crate::web::response::{ApiMessage, Reply};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommentDto {
    pub id: Uuid,
    pub pdf_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub author_img: Option<String>,
    /// Rich text, returned exactly as submitted.
    pub content: String,
    pub page: i32,
    pub parent_comment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Comment> for CommentDto {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            pdf_id: comment.document_id,
            author_id: comment.author_id,
            author_name: comment.author_name,
            author_img: comment.author_avatar_url,
            content: comment.content,
            page: comment.page,
            parent_comment_id: comment.parent_comment_id,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

/// One comment in a thread listing. Entries come in pre-order: every comment
/// is followed by its replies, and `depth` tells how far to indent it.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThreadEntryDto {
    #[serde(flatten)]
    pub comment: CommentDto,
    pub depth: usize,
    /// The parent was deleted, so this reply is shown as a root.
    pub orphaned: bool,
    pub reply_count: usize,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadCommentRequest {
    pub pdf_id: Uuid,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub page: i64,
    pub parent_comment_id: Option<Uuid>,
    pub author_img: Option<String>,
    pub author_name: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct FetchCommentsQuery {
    pub pdf_id: Uuid,
    /// Only comments anchored to this page.
    pub page: Option<i32>,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CommentIdQuery {
    pub comment_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct CommentResponse {
    pub comment: CommentDto,
}

#[derive(Serialize, ToSchema)]
pub struct CommentListResponse {
    pub comments: Vec<CommentDto>,
}

#[derive(Serialize, ToSchema)]
pub struct ThreadResponse {
    pub thread: Vec<ThreadEntryDto>,
}

/// Lays the forest out in pre-order, without recursing into deep threads.
fn flatten_thread(forest: Vec<ThreadNode>) -> Vec<ThreadEntryDto> {
    let mut entries = Vec::new();
    let mut stack: Vec<ThreadNode> = forest.into_iter().rev().collect();
    while let Some(node) = stack.pop() {
        let ThreadNode {
            comment,
            depth,
            orphaned,
            replies,
        } = node;
        entries.push(ThreadEntryDto {
            comment: comment.into(),
            depth,
            orphaned,
            reply_count: replies.len(),
        });
        stack.extend(replies.into_iter().rev());
    }
    entries
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/pdf/upload-comments - Comment on a page, or reply to a comment
#[utoipa::path(
    post,
    path = "/api/pdf/upload-comments",
    request_body = UploadCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CommentResponse),
        (status = 400, description = "Empty content, bad page or bad parent", body = ApiMessage),
        (status = 403, description = "No access to the document", body = ApiMessage),
        (status = 404, description = "No such document", body = ApiMessage)
    )
)]
pub async fn upload_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    ApiJson(req): ApiJson<UploadCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = CommentDraft {
        document_id: req.pdf_id,
        content: req.content,
        page: req.page,
        parent_comment_id: req.parent_comment_id,
        author_name: req.author_name,
        author_avatar_url: req.author_img,
    };
    let comment = state.comments.create(user_id, draft).await?;
    Ok(Reply::created(
        "Comment added successfully",
        CommentResponse {
            comment: comment.into(),
        },
    ))
}

/// GET /api/pdf/fetch-comments - Comments on a document, newest first
#[utoipa::path(
    get,
    path = "/api/pdf/fetch-comments",
    params(FetchCommentsQuery),
    responses(
        (status = 200, description = "Flat comment list, newest first", body = CommentListResponse),
        (status = 403, description = "No access to the document", body = ApiMessage),
        (status = 404, description = "No such document", body = ApiMessage)
    )
)]
pub async fn fetch_comments_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<FetchCommentsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state.ledger.require_access(query.pdf_id, user_id).await?;
    let comments = match query.page {
        Some(page) => state.comments.list_by_page(query.pdf_id, page).await?,
        None => state.comments.list_by_document(query.pdf_id).await?,
    };
    Ok(Reply::ok(
        "Comments fetched",
        CommentListResponse {
            comments: comments.into_iter().map(CommentDto::from).collect(),
        },
    ))
}

/// GET /api/pdf/comment-thread - The document's comments as reply threads
#[utoipa::path(
    get,
    path = "/api/pdf/comment-thread",
    params(PdfIdQuery),
    responses(
        (status = 200, description = "Threads in pre-order with depths", body = ThreadResponse),
        (status = 403, description = "No access to the document", body = ApiMessage),
        (status = 404, description = "No such document", body = ApiMessage)
    )
)]
pub async fn comment_thread_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<PdfIdQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state.ledger.require_access(query.pdf_id, user_id).await?;
    let forest = state.comments.thread(query.pdf_id).await?;
    Ok(Reply::ok(
        "Comment thread fetched",
        ThreadResponse {
            thread: flatten_thread(forest),
        },
    ))
}

/// DELETE /api/pdf/delete-comment - Delete one of your own comments
///
/// Replies to the deleted comment are kept.
#[utoipa::path(
    delete,
    path = "/api/pdf/delete-comment",
    params(CommentIdQuery),
    responses(
        (status = 200, description = "Comment deleted", body = ApiMessage),
        (status = 403, description = "Only the author may delete", body = ApiMessage),
        (status = 404, description = "Comment not found or already deleted", body = ApiMessage)
    )
)]
pub async fn delete_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<CommentIdQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state.comments.delete(query.comment_id, user_id).await?;
    Ok(Reply::message("Comment deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use codoc_core::build_thread;

    fn comment(id: u128, parent: Option<u128>) -> Comment {
        let now = Utc::now();
        Comment {
            id: Uuid::from_u128(id),
            document_id: Uuid::from_u128(100),
            author_id: Uuid::from_u128(200),
            author_name: "Ann".to_string(),
            author_avatar_url: None,
            content: format!("comment {id}"),
            page: 1,
            parent_comment_id: parent.map(Uuid::from_u128),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn thread_entries_come_parents_first_with_depths() {
        // Feed order: a root with a reply and a nested reply, then a second root.
        let forest = build_thread(vec![
            comment(1, None),
            comment(2, Some(1)),
            comment(3, Some(2)),
            comment(4, None),
            comment(5, Some(99)),
        ]);
        let entries = flatten_thread(forest);
        let layout: Vec<(u128, usize, bool, usize)> = entries
            .iter()
            .map(|e| (e.comment.id.as_u128(), e.depth, e.orphaned, e.reply_count))
            .collect();
        assert_eq!(
            layout,
            vec![
                (1, 0, false, 1),
                (2, 1, false, 1),
                (3, 2, false, 0),
                (4, 0, false, 0),
                (5, 0, true, 0),
            ]
        );
    }

    #[test]
    fn serialized_entries_keep_the_comment_fields_at_top_level() {
        let entry = flatten_thread(build_thread(vec![comment(7, None)])).remove(0);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["id"], serde_json::json!(Uuid::from_u128(7)));
        assert_eq!(value["pdfId"], serde_json::json!(Uuid::from_u128(100)));
        assert_eq!(value["replyCount"], 0);
        assert_eq!(value["depth"], 0);
    }
}
