//! services/api/src/web/documents.rs
//!
//! Document endpoints: upload, listings, details, collaboration links and the
//! share grants managed by the access ledger.

use axum::{
    extract::State,
    response::IntoResponse,
    Extension,
};
use chrono::{DateTime, Utc};
use codoc_core::{AccessDecision, CoreError, Document, DocumentMetadata, Grantee};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::extract::{ApiJson, ApiPath, ApiQuery};
use crate::web::middleware::CurrentUser;
use crate::web::response::{ApiMessage, Reply};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// A document as shown to users who may see it.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDto {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// The token embedded in collaboration links.
    pub share_id: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub size: i64,
    pub file_hash: String,
    pub last_modified: i64,
    pub shared_with: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Document> for DocumentDto {
    fn from(document: Document) -> Self {
        Self {
            id: document.id,
            owner_id: document.owner_id,
            share_id: document.share_token,
            name: document.metadata.name,
            url: document.metadata.url,
            content_type: document.metadata.content_type,
            size: document.metadata.size_bytes,
            file_hash: document.metadata.file_hash,
            last_modified: document.metadata.last_modified,
            shared_with: document.shared_with.into_iter().collect(),
            created_at: document.created_at,
            updated_at: document.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GranteeDto {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl From<Grantee> for GranteeDto {
    fn from(grantee: Grantee) -> Self {
        Self {
            id: grantee.id,
            email: grantee.email,
            name: grantee.name,
            avatar_url: grantee.avatar_url,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadPdfRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub file_hash: String,
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub last_modified: i64,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadPdfResponse {
    pub saved_pdf_id: Uuid,
    pub share_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentListResponse {
    pub data: Vec<DocumentDto>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDetailsResponse {
    pub pdf_details: DocumentDto,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OwnerResponse {
    pub is_owner: bool,
}

#[derive(Serialize, ToSchema)]
pub struct AccessResponse {
    pub shared: bool,
}

#[derive(Serialize, ToSchema)]
pub struct GranteeResponse {
    pub user: GranteeDto,
}

#[derive(Serialize, ToSchema)]
pub struct GranteeListResponse {
    pub users: Vec<GranteeDto>,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PdfIdQuery {
    pub pdf_id: Uuid,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PdfIdRequest {
    pub pdf_id: Uuid,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShareAccessRequest {
    pub pdf_id: Uuid,
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoveAccessRequest {
    pub pdf_id: Uuid,
    pub user_id_to_remove: Uuid,
}

fn document_list(message: &str, documents: Vec<Document>) -> Reply<DocumentListResponse> {
    Reply::ok(
        message,
        DocumentListResponse {
            data: documents.into_iter().map(DocumentDto::from).collect(),
        },
    )
}

//=========================================================================================
// Upload & Listings
//=========================================================================================

/// POST /api/pdf/upload-pdf - Record a PDF already stored in blob storage
#[utoipa::path(
    post,
    path = "/api/pdf/upload-pdf",
    request_body = UploadPdfRequest,
    responses(
        (status = 201, description = "Document recorded", body = UploadPdfResponse),
        (status = 400, description = "Missing or invalid fields", body = ApiMessage),
        (status = 401, description = "Not logged in", body = ApiMessage)
    )
)]
pub async fn upload_pdf_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    ApiJson(req): ApiJson<UploadPdfRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let metadata = DocumentMetadata {
        name: req.name,
        url: req.url,
        content_type: req.content_type,
        size_bytes: req.size,
        file_hash: req.file_hash,
        last_modified: req.last_modified,
    };
    let document = state.ledger.upload(user_id, metadata).await?;
    Ok(Reply::created(
        "PDF uploaded successfully",
        UploadPdfResponse {
            saved_pdf_id: document.id,
            share_id: document.share_token,
        },
    ))
}

/// GET /api/pdf/my-pdf - Documents owned by the current user
#[utoipa::path(
    get,
    path = "/api/pdf/my-pdf",
    responses(
        (status = 200, description = "Owned documents, newest first", body = DocumentListResponse),
        (status = 401, description = "Not logged in", body = ApiMessage)
    )
)]
pub async fn my_pdfs_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let documents = state.ledger.owned_documents(user_id).await?;
    Ok(document_list("PDFs fetched", documents))
}

/// GET /api/pdf/invited-pdf - Documents other users shared with the current user
#[utoipa::path(
    get,
    path = "/api/pdf/invited-pdf",
    responses(
        (status = 200, description = "Documents shared with the current user", body = DocumentListResponse),
        (status = 401, description = "Not logged in", body = ApiMessage)
    )
)]
pub async fn invited_pdfs_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let documents = state.ledger.shared_with_me(user_id).await?;
    Ok(document_list("Shared PDFs fetched", documents))
}

/// GET /api/pdf/shared-pdf - The current user's documents that have collaborators
#[utoipa::path(
    get,
    path = "/api/pdf/shared-pdf",
    responses(
        (status = 200, description = "Owned documents shared with at least one user", body = DocumentListResponse),
        (status = 401, description = "Not logged in", body = ApiMessage)
    )
)]
pub async fn shared_pdfs_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let documents = state.ledger.shared_by_me(user_id).await?;
    Ok(document_list("Shared PDFs fetched", documents))
}

//=========================================================================================
// Single Document
//=========================================================================================

/// GET /api/pdf/details - Details of one document the user may see
#[utoipa::path(
    get,
    path = "/api/pdf/details",
    params(PdfIdQuery),
    responses(
        (status = 200, description = "Document details", body = DocumentDetailsResponse),
        (status = 403, description = "No access", body = ApiMessage),
        (status = 404, description = "No such document", body = ApiMessage)
    )
)]
pub async fn pdf_details_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<PdfIdQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let document = state.ledger.require_access(query.pdf_id, user_id).await?;
    Ok(Reply::ok(
        "PDF details fetched",
        DocumentDetailsResponse {
            pdf_details: document.into(),
        },
    ))
}

/// POST /api/pdf/pdf-owner - Whether the current user owns the document
#[utoipa::path(
    post,
    path = "/api/pdf/pdf-owner",
    request_body = PdfIdRequest,
    responses(
        (status = 200, description = "Ownership flag", body = OwnerResponse),
        (status = 404, description = "No such document, or no access to it", body = ApiMessage)
    )
)]
pub async fn pdf_owner_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    ApiJson(req): ApiJson<PdfIdRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let is_owner = state.ledger.is_owner(req.pdf_id, user_id).await?;
    Ok(Reply::ok("Ownership checked", OwnerResponse { is_owner }))
}

/// GET /api/pdf/collaboration-access - Whether the current user may open the document
#[utoipa::path(
    get,
    path = "/api/pdf/collaboration-access",
    params(PdfIdQuery),
    responses(
        (status = 200, description = "Access granted", body = AccessResponse),
        (status = 403, description = "No access", body = ApiMessage),
        (status = 404, description = "No such document", body = ApiMessage)
    )
)]
pub async fn collaboration_access_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<PdfIdQuery>,
) -> Result<impl IntoResponse, ApiError> {
    match state.ledger.check_access(query.pdf_id, user_id).await? {
        AccessDecision::Authorized => Ok(Reply::ok("Access granted", AccessResponse { shared: true })),
        AccessDecision::Forbidden => Err(CoreError::Forbidden.into()),
    }
}

/// GET /api/pdf/collaborate/{pdfId}/{shareId} - Open a collaboration link
#[utoipa::path(
    get,
    path = "/api/pdf/collaborate/{pdfId}/{shareId}",
    params(
        ("pdfId" = Uuid, Path, description = "The shared document."),
        ("shareId" = String, Path, description = "The document's share token.")
    ),
    responses(
        (status = 200, description = "Document details", body = DocumentDetailsResponse),
        (status = 403, description = "Link is valid but the user has no access", body = ApiMessage),
        (status = 404, description = "Unknown document or token", body = ApiMessage)
    )
)]
pub async fn collaborate_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    ApiPath((pdf_id, share_id)): ApiPath<(Uuid, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let document = state
        .ledger
        .open_collaboration_link(pdf_id, &share_id, user_id)
        .await?;
    Ok(Reply::ok(
        "PDF details fetched",
        DocumentDetailsResponse {
            pdf_details: document.into(),
        },
    ))
}

/// DELETE /api/pdf/delete-pdf - Delete a document with its grants and comments
#[utoipa::path(
    delete,
    path = "/api/pdf/delete-pdf",
    params(PdfIdQuery),
    responses(
        (status = 200, description = "Document deleted", body = ApiMessage),
        (status = 403, description = "Only the owner may delete", body = ApiMessage),
        (status = 404, description = "No such document", body = ApiMessage)
    )
)]
pub async fn delete_pdf_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<PdfIdQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state.ledger.delete(query.pdf_id, user_id).await?;
    Ok(Reply::message("PDF deleted successfully"))
}

//=========================================================================================
// Sharing
//=========================================================================================

/// POST /api/pdf/share-access - Grant another user access by email
#[utoipa::path(
    post,
    path = "/api/pdf/share-access",
    request_body = ShareAccessRequest,
    responses(
        (status = 200, description = "Access granted and the user notified", body = GranteeResponse),
        (status = 400, description = "Already shared, or sharing with yourself", body = ApiMessage),
        (status = 403, description = "Only the owner may share", body = ApiMessage),
        (status = 404, description = "No such document or user", body = ApiMessage)
    )
)]
pub async fn share_access_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    ApiJson(req): ApiJson<ShareAccessRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::invalid("Email is required"));
    }
    let grantee = state.ledger.grant(req.pdf_id, user_id, &email).await?;
    Ok(Reply::ok(
        "PDF shared successfully",
        GranteeResponse {
            user: grantee.into(),
        },
    ))
}

/// POST /api/pdf/remove-access - Revoke a user's access
///
/// The owner may remove anyone; a collaborator may remove only themselves.
#[utoipa::path(
    post,
    path = "/api/pdf/remove-access",
    request_body = RemoveAccessRequest,
    responses(
        (status = 200, description = "Access removed, or the user had none", body = ApiMessage),
        (status = 403, description = "Not allowed to remove this user", body = ApiMessage),
        (status = 404, description = "No such document", body = ApiMessage)
    )
)]
pub async fn remove_access_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    ApiJson(req): ApiJson<RemoveAccessRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state
        .ledger
        .revoke(req.pdf_id, user_id, req.user_id_to_remove)
        .await?;
    let message = if removed {
        "Access removed successfully"
    } else {
        "User did not have access to this PDF"
    };
    Ok(Reply::message(message))
}

/// POST /api/pdf/shared-user-list - Everyone the document is shared with
#[utoipa::path(
    post,
    path = "/api/pdf/shared-user-list",
    request_body = PdfIdRequest,
    responses(
        (status = 200, description = "Grantees of the document", body = GranteeListResponse),
        (status = 403, description = "No access", body = ApiMessage),
        (status = 404, description = "No such document", body = ApiMessage)
    )
)]
pub async fn shared_user_list_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    ApiJson(req): ApiJson<PdfIdRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.ledger.require_access(req.pdf_id, user_id).await?;
    let users = state.ledger.list_grantees(req.pdf_id).await?;
    Ok(Reply::ok(
        "Shared users fetched",
        GranteeListResponse {
            users: users.into_iter().map(GranteeDto::from).collect(),
        },
    ))
}
