//! services/api/src/web/rest.rs
//!
//! The master definition of the OpenAPI specification, served by Swagger UI
//! and written to disk by the `openapi` binary.

use utoipa::OpenApi;

use crate::web::{auth, comments, documents, response, user};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::send_verification_email_handler,
        auth::verify_email_handler,
        auth::send_reset_otp_handler,
        auth::reset_password_handler,
        user::user_data_handler,
        user::is_account_verified_handler,
        user::upload_profile_handler,
        documents::upload_pdf_handler,
        documents::my_pdfs_handler,
        documents::invited_pdfs_handler,
        documents::shared_pdfs_handler,
        documents::pdf_details_handler,
        documents::pdf_owner_handler,
        documents::collaboration_access_handler,
        documents::collaborate_handler,
        documents::delete_pdf_handler,
        documents::share_access_handler,
        documents::remove_access_handler,
        documents::shared_user_list_handler,
        comments::upload_comment_handler,
        comments::fetch_comments_handler,
        comments::comment_thread_handler,
        comments::delete_comment_handler,
    ),
    components(
        schemas(
            response::ApiMessage,
            auth::SignupRequest,
            auth::LoginRequest,
            auth::ResetOtpRequest,
            auth::ResetPasswordRequest,
            auth::VerifyEmailRequest,
            auth::AuthResponse,
            user::UserData,
            user::UserDataResponse,
            user::VerifiedResponse,
            user::UploadProfileRequest,
            documents::DocumentDto,
            documents::GranteeDto,
            documents::UploadPdfRequest,
            documents::UploadPdfResponse,
            documents::DocumentListResponse,
            documents::DocumentDetailsResponse,
            documents::OwnerResponse,
            documents::AccessResponse,
            documents::GranteeResponse,
            documents::GranteeListResponse,
            documents::PdfIdRequest,
            documents::ShareAccessRequest,
            documents::RemoveAccessRequest,
            comments::CommentDto,
            comments::ThreadEntryDto,
            comments::UploadCommentRequest,
            comments::CommentResponse,
            comments::CommentListResponse,
            comments::ThreadResponse,
        )
    ),
    tags(
        (name = "CoDoc API", description = "Shared PDF documents with access grants and threaded comments. \
            Every response is a JSON object with `success` and `message` next to the payload fields.")
    )
)]
pub struct ApiDoc;
