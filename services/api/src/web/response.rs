//! services/api/src/web/response.rs
//!
//! The JSON envelope every endpoint answers with:
//! `{ "success": bool, "message": string, ...payload }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

/// Payload for replies that carry nothing besides the message.
#[derive(Debug, Default, Serialize)]
pub struct NoData {}

/// The body shape shared by all responses; documented once for the OpenAPI spec.
#[derive(Serialize, ToSchema)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize)]
struct Envelope<T> {
    success: bool,
    message: String,
    #[serde(flatten)]
    data: T,
}

/// A successful reply: status code, message and the payload fields that get
/// flattened next to `success` and `message`.
pub struct Reply<T = NoData> {
    status: StatusCode,
    message: String,
    data: T,
}

impl Reply<NoData> {
    pub fn message(message: impl Into<String>) -> Self {
        Reply::ok(message, NoData {})
    }
}

impl<T: Serialize> Reply<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            message: message.into(),
            data,
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Reply::ok(message, data)
        }
    }
}

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        let body = Envelope {
            success: true,
            message: self.message,
            data: self.data,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Saved {
        saved_pdf_id: u32,
    }

    async fn body_of(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn payload_fields_sit_next_to_the_envelope() {
        let response = Reply::created("PDF uploaded", Saved { saved_pdf_id: 7 }).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            body_of(response).await,
            json!({ "success": true, "message": "PDF uploaded", "savedPdfId": 7 })
        );
    }

    #[tokio::test]
    async fn message_only_replies_have_no_extra_fields() {
        let response = Reply::message("Logged out").into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_of(response).await,
            json!({ "success": true, "message": "Logged out" })
        );
    }
}
