//! Application error type mapping to HTTP status codes.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use uuid::Uuid;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// The request body could not be decoded.
    BadRequest(String),
    /// No in-flight run with this id.
    RunNotFound(Uuid),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST", msg.clone()),
            AppError::RunNotFound(run_id) => (
                StatusCode::NOT_FOUND,
                "RUN_NOT_FOUND",
                format!("No active run with id {run_id}"),
            ),
        };

        let body = json!({
            "errors": [{
                "code": code,
                "message": message,
            }],
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
