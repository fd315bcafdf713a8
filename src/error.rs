use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found")]
    NotFound,

    #[error("Authorization mismatch: {0}")]
    AuthorizationMismatch(String),

    #[error("No Time In found for today")]
    NoTimeInYet,

    #[error("Malformed scan payload: {0}")]
    MalformedPayload(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    #[error("Internal server error")]
    InternalServerError,
}

impl AppError {
    /// Stable machine code carried on the wire so the device client can
    /// classify rejections without matching message text.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE",
            AppError::NotFound => "NOT_FOUND",
            AppError::AuthorizationMismatch(_) => "AUTHORIZATION_MISMATCH",
            AppError::NoTimeInYet => "NO_TIME_IN",
            AppError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Upstream(_) => "UPSTREAM_UNAVAILABLE",
            AppError::InternalServerError => "INTERNAL",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code().to_string();
        let (status, error_message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            AppError::AuthorizationMismatch(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NoTimeInYet => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "No Time In found for today".to_string(),
            ),
            AppError::MalformedPayload(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Database(e) => {
                error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                )
            }
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: code,
            message: error_message,
        });

        (status, body).into_response()
    }
}
