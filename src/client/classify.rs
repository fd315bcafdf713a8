use reqwest::StatusCode;
use thiserror::Error;

use crate::error::{AppError, ErrorResponse};

/// Outcome classification for an attempted network submission. This is the
/// hard correctness boundary of the dispatcher: only transport failures may
/// fall back to the offline queue. Buffering a business rejection would
/// defer an error that will recur identically, or duplicate a request the
/// server already satisfied.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Timeout, connect/DNS failure, or server unavailability (5xx).
    /// Eligible for offline fallback and later reconciliation.
    #[error("transport failure: {0}")]
    Transport(String),

    /// A well-formed rejection the server validly processed. Surfaced to the
    /// caller unchanged, never buffered.
    #[error("{0}")]
    Rejected(Rejection),
}

#[derive(Debug, Error)]
pub enum Rejection {
    #[error("{0}")]
    AuthorizationMismatch(String),

    #[error("{0}")]
    NoTimeInYet(String),

    #[error("{0}")]
    MalformedPayload(String),

    #[error("{code}: {message}")]
    Other { code: String, message: String },
}

impl Rejection {
    pub fn into_app_error(self) -> AppError {
        match self {
            Rejection::AuthorizationMismatch(msg) => AppError::AuthorizationMismatch(msg),
            Rejection::NoTimeInYet(_) => AppError::NoTimeInYet,
            Rejection::MalformedPayload(msg) => AppError::MalformedPayload(msg),
            Rejection::Other { code, message } => {
                AppError::BadRequest(format!("{}: {}", code, message))
            }
        }
    }
}

/// A request that never produced an HTTP response is always a transport
/// failure: timeouts, refused connections, DNS, broken bodies.
pub fn classify_request_error(err: reqwest::Error) -> ApiError {
    ApiError::Transport(err.to_string())
}

/// A response arrived, so the server is reachable. 5xx counts as transport
/// (the server never processed the request); any 4xx is a processed
/// rejection, keyed by the machine code when the body parses and treated as
/// an opaque rejection when it does not.
pub fn classify_response(status: StatusCode, body: &str) -> ApiError {
    if status.is_server_error() {
        return ApiError::Transport(format!("server error {}: {}", status, body));
    }

    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => ApiError::Rejected(match err.error.as_str() {
            "AUTHORIZATION_MISMATCH" => Rejection::AuthorizationMismatch(err.message),
            "NO_TIME_IN" => Rejection::NoTimeInYet(err.message),
            "MALFORMED_PAYLOAD" => Rejection::MalformedPayload(err.message),
            _ => Rejection::Other {
                code: err.error,
                message: err.message,
            },
        }),
        Err(_) => ApiError::Rejected(Rejection::Other {
            code: status.to_string(),
            message: body.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transport() {
        assert!(matches!(
            classify_response(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            ApiError::Transport(_)
        ));
        assert!(matches!(
            classify_response(StatusCode::BAD_GATEWAY, ""),
            ApiError::Transport(_)
        ));
    }

    #[test]
    fn typed_rejections_map_by_code() {
        let body = r#"{"error":"AUTHORIZATION_MISMATCH","message":"student is not in your section"}"#;
        assert!(matches!(
            classify_response(StatusCode::FORBIDDEN, body),
            ApiError::Rejected(Rejection::AuthorizationMismatch(_))
        ));

        let body = r#"{"error":"NO_TIME_IN","message":"No Time In found for today"}"#;
        assert!(matches!(
            classify_response(StatusCode::UNPROCESSABLE_ENTITY, body),
            ApiError::Rejected(Rejection::NoTimeInYet(_))
        ));
    }

    #[test]
    fn unparseable_4xx_stays_a_rejection() {
        // Never classified as transport; buffering it could duplicate data.
        assert!(matches!(
            classify_response(StatusCode::BAD_REQUEST, "<html>gateway page</html>"),
            ApiError::Rejected(Rejection::Other { .. })
        ));
    }
}
