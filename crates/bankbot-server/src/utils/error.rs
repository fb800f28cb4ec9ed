use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failure kinds of the chat pipeline.
///
/// Only `MissingSecret` and `Config` are fatal, and only at startup. The
/// orchestrator absorbs the other two per turn: an unavailable index degrades
/// semantic recall, a generation failure turns into the fixed apology.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Missing required secret: {0}")]
    MissingSecret(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Semantic index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Generation failed: {0}")]
    Generation(String),
}

impl ChatError {
    /// True for errors that must abort the process before any input is accepted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChatError::MissingSecret(_) | ChatError::Config(_))
    }
}

impl From<config::ConfigError> for ChatError {
    fn from(e: config::ConfigError) -> Self {
        ChatError::Config(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => {
                tracing::warn!("Not found: {}", msg);
                (StatusCode::NOT_FOUND, "NotFound", msg)
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, "BadRequest", msg)
            }
            ApiError::Unavailable(msg) => {
                tracing::error!("Service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Unavailable", msg)
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError", msg)
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::IndexUnavailable(msg) => ApiError::Unavailable(msg),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(ChatError::MissingSecret("GOOGLE_API_KEY".into()).is_fatal());
        assert!(ChatError::Config("bad threshold".into()).is_fatal());
        assert!(!ChatError::IndexUnavailable("down".into()).is_fatal());
        assert!(!ChatError::Generation("quota".into()).is_fatal());
    }

    #[test]
    fn test_api_error_status_codes() {
        let resp = ApiError::BadRequest("empty".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = ApiError::from(ChatError::IndexUnavailable("down".into())).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let resp = ApiError::from(ChatError::Generation("quota".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
