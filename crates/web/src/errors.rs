use axum::extract::rejection::{BytesRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use sparks_infra::ContextError;
use thiserror::Error;

/// Failures between the socket and the action router.
///
/// Errors inside an action never get here; the router turns them into
/// responses. These are the resolution and transport failures around it.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid query string: {0}")]
    Query(#[from] QueryRejection),

    #[error("failed to read request body: {0}")]
    Body(#[from] BytesRejection),

    #[error("dispatch task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for TransportError {
    fn into_response(self) -> Response {
        match self {
            TransportError::Query(e) => json_error(StatusCode::BAD_REQUEST, "invalid_query", e.body_text()),
            TransportError::Body(e) => {
                let status = e.status();
                let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "payload_too_large"
                } else {
                    "invalid_body"
                };
                json_error(status, code, e.body_text())
            }
            TransportError::Join(e) => {
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "dispatch_failed", e.to_string())
            }
            TransportError::Context(e) => context_error_to_response(e),
            TransportError::Io(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "io_error", e.to_string()),
        }
    }
}

pub fn context_error_to_response(err: ContextError) -> Response {
    let message = err.to_string();
    match err {
        ContextError::ProcessorNotFound { .. } => {
            json_error(StatusCode::NOT_FOUND, "processor_not_found", message)
        }
        ContextError::ViewNotFound { .. } => json_error(StatusCode::NOT_FOUND, "view_not_found", message),
        ContextError::ProcessorInitialization { .. } => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "processor_initialization", message)
        }
        ContextError::ConfigConflict { .. } => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "config_conflict", message)
        }
        ContextError::CommandMismatch { .. } => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "command_mismatch", message)
        }
        ContextError::ContextDropped => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "context_unavailable", message)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
