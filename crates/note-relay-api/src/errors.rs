//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use note_relay_core::{NoteWriteError, PipelineError};
use serde_json::{json, Map, Value};
use tracing::{error, warn};

/// Longest remote body echoed back in a 502, in characters.
pub const MAX_REMOTE_BODY_CHARS: usize = 2_000;

/// Webhook handler errors with HTTP status code mapping
///
/// - `400 Bad Request`: the body is missing, not base64 when flagged, or not JSON
/// - `401 Unauthorized`: the signature did not verify
/// - `405 Method Not Allowed`: anything but `POST` or `OPTIONS`
/// - `500 Internal Server Error`: directory settings are missing
/// - `502 Bad Gateway`: the directory failed or rejected the note
///
/// Signature failures answer 401 rather than 2xx so the helpdesk keeps its
/// redelivery schedule for the event.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// Maps to the status given by [`PipelineError::status_code`]
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Maps to: `405 Method Not Allowed`
    #[error("Method {method} not allowed")]
    MethodNotAllowed { method: String },

    /// Maps to: `500 Internal Server Error`, with a generic message
    #[error("Internal server error: {message}")]
    InternalError { message: String },
}

impl WebhookHandlerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Pipeline(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Diagnostic fields added to the JSON error body.
    fn details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        let Self::Pipeline(pipeline_error) = self else {
            return details;
        };

        match pipeline_error {
            PipelineError::Configuration { missing } => {
                details.insert("missing".to_string(), json!(missing));
            }
            PipelineError::Directory(directory_error) => {
                details.insert("tried".to_string(), json!(directory_error.tried));
                details.insert("query".to_string(), json!(directory_error.query.to_string()));
                if let Some(status) = directory_error.remote_status() {
                    details.insert("remoteStatus".to_string(), json!(status));
                }
                if let directory_client::ApiError::HttpError { message, .. } = &directory_error.source {
                    details.insert("remoteBody".to_string(), json!(truncate_body(message)));
                }
            }
            PipelineError::NoteWrite { contact_id, source } => {
                details.insert("contactID".to_string(), json!(contact_id.as_str()));
                match source {
                    NoteWriteError::Rejected { status, body } => {
                        details.insert("remoteStatus".to_string(), json!(status));
                        details.insert("remoteBody".to_string(), json!(truncate_body(body)));
                    }
                    NoteWriteError::Transport { message } => {
                        details.insert("remoteBody".to_string(), json!(truncate_body(message)));
                    }
                }
            }
            PipelineError::MalformedBody { .. } | PipelineError::InvalidSignature { .. } => {}
        }

        details
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            Self::Pipeline(e) => {
                match e {
                    PipelineError::InvalidSignature { verdict } => {
                        warn!(
                            header_present = verdict.header_present,
                            candidates = ?verdict.tried,
                            "Rejecting webhook with invalid signature"
                        );
                    }
                    PipelineError::Configuration { .. } => {
                        error!(error = %e, "Webhook service is not configured");
                    }
                    _ if status.is_server_error() => {
                        error!(error = %e, kind = e.kind(), transient = e.is_transient(), "Webhook relay failed");
                    }
                    _ => {
                        warn!(error = %e, kind = e.kind(), "Webhook rejected");
                    }
                }
                e.to_string()
            }
            Self::MethodNotAllowed { .. } => self.to_string(),
            Self::InternalError { message } => {
                // Log detailed error server-side but return generic message to client
                error!(error = %message, "Internal server error occurred");
                "Internal server error occurred. Please try again later.".to_string()
            }
        };

        let mut body = Map::new();
        body.insert("error".to_string(), json!(message));
        body.insert("status".to_string(), json!(status.as_u16()));
        body.insert(
            "timestamp".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
        body.extend(self.details());

        (status, Json(Value::Object(body))).into_response()
    }
}

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_REMOTE_BODY_CHARS) {
        Some((byte_index, _)) => body[..byte_index].to_string(),
        None => body.to_string(),
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl ServiceError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BindFailed { .. } => 1,
            Self::ServerFailed { .. } => 2,
            Self::Configuration(_) => 3,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration loading failed: {0}")]
    Load(#[from] config::ConfigError),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
