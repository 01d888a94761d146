//! Response bodies for the API.

use note_relay_core::{PipelineOutcome, Timestamp};
use serde::Serialize;

// ============================================================================
// Response Types
// ============================================================================

/// Body of every 200 answer to a webhook delivery.
///
/// A written note fills `contact_id` through `signature`; a skipped delivery
/// fills `skipped` and, for an unknown contact, `email` and `tried`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub ok: bool,

    #[serde(rename = "contactID", skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_length: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_by: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

impl From<&PipelineOutcome> for WebhookResponse {
    fn from(outcome: &PipelineOutcome) -> Self {
        match outcome {
            PipelineOutcome::NoteWritten(written) => Self {
                ok: true,
                contact_id: Some(written.contact_id.to_string()),
                note_length: Some(written.note_length),
                matched_by: Some(written.matched_by.to_string()),
                signature: Some(written.signature.label()),
                ..Self::default()
            },
            PipelineOutcome::Skipped(skipped) => Self {
                ok: true,
                skipped: Some(skipped.reason.to_string()),
                email: skipped.email.clone(),
                tried: skipped.email.as_ref().map(|_| skipped.tried.clone()),
                ..Self::default()
            },
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: Timestamp,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Timestamp::now(),
        }
    }
}

#[cfg(test)]
#[path = "responses_tests.rs"]
mod tests;
