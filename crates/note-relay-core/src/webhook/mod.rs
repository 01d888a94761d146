//! # Webhook Processing Module
//!
//! Handles helpdesk webhook verification, extraction and relay to the
//! contact directory.
//!
//! A delivery moves through the [`PipelineStage`]s in order. Each stage either
//! advances, ends the run with a [`PipelineOutcome`], or fails with a
//! [`PipelineError`] that carries its HTTP status.

use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use directory_client::{ContactId, NoteReceipt};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use crate::contacts::{DirectoryError, MatchStage, ResolverSettings};
use crate::note::{NoteWriteError, DEFAULT_MAX_NOTE_LENGTH};
use crate::Timestamp;

pub mod extraction;
pub mod html;
pub mod pipeline;
pub mod signature;

pub use extraction::{extract_event, CanonicalEventData};
pub use pipeline::{record_response, WebhookPipeline};
pub use signature::{BypassReason, SignatureCandidate, SignatureVerdict, SignatureVerifier};

/// Header carrying the helpdesk signature.
pub const DEFAULT_SIGNATURE_HEADER: &str = "x-helpscout-signature";

// ============================================================================
// Core Types
// ============================================================================

/// Raw webhook delivery as received by the HTTP layer.
#[derive(Debug, Clone)]
pub struct WebhookEnvelope {
    headers: HashMap<String, String>,
    pub body: Bytes,
    /// Set when an upstream gateway base64-encoded the body
    pub is_base64_encoded: bool,
    pub received_at: Timestamp,
}

impl WebhookEnvelope {
    /// Create a new envelope. Header names are stored lowercase.
    pub fn new<K, V>(headers: impl IntoIterator<Item = (K, V)>, body: impl Into<Bytes>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            headers: headers
                .into_iter()
                .map(|(name, value)| (name.as_ref().to_ascii_lowercase(), value.into()))
                .collect(),
            body: body.into(),
            is_base64_encoded: false,
            received_at: Timestamp::now(),
        }
    }

    /// Mark the body as base64 encoded.
    pub fn with_base64_body(mut self, encoded: bool) -> Self {
        self.is_base64_encoded = encoded;
        self
    }

    /// Time since the delivery was received, zero if the clock went back.
    pub fn age(&self) -> std::time::Duration {
        (chrono::Utc::now() - *self.received_at.as_datetime())
            .to_std()
            .unwrap_or_default()
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Body bytes, decoded from base64 when flagged.
    pub fn decoded_body(&self) -> Result<Cow<'_, [u8]>, base64::DecodeError> {
        if self.is_base64_encoded {
            let trimmed = self.body.trim_ascii();
            Ok(Cow::Owned(STANDARD.decode(trimmed)?))
        } else {
            Ok(Cow::Borrowed(&self.body[..]))
        }
    }
}

/// Settings the pipeline needs for one run.
#[derive(Clone)]
pub struct PipelineConfig {
    /// Shared HMAC secret; `None` accepts unverified deliveries
    pub webhook_secret: Option<String>,
    pub allow_unverified: bool,
    pub loose_signature_match: bool,
    /// Lowercase name of the signature header
    pub signature_header: String,
    /// Note length bound, in characters
    pub max_note_length: usize,
    pub resolver: ResolverSettings,
    /// Directory note type, when notes must carry one
    pub note_type_id: Option<String>,
    /// Names of required settings that are absent
    pub missing_settings: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            webhook_secret: None,
            allow_unverified: false,
            loose_signature_match: false,
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            max_note_length: DEFAULT_MAX_NOTE_LENGTH,
            resolver: ResolverSettings::default(),
            note_type_id: None,
            missing_settings: Vec::new(),
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "<REDACTED>"),
            )
            .field("allow_unverified", &self.allow_unverified)
            .field("loose_signature_match", &self.loose_signature_match)
            .field("signature_header", &self.signature_header)
            .field("max_note_length", &self.max_note_length)
            .field("resolver", &self.resolver)
            .field("note_type_id", &self.note_type_id)
            .field("missing_settings", &self.missing_settings)
            .finish()
    }
}

/// Processing stages, in the order a delivery passes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    Parsed,
    SignatureChecked,
    EmailExtracted,
    ContactResolved,
    NoteComposed,
    NoteWritten,
    Responded,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Parsed => "parsed",
            Self::SignatureChecked => "signature_checked",
            Self::EmailExtracted => "email_extracted",
            Self::ContactResolved => "contact_resolved",
            Self::NoteComposed => "note_composed",
            Self::NoteWritten => "note_written",
            Self::Responded => "responded",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Why a delivery ended without writing a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    NoCustomerEmail,
    ContactNotFound,
}

impl SkipReason {
    /// Reason text returned to the caller.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoCustomerEmail => "no customer email",
            Self::ContactNotFound => "contact not found",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful end of a pipeline run.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    NoteWritten(WrittenNote),
    Skipped(SkippedDelivery),
}

impl PipelineOutcome {
    /// Label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoteWritten(_) => "note_written",
            Self::Skipped(skipped) => match skipped.reason {
                SkipReason::NoCustomerEmail => "skipped_no_email",
                SkipReason::ContactNotFound => "skipped_not_found",
            },
        }
    }
}

/// A note was written.
#[derive(Debug, Clone)]
pub struct WrittenNote {
    pub contact_id: ContactId,
    pub email: String,
    pub matched_by: MatchStage,
    /// Note length in characters
    pub note_length: usize,
    pub signature: SignatureVerdict,
    pub conversation_id: Option<String>,
    pub receipt: NoteReceipt,
    pub tried: Vec<String>,
}

/// The delivery was accepted but nothing was written.
#[derive(Debug, Clone)]
pub struct SkippedDelivery {
    pub reason: SkipReason,
    pub email: Option<String>,
    pub tried: Vec<String>,
    pub signature: SignatureVerdict,
}

// ============================================================================
// Error Types
// ============================================================================

/// Failures that end a pipeline run with an error response.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Missing required configuration: {}", missing.join(", "))]
    Configuration { missing: Vec<String> },

    #[error("Malformed webhook body: {message}")]
    MalformedBody { message: String },

    #[error("Webhook signature verification failed")]
    InvalidSignature { verdict: SignatureVerdict },

    #[error("Contact lookup failed: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Note write failed for contact {contact_id}: {source}")]
    NoteWrite {
        contact_id: ContactId,
        #[source]
        source: NoteWriteError,
    },
}

impl PipelineError {
    /// HTTP status for the response.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Configuration { .. } => 500,
            Self::MalformedBody { .. } => 400,
            Self::InvalidSignature { .. } => 401,
            Self::Directory(_) => 502,
            Self::NoteWrite { .. } => 502,
        }
    }

    /// Stage at which the run failed.
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::Configuration { .. } => PipelineStage::Received,
            Self::MalformedBody { .. } => PipelineStage::Parsed,
            Self::InvalidSignature { .. } => PipelineStage::SignatureChecked,
            Self::Directory(_) => PipelineStage::ContactResolved,
            Self::NoteWrite { .. } => PipelineStage::NoteWritten,
        }
    }

    /// Check if error is transient and the helpdesk may usefully redeliver
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Directory(error) => error.is_transient(),
            Self::NoteWrite { source, .. } => match source {
                NoteWriteError::Rejected { status, .. } => *status >= 500 || *status == 429,
                NoteWriteError::Transport { .. } => true,
            },
            _ => false,
        }
    }

    /// Short machine-readable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::MalformedBody { .. } => "malformed_body",
            Self::InvalidSignature { .. } => "invalid_signature",
            Self::Directory(_) => "directory_failure",
            Self::NoteWrite { .. } => "note_write_failure",
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
