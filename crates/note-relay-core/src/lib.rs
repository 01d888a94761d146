//! # Note Relay Core
//!
//! Core business logic for the Note Relay helpdesk webhook service.
//!
//! This crate turns a helpdesk webhook delivery into a note on the matching
//! contact in a remote contact directory: it verifies the delivery signature,
//! extracts the conversation data, resolves the customer email to a contact,
//! composes the note and writes it.
//!
//! ## Architecture
//!
//! - Business logic depends only on the [`contacts::ContactDirectory`] trait
//! - The directory HTTP client is injected at runtime through [`adapters`]
//! - Every stage of the pipeline is a pure function or a single trait call
//!
//! ## Usage
//!
//! ```rust
//! use note_relay_core::webhook::extraction::extract_event;
//! use serde_json::json;
//!
//! let payload = json!({"data": {"customer": {"email": "a@x.com"}, "subject": "Hi"}});
//! let event = extract_event(&payload);
//! assert_eq!(event.customer_email.as_deref(), Some("a@x.com"));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use uuid::Uuid;

pub mod adapters;
pub mod contacts;
pub mod note;
pub mod webhook;

#[cfg(test)]
pub(crate) mod testing;

pub use contacts::{
    ContactDirectory, ContactResolver, DirectoryError, DirectoryQuery, MatchStage, Resolution,
    ResolverSettings,
};
pub use note::{NoteComposer, NoteWriteError, NoteWriter, DEFAULT_MAX_NOTE_LENGTH};
pub use webhook::{
    PipelineConfig, PipelineError, PipelineOutcome, PipelineStage, SkipReason, WebhookEnvelope,
    WebhookPipeline,
};

// ============================================================================
// Time and Metadata Types
// ============================================================================

/// UTC timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse timestamp from RFC3339 string
    pub fn from_rfc3339(s: &str) -> Result<Self, ParseError> {
        let dt = DateTime::parse_from_rfc3339(s.trim())
            .map_err(|_| ParseError::InvalidFormat {
                expected: "RFC3339 datetime".to_string(),
                actual: s.to_string(),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }

    /// Build a timestamp from a Unix epoch value.
    ///
    /// Values above 10^12 are read as milliseconds, smaller ones as seconds.
    pub fn from_epoch(value: i64) -> Option<Self> {
        let dt = if value.abs() >= 1_000_000_000_000 {
            DateTime::from_timestamp_millis(value)?
        } else {
            DateTime::from_timestamp(value, 0)?
        };
        Some(Self(dt))
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// Identifier for tracing one webhook delivery through logs and responses
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate new correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get string representation
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CorrelationId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = s.parse::<Uuid>().map_err(|_| ParseError::InvalidFormat {
            expected: "UUID format".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(uuid))
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for string parsing failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
