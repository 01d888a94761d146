//! # Contact Notes
//!
//! Composition of the note text from extracted event data, and the single
//! write of that note to the directory.

use directory_client::{ApiError, ContactId, NoteReceipt};
use std::sync::Arc;
use tracing::{info, warn};

use crate::contacts::ContactDirectory;
use crate::webhook::extraction::CanonicalEventData;

/// Default upper bound on note length, in characters.
pub const DEFAULT_MAX_NOTE_LENGTH: usize = 60_000;

/// Placeholder written when the event carried no message body.
pub const EMPTY_BODY_PLACEHOLDER: &str = "(no body)";

/// Line introducing every relayed note.
pub const NOTE_HEADING: &str = "Helpdesk email sent";

// ============================================================================
// Composer
// ============================================================================

/// Builds note text from event data.
///
/// Output is a fixed header block, one blank line, then the body. The header
/// holds the heading, the conversation when known, the recipient when known,
/// the subject, and then the agent and inbox lines when known. The result never exceeds the configured character count.
#[derive(Debug, Clone)]
pub struct NoteComposer {
    max_length: usize,
}

impl Default for NoteComposer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NOTE_LENGTH)
    }
}

impl NoteComposer {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Compose the note for one event.
    pub fn compose(&self, event: &CanonicalEventData) -> String {
        let mut lines = vec![NOTE_HEADING.to_string()];
        if let Some(conversation_id) = &event.conversation_id {
            lines.push(format!("Conversation: {conversation_id}"));
        }
        if let Some(recipient) = &event.customer_email {
            lines.push(format!("To: {recipient}"));
        }
        lines.push(format!("Subject: {}", event.subject));
        if let Some(agent) = &event.agent_name {
            lines.push(format!("Agent: {agent}"));
        }
        if let Some(inbox) = &event.inbox_label {
            lines.push(format!("Inbox: {inbox}"));
        }

        let body = if event.body_text.trim().is_empty() {
            EMPTY_BODY_PLACEHOLDER
        } else {
            event.body_text.as_str()
        };

        let note = format!("{}\n\n{}", lines.join("\n"), body);
        truncate_chars(note, self.max_length)
    }
}

/// Cut `text` to at most `max_chars` characters, on a character boundary.
pub fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text,
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Reasons a note write failed.
#[derive(Debug, thiserror::Error)]
pub enum NoteWriteError {
    /// The directory answered with a non-success status
    #[error("Directory rejected note with status {status}")]
    Rejected { status: u16, body: String },

    /// No response was received
    #[error("Note write failed: {message}")]
    Transport { message: String },
}

impl NoteWriteError {
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Transport { .. } => None,
        }
    }
}

impl From<ApiError> for NoteWriteError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::HttpError { status, message } => Self::Rejected {
                status,
                body: message,
            },
            other => Self::Transport {
                message: other.to_string(),
            },
        }
    }
}

/// Writes composed notes to the directory, once per call.
#[derive(Clone)]
pub struct NoteWriter {
    directory: Arc<dyn ContactDirectory>,
    note_type_id: Option<String>,
}

impl NoteWriter {
    pub fn new(directory: Arc<dyn ContactDirectory>, note_type_id: Option<String>) -> Self {
        Self {
            directory,
            note_type_id: note_type_id.filter(|id| !id.trim().is_empty()),
        }
    }

    /// Write `note` to the contact.
    ///
    /// # Errors
    ///
    /// Returns [`NoteWriteError::Rejected`] with the remote status and body,
    /// or [`NoteWriteError::Transport`] when the directory was unreachable.
    pub async fn write(&self, contact_id: &ContactId, note: &str) -> Result<NoteReceipt, NoteWriteError> {
        match self
            .directory
            .create_note(contact_id, note, self.note_type_id.as_deref())
            .await
        {
            Ok(receipt) => {
                info!(
                    contact_id = %contact_id,
                    status = receipt.status,
                    note_length = note.chars().count(),
                    "Contact note written"
                );
                Ok(receipt)
            }
            Err(error) => {
                warn!(contact_id = %contact_id, error = %error, "Contact note write failed");
                Err(error.into())
            }
        }
    }
}

#[cfg(test)]
#[path = "note_tests.rs"]
mod tests;
