// Contact note operations for the directory API

use serde_json::Value;
use tracing::{debug, warn};

use crate::client::{ContactId, DirectoryClient};
use crate::error::ApiError;

/// Result of a successful note creation.
#[derive(Debug, Clone)]
pub struct NoteReceipt {
    /// HTTP status returned by the directory
    pub status: u16,
    /// Created or updated record, when the body was JSON
    pub body: Option<Value>,
}

impl DirectoryClient {
    /// Append a note to a contact.
    ///
    /// Issues a form-encoded `POST {base}/contact/note/` with `contactID`,
    /// `contactNote` and, when given, `noteTypeID`. The request is sent once;
    /// retries are the caller's concern.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::HttpError`] with the response body as message when
    /// the directory rejects the note, and a transport error when no response
    /// was received.
    pub async fn create_note(
        &self,
        contact_id: &ContactId,
        note: &str,
        note_type_id: Option<&str>,
    ) -> Result<NoteReceipt, ApiError> {
        let url = self.endpoint("contact/note/")?;

        let mut form: Vec<(&str, &str)> = vec![
            ("contactID", contact_id.as_str()),
            ("contactNote", note),
        ];
        if let Some(note_type_id) = note_type_id {
            form.push(("noteTypeID", note_type_id));
        }

        debug!(
            url = %url,
            contact_id = %contact_id,
            note_length = note.chars().count(),
            "Creating contact note"
        );

        let response = self
            .authorized(self.http_client.post(url))
            .form(&form)
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());

        if !status.is_success() {
            warn!(
                contact_id = %contact_id,
                status = status.as_u16(),
                "Directory rejected contact note"
            );
            return Err(ApiError::HttpError {
                status: status.as_u16(),
                message: text,
            });
        }

        Ok(NoteReceipt {
            status: status.as_u16(),
            body: serde_json::from_str(&text).ok(),
        })
    }
}

#[cfg(test)]
#[path = "note_tests.rs"]
mod tests;
