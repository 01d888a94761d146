//! The webhook relay pipeline.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::extraction::extract_event;
use super::signature::SignatureVerifier;
use super::{
    PipelineConfig, PipelineError, PipelineOutcome, PipelineStage, SkipReason, SkippedDelivery,
    WebhookEnvelope, WrittenNote,
};
use crate::contacts::{ContactDirectory, ContactResolver};
use crate::note::{NoteComposer, NoteWriteError, NoteWriter};

/// Runs one webhook delivery from raw envelope to written note.
///
/// Order of checks: configuration, body decoding and JSON parsing, then the
/// signature. Parsing happens before verification because one signing
/// candidate is the re-serialised `data` value; nothing derived from the
/// payload is used until the signature has been accepted.
#[derive(Clone)]
pub struct WebhookPipeline {
    config: PipelineConfig,
    verifier: SignatureVerifier,
    resolver: ContactResolver,
    composer: NoteComposer,
    writer: NoteWriter,
}

impl WebhookPipeline {
    pub fn new(config: PipelineConfig, directory: Arc<dyn ContactDirectory>) -> Self {
        let verifier = SignatureVerifier::from_config(&config);
        let resolver = ContactResolver::new(directory.clone(), config.resolver.clone());
        let composer = NoteComposer::new(config.max_note_length);
        let writer = NoteWriter::new(directory, config.note_type_id.clone());

        Self {
            config,
            verifier,
            resolver,
            composer,
            writer,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one delivery.
    ///
    /// # Errors
    ///
    /// Each [`PipelineError`] variant maps to the HTTP status the caller
    /// should answer with; see [`PipelineError::status_code`].
    #[instrument(skip_all, fields(body_length = envelope.body.len()))]
    pub async fn process(
        &self,
        envelope: &WebhookEnvelope,
    ) -> Result<PipelineOutcome, PipelineError> {
        if !self.config.missing_settings.is_empty() {
            warn!(
                missing = ?self.config.missing_settings,
                "Rejecting webhook, configuration incomplete"
            );
            return Err(PipelineError::Configuration {
                missing: self.config.missing_settings.clone(),
            });
        }
        advance(PipelineStage::Received);

        let body = envelope
            .decoded_body()
            .map_err(|e| PipelineError::MalformedBody {
                message: format!("invalid base64 body: {e}"),
            })?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(PipelineError::MalformedBody {
                message: "empty body".to_string(),
            });
        }
        let payload: Value =
            serde_json::from_slice(&body).map_err(|e| PipelineError::MalformedBody {
                message: format!("invalid JSON: {e}"),
            })?;
        advance(PipelineStage::Parsed);

        let verdict = self.verifier.verify(
            &body,
            Some(&payload),
            envelope.header(&self.config.signature_header),
        );
        if !verdict.accepted {
            return Err(PipelineError::InvalidSignature { verdict });
        }
        advance(PipelineStage::SignatureChecked);

        let event = extract_event(&payload);
        let Some(email) = event.customer_email.clone() else {
            info!(
                outcome = "skipped",
                reason = %SkipReason::NoCustomerEmail,
                "No customer email in webhook"
            );
            return Ok(PipelineOutcome::Skipped(SkippedDelivery {
                reason: SkipReason::NoCustomerEmail,
                email: None,
                tried: Vec::new(),
                signature: verdict,
            }));
        };
        debug!(
            email_source = event.email_source,
            body_source = event.body_source,
            "Event data extracted"
        );
        advance(PipelineStage::EmailExtracted);

        let resolution = self.resolver.resolve(&email).await?;
        let (Some((contact_id, _)), Some(matched_by)) = (resolution.contact, resolution.matched_by)
        else {
            info!(
                outcome = "skipped",
                reason = %SkipReason::ContactNotFound,
                queries = resolution.tried.len(),
                "No contact for customer email"
            );
            return Ok(PipelineOutcome::Skipped(SkippedDelivery {
                reason: SkipReason::ContactNotFound,
                email: Some(email),
                tried: resolution.tried,
                signature: verdict,
            }));
        };
        advance(PipelineStage::ContactResolved);

        let note = self.composer.compose(&event);
        let note_length = note.chars().count();
        advance(PipelineStage::NoteComposed);

        let receipt = self
            .writer
            .write(&contact_id, &note)
            .await
            .map_err(|source: NoteWriteError| PipelineError::NoteWrite {
                contact_id: contact_id.clone(),
                source,
            })?;
        advance(PipelineStage::NoteWritten);

        info!(
            contact_id = %contact_id,
            matched_by = %matched_by,
            note_length,
            signature = %verdict.label(),
            "Webhook relayed to contact note"
        );

        Ok(PipelineOutcome::NoteWritten(WrittenNote {
            contact_id,
            email,
            matched_by,
            note_length,
            signature: verdict,
            conversation_id: event.conversation_id,
            receipt,
            tried: resolution.tried,
        }))
    }
}

/// Log the final [`PipelineStage::Responded`] transition with the status
/// answered and the time since the delivery arrived.
pub fn record_response(envelope: &WebhookEnvelope, status: u16) {
    debug!(
        stage = %PipelineStage::Responded,
        status,
        elapsed_ms = envelope.age().as_millis() as u64,
        "Pipeline stage reached"
    );
}

fn advance(stage: PipelineStage) {
    debug!(stage = %stage, "Pipeline stage reached");
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
