//! [`ContactDirectory`] over the HTTP directory client.

use async_trait::async_trait;
use directory_client::{ApiError, ContactId, ContactPage, DirectoryClient, NoteReceipt, SearchParam};

use crate::contacts::ContactDirectory;

#[async_trait]
impl ContactDirectory for DirectoryClient {
    async fn lookup_by_email(&self, email: &str) -> Result<ContactPage, ApiError> {
        DirectoryClient::lookup_by_email(self, email).await
    }

    async fn search_contacts(
        &self,
        param: SearchParam,
        value: &str,
        offset: u32,
        limit: u32,
    ) -> Result<ContactPage, ApiError> {
        DirectoryClient::search_contacts(self, param, value, offset, limit).await
    }

    async fn create_note(
        &self,
        contact_id: &ContactId,
        note: &str,
        note_type_id: Option<&str>,
    ) -> Result<NoteReceipt, ApiError> {
        DirectoryClient::create_note(self, contact_id, note, note_type_id).await
    }
}

#[cfg(test)]
#[path = "http_directory_tests.rs"]
mod tests;
