//! Email to contact resolution.
//!
//! Resolution escalates through progressively broader directory queries:
//!
//! 1. exact lookup by email
//! 2. paged free-text search, once per [`SearchParam`] in escalation order
//!
//! Every candidate must carry the email in one of its email fields, compared
//! case-insensitively. The first matching contact wins. The only exception is
//! a lone exact-lookup result, which the directory has already matched on our
//! behalf and is accepted when the single-result fallback is enabled.

use directory_client::{Contact, ContactId, SearchParam};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{ContactDirectory, DirectoryError, DirectoryQuery};

/// Default page size for search queries.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Default exclusive ceiling on search offsets.
pub const DEFAULT_MAX_OFFSET: u32 = 1000;

/// Paging and fallback settings for the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSettings {
    pub page_size: u32,
    pub max_offset: u32,
    /// Accept a single exact-lookup result even without a field match
    pub single_result_fallback: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_offset: DEFAULT_MAX_OFFSET,
            single_result_fallback: true,
        }
    }
}

/// Which resolution step found the contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum MatchStage {
    /// An exact-lookup result carried the email
    ExactLookup,
    /// The exact lookup returned exactly one record without a field match
    SingleResult,
    /// A search page produced the match
    Search(SearchParam),
}

impl fmt::Display for MatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactLookup => f.write_str("exact_lookup"),
            Self::SingleResult => f.write_str("single_result"),
            Self::Search(param) => write!(f, "search:{param}"),
        }
    }
}

impl From<MatchStage> for String {
    fn from(stage: MatchStage) -> Self {
        stage.to_string()
    }
}

/// Result of resolving one email.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Matched contact and its identifier
    pub contact: Option<(ContactId, Contact)>,
    pub matched_by: Option<MatchStage>,
    /// Queried URLs in order
    pub tried: Vec<String>,
}

impl Resolution {
    fn found(id: ContactId, contact: Contact, stage: MatchStage, tried: Vec<String>) -> Self {
        Self {
            contact: Some((id, contact)),
            matched_by: Some(stage),
            tried,
        }
    }

    fn not_found(tried: Vec<String>) -> Self {
        Self {
            contact: None,
            matched_by: None,
            tried,
        }
    }

    /// Identifier of the matched contact.
    pub fn contact_id(&self) -> Option<&ContactId> {
        self.contact.as_ref().map(|(id, _)| id)
    }
}

/// Resolves customer emails to directory contacts.
#[derive(Clone)]
pub struct ContactResolver {
    directory: Arc<dyn ContactDirectory>,
    settings: ResolverSettings,
}

impl ContactResolver {
    pub fn new(directory: Arc<dyn ContactDirectory>, settings: ResolverSettings) -> Self {
        Self {
            directory,
            settings,
        }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Resolve `email` to a contact.
    ///
    /// Returns a resolution without a contact when every step is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] as soon as any query fails; later steps are
    /// not attempted.
    pub async fn resolve(&self, email: &str) -> Result<Resolution, DirectoryError> {
        let email = email.trim();
        let mut tried = Vec::new();

        let page = self
            .directory
            .lookup_by_email(email)
            .await
            .map_err(|source| DirectoryError {
                query: DirectoryQuery::Lookup {
                    email: email.to_string(),
                },
                tried: tried.clone(),
                source,
            })?;
        tried.push(page.url.clone());

        if let Some((id, contact)) = first_exact_match(&page.contacts, email) {
            info!(contact_id = %id, stage = "exact_lookup", "Contact resolved");
            return Ok(Resolution::found(id, contact, MatchStage::ExactLookup, tried));
        }

        if self.settings.single_result_fallback {
            if let [only] = page.contacts.as_slice() {
                if let Some(id) = only.contact_id() {
                    warn!(
                        contact_id = %id,
                        "Accepting single exact-lookup result without an email field match"
                    );
                    return Ok(Resolution::found(
                        id,
                        only.clone(),
                        MatchStage::SingleResult,
                        tried,
                    ));
                }
            }
        }

        let page_size = self.settings.page_size.max(1);

        for param in SearchParam::ESCALATION {
            let mut offset = 0;
            while offset < self.settings.max_offset {
                let page = self
                    .directory
                    .search_contacts(param, email, offset, page_size)
                    .await
                    .map_err(|source| DirectoryError {
                        query: DirectoryQuery::Search {
                            param,
                            value: email.to_string(),
                            offset,
                            limit: page_size,
                        },
                        tried: tried.clone(),
                        source,
                    })?;
                tried.push(page.url.clone());

                if let Some((id, contact)) = first_exact_match(&page.contacts, email) {
                    info!(contact_id = %id, stage = %MatchStage::Search(param), offset, "Contact resolved");
                    return Ok(Resolution::found(id, contact, MatchStage::Search(param), tried));
                }

                if (page.contacts.len() as u64) < u64::from(page_size) {
                    debug!(param = %param, offset, "Short page, search exhausted");
                    break;
                }
                offset = offset.saturating_add(page_size);
            }
        }

        info!(queries = tried.len(), "No contact matched email");
        Ok(Resolution::not_found(tried))
    }
}

/// First contact in page order that carries `email` and has an identifier.
fn first_exact_match(contacts: &[Contact], email: &str) -> Option<(ContactId, Contact)> {
    contacts.iter().find_map(|contact| {
        let field = contact.matching_email_field(email)?;
        let id = contact.contact_id()?;
        debug!(contact_id = %id, field, "Email field matched");
        Some((id, contact.clone()))
    })
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
