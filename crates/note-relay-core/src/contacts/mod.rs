//! # Contact Directory Module
//!
//! Abstraction over the remote contact directory plus the resolver that maps
//! a customer email to a single contact.

use async_trait::async_trait;
use directory_client::{ApiError, ContactId, ContactPage, NoteReceipt, SearchParam};
use std::fmt;

pub mod resolver;

pub use resolver::{ContactResolver, MatchStage, Resolution, ResolverSettings};

// ============================================================================
// Directory Abstraction
// ============================================================================

/// Operations the relay needs from the contact directory.
///
/// Implemented for [`directory_client::DirectoryClient`] in
/// [`crate::adapters`]; tests substitute in-memory fakes.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// Exact lookup by email address.
    async fn lookup_by_email(&self, email: &str) -> Result<ContactPage, ApiError>;

    /// One page of a free-text search.
    async fn search_contacts(
        &self,
        param: SearchParam,
        value: &str,
        offset: u32,
        limit: u32,
    ) -> Result<ContactPage, ApiError>;

    /// Append a note to a contact.
    async fn create_note(
        &self,
        contact_id: &ContactId,
        note: &str,
        note_type_id: Option<&str>,
    ) -> Result<NoteReceipt, ApiError>;
}

/// Description of a directory query, for diagnostics when it fails before
/// a URL could be reported back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryQuery {
    Lookup {
        email: String,
    },
    Search {
        param: SearchParam,
        value: String,
        offset: u32,
        limit: u32,
    },
}

impl fmt::Display for DirectoryQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lookup { email } => write!(f, "lookup emailAddress={email}"),
            Self::Search {
                param,
                value,
                offset,
                limit,
            } => write!(
                f,
                "search {param}={value} offsetRows={offset} displayLength={limit}"
            ),
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// A directory query failed while resolving a contact.
#[derive(Debug, thiserror::Error)]
#[error("Directory query '{query}' failed: {source}")]
pub struct DirectoryError {
    /// The query that failed
    pub query: DirectoryQuery,
    /// URLs of the queries that completed before the failure
    pub tried: Vec<String>,
    #[source]
    pub source: ApiError,
}

impl DirectoryError {
    /// HTTP status the directory answered with, if it answered.
    pub fn remote_status(&self) -> Option<u16> {
        self.source.status()
    }

    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        self.source.is_transient()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
