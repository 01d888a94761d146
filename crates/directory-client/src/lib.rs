//! # Directory Client
//!
//! Async client for the remote student-management directory that note-relay
//! writes to. The directory is the system of record for contacts; this crate
//! only reads contacts and appends notes, it never caches or mutates records
//! locally.
//!
//! Supported operations:
//! - exact contact lookup by email address
//! - paged free-text contact search
//! - contact note creation
//!
//! ```rust,no_run
//! use directory_client::{ClientConfig, DirectoryClient};
//!
//! # async fn example() -> Result<(), directory_client::ApiError> {
//! let config = ClientConfig::default()
//!     .with_base_url("https://directory.example.com/api")
//!     .with_tokens("api-token", "ws-token");
//! let client = DirectoryClient::builder(config).build()?;
//!
//! let page = client.lookup_by_email("student@example.com").await?;
//! println!("{} candidates from {}", page.contacts.len(), page.url);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;

pub use client::{
    ClientConfig, ClientConfigBuilder, Contact, ContactId, ContactPage, DirectoryClient,
    DirectoryClientBuilder, NoteReceipt, SearchParam,
};
pub use error::ApiError;
