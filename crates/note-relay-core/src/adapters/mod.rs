//! # Infrastructure Adapters
//!
//! Implementations of the core directory interface over real clients.

pub mod http_directory;
