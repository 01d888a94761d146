//! Directory API client.
//!
//! This module provides [`DirectoryClient`], an authenticated client for the
//! remote contact directory. Authentication uses two static tokens sent as
//! request headers on every call (`apitoken` and `wstoken`).

mod contact;
mod note;

use std::time::Duration;

use url::Url;

use crate::error::ApiError;

pub use contact::{Contact, ContactId, ContactPage, SearchParam};
pub use note::NoteReceipt;

/// Header carrying the API token.
pub const API_TOKEN_HEADER: &str = "apitoken";

/// Header carrying the web-service token.
pub const WS_TOKEN_HEADER: &str = "wstoken";

/// Configuration for directory client behavior.
///
/// # Examples
///
/// ```
/// use directory_client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_base_url("https://directory.example.com/api")
///     .with_timeout(Duration::from_secs(5));
/// assert_eq!(config.timeout, Duration::from_secs(5));
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Root of the directory REST API, e.g. `https://host/api`
    pub base_url: String,
    /// Value of the `apitoken` header
    pub api_token: String,
    /// Value of the `wstoken` header
    pub ws_token: String,
    /// Timeout applied to every request
    pub timeout: Duration,
    /// User agent string for API requests
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_token: String::new(),
            ws_token: String::new(),
            timeout: Duration::from_secs(10),
            user_agent: concat!("note-relay/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &"<REDACTED>")
            .field("ws_token", &"<REDACTED>")
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for client configuration.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Set the directory base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set both authentication tokens.
    pub fn with_tokens(mut self, api_token: impl Into<String>, ws_token: impl Into<String>) -> Self {
        self.api_token = api_token.into();
        self.ws_token = ws_token.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Builder for constructing `ClientConfig` instances.
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new configuration builder with defaults.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Set the directory base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Set the API token.
    pub fn api_token(mut self, api_token: impl Into<String>) -> Self {
        self.config.api_token = api_token.into();
        self
    }

    /// Set the web-service token.
    pub fn ws_token(mut self, ws_token: impl Into<String>) -> Self {
        self.config.ws_token = ws_token.into();
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Authenticated client for the contact directory.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct DirectoryClient {
    http_client: reqwest::Client,
    config: ClientConfig,
}

impl DirectoryClient {
    /// Create a new builder for constructing a directory client.
    pub fn builder(config: ClientConfig) -> DirectoryClientBuilder {
        DirectoryClientBuilder::new(config)
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Resolve an API path against the configured base URL.
    ///
    /// Leading slashes on `path` and trailing slashes on the base URL are
    /// normalised so that both `"contacts"` and `"/contacts"` work.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Configuration`] when the base URL is empty or not
    /// an absolute URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        let base = self.config.base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(ApiError::Configuration {
                message: "directory base URL is not configured".to_string(),
            });
        }

        let normalized_path = path.strip_prefix('/').unwrap_or(path);
        let raw = format!("{}/{}", base, normalized_path);

        Url::parse(&raw).map_err(|e| ApiError::Configuration {
            message: format!("invalid directory URL '{}': {}", raw, e),
        })
    }

    /// Attach the authentication headers to a request.
    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header(API_TOKEN_HEADER, &self.config.api_token)
            .header(WS_TOKEN_HEADER, &self.config.ws_token)
            .header("Accept", "application/json")
    }
}

impl std::fmt::Debug for DirectoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryClient")
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for constructing `DirectoryClient` instances.
pub struct DirectoryClientBuilder {
    config: ClientConfig,
}

impl DirectoryClientBuilder {
    fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Build the directory client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Configuration` if the HTTP client cannot be created.
    pub fn build(self) -> Result<DirectoryClient, ApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .user_agent(&self.config.user_agent)
            .build()
            .map_err(|e| ApiError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(DirectoryClient {
            http_client,
            config: self.config,
        })
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
