//! Configuration types for the HTTP service
//!
//! Sources are layered by [`ServiceConfig::load`], later sources winning:
//!
//! 1. `/etc/note-relay/service.yaml`
//! 2. `./config/service.yaml`
//! 3. the file named by `NOTE_RELAY_CONFIG_FILE`
//! 4. `NOTE_RELAY__SECTION__KEY` environment variables
//! 5. the flat deployment variables (`DIRECTORY_BASE_URL`, `WEBHOOK_SECRET`, ...)
//!
//! Every field has a default, so an empty environment yields a valid config.
//! Absent directory credentials are not a load error; they are reported by
//! [`ServiceConfig::missing_settings`] and fail each request with a 500.

use directory_client::ClientConfig;
use note_relay_core::webhook::DEFAULT_SIGNATURE_HEADER;
use note_relay_core::{PipelineConfig, ResolverSettings, DEFAULT_MAX_NOTE_LENGTH};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::errors::ConfigError;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_FILE_ENV: &str = "NOTE_RELAY_CONFIG_FILE";

/// Prefix for structured environment overrides.
pub const ENV_PREFIX: &str = "NOTE_RELAY";

pub const DIRECTORY_BASE_URL_ENV: &str = "DIRECTORY_BASE_URL";
pub const DIRECTORY_API_TOKEN_ENV: &str = "DIRECTORY_API_TOKEN";
pub const DIRECTORY_WS_TOKEN_ENV: &str = "DIRECTORY_WS_TOKEN";
pub const WEBHOOK_SECRET_ENV: &str = "WEBHOOK_SECRET";
pub const ALLOW_UNVERIFIED_ENV: &str = "ALLOW_UNVERIFIED";

/// Log filter used when neither `RUST_LOG` nor `logging.level` is set.
pub const DEFAULT_LOG_FILTER: &str = "note_relay_service=info,note_relay_api=info,note_relay_core=info,directory_client=info,tower_http=debug";

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Webhook intake settings
    pub webhook: WebhookConfig,

    /// Remote contact directory settings
    pub directory: DirectoryConfig,

    /// Note composition settings
    pub note: NoteConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Webhook intake configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Webhook endpoint path
    pub endpoint_path: String,

    /// Shared HMAC secret
    pub secret: Option<String>,

    /// Accept deliveries without verifying them (local testing only)
    pub allow_unverified: bool,

    /// Accept headers that merely contain the digest
    pub loose_signature_match: bool,

    /// Header carrying the signature
    pub signature_header: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/webhook".to_string(),
            secret: None,
            allow_unverified: false,
            loose_signature_match: false,
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
        }
    }
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("endpoint_path", &self.endpoint_path)
            .field("secret", &self.secret.as_ref().map(|_| "<REDACTED>"))
            .field("allow_unverified", &self.allow_unverified)
            .field("loose_signature_match", &self.loose_signature_match)
            .field("signature_header", &self.signature_header)
            .finish()
    }
}

/// Remote contact directory configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// API root, e.g. `https://example.directory.com/api`
    pub base_url: String,

    pub api_token: String,

    pub ws_token: String,

    /// Per-request timeout in seconds
    pub timeout_seconds: u64,

    /// Note type to attach to every note
    pub note_type_id: Option<String>,

    /// Search page size
    pub search_page_size: u32,

    /// Exclusive ceiling on search offsets
    pub search_max_offset: u32,

    /// Trust a single exact-lookup result without an email field match
    pub single_result_fallback: bool,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        let resolver = ResolverSettings::default();
        Self {
            base_url: String::new(),
            api_token: String::new(),
            ws_token: String::new(),
            timeout_seconds: 10,
            note_type_id: None,
            search_page_size: resolver.page_size,
            search_max_offset: resolver.max_offset,
            single_result_fallback: resolver.single_result_fallback,
        }
    }
}

impl fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |token: &str| if token.is_empty() { "" } else { "<REDACTED>" };
        f.debug_struct("DirectoryConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &redact(&self.api_token))
            .field("ws_token", &redact(&self.ws_token))
            .field("timeout_seconds", &self.timeout_seconds)
            .field("note_type_id", &self.note_type_id)
            .field("search_page_size", &self.search_page_size)
            .field("search_max_offset", &self.search_max_offset)
            .field("single_result_fallback", &self.single_result_fallback)
            .finish()
    }
}

/// Note composition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteConfig {
    /// Maximum note length in characters
    pub max_length: usize,
}

impl Default for NoteConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_NOTE_LENGTH,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_FILTER.to_string(),
            json_format: false,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from files and the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when a present file is malformed, the
    /// explicit file is missing, or a value cannot be coerced to its type.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var(CONFIG_FILE_ENV)
            .ok()
            .filter(|path| !path.trim().is_empty());

        let mut config = Self::load_from(
            &["/etc/note-relay/service", "config/service"],
            explicit.as_deref(),
        )?;
        config.apply_env_overrides_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Layer the optional `files`, the required `explicit` file and the
    /// `NOTE_RELAY__` environment.
    pub fn load_from(files: &[&str], explicit: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        for file in files {
            builder = builder.add_source(
                config::File::with_name(file)
                    .required(false)
                    .format(config::FileFormat::Yaml),
            );
        }

        if let Some(path) = explicit {
            builder = builder.add_source(
                config::File::with_name(path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Apply the flat deployment variables on top of the loaded config.
    ///
    /// Empty values are ignored. `ALLOW_UNVERIFIED` is true for `1`, `true`
    /// or `yes` in any case.
    pub fn apply_env_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(base_url) = get(DIRECTORY_BASE_URL_ENV) {
            self.directory.base_url = base_url.trim().to_string();
        }
        if let Some(token) = get(DIRECTORY_API_TOKEN_ENV) {
            self.directory.api_token = token;
        }
        if let Some(token) = get(DIRECTORY_WS_TOKEN_ENV) {
            self.directory.ws_token = token;
        }
        if let Some(secret) = get(WEBHOOK_SECRET_ENV) {
            self.webhook.secret = Some(secret);
        }
        if let Some(flag) = get(ALLOW_UNVERIFIED_ENV) {
            self.webhook.allow_unverified =
                matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    /// Reject structurally invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                message: "server.port must be non-zero".to_string(),
            });
        }
        if !self.webhook.endpoint_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                message: "webhook.endpoint_path must start with '/'".to_string(),
            });
        }
        if self.webhook.signature_header.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "webhook.signature_header must not be empty".to_string(),
            });
        }
        if self.directory.search_page_size == 0 {
            return Err(ConfigError::Invalid {
                message: "directory.search_page_size must be non-zero".to_string(),
            });
        }
        if self.directory.search_max_offset < self.directory.search_page_size {
            return Err(ConfigError::Invalid {
                message: "directory.search_max_offset must be at least one page".to_string(),
            });
        }
        if self.note.max_length == 0 {
            return Err(ConfigError::Invalid {
                message: "note.max_length must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// Names of required settings that are absent.
    pub fn missing_settings(&self) -> Vec<String> {
        [
            (DIRECTORY_BASE_URL_ENV, &self.directory.base_url),
            (DIRECTORY_API_TOKEN_ENV, &self.directory.api_token),
            (DIRECTORY_WS_TOKEN_ENV, &self.directory.ws_token),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name.to_string())
        .collect()
    }

    /// Settings for the webhook pipeline.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            webhook_secret: self.webhook.secret.clone(),
            allow_unverified: self.webhook.allow_unverified,
            loose_signature_match: self.webhook.loose_signature_match,
            signature_header: self.webhook.signature_header.to_ascii_lowercase(),
            max_note_length: self.note.max_length,
            resolver: ResolverSettings {
                page_size: self.directory.search_page_size,
                max_offset: self.directory.search_max_offset,
                single_result_fallback: self.directory.single_result_fallback,
            },
            note_type_id: self.directory.note_type_id.clone(),
            missing_settings: self.missing_settings(),
        }
    }

    /// Settings for the directory HTTP client.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_base_url(self.directory.base_url.clone())
            .with_tokens(
                self.directory.api_token.clone(),
                self.directory.ws_token.clone(),
            )
            .with_timeout(Duration::from_secs(self.directory.timeout_seconds.max(1)))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
