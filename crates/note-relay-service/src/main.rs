//! # Note-Relay Service
//!
//! Binary entry point for the Note-Relay HTTP service.
//!
//! This executable:
//! - Loads configuration from files and the environment
//! - Initializes logging
//! - Creates the directory client and webhook pipeline
//! - Starts the HTTP server from note-relay-api
//!
//! Exit codes: `1` bind failure, `2` server failure, `3` configuration error.

use anyhow::Context;
use directory_client::DirectoryClient;
use note_relay_api::{start_server, LoggingConfig, ServiceConfig, ServiceError};
use note_relay_core::ContactDirectory;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Logging settings live in the configuration, so loading happens before
    // the subscriber exists. A load failure still gets logged with defaults.
    // -------------------------------------------------------------------------
    let loaded = ServiceConfig::load();

    let logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    init_logging(&logging);

    let service_config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration; aborting");
            std::process::exit(ServiceError::Configuration(e).exit_code());
        }
    };

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(ServiceError::Configuration(e).exit_code());
    }

    info!(config = ?service_config, "Starting Note-Relay Service");

    if service_config.webhook.secret.is_none() {
        warn!("No webhook secret configured, deliveries will not be verified");
    } else if service_config.webhook.allow_unverified {
        warn!("ALLOW_UNVERIFIED is set, signature failures will be ignored");
    }

    // -------------------------------------------------------------------------
    // Wire the directory client
    // -------------------------------------------------------------------------
    let client = DirectoryClient::builder(service_config.client_config())
        .build()
        .context("failed to build directory client")?;
    let directory: Arc<dyn ContactDirectory> = Arc::new(client);

    if let Err(e) = start_server(service_config, directory).await {
        error!(error = %e, "HTTP server failed");
        std::process::exit(e.exit_code());
    }

    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
