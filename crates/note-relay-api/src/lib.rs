//! # Note-Relay HTTP Service
//!
//! HTTP surface for the helpdesk webhook relay.
//!
//! This service provides:
//! - the webhook endpoint (`POST`, with `204` preflights and JSON `405`s)
//! - a health check endpoint
//! - a Prometheus metrics endpoint
//!
//! Processing itself lives in [`note_relay_core::WebhookPipeline`]; this crate
//! turns requests into envelopes and pipeline results into responses.

pub mod config;
pub mod errors;
pub mod metrics;
pub mod responses;

pub use config::{
    DirectoryConfig, LoggingConfig, NoteConfig, ServerConfig, ServiceConfig, WebhookConfig,
};
pub use errors::{ConfigError, ServiceError, WebhookHandlerError};
pub use metrics::ServiceMetrics;
pub use responses::{HealthResponse, WebhookResponse};

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use note_relay_core::{
    webhook::record_response, ContactDirectory, CorrelationId, PipelineError, WebhookEnvelope,
    WebhookPipeline,
};
use std::{future::IntoFuture, net::SocketAddr, sync::Arc};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, instrument, warn};

/// Request header naming the transfer encoding of the body.
///
/// A value of `base64` marks a body re-encoded by an upstream gateway.
pub const BODY_ENCODING_HEADER: &str = "x-body-encoding";

/// Header used to correlate log lines for one request.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: ServiceConfig,

    /// Pipeline handling each delivery
    pub pipeline: Arc<WebhookPipeline>,

    /// Metrics collector for observability
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ServiceConfig,
        pipeline: Arc<WebhookPipeline>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            config,
            pipeline,
            metrics,
        }
    }

    /// Build the pipeline from `config` over `directory`.
    pub fn from_config(
        config: ServiceConfig,
        directory: Arc<dyn ContactDirectory>,
    ) -> Result<Self, ServiceError> {
        let metrics = ServiceMetrics::new().map_err(|e| {
            ServiceError::Configuration(ConfigError::Invalid {
                message: format!("Failed to initialize metrics: {e}"),
            })
        })?;
        let pipeline = Arc::new(WebhookPipeline::new(config.pipeline_config(), directory));

        Ok(Self::new(config, pipeline, metrics))
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let webhook_routes = Router::new().route(
        &state.config.webhook.endpoint_path,
        post(handle_webhook).fallback(handle_method_not_allowed),
    );

    let observability_routes = Router::new()
        .route("/health", get(handle_health_check))
        .route("/metrics", get(metrics_endpoint));

    Router::new()
        .merge(webhook_routes)
        .merge(observability_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(preflight_status_middleware))
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(request_logging_middleware))
                .layer(DefaultBodyLimit::max(state.config.server.max_body_size))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server
///
/// Serves until SIGINT or SIGTERM, then lets in-flight requests finish.
pub async fn start_server(
    config: ServiceConfig,
    directory: Arc<dyn ContactDirectory>,
) -> Result<(), ServiceError> {
    let state = AppState::from_config(config.clone(), directory)?;
    let missing = config.missing_settings();
    if !missing.is_empty() {
        warn!(
            missing = ?missing,
            "Directory settings incomplete, webhook requests will be answered with 500"
        );
    }
    let app = create_router(state);

    let address = format!("{}:{}", config.server.host, config.server.port);
    let addr: SocketAddr = address.parse().map_err(|e| ServiceError::BindFailed {
        address: address.clone(),
        message: format!("invalid address: {e}"),
    })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: addr.to_string(),
            message: e.to_string(),
        })?;

    info!(
        address = %addr,
        endpoint = %config.webhook.endpoint_path,
        "Starting HTTP server"
    );

    let shutdown_timeout = std::time::Duration::from_secs(config.server.shutdown_timeout_seconds);
    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal(shutdown_timeout).await;
            let _ = signalled_tx.send(());
        })
        .into_future();

    // In-flight requests get `shutdown_timeout` to finish once a signal arrives.
    let deadline = async move {
        match signalled_rx.await {
            Ok(()) => tokio::time::sleep(shutdown_timeout).await,
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = server => {
            result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            })?;
        }
        _ = deadline => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out, abandoning in-flight requests"
            );
        }
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

async fn shutdown_signal(shutdown_timeout: std::time::Duration) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Received SIGINT (Ctrl+C), initiating graceful shutdown"
            );
        },
        _ = terminate => {
            info!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Received SIGTERM, initiating graceful shutdown"
            );
        },
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Relay one helpdesk webhook delivery.
#[instrument(skip_all, fields(body_length = body.len()))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, WebhookHandlerError> {
    state.metrics.webhook_requests_total.inc();
    let _timer = state.metrics.webhook_duration_seconds.start_timer();

    let envelope = envelope_from_request(&headers, body);

    let result = state.pipeline.process(&envelope).await;
    let status = match &result {
        Ok(_) => StatusCode::OK.as_u16(),
        Err(e) => e.status_code(),
    };
    record_response(&envelope, status);

    match result {
        Ok(outcome) => {
            state.metrics.record_outcome(outcome.label());
            Ok(Json(WebhookResponse::from(&outcome)))
        }
        Err(e) => {
            match &e {
                PipelineError::InvalidSignature { .. } => {
                    state.metrics.signature_failures_total.inc();
                }
                PipelineError::Directory(_) | PipelineError::NoteWrite { .. } => {
                    state.metrics.directory_failures_total.inc();
                }
                _ => {}
            }
            state.metrics.record_outcome(e.kind());
            Err(WebhookHandlerError::Pipeline(e))
        }
    }
}

/// Build an envelope from the request, dropping header values that are not
/// valid UTF-8.
fn envelope_from_request(headers: &HeaderMap, body: Bytes) -> WebhookEnvelope {
    let is_base64 = headers
        .get(BODY_ENCODING_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("base64"));

    let pairs = headers.iter().filter_map(|(name, value)| {
        value
            .to_str()
            .ok()
            .map(|value| (name.as_str(), value.to_string()))
    });

    WebhookEnvelope::new(pairs, body).with_base64_body(is_base64)
}

async fn handle_method_not_allowed(method: Method) -> WebhookHandlerError {
    WebhookHandlerError::MethodNotAllowed {
        method: method.to_string(),
    }
}

/// Basic health check endpoint
#[instrument(skip_all)]
async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(
    State(state): State<AppState>,
) -> Result<Response, WebhookHandlerError> {
    metrics_response(state.metrics.gather_text())
}

fn metrics_response(
    gathered: Result<String, prometheus::Error>,
) -> Result<Response, WebhookHandlerError> {
    let text = gathered.map_err(|e| WebhookHandlerError::InternalError {
        message: format!("failed to encode metrics: {e}"),
    })?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text).into_response())
}

// ============================================================================
// Middleware
// ============================================================================

/// Answer `OPTIONS` with `204 No Content`.
///
/// The CORS layer answers every `OPTIONS` request itself, with `200` and the
/// permissive headers; this only rewrites the status.
async fn preflight_status_middleware(
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let is_preflight = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if is_preflight && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

/// Request logging middleware with correlation IDs
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| CorrelationId::new().to_string());

    request.extensions_mut().insert(correlation_id.clone());

    info!(
        correlation_id = %correlation_id,
        method = %method,
        uri = %uri,
        "Request started"
    );

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert(CORRELATION_ID_HEADER, header_value);
    }

    let status = response.status();

    if status.is_server_error() {
        error!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed"
        );
    }

    response
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
