//! Common test utilities for note-relay end-to-end tests
//!
//! This module provides:
//! - A mocked remote directory backed by `wiremock`
//! - A router wired to the real directory client
//! - Signed request and payload builders

#![allow(dead_code)]

use axum::{
    body::Body,
    http::Request,
    response::Response,
    Router,
};
use directory_client::DirectoryClient;
use note_relay_api::{create_router, AppState, ServiceConfig};
use note_relay_core::webhook::signature::compute_signature;
use note_relay_core::ContactDirectory;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::{
    matchers::{header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

pub const SECRET: &str = "e2e-webhook-secret";
pub const API_TOKEN: &str = "e2e-api-token";
pub const WS_TOKEN: &str = "e2e-ws-token";

// ============================================================================
// Mock directory
// ============================================================================

/// Remote directory served by a local mock server.
pub struct TestDirectory {
    pub server: MockServer,
}

impl TestDirectory {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn base_url(&self) -> String {
        format!("{}/api", self.server.uri())
    }

    /// Exact lookup for `email` answers with `records`.
    pub async fn lookup_returns(&self, email: &str, records: Value) {
        Mock::given(method("GET"))
            .and(path("/api/contacts"))
            .and(query_param("emailAddress", email))
            .and(header("apitoken", API_TOKEN))
            .and(header("wstoken", WS_TOKEN))
            .respond_with(ResponseTemplate::new(200).set_body_json(records))
            .mount(&self.server)
            .await;
    }

    /// Exact lookup answers with a server error.
    pub async fn lookup_fails(&self, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path("/api/contacts"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Every search page is empty.
    pub async fn search_returns_nothing(&self) {
        Mock::given(method("GET"))
            .and(path("/api/contacts/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&self.server)
            .await;
    }

    /// Note creation answers with `status` and `body`.
    pub async fn note_responds(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/api/contact/note/"))
            .and(header("apitoken", API_TOKEN))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Note creation answers with a plain-text error.
    pub async fn note_fails(&self, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path("/api/contact/note/"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Requests the directory received, as `METHOD path`.
    pub async fn received(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|request| format!("{} {}", request.method, request.url.path()))
            .collect()
    }

    /// Body of the first note POST, if any.
    pub async fn note_body(&self) -> Option<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .find(|request| request.url.path() == "/api/contact/note/")
            .map(|request| String::from_utf8_lossy(&request.body).into_owned())
    }
}

// ============================================================================
// App wiring
// ============================================================================

/// Service configuration pointing at `directory`, signing with [`SECRET`].
pub fn test_config(directory: &TestDirectory) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.directory.base_url = directory.base_url();
    config.directory.api_token = API_TOKEN.to_string();
    config.directory.ws_token = WS_TOKEN.to_string();
    config.webhook.secret = Some(SECRET.to_string());
    config
}

/// Router over the real HTTP directory client.
pub fn build_app(config: ServiceConfig) -> Router {
    let client = DirectoryClient::builder(config.client_config())
        .build()
        .expect("directory client");
    let directory: Arc<dyn ContactDirectory> = Arc::new(client);
    let state = AppState::from_config(config, directory).expect("app state");
    create_router(state)
}

// ============================================================================
// Requests
// ============================================================================

/// POST `payload` with a signature over its `data` value.
pub fn signed_request(payload: &Value) -> Request<Body> {
    let body = serde_json::to_vec(payload).expect("serialize payload");
    let data = serde_json::to_vec(&payload["data"]).expect("serialize data");
    let signature = compute_signature(SECRET, &data).expect("signature");

    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header("X-HelpScout-Signature", signature)
        .body(Body::from(body))
        .expect("request")
}

/// POST `payload` without a signature header.
pub fn unsigned_request(payload: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(payload).expect("serialize payload")))
        .expect("request")
}

/// Agent reply to `email`, shaped like the helpdesk's conversation events.
pub fn reply_payload(email: &str) -> Value {
    json!({
        "data": {
            "contactInfo": {"email": email},
            "threads": [{"type": "Email", "direction": "Outbound", "textBody": "Hi there"}],
            "subject": "Re: Order"
        }
    })
}

pub async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
