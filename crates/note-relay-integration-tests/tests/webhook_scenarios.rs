//! End-to-end webhook scenarios
//!
//! Each test drives the full router over the real directory client against a
//! mocked directory server.

mod common;

use axum::http::StatusCode;
use common::{
    build_app, json_body, reply_payload, signed_request, test_config, unsigned_request,
    TestDirectory,
};
use serde_json::json;
use tower::ServiceExt;

/// Signed reply to a known contact writes exactly one note.
#[tokio::test]
async fn test_signed_reply_writes_note_to_matched_contact() {
    let directory = TestDirectory::start().await;
    directory
        .lookup_returns("a@x.com", json!([{"CONTACTID": 7, "EMAILADDRESS": "a@x.com"}]))
        .await;
    directory
        .note_responds(200, json!({"CONTACTID": 7, "NOTEID": 99}))
        .await;
    let app = build_app(test_config(&directory));

    let response = app.oneshot(signed_request(&reply_payload("a@x.com"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["contactID"], "7");
    assert_eq!(body["matchedBy"], "exact_lookup");
    assert_eq!(body["signature"], "raw_data_substring");

    assert_eq!(
        directory.received().await,
        vec!["GET /api/contacts", "POST /api/contact/note/"]
    );
    let note = directory.note_body().await.expect("note posted");
    assert!(note.contains("contactID=7"));
    assert!(note.contains("To%3A+a%40x.com") || note.contains("To%3A%20a%40x.com"));
    assert!(note.contains("Re%3A+Order") || note.contains("Re%3A%20Order"));
    assert!(note.contains("Hi+there") || note.contains("Hi%20there"));
}

/// The configured secret makes the signature mandatory.
#[tokio::test]
async fn test_missing_signature_is_rejected_without_directory_calls() {
    let directory = TestDirectory::start().await;
    directory
        .lookup_returns("a@x.com", json!([{"CONTACTID": 7, "EMAILADDRESS": "a@x.com"}]))
        .await;
    let app = build_app(test_config(&directory));

    let response = app.oneshot(unsigned_request(&reply_payload("a@x.com"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["status"], 401);
    assert!(directory.received().await.is_empty());
}

/// Changing the signed data without re-signing is rejected.
#[tokio::test]
async fn test_tampered_payload_is_rejected() {
    let directory = TestDirectory::start().await;
    let app = build_app(test_config(&directory));

    let signed = signed_request(&reply_payload("a@x.com"));
    let (parts, _) = signed.into_parts();
    let tampered = serde_json::to_vec(&reply_payload("b@x.com")).unwrap();
    let request = axum::http::Request::from_parts(parts, axum::body::Body::from(tampered));

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(directory.received().await.is_empty());
}

#[tokio::test]
async fn test_payload_without_email_is_skipped_without_directory_calls() {
    let directory = TestDirectory::start().await;
    let app = build_app(test_config(&directory));
    let payload = json!({
        "data": {
            "subject": "Internal note",
            "threads": [{"type": "note", "body": "Nothing to relay"}]
        }
    });

    let response = app.oneshot(signed_request(&payload)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"ok": true, "skipped": "no customer email"})
    );
    assert!(directory.received().await.is_empty());
}

/// Every lookup and search stage comes back empty.
#[tokio::test]
async fn test_unknown_contact_is_skipped_with_tried_urls() {
    let directory = TestDirectory::start().await;
    directory.lookup_returns("a@x.com", json!([])).await;
    directory.search_returns_nothing().await;
    let app = build_app(test_config(&directory));

    let response = app.oneshot(signed_request(&reply_payload("a@x.com"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["skipped"], "contact not found");
    assert_eq!(body["email"], "a@x.com");

    let tried = body["tried"].as_array().expect("tried urls");
    assert_eq!(tried.len(), 4);
    assert!(tried[0].as_str().unwrap().contains("/api/contacts?emailAddress="));
    assert!(tried[1].as_str().unwrap().contains("/api/contacts/search?emailAddress="));
    assert!(tried[2].as_str().unwrap().contains("/api/contacts/search?q="));
    assert!(tried[3].as_str().unwrap().contains("/api/contacts/search?search="));
    // Credentials never appear in diagnostics
    assert!(!body.to_string().contains(common::API_TOKEN));

    let received = directory.received().await;
    assert!(!received.iter().any(|r| r.starts_with("POST")));
}

/// A failed note write surfaces the directory's status.
#[tokio::test]
async fn test_note_write_failure_is_502_with_remote_status() {
    let directory = TestDirectory::start().await;
    directory
        .lookup_returns("a@x.com", json!([{"CONTACTID": 7, "EMAILADDRESS": "a@x.com"}]))
        .await;
    directory.note_fails(500, "database unavailable").await;
    let app = build_app(test_config(&directory));

    let response = app.oneshot(signed_request(&reply_payload("a@x.com"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["status"], 502);
    assert_eq!(body["remoteStatus"], 500);
    assert_eq!(body["remoteBody"], "database unavailable");
    assert_eq!(body["contactID"], "7");
}

#[tokio::test]
async fn test_directory_lookup_failure_is_502() {
    let directory = TestDirectory::start().await;
    directory.lookup_fails(503, "maintenance").await;
    let app = build_app(test_config(&directory));

    let response = app.oneshot(signed_request(&reply_payload("a@x.com"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["remoteStatus"], 503);
    assert_eq!(body["remoteBody"], "maintenance");
}

/// With no secret configured any delivery is processed.
#[tokio::test]
async fn test_unsigned_delivery_accepted_without_secret() {
    let directory = TestDirectory::start().await;
    directory
        .lookup_returns("a@x.com", json!([{"CONTACTID": 7, "EMAILADDRESS": "a@x.com"}]))
        .await;
    directory.note_responds(200, json!({"CONTACTID": 7})).await;
    let mut config = test_config(&directory);
    config.webhook.secret = None;
    let app = build_app(config);

    let response = app.oneshot(unsigned_request(&reply_payload("a@x.com"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["signature"], "unverified:no_secret_configured");
}

#[tokio::test]
async fn test_missing_directory_settings_is_500() {
    let directory = TestDirectory::start().await;
    let mut config = test_config(&directory);
    config.directory.api_token = String::new();
    let app = build_app(config);

    let response = app.oneshot(signed_request(&reply_payload("a@x.com"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["missing"], json!(["DIRECTORY_API_TOKEN"]));
    assert!(directory.received().await.is_empty());
}
