//! Tests for contact records, lookup and search.

use super::*;
use crate::client::ClientConfig;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn contact(value: Value) -> Contact {
    match value {
        Value::Object(fields) => Contact::from_fields(fields),
        other => panic!("expected object, got {other}"),
    }
}

fn client_for(server: &MockServer) -> DirectoryClient {
    let config = ClientConfig::default()
        .with_base_url(server.uri())
        .with_tokens("test-api-token", "test-ws-token");
    DirectoryClient::builder(config).build().unwrap()
}

mod contact_record {
    use super::*;

    /// Numeric and string identifiers normalise to the same form.
    #[test]
    fn test_contact_id_from_number_or_string() {
        assert_eq!(
            contact(json!({"CONTACTID": 42})).contact_id(),
            Some(ContactId::new("42"))
        );
        assert_eq!(
            contact(json!({"CONTACTID": " 42 "})).contact_id(),
            Some(ContactId::new("42"))
        );
        assert_eq!(
            contact(json!({"contactID": "7"})).contact_id(),
            Some(ContactId::new("7"))
        );
    }

    #[test]
    fn test_contact_id_absent_or_blank() {
        assert_eq!(contact(json!({"GIVENNAME": "Ann"})).contact_id(), None);
        assert_eq!(contact(json!({"CONTACTID": ""})).contact_id(), None);
        assert_eq!(contact(json!({"CONTACTID": null})).contact_id(), None);
    }

    /// Primary and alternate come first, custom email fields after.
    #[test]
    fn test_email_fields_order() {
        let record = contact(json!({
            "CUSTOMFIELD_PARENTEMAIL": "parent@x.com",
            "EMAILADDRESSALTERNATIVE": "alt@x.com",
            "EMAILADDRESS": "primary@x.com",
            "GIVENNAME": "Ann",
            "CUSTOMFIELD_WORKEMAIL": ""
        }));

        assert_eq!(
            record.email_fields(),
            vec![
                ("EMAILADDRESS", "primary@x.com"),
                ("EMAILADDRESSALTERNATIVE", "alt@x.com"),
                ("CUSTOMFIELD_PARENTEMAIL", "parent@x.com"),
            ]
        );
    }

    #[test]
    fn test_matches_email_ignores_case_and_whitespace() {
        let record = contact(json!({"EMAILADDRESS": "  Ann.Smith@Example.COM "}));
        assert!(record.matches_email("ann.smith@example.com"));
        assert!(record.matches_email(" ANN.SMITH@EXAMPLE.COM"));
    }

    /// Prefix and substring overlaps are not matches.
    #[test]
    fn test_matches_email_rejects_near_matches() {
        let record = contact(json!({"EMAILADDRESS": "ann.smith@example.com"}));
        assert!(!record.matches_email("ann@example.com"));
        assert!(!record.matches_email("smith@example.com"));
        assert!(!record.matches_email("ann.smith@example.com.au"));
        assert!(!record.matches_email(""));
    }

    #[test]
    fn test_matching_email_field_reports_field_name() {
        let record = contact(json!({
            "EMAILADDRESS": "someone@x.com",
            "CUSTOMFIELD_STUDENTEMAIL": "Student@X.com"
        }));
        assert_eq!(
            record.matching_email_field("student@x.com"),
            Some("CUSTOMFIELD_STUDENTEMAIL")
        );
    }
}

mod response_parsing {
    use super::*;

    #[test]
    fn test_parse_array_skips_non_objects() {
        let contacts = parse_contacts(r#"[{"CONTACTID":1}, 5, "x", {"CONTACTID":2}]"#).unwrap();
        assert_eq!(contacts.len(), 2);
    }

    #[test]
    fn test_parse_single_object() {
        let contacts = parse_contacts(r#"{"CONTACTID":1}"#).unwrap();
        assert_eq!(contacts.len(), 1);
    }

    #[test]
    fn test_parse_empty_and_null() {
        assert!(parse_contacts("").unwrap().is_empty());
        assert!(parse_contacts("   ").unwrap().is_empty());
        assert!(parse_contacts("null").unwrap().is_empty());
    }

    #[test]
    fn test_parse_invalid_json_is_error() {
        assert!(matches!(
            parse_contacts("<html>oops</html>"),
            Err(ApiError::JsonError(_))
        ));
    }
}

mod remote_queries {
    use super::*;

    /// Exact lookup sends the email parameter and both auth headers.
    #[tokio::test]
    async fn test_lookup_by_email_sends_auth_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contacts"))
            .and(query_param("emailAddress", "a@x.com"))
            .and(header("apitoken", "test-api-token"))
            .and(header("wstoken", "test-ws-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{"CONTACTID": 42, "EMAILADDRESS": "a@x.com"}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let page = client_for(&server).lookup_by_email("a@x.com").await.unwrap();

        assert_eq!(page.contacts.len(), 1);
        assert_eq!(page.contacts[0].contact_id(), Some(ContactId::new("42")));
        assert!(page.url.contains("/contacts?emailAddress=a%40x.com"), "url: {}", page.url);
    }

    /// Search pages carry the parameter, offset and page size.
    #[tokio::test]
    async fn test_search_contacts_sends_paging_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contacts/search"))
            .and(query_param("q", "a@x.com"))
            .and(query_param("offsetRows", "200"))
            .and(query_param("displayLength", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let page = client_for(&server)
            .search_contacts(SearchParam::Query, "a@x.com", 200, 100)
            .await
            .unwrap();

        assert!(page.contacts.is_empty());
        assert!(page.url.contains("offsetRows=200"));
    }

    #[tokio::test]
    async fn test_not_found_is_empty_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contacts"))
            .respond_with(ResponseTemplate::new(404).set_body_string("No contacts"))
            .mount(&server)
            .await;

        let page = client_for(&server).lookup_by_email("nobody@x.com").await.unwrap();
        assert!(page.contacts.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_surfaces_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contacts/search"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .search_contacts(SearchParam::EmailAddress, "a@x.com", 0, 100)
            .await;

        match result {
            Err(ApiError::HttpError { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "maintenance");
            }
            other => panic!("expected HttpError, got {other:?}"),
        }
    }

    /// A slow directory is cut off by the client timeout.
    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contacts"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(std::time::Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let config = ClientConfig::default()
            .with_base_url(server.uri())
            .with_timeout(std::time::Duration::from_millis(50));
        let client = DirectoryClient::builder(config).build().unwrap();

        let result = client.lookup_by_email("a@x.com").await;
        assert!(matches!(result, Err(ApiError::Timeout)), "got {result:?}");
    }
}
