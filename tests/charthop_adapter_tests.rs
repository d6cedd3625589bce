//! HTTP-level tests for the ChartHop (HRIS) adapter, mocked with wiremock.

use hrsync::config::ChartHopConfig;
use hrsync::remote::ChartHopClient;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(mock_server: &MockServer) -> ChartHopConfig {
    ChartHopConfig {
        base_url: mock_server.uri(),
        api_token: Some("test-token".to_string()),
        org_id: "acme".to_string(),
        ..ChartHopConfig::default()
    }
}

#[tokio::test]
async fn list_active_people_filters_terminated_rows() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/org/acme/person"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "p1", "fields": {"contact workemail": "a@acme.com", "status": "Active"}},
                {"id": "p2", "fields": {"contact workemail": "b@acme.com", "status": "Terminated"}},
            ]
        })))
        .mount(&mock_server)
        .await;

    let client = ChartHopClient::new(config_for(&mock_server));
    let people = client.list_active_people().await.unwrap();

    assert_eq!(people.len(), 1);
    assert_eq!(people[0].id, "p1");
}

#[tokio::test]
async fn list_active_people_stops_on_repeated_offset() {
    let mock_server = MockServer::start().await;
    // Every page reports data but never advances nextOffset - the client
    // must notice the repeat and stop instead of looping forever.
    Mock::given(method("GET"))
        .and(path("/v2/org/acme/person"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "p1", "fields": {"contact workemail": "a@acme.com", "status": "Active"}}],
            "nextOffset": 0
        })))
        .mount(&mock_server)
        .await;

    let client = ChartHopClient::new(config_for(&mock_server));
    let people = client.list_active_people().await.unwrap();

    assert_eq!(people.len(), 1);
}

#[tokio::test]
async fn find_timeoff_returns_none_on_404() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/org/acme/timeoff/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = ChartHopClient::new(config_for(&mock_server));
    let result = client.find_timeoff("missing").await.unwrap();

    assert!(result.is_none());
}

#[tokio::test]
async fn find_person_parses_a_single_record() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/org/acme/person/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "p1", "fields": {"contact workemail": "a@acme.com", "status": "Active"}}
        })))
        .mount(&mock_server)
        .await;

    let client = ChartHopClient::new(config_for(&mock_server));
    let person = client.find_person("p1").await.unwrap().expect("person present");

    assert_eq!(person.id, "p1");
    assert_eq!(person.work_email.as_deref(), Some("a@acme.com"));
}

#[tokio::test]
async fn missing_api_token_fails_before_any_request() {
    let mock_server = MockServer::start().await;
    let config = ChartHopConfig {
        api_token: None,
        ..config_for(&mock_server)
    };
    let client = ChartHopClient::new(config);

    let result = client.find_person("p1").await;
    assert!(result.is_err());
}
