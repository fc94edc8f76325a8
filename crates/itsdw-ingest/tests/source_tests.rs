//! HTTP client tests against a mock API
//!
//! Covers:
//! - bearer authentication and query parameters
//! - array, "not valid" object, and other object bodies
//! - non-2xx statuses, non-JSON bodies, and timeouts

use itsdw_common::Secret;
use itsdw_ingest::source::{fetch_or_empty, params, resources, ApiClient, FetchError, RecordSource};
use serde_json::json;
use std::time::Duration;
use wiremock::{
    matchers::{header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const TOKEN: &str = "test-token-1234";

fn client(server: &MockServer) -> ApiClient {
    client_with_timeout(server, Duration::from_secs(5))
}

fn client_with_timeout(server: &MockServer, timeout: Duration) -> ApiClient {
    ApiClient::new(format!("{}/api", server.uri()), Secret::new(TOKEN), timeout)
        .expect("Failed to build client")
}

#[tokio::test]
async fn test_fetch_sends_bearer_token_and_params() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/iscrizioni"))
        .and(header("Authorization", format!("Bearer {}", TOKEN).as_str()))
        .and(header("Content-Type", "application/json"))
        .and(query_param("AnnoAccademico", "2020"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"idAlunno": "S1", "idCorsoAnno": "C1"},
            {"idAlunno": "S2", "idCorsoAnno": "C1"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let records = client(&server)
        .fetch(resources::ENROLLMENTS, &[(params::ACADEMIC_YEAR, "2020")])
        .await
        .expect("Fetch should succeed");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["idAlunno"], json!("S1"));
}

#[tokio::test]
async fn test_fetch_with_date_window() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/stage"))
        .and(query_param("DataDa", "01/01/2019"))
        .and(query_param("DataA", "31/12/2025"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"idAlunno": "S9"}])))
        .expect(1)
        .mount(&server)
        .await;

    let records = client(&server)
        .fetch(
            resources::INTERNSHIPS,
            &[(params::DATE_FROM, "01/01/2019"), (params::DATE_TO, "31/12/2025")],
        )
        .await
        .expect("Fetch should succeed");

    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_invalid_marker_is_empty_not_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/corso_materie"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"valid": false, "message": "Nessun dato trovato"})),
        )
        .mount(&server)
        .await;

    let records = client(&server)
        .fetch(resources::COURSE_SUBJECTS, &[(params::COURSE_YEAR_ID, "C1")])
        .await
        .expect("Invalid marker should not be an error");

    assert!(records.is_empty());
}

#[tokio::test]
async fn test_object_body_is_unexpected_shape() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/corsi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let api = client(&server);
    let err = api.fetch(resources::COURSES, &[]).await.unwrap_err();
    assert!(matches!(err, FetchError::UnexpectedShape { found: "object", .. }));

    // At the lenient boundary the same response is zero records
    let records = fetch_or_empty(&api, resources::COURSES, &[]).await;
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_server_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/docenti"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let api = client(&server);
    let err = api.fetch(resources::TEACHERS, &[]).await.unwrap_err();
    match err {
        FetchError::Status { status, .. } => assert_eq!(status.as_u16(), 500),
        other => panic!("Expected status error, got {:?}", other),
    }

    assert!(fetch_or_empty(&api, resources::TEACHERS, &[]).await.is_empty());
}

#[tokio::test]
async fn test_unauthorized_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/corsi"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client(&server).fetch(resources::COURSES, &[]).await.unwrap_err();
    assert_eq!(err.kind(), "status");
}

#[tokio::test]
async fn test_non_json_body_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/ore_alunno"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch(resources::STUDENT_HOURS, &[(params::COURSE_YEAR_ID, "C1")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "decode");
}

#[tokio::test]
async fn test_timeout_is_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/corsi"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = client_with_timeout(&server, Duration::from_millis(200))
        .fetch(resources::COURSES, &[])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "transport");
}
