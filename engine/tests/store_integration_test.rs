//! Integration tests for the Firebase answer store client
//!
//! A wiremock server stands in for the Realtime Database REST API.

use attendant_engine::store::{AnswerStore, FirebaseStore, StoreError};
use sdk::types::{QuestionType, Timestamp};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LATEST_PATH: &str = "/Last%20Updated%20Time.json";
const RECORD_PATH: &str = "/2024-01-01%2010%3A00%3A00.json";

fn store_for(server: &MockServer) -> FirebaseStore {
    FirebaseStore::new(server.uri(), "Last Updated Time", Duration::from_secs(2))
        .expect("client builds")
}

fn key() -> Timestamp {
    Timestamp::parse("2024-01-01 10:00:00").unwrap()
}

#[tokio::test]
async fn test_fetch_latest_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LATEST_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"Last Updated Time": "2024-01-01 10:00:00"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let latest = store_for(&server).fetch_latest_key().await.unwrap();
    assert_eq!(latest, key());
}

#[tokio::test]
async fn test_fetch_record_normalizes_choice() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RECORD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Session ID": "A1",
            "Question Type": "mc",
            "Ureply Answer": "2"
        })))
        .mount(&server)
        .await;

    let record = store_for(&server).fetch_record(&key()).await.unwrap();
    assert_eq!(record.session_id, "A1");
    assert_eq!(record.question_type, QuestionType::MultipleChoice);
    assert_eq!(record.answer, "b");
    assert_eq!(record.published_at, key());
}

#[tokio::test]
async fn test_null_record_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RECORD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .mount(&server)
        .await;

    let result = store_for(&server).fetch_record(&key()).await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_unpublished_latest_pointer_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LATEST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .mount(&server)
        .await;

    let result = store_for(&server).fetch_latest_key().await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LATEST_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let result = store_for(&server).fetch_latest_key().await;
    assert!(matches!(result, Err(StoreError::Transient(_))));
}

#[tokio::test]
async fn test_unreadable_latest_pointer_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LATEST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Last Updated Time": "yesterday"})))
        .mount(&server)
        .await;

    let result = store_for(&server).fetch_latest_key().await;
    assert!(matches!(result, Err(StoreError::Transient(_))));
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LATEST_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"Last Updated Time": "2024-01-01 10:00:00"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let store = FirebaseStore::new(server.uri(), "Last Updated Time", Duration::from_millis(200))
        .expect("client builds");
    let result = store.fetch_latest_key().await;
    assert!(matches!(result, Err(StoreError::Transient(_))));
}

#[tokio::test]
async fn test_unreachable_store_is_transient() {
    // Port 9 (discard) is closed on test machines
    let store = FirebaseStore::new("http://127.0.0.1:9", "Last Updated Time", Duration::from_secs(2))
        .expect("client builds");

    let result = store.fetch_latest_key().await;
    assert!(matches!(result, Err(StoreError::Transient(_))));
}

#[tokio::test]
async fn test_malformed_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RECORD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Session ID": "A1",
            "Question Type": "essay",
            "Ureply Answer": "x"
        })))
        .mount(&server)
        .await;

    let result = store_for(&server).fetch_record(&key()).await;
    assert!(matches!(result, Err(StoreError::Malformed { .. })));
}
