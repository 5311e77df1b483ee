//! Integration tests for the webhook notification sink.

use chrono::NaiveDate;
use logwarden_monitor::sink::SinkError;
use logwarden_monitor::{Notification, NotificationKind, NotificationSink, ThreadKey, WebhookSink};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn thread() -> ThreadKey {
    ThreadKey::for_date(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap())
}

#[tokio::test]
async fn test_posts_thread_source_and_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("X-Source-Id", "eu-1"))
        .and(header("Content-Type", "application/json"))
        .and(body_partial_json(json!({
            "thread": "2026-02-01",
            "source": "eu-1",
            "message": {
                "kind": "death",
                "title": "Alice died",
                "fields": [{ "name": "Player", "value": "Alice" }]
            }
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sink = WebhookSink::new(format!("{}/hook", mock_server.uri()), "eu-1").unwrap();
    let message = Notification::new(NotificationKind::Death, "Alice died").field("Player", "Alice");

    sink.send(&thread(), &message).await.unwrap();
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("thread lookup failed"))
        .mount(&mock_server)
        .await;

    let sink = WebhookSink::new(mock_server.uri(), "eu-1").unwrap();
    let message = Notification::new(NotificationKind::AdminAccess, "x");

    let err = sink.send(&thread(), &message).await.unwrap_err();
    match err {
        SinkError::Rejected { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "thread lookup failed");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unreachable_endpoint_is_http_error() {
    let sink = WebhookSink::new("http://127.0.0.1:1/hook", "eu-1").unwrap();
    let message = Notification::new(NotificationKind::Connect, "x");

    let err = sink.send(&thread(), &message).await.unwrap_err();
    assert!(matches!(err, SinkError::Http(_)));
}
