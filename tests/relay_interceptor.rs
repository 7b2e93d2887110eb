//! Relay path tests: forwarding, probe interception, downstream failures.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use relay_probe::config::{DownstreamConfig, RelayConfig};
use relay_probe::health::CorrelationTable;
use relay_probe::http::RelayServer;

mod common;

const PROBE_BODY: &str = r#"{"type":"health-check","id":"probe-from-body"}"#;

fn body_detection() -> RelayConfig {
    RelayConfig {
        detect_probe_in_body: true,
        ..RelayConfig::default()
    }
}

#[tokio::test]
async fn test_ordinary_event_is_forwarded() {
    let (downstream, recorded) = common::start_mock_downstream().await;
    let relay = common::start_relay(RelayConfig::default(), format!("http://{}", downstream)).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/github?delivery=42", relay.addr))
        .header("content-type", "application/json")
        .header("x-github-event", "push")
        .body(r#"{"action":"opened"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "downstream-ok");

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].method, axum::http::Method::POST);
    assert_eq!(recorded[0].uri.path(), "/github");
    assert_eq!(recorded[0].uri.query(), Some("delivery=42"));
    assert_eq!(recorded[0].headers["x-github-event"], "push");
    assert_eq!(recorded[0].headers["x-forwarded-for"], "127.0.0.1");
    assert_eq!(recorded[0].headers["host"], relay.addr.to_string().as_str());
    assert_eq!(&recorded[0].body[..], br#"{"action":"opened"}"#);
    assert_eq!(relay.stats.forwarded(), 1);
}

#[tokio::test]
async fn test_base_path_is_prefixed() {
    let (downstream, recorded) = common::start_mock_downstream().await;
    let relay = common::start_relay(
        RelayConfig::default(),
        format!("http://{}/webhook", downstream),
    )
    .await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/", relay.addr))
        .body("event")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].uri.path(), "/webhook/");
}

#[tokio::test]
async fn test_header_probe_is_intercepted() {
    let (downstream, recorded) = common::start_mock_downstream().await;
    let relay = common::start_relay(RelayConfig::default(), format!("http://{}", downstream)).await;
    let slot = relay.table.register("probe-1").unwrap();

    let response = reqwest::Client::new()
        .post(format!("http://{}/", relay.addr))
        .header("x-health-check-id", "probe-1")
        .header("content-type", "application/json")
        .body(r#"{"type":"health-check","id":"probe-1"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(tokio::time::timeout(Duration::from_secs(1), slot).await.unwrap().is_ok());
    assert!(!relay.table.contains("probe-1"));
    assert!(recorded.lock().unwrap().is_empty());
    assert_eq!(relay.stats.forwarded(), 0);
    assert_eq!(relay.stats.probes_matched(), 1);
}

#[tokio::test]
async fn test_unmatched_probe_is_acknowledged_and_dropped() {
    let (downstream, recorded) = common::start_mock_downstream().await;
    let relay = common::start_relay(RelayConfig::default(), format!("http://{}", downstream)).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/", relay.addr))
        .header("x-health-check-id", "nobody-waits-for-this")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(recorded.lock().unwrap().is_empty());
    assert_eq!(relay.stats.probes_unmatched(), 1);
    assert!(relay.table.is_empty());
}

#[tokio::test]
async fn test_probe_acknowledgement_closes_connection() {
    let table = Arc::new(CorrelationTable::new());
    let downstream = DownstreamConfig {
        url: "http://127.0.0.1:1".into(),
        ..DownstreamConfig::default()
    };
    let server = RelayServer::new(&RelayConfig::default(), &downstream, table).unwrap();

    let response = server
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("x-health-check-id", "probe-2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONNECTION], "close");
}

#[tokio::test]
async fn test_probe_shaped_body_without_header_is_forwarded() {
    let (downstream, recorded) = common::start_mock_downstream().await;
    let relay = common::start_relay(RelayConfig::default(), format!("http://{}", downstream)).await;
    let _slot = relay.table.register("probe-from-body").unwrap();

    let response = reqwest::Client::new()
        .post(format!("http://{}/", relay.addr))
        .header("content-type", "application/json")
        .body(PROBE_BODY)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(recorded.lock().unwrap().len(), 1);
    assert!(relay.table.contains("probe-from-body"));
}

#[tokio::test]
async fn test_body_probe_detected_when_enabled() {
    let (downstream, recorded) = common::start_mock_downstream().await;
    let relay = common::start_relay(body_detection(), format!("http://{}", downstream)).await;
    let slot = relay.table.register("probe-from-body").unwrap();

    let response = reqwest::Client::new()
        .post(format!("http://{}/", relay.addr))
        .header("content-type", "application/json")
        .body(PROBE_BODY)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(tokio::time::timeout(Duration::from_secs(1), slot).await.unwrap().is_ok());
    assert!(recorded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_json_is_forwarded_intact() {
    let (downstream, recorded) = common::start_mock_downstream().await;
    let relay = common::start_relay(body_detection(), format!("http://{}", downstream)).await;
    let malformed = r#"{"type": "health-check", "id": "test-123""#;

    let response = reqwest::Client::new()
        .post(format!("http://{}/", relay.addr))
        .header("content-type", "application/json")
        .body(malformed)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(&recorded[0].body[..], malformed.as_bytes());
    assert_eq!(relay.stats.forwarded(), 1);
}

#[tokio::test]
async fn test_downstream_down_returns_bad_gateway() {
    let downstream = common::refused_addr().await;
    let relay = common::start_relay(RelayConfig::default(), format!("http://{}", downstream)).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/", relay.addr))
        .body("event")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
    assert_eq!(relay.stats.forwarded(), 1);
}

#[tokio::test]
async fn test_concurrent_probes_and_events() {
    let (downstream, recorded) = common::start_mock_downstream().await;
    let relay = common::start_relay(RelayConfig::default(), format!("http://{}", downstream)).await;
    let client = reqwest::Client::new();

    let mut slots = Vec::new();
    let mut requests = Vec::new();
    for i in 0..10 {
        let id = format!("probe-{}", i);
        slots.push(relay.table.register(&id).unwrap());

        let probe = client
            .post(format!("http://{}/", relay.addr))
            .header("x-health-check-id", id)
            .send();
        let event = client
            .post(format!("http://{}/events/{}", relay.addr, i))
            .body(format!("event-{}", i))
            .send();
        requests.push(tokio::spawn(probe));
        requests.push(tokio::spawn(event));
    }

    for request in requests {
        assert_eq!(request.await.unwrap().unwrap().status(), reqwest::StatusCode::OK);
    }
    for slot in slots {
        assert!(tokio::time::timeout(Duration::from_secs(1), slot).await.unwrap().is_ok());
    }

    assert!(relay.table.is_empty());
    assert_eq!(recorded.lock().unwrap().len(), 10);
    assert_eq!(relay.stats.forwarded(), 10);
    assert_eq!(relay.stats.probes_matched(), 10);
}
