//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    routing::any,
    Router,
};
use tokio::net::TcpListener;

use relay_probe::config::{DownstreamConfig, ProbeConfig, RelayConfig};
use relay_probe::health::{CorrelationTable, ProbeEmitter, HEALTH_CHECK_ID_HEADER};
use relay_probe::http::{RelayServer, RelayStats};
use relay_probe::lifecycle::Shutdown;

/// Bind an ephemeral loopback port.
pub async fn bind_local() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// An address nothing is listening on.
pub async fn refused_addr() -> SocketAddr {
    let (listener, addr) = bind_local().await;
    drop(listener);
    addr
}

/// Fresh status file path under the system temp dir.
pub fn temp_status_path() -> PathBuf {
    std::env::temp_dir().join(format!("relay-probe-status-{}.txt", uuid::Uuid::new_v4()))
}

/// A request seen by the mock downstream.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub type Recorder = Arc<Mutex<Vec<Recorded>>>;

async fn record(
    State(recorder): State<Recorder>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    recorder.lock().unwrap().push(Recorded {
        method,
        uri,
        headers,
        body,
    });
    (StatusCode::OK, "downstream-ok")
}

/// Start a downstream service that records every request and answers 200.
pub async fn start_mock_downstream() -> (SocketAddr, Recorder) {
    let recorder: Recorder = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/", any(record))
        .route("/{*path}", any(record))
        .with_state(recorder.clone());

    let (listener, addr) = bind_local().await;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, recorder)
}

async fn echo(State(relay): State<SocketAddr>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let mut request = reqwest::Client::new()
        .post(format!("http://{}/", relay))
        .header("content-type", "application/json")
        .body(body);
    if let Some(id) = headers.get(HEALTH_CHECK_ID_HEADER) {
        request = request.header(HEALTH_CHECK_ID_HEADER, id.as_bytes());
    }

    tokio::spawn(async move {
        let _ = request.send().await;
    });
    StatusCode::ACCEPTED
}

/// Start a relay channel that delivers every posted event to `relay`,
/// the way a webhook relay client would.
pub async fn start_echo_relay(relay: SocketAddr) -> SocketAddr {
    let app = Router::new()
        .route("/", any(echo))
        .route("/{*path}", any(echo))
        .with_state(relay);

    let (listener, addr) = bind_local().await;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a relay channel that accepts events and never delivers them.
pub async fn start_silent_relay() -> SocketAddr {
    let app = Router::new().route("/", any(|| async { StatusCode::OK }));

    let (listener, addr) = bind_local().await;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// A relay server running on an ephemeral port.
pub struct RunningRelay {
    pub addr: SocketAddr,
    pub stats: Arc<RelayStats>,
    pub table: Arc<CorrelationTable>,
    pub shutdown: Shutdown,
}

/// Start the relay server in front of `downstream_url`.
pub async fn start_relay(relay: RelayConfig, downstream_url: String) -> RunningRelay {
    let table = Arc::new(CorrelationTable::new());
    let downstream = DownstreamConfig {
        url: downstream_url,
        ..DownstreamConfig::default()
    };
    let server = RelayServer::new(&relay, &downstream, table.clone()).unwrap();
    let stats = server.stats();
    let shutdown = Shutdown::new();

    let (listener, addr) = bind_local().await;
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    RunningRelay {
        addr,
        stats,
        table,
        shutdown,
    }
}

/// Probe configuration pointed at `channel`.
pub fn probe_config(channel: SocketAddr, timeout_secs: u64) -> ProbeConfig {
    ProbeConfig {
        channel_url: format!("http://{}/", channel),
        timeout_secs,
        ..ProbeConfig::default()
    }
}

/// Emitter sharing `table`, posting to `channel`.
pub fn emitter(table: Arc<CorrelationTable>, channel: SocketAddr, timeout_secs: u64) -> ProbeEmitter {
    ProbeEmitter::new(table, &probe_config(channel, timeout_secs)).unwrap()
}

/// Poll `check` until it holds or `deadline` elapses.
pub async fn eventually<F: Fn() -> bool>(deadline: Duration, check: F) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
