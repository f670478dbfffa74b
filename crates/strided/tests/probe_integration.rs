//! End-to-end probe tests.
//!
//! Runs the hyper-backed probe and the connectivity monitor against a real
//! HTTP server on a loopback port: the stride health API itself, plus a few
//! misbehaving routes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use stride_core::config::MonitorConfig;
use stride_core::{CheckStatus, Phase};
use stride_health::checker::NON_JSON_MESSAGE;
use stride_health::{ConnectivityMonitor, Probe, ProbeConfig, ProbeError};

async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn probe(addr: SocketAddr, endpoint: &str, max_retries: u32) -> Probe {
    let config = ProbeConfig {
        endpoint: endpoint.to_string(),
        timeout: Duration::from_secs(2),
        max_retries,
        base_delay: Duration::from_millis(10),
    };
    Probe::http(config, format!("http://{addr}"))
}

#[tokio::test]
async fn healthy_against_stride_api() {
    let addr = spawn_server(stride_api::build_router(stride_api::DEFAULT_VERSION)).await;

    let result = probe(addr, "/api/health", 0).run(None).await.unwrap();

    assert_eq!(result.status, CheckStatus::Ok);
    assert_eq!(result.version.as_deref(), Some("1.0.0"));
    assert_eq!(result.message.as_deref(), Some("Service is healthy"));
}

#[tokio::test]
async fn plain_text_2xx_is_lenient_success() {
    let addr = spawn_server(stride_api::build_router("1.0.0")).await;

    let result = probe(addr, "/", 0).run(None).await.unwrap();

    assert_eq!(result.status, CheckStatus::Ok);
    assert_eq!(result.message.as_deref(), Some(NON_JSON_MESSAGE));
}

#[tokio::test]
async fn service_unavailable_is_retried_then_reported() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let router = Router::new().route(
        "/api/health",
        get(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                StatusCode::SERVICE_UNAVAILABLE
            }
        }),
    );
    let addr = spawn_server(router).await;

    let err = probe(addr, "/api/health", 2).run(None).await.unwrap_err();

    assert_eq!(err, ProbeError::HttpStatus(503));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn missing_timestamp_is_invalid_format() {
    let router = Router::new().route("/api/health", get(|| async { r#"{"status":"ok"}"# }));
    let addr = spawn_server(router).await;

    let err = probe(addr, "/api/health", 0).run(None).await.unwrap_err();

    assert!(matches!(err, ProbeError::InvalidFormat(_)), "got {err:?}");
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let router = Router::new().route(
        "/api/health",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "late"
        }),
    );
    let addr = spawn_server(router).await;
    let config = ProbeConfig {
        timeout: Duration::from_millis(200),
        max_retries: 0,
        ..Default::default()
    };

    let err = Probe::http(config, format!("http://{addr}"))
        .run(None)
        .await
        .unwrap_err();

    assert_eq!(err, ProbeError::Timeout(Duration::from_millis(200)));
}

#[tokio::test]
async fn closed_port_is_network_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = probe(addr, "/api/health", 1).run(None).await.unwrap_err();

    assert!(matches!(err, ProbeError::NetworkUnreachable(_)), "got {err:?}");
}

#[tokio::test]
async fn request_asks_for_json() {
    let router = Router::new().route(
        "/api/health",
        get(|headers: HeaderMap| async move {
            let accept = headers.get("accept").and_then(|v| v.to_str().ok());
            let content_type = headers.get("content-type").and_then(|v| v.to_str().ok());
            if accept == Some("application/json") && content_type == Some("application/json") {
                (
                    StatusCode::OK,
                    r#"{"status":"ok","timestamp":"2025-02-08T10:30:00Z"}"#,
                )
            } else {
                (StatusCode::BAD_REQUEST, "")
            }
        }),
    );
    let addr = spawn_server(router).await;

    let result = probe(addr, "/api/health", 0).run(None).await.unwrap();

    assert_eq!(result.timestamp_rfc3339(), "2025-02-08T10:30:00Z");
}

#[tokio::test]
async fn monitor_reports_healthy_then_stops() {
    let addr = spawn_server(stride_api::build_router("1.0.0")).await;
    let config = MonitorConfig {
        base_url: Some(format!("http://{addr}")),
        interval: Some("60s".into()),
        max_retries: Some(0),
        ..Default::default()
    };

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = ConnectivityMonitor::from_config(&config).start(move |state| {
        let _ = tx.send(state);
    });

    let first = rx.recv().await.unwrap();
    assert_eq!(first.phase, Phase::Checking);
    assert!(first.last_checked.is_none());

    let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.phase, Phase::Healthy);
    assert!(second.last_checked.is_some());

    handle.shutdown().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn monitor_reports_unhealthy_when_backend_is_down() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = MonitorConfig {
        base_url: Some(format!("http://{addr}")),
        max_retries: Some(0),
        ..Default::default()
    };

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = ConnectivityMonitor::from_config(&config).start(move |state| {
        let _ = tx.send(state);
    });

    let _checking = rx.recv().await.unwrap();
    let settled = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(settled.phase, Phase::Unhealthy);
    assert_eq!(handle.state(), settled);

    handle.stop();
}
