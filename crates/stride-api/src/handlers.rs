//! HTTP handlers and middleware.

use std::time::Instant;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE,
};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{SubsecRound, Utc};
use tracing::{debug, info};

use stride_core::{CheckResult, CheckStatus};

use crate::ApiState;

/// Health body with a whole-second timestamp.
fn stamped(status: CheckStatus) -> CheckResult {
    let mut result = CheckResult::now(status);
    result.timestamp = Utc::now().trunc_subsecs(0);
    result
}

fn error_response(msg: &str, status: StatusCode) -> Response {
    (status, Json(stamped(CheckStatus::Error).with_message(msg))).into_response()
}

/// GET /api/health
pub async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let body = stamped(CheckStatus::Ok)
        .with_version(state.version)
        .with_message("Service is healthy");

    debug!(timestamp = %body.timestamp_rfc3339(), "health check served");
    (StatusCode::OK, Json(body))
}

/// OPTIONS /api/health. The CORS headers come from [`cors_and_log`].
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Any other method on /api/health.
pub async fn method_not_allowed() -> Response {
    error_response("Method not allowed", StatusCode::METHOD_NOT_ALLOWED)
}

/// Every path without a route.
pub async fn hello_world() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        "Hello World",
    )
}

/// Adds CORS headers and logs each request with its duration.
pub async fn cors_and_log(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut resp = next.run(req).await;

    let headers = resp.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );

    info!(
        %method,
        %path,
        status = resp.status().as_u16(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "request completed"
    );
    resp
}
