//! stride-api: HTTP API for the Stride backend.
//!
//! Serves the health endpoint polled by the connectivity monitor.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/health` | Service health as JSON |
//! | OPTIONS | `/api/health` | CORS preflight, `204 No Content` |
//! | * | any other path | Plain-text `Hello World` |
//!
//! Every response carries permissive CORS headers so browser clients on
//! another origin can poll the health endpoint.

pub mod handlers;

use axum::Router;
use axum::middleware;
use axum::routing::get;

/// Version reported by the health endpoint when none is configured.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub version: String,
}

/// Build the API router.
pub fn build_router(version: impl Into<String>) -> Router {
    let state = ApiState {
        version: version.into(),
    };

    Router::new()
        .route(
            "/api/health",
            get(handlers::health)
                .options(handlers::preflight)
                .fallback(handlers::method_not_allowed),
        )
        .fallback(handlers::hello_world)
        .layer(middleware::from_fn(handlers::cors_and_log))
        .with_state(state)
}
