//! HTTP transport used by the probe.
//!
//! The probe only needs "GET this endpoint, give me the status and body".
//! Timeouts and cancellation are applied by the caller by dropping the
//! returned future, which aborts the in-flight request.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use http_body_util::{BodyExt, Empty, Limited};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tracing::trace;

use crate::error::TransportError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Origin used when none is configured.
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:8080";

/// Largest response body read before the attempt fails.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

const USER_AGENT_VALUE: &str = concat!("stride-health/", env!("CARGO_PKG_VERSION"));

/// Status and body of a completed GET.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues GET requests on behalf of a probe.
pub trait Transport: Send + Sync {
    fn get<'a>(
        &'a self,
        endpoint: &'a str,
    ) -> BoxFuture<'a, Result<TransportResponse, TransportError>>;
}

/// Plain-HTTP transport backed by the hyper client.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Empty<Bytes>>,
    origin: String,
}

impl HyperTransport {
    /// Create a transport resolving relative endpoints against `origin`.
    pub fn new(origin: impl Into<String>) -> Self {
        let connector = HttpConnector::new();
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self {
            client,
            origin: origin.into(),
        }
    }

    /// Turn an endpoint (absolute URL or path) into a request URI.
    pub fn resolve(&self, endpoint: &str) -> Result<http::Uri, TransportError> {
        let full = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!(
                "{}/{}",
                self.origin.trim_end_matches('/'),
                endpoint.trim_start_matches('/')
            )
        };

        full.parse::<http::Uri>()
            .map_err(|e| TransportError::InvalidUri {
                reason: e.to_string(),
                uri: full,
            })
    }

    async fn fetch(&self, endpoint: &str) -> Result<TransportResponse, TransportError> {
        let uri = self.resolve(endpoint)?;
        trace!(%uri, "health GET");

        let req = http::Request::builder()
            .method(http::Method::GET)
            .uri(uri)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, USER_AGENT_VALUE)
            .body(Empty::<Bytes>::new())
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let resp = self.client.request(req).await.map_err(|e| {
            if e.is_connect() {
                TransportError::Connect(error_chain(&e))
            } else {
                TransportError::Request(error_chain(&e))
            }
        })?;

        let status = resp.status().as_u16();
        let body = Limited::new(resp.into_body(), MAX_BODY_BYTES)
            .collect()
            .await
            .map_err(|e| TransportError::Body(error_chain(&*e)))?
            .to_bytes();

        Ok(TransportResponse { status, body })
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new(DEFAULT_ORIGIN)
    }
}

impl Transport for HyperTransport {
    fn get<'a>(
        &'a self,
        endpoint: &'a str,
    ) -> BoxFuture<'a, Result<TransportResponse, TransportError>> {
        Box::pin(self.fetch(endpoint))
    }
}

/// Join an error with its sources; hyper's top-level messages are terse.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
