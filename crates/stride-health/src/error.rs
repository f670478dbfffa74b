//! Error types for health probes.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for probe operations.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Why a health check failed.
///
/// Every kind except [`ProbeError::Aborted`] is retried by the probe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("health check timed out after {0:?}")]
    Timeout(Duration),

    #[error("health endpoint unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("health endpoint returned HTTP {0}")]
    HttpStatus(u16),

    #[error("invalid health response: {0}")]
    InvalidFormat(String),

    #[error("health check aborted")]
    Aborted,
}

impl ProbeError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProbeError::Aborted)
    }

    /// Short stable name for logs and exit messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Timeout(_) => "timeout",
            ProbeError::NetworkUnreachable(_) => "network_unreachable",
            ProbeError::HttpStatus(_) => "http_status",
            ProbeError::InvalidFormat(_) => "invalid_format",
            ProbeError::Aborted => "aborted",
        }
    }
}

/// Errors raised by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid endpoint uri {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),
}

impl From<TransportError> for ProbeError {
    fn from(err: TransportError) -> Self {
        ProbeError::NetworkUnreachable(err.to_string())
    }
}
