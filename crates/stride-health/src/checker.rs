//! Health check probe logic.
//!
//! A [`Probe`] performs one logical health check: up to `max_retries + 1`
//! HTTP attempts, each bounded by a timeout, separated by exponential
//! backoff. The whole operation observes a [`CancellationToken`], both
//! while a request is in flight and while waiting between attempts.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use stride_core::config::MonitorConfig;
use stride_core::{CheckResult, CheckStatus, parse_duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ProbeError, ProbeResult};
use crate::transport::{BoxFuture, HyperTransport, Transport};

/// Message attached to a 2xx response whose body is not JSON.
pub const NON_JSON_MESSAGE: &str = "response was not valid JSON";

/// Immutable probe settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Absolute URL, or a path resolved by the transport.
    pub endpoint: String,
    /// Deadline for a single attempt.
    pub timeout: Duration,
    /// Attempts made after the first failure.
    pub max_retries: u32,
    /// Backoff base; attempt `n` waits `base_delay * 2^n`.
    pub base_delay: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            endpoint: "/api/health".to_string(),
            timeout: Duration::from_millis(5000),
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl ProbeConfig {
    /// Build from the `[monitor]` table, falling back to defaults for
    /// absent or unparseable values.
    pub fn from_config(config: &MonitorConfig) -> Self {
        let defaults = Self::default();
        Self {
            endpoint: config.endpoint.clone().unwrap_or(defaults.endpoint),
            timeout: duration_or(config.timeout.as_deref(), "timeout", defaults.timeout),
            max_retries: config.max_retries.unwrap_or(defaults.max_retries),
            base_delay: duration_or(
                config.base_delay.as_deref(),
                "base_delay",
                defaults.base_delay,
            ),
        }
    }

    /// Worst-case wall time before a check gives up.
    pub fn worst_case(&self) -> Duration {
        let attempts = self.max_retries + 1;
        let backoff: Duration = (0..self.max_retries)
            .map(|attempt| backoff_delay(self.base_delay, attempt))
            .sum();
        self.timeout * attempts + backoff
    }
}

pub(crate) fn duration_or(value: Option<&str>, field: &str, default: Duration) -> Duration {
    match value {
        None => default,
        Some(raw) => parse_duration(raw).unwrap_or_else(|| {
            warn!(field, value = raw, ?default, "unparseable duration, using default");
            default
        }),
    }
}

/// Delay before the retry that follows failed attempt `attempt` (0-based).
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Something that can run one health check.
///
/// Implemented by [`Probe`]; the monitor depends only on this trait.
pub trait HealthCheck: Send + Sync {
    fn check<'a>(&'a self, cancel: &'a CancellationToken) -> BoxFuture<'a, ProbeResult<CheckResult>>;
}

/// A retrying, timeout-bounded health probe.
#[derive(Clone)]
pub struct Probe {
    config: ProbeConfig,
    transport: Arc<dyn Transport>,
}

impl Probe {
    pub fn new(config: ProbeConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Probe over plain HTTP, resolving relative endpoints against `origin`.
    pub fn http(config: ProbeConfig, origin: impl Into<String>) -> Self {
        Self::new(config, Arc::new(HyperTransport::new(origin)))
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Run the check. Without a token the check cannot be cancelled.
    ///
    /// On exhaustion the error of the final attempt is returned as is.
    pub async fn run(&self, cancel: Option<&CancellationToken>) -> ProbeResult<CheckResult> {
        let never = CancellationToken::new();
        let cancel = cancel.unwrap_or(&never);

        if cancel.is_cancelled() {
            return Err(ProbeError::Aborted);
        }

        let mut attempt = 0;
        loop {
            let err = match self.attempt(cancel).await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(attempt, endpoint = %self.config.endpoint, "health check recovered");
                    }
                    return Ok(result);
                }
                Err(ProbeError::Aborted) => return Err(ProbeError::Aborted),
                Err(err) => err,
            };

            debug!(
                attempt,
                kind = err.kind(),
                error = %err,
                endpoint = %self.config.endpoint,
                "health check attempt failed"
            );

            if attempt >= self.config.max_retries {
                return Err(err);
            }

            let delay = backoff_delay(self.config.base_delay, attempt);
            warn!(
                attempt,
                max_retries = self.config.max_retries,
                ?delay,
                kind = err.kind(),
                "retrying health check"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProbeError::Aborted),
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }

    /// One GET, raced against the timeout and the cancellation token.
    async fn attempt(&self, cancel: &CancellationToken) -> ProbeResult<CheckResult> {
        let request = tokio::time::timeout(
            self.config.timeout,
            self.transport.get(&self.config.endpoint),
        );

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProbeError::Aborted),
            outcome = request => match outcome {
                Err(_) => return Err(ProbeError::Timeout(self.config.timeout)),
                Ok(Err(e)) => return Err(e.into()),
                Ok(Ok(response)) => response,
            },
        };

        if !response.is_success() {
            return Err(ProbeError::HttpStatus(response.status));
        }

        parse_body(&response.body)
    }
}

impl HealthCheck for Probe {
    fn check<'a>(&'a self, cancel: &'a CancellationToken) -> BoxFuture<'a, ProbeResult<CheckResult>> {
        Box::pin(self.run(Some(cancel)))
    }
}

/// Interpret the body of a 2xx response.
///
/// A body that is not JSON still proves the service is reachable and is
/// accepted with a synthesized result. JSON that lacks `status` or
/// `timestamp` is an `InvalidFormat` failure. `message` and `version` are
/// kept as text whatever their JSON type.
pub fn parse_body(body: &[u8]) -> ProbeResult<CheckResult> {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "health response is not JSON, accepting");
            return Ok(CheckResult::now(CheckStatus::Ok).with_message(NON_JSON_MESSAGE));
        }
    };

    decode_result(&value).map_err(ProbeError::InvalidFormat)
}

fn decode_result(value: &Value) -> Result<CheckResult, String> {
    let Value::Object(fields) = value else {
        return Err(format!("expected a JSON object, got {}", json_type(value)));
    };

    let status = match required(fields, "status")? {
        Value::String(raw) => parse_status(raw).ok_or_else(|| format!("unknown status `{raw}`"))?,
        other => return Err(format!("`status` must be a string, got {}", json_type(other))),
    };
    let timestamp = match required(fields, "timestamp")? {
        Value::String(raw) => {
            parse_timestamp(raw).ok_or_else(|| format!("unparseable timestamp `{raw}`"))?
        }
        other => return Err(format!("`timestamp` must be a string, got {}", json_type(other))),
    };

    Ok(CheckResult {
        status,
        timestamp,
        message: as_text(fields.get("message")),
        version: as_text(fields.get("version")),
    })
}

fn required<'a>(fields: &'a Map<String, Value>, name: &str) -> Result<&'a Value, String> {
    match fields.get(name) {
        None | Some(Value::Null) => Err(format!("missing field `{name}`")),
        Some(value) => Ok(value),
    }
}

fn parse_status(raw: &str) -> Option<CheckStatus> {
    if raw.eq_ignore_ascii_case("ok") {
        Some(CheckStatus::Ok)
    } else if raw.eq_ignore_ascii_case("error") {
        Some(CheckStatus::Error)
    } else {
        None
    }
}

/// RFC 3339, or an ISO-8601 local time taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn as_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
