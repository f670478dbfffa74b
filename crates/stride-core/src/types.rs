//! Shared types used across Stride crates.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Status reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Error,
}

/// Body of a health endpoint response.
///
/// `status` and `timestamp` are required; decoding a body without them fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Opaque service version, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl CheckResult {
    /// A result stamped with the current time.
    pub fn now(status: CheckStatus) -> Self {
        Self {
            status,
            timestamp: Utc::now(),
            message: None,
            version: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// RFC 3339 rendering of the timestamp, second precision, `Z` suffix.
    pub fn timestamp_rfc3339(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Connectivity phase observed by the consumer of a monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Checking,
    Healthy,
    Unhealthy,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Checking => "checking",
            Phase::Healthy => "healthy",
            Phase::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Snapshot of the connectivity state handed to consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityState {
    pub phase: Phase,
    /// When the last check completed, successfully or not.
    pub last_checked: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_result_decodes_full_body() {
        let body = r#"{"status":"ok","timestamp":"2025-02-08T10:30:00Z","message":"Service is healthy","version":"1.0.0"}"#;
        let result: CheckResult = serde_json::from_str(body).unwrap();
        assert_eq!(result.status, CheckStatus::Ok);
        assert_eq!(result.timestamp_rfc3339(), "2025-02-08T10:30:00Z");
        assert_eq!(result.message.as_deref(), Some("Service is healthy"));
        assert_eq!(result.version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn check_result_requires_status_and_timestamp() {
        assert!(serde_json::from_str::<CheckResult>(r#"{"timestamp":"2025-02-08T10:30:00Z"}"#).is_err());
        assert!(serde_json::from_str::<CheckResult>(r#"{"status":"ok"}"#).is_err());
        assert!(serde_json::from_str::<CheckResult>(r#"{"status":"degraded","timestamp":"2025-02-08T10:30:00Z"}"#).is_err());
    }

    #[test]
    fn check_result_omits_absent_optionals() {
        let result = CheckResult::now(CheckStatus::Error);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "error");
        assert!(json.get("message").is_none());
        assert!(json.get("version").is_none());
    }

    #[test]
    fn connectivity_state_starts_checking() {
        let state = ConnectivityState::default();
        assert_eq!(state.phase, Phase::Checking);
        assert!(state.last_checked.is_none());
        assert_eq!(serde_json::to_value(state).unwrap()["phase"], "checking");
    }
}
