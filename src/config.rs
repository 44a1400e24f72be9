//! Transport settings.
//!
//! Settings are read once when the client is built and never change for the
//! lifetime of the process. They deserialize from the agent's JSON
//! configuration; every field except the remote address has a default.
//!
//! # Example
//!
//! ```
//! use apm_transport::config::Settings;
//!
//! let settings = Settings::from_json_str(
//!     r#"{"remote_address": "10.0.0.5:8931", "heartbeat_interval_secs": 15}"#,
//! )
//! .unwrap();
//! assert_eq!(settings.heartbeat_interval().as_secs(), 15);
//! assert_eq!(settings.retry_backoff().as_secs(), 5);
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, TransportError};
use crate::protocol::DEFAULT_MAX_MESSAGE_SIZE;

/// Default heartbeat interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Longest accepted heartbeat interval.
pub const MAX_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Fixed wait between failed dial attempts.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Default upper bound for a single dial attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings consumed by the transport client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Collector address, `host:port`.
    pub remote_address: String,
    /// Heartbeat cadence in seconds. Must be positive and at most one day.
    pub heartbeat_interval_secs: u64,
    /// Wait between failed dial attempts, in milliseconds.
    pub retry_backoff_ms: u64,
    /// Upper bound for one dial attempt, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Largest frame payload accepted from the collector.
    pub max_message_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            remote_address: String::new(),
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL.as_secs(),
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF.as_millis() as u64,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl Settings {
    /// Settings for the given collector address with default timings.
    pub fn new(remote_address: impl Into<String>) -> Self {
        Self {
            remote_address: remote_address.into(),
            ..Self::default()
        }
    }

    /// Parse and validate settings from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check the invariants the client relies on.
    pub fn validate(&self) -> Result<()> {
        if self.remote_address.trim().is_empty() {
            return Err(TransportError::Config(
                "remote_address must not be empty".to_string(),
            ));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(TransportError::Config(
                "heartbeat_interval_secs must be positive".to_string(),
            ));
        }
        if self.heartbeat_interval_secs > MAX_HEARTBEAT_INTERVAL.as_secs() {
            return Err(TransportError::Config(format!(
                "heartbeat_interval_secs must be at most {}",
                MAX_HEARTBEAT_INTERVAL.as_secs()
            )));
        }
        if self.retry_backoff_ms == 0 {
            return Err(TransportError::Config(
                "retry_backoff_ms must be positive".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(TransportError::Config(
                "connect_timeout_ms must be positive".to_string(),
            ));
        }
        if self.max_message_size == 0 {
            return Err(TransportError::Config(
                "max_message_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::new("127.0.0.1:9000");
        assert_eq!(settings.heartbeat_interval(), DEFAULT_HEARTBEAT_INTERVAL);
        assert_eq!(settings.retry_backoff(), DEFAULT_RETRY_BACKOFF);
        assert_eq!(settings.connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(settings.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let settings = Settings::from_json_str(r#"{"remote_address": "collector:8931"}"#).unwrap();
        assert_eq!(settings.remote_address, "collector:8931");
        assert_eq!(settings.heartbeat_interval_secs, 10);
        assert_eq!(settings.retry_backoff_ms, 5000);
    }

    #[test]
    fn test_zero_heartbeat_rejected() {
        let err = Settings::from_json_str(
            r#"{"remote_address": "collector:8931", "heartbeat_interval_secs": 0}"#,
        )
        .unwrap_err();
        assert!(matches!(err, TransportError::Config(_)));
    }

    #[test]
    fn test_overlong_heartbeat_rejected() {
        let json = format!(
            r#"{{"remote_address": "collector:8931", "heartbeat_interval_secs": {}}}"#,
            u64::MAX
        );
        let err = Settings::from_json_str(&json).unwrap_err();
        assert!(matches!(err, TransportError::Config(_)));

        let mut settings = Settings::new("collector:8931");
        settings.heartbeat_interval_secs = MAX_HEARTBEAT_INTERVAL.as_secs();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_missing_address_rejected() {
        assert!(Settings::from_json_str("{}").is_err());
        assert!(Settings::new("   ").validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_json_error() {
        assert!(matches!(
            Settings::from_json_str("{remote_address"),
            Err(TransportError::Json(_))
        ));
    }
}
