//! Client configuration.
//!
//! Defaults suit a LAN cluster; override them through
//! [`ClientBuilder`](crate::ClientBuilder) or by parsing JSON:
//!
//! ```
//! use clusterwire::ClientConfig;
//!
//! let config = ClientConfig::from_json(r#"{"heartbeat_interval_ms": 500}"#).unwrap();
//! assert_eq!(config.heartbeat_interval.as_millis(), 500);
//! assert_eq!(config.max_empty_reads, 100);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WireError};
use crate::transport::DEFAULT_MAX_EMPTY_READS;

/// Default period between heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Default per-heartbeat deadline.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default primary buffer size of the heartbeat request.
pub const DEFAULT_HEARTBEAT_REQUEST_SIZE: usize = 16;

/// Default primary buffer size of the heartbeat response.
pub const DEFAULT_HEARTBEAT_RESPONSE_SIZE: usize = 512;

/// Default maximum response body (16 MB).
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;

/// Tunables for one client connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Period between heartbeats. Zero disables the heartbeat task.
    #[serde(rename = "heartbeat_interval_ms", with = "millis")]
    pub heartbeat_interval: Duration,
    /// Deadline for one heartbeat call and its store update.
    ///
    /// The deadline also bounds the wait for the connection lock, so a
    /// foreground call holding the connection longer than this ends the
    /// heartbeat with [`WireError::DeadlineExceeded`](crate::WireError).
    #[serde(rename = "heartbeat_timeout_ms", with = "millis")]
    pub heartbeat_timeout: Duration,
    /// Consecutive zero-byte reads tolerated before failing.
    pub max_empty_reads: usize,
    pub heartbeat_request_size: usize,
    pub heartbeat_response_size: usize,
    /// Largest response body the client will read.
    pub max_response_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            max_empty_reads: DEFAULT_MAX_EMPTY_READS,
            heartbeat_request_size: DEFAULT_HEARTBEAT_REQUEST_SIZE,
            heartbeat_response_size: DEFAULT_HEARTBEAT_RESPONSE_SIZE,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }
}

impl ClientConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field combinations that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.max_empty_reads == 0 {
            return Err(WireError::Config(
                "max_empty_reads must be at least 1".to_string(),
            ));
        }
        if self.heartbeat_enabled() && self.heartbeat_timeout.is_zero() {
            return Err(WireError::Config(
                "heartbeat_timeout must be non-zero when heartbeats are enabled".to_string(),
            ));
        }
        if self.heartbeat_response_size > self.max_response_size {
            return Err(WireError::Config(format!(
                "heartbeat_response_size {} exceeds max_response_size {}",
                self.heartbeat_response_size, self.max_response_size
            )));
        }
        Ok(())
    }

    /// Whether the background heartbeat should run.
    #[inline]
    pub fn heartbeat_enabled(&self) -> bool {
        !self.heartbeat_interval.is_zero()
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
