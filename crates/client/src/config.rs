//! Tunables for the request channel and progress reporting.
//!
//! Defaults match what the watch firmware is known to tolerate. A JSON
//! file may override any subset; durations are given in milliseconds:
//!
//! ```json
//! { "responseTimeoutMs": 3000, "maxAttempts": 5, "strictStatus": false }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FsError;
use crate::{MAX_ATTEMPTS, RESPONSE_TIMEOUT, RETRY_DELAY, SETTLE_DELAY};

/// Filesystem client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FsConfig {
    #[serde(rename = "responseTimeoutMs", with = "millis")]
    pub response_timeout: Duration,

    /// Total write+wait attempts per exchange (at least one is made).
    pub max_attempts: u32,

    #[serde(rename = "settleDelayMs", with = "millis")]
    pub settle_delay: Duration,

    #[serde(rename = "retryDelayMs", with = "millis")]
    pub retry_delay: Duration,

    /// Longest gap tolerated between frames of a directory listing.
    #[serde(rename = "drainIdleTimeoutMs", with = "millis")]
    pub drain_idle_timeout: Duration,

    #[serde(rename = "progressIntervalMs", with = "millis")]
    pub progress_interval: Duration,

    /// Fail operations whose response carries a non-OK status.
    pub strict_status: bool,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            response_timeout: RESPONSE_TIMEOUT,
            max_attempts: MAX_ATTEMPTS,
            settle_delay: SETTLE_DELAY,
            retry_delay: RETRY_DELAY,
            drain_idle_timeout: RESPONSE_TIMEOUT,
            progress_interval: blefs_transfer::DEFAULT_PROGRESS_INTERVAL,
            strict_status: true,
        }
    }
}

impl FsConfig {
    pub fn from_json_str(json: &str) -> Result<Self, FsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a config file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> Result<Self, FsError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        tracing::debug!(path = %path.display(), ?config, "loaded filesystem config");
        Ok(config)
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
