use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A progress snapshot for a running (or finished) transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferProgress {
    pub job_id: String,
    /// Human readable stage, e.g. `Reading /logs/today.txt`.
    pub stage: String,
    /// Fraction in `[0, 1]`.
    pub total_progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_per_second: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<Duration>,
    pub is_done: bool,
}

impl TransferProgress {
    /// Returns the progress as a percentage (0-100).
    pub fn percentage(&self) -> f64 {
        self.total_progress * 100.0
    }
}
