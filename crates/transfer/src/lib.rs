//! Progress reporting for BLEFS transfers.
//!
//! Transfers over BLE advance in small, irregular steps. The
//! [`ProgressReporter`] samples the byte count on a fixed wall-clock
//! interval instead, so throughput and ETA are reported at a steady
//! cadence regardless of chunk size.

mod progress;
mod types;

pub use progress::{ProgressCallback, ProgressReporter};
pub use types::TransferProgress;

use std::time::Duration;

/// Default interval between periodic progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);
