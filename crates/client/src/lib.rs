//! Client for the BLE remote filesystem (BLEFS) exposed by the watch.
//!
//! All traffic goes through a single GATT characteristic: requests are
//! written to it and responses arrive as notifications. A
//! [`RequestChannel`] turns that notification stream into
//! request/response exchanges with timeouts and retries, and
//! [`FileSystem`] builds the file operations on top of it while holding a
//! per-device [`DeviceLock`], since the firmware serves one exchange at a
//! time.

pub mod channel;
pub mod characteristic;
pub mod config;
pub mod error;
pub mod fs;
mod ops;
#[cfg(test)]
pub(crate) mod sim;

pub use channel::RequestChannel;
pub use characteristic::{Characteristic, Notifications};
pub use config::FsConfig;
pub use error::{AttemptFailure, FsError};
pub use fs::{DeviceLock, File, FileSystem};

pub use blefs_transfer::{ProgressCallback, TransferProgress};

use std::time::Duration;

/// How long to wait for a notification after writing a request.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Write+wait attempts per exchange before giving up.
pub const MAX_ATTEMPTS: u32 = 3;

/// Pause before the first write on a fresh subscription.
///
/// Notifications subscribed immediately before a write can miss the first
/// response on some platforms.
pub const SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Pause before resending after a failed characteristic write.
pub const RETRY_DELAY: Duration = Duration::from_millis(200);
