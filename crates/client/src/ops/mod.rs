//! The exchange loops behind each [`FileSystem`](crate::FileSystem)
//! operation. Each takes an open channel and a cleaned remote path.

pub(crate) mod dir;
pub(crate) mod read;
pub(crate) mod remove;
pub(crate) mod write;

use blefs_protocol::Command;
use blefs_protocol::constants::STATUS_OK;
use tracing::debug;

use crate::error::FsError;

/// Payload bytes per exchange for a connection MTU.
pub(crate) fn chunk_size(mtu: usize, overhead: usize) -> Result<usize, FsError> {
    match mtu.checked_sub(overhead) {
        Some(n) if n > 0 => Ok(n),
        _ => Err(FsError::InvalidMtu { mtu, overhead }),
    }
}

/// Applies the status policy to a response.
pub(crate) fn check_status(command: Command, status: u8, strict: bool) -> Result<(), FsError> {
    if status == STATUS_OK {
        return Ok(());
    }
    if strict {
        return Err(FsError::Status { command, status });
    }
    debug!(%command, status, "ignoring non-OK status");
    Ok(())
}
