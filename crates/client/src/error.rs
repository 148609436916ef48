//! Error types for filesystem operations.

use std::fmt;

use blefs_protocol::{Command, ProtocolError};

/// Why a single write+wait attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// No notification arrived within the response timeout.
    Timeout,
    /// The characteristic write itself failed.
    Write(String),
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::Timeout => f.write_str("response timed out"),
            AttemptFailure::Write(e) => write!(f, "write failed: {e}"),
        }
    }
}

/// Errors produced by filesystem operations.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// The watch answered with a frame this exchange did not expect.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("{command} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        command: Command,
        attempts: u32,
        last: AttemptFailure,
    },

    #[error("timed out waiting for {command}")]
    Timeout { command: Command },

    #[error("notification stream closed")]
    Disconnected,

    #[error("subscribe failed: {0}")]
    Subscribe(std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{command} returned status 0x{status:02x}")]
    Status { command: Command, status: u8 },

    #[error("device not connected")]
    NotConnected,

    #[error("MTU {mtu} too small (protocol overhead {overhead})")]
    InvalidMtu { mtu: usize, overhead: usize },

    #[error("source ended after {sent} of {total} bytes")]
    SourceExhausted { sent: u64, total: u64 },

    #[error("read response at offset {actual}, expected {expected}")]
    OffsetMismatch { expected: u32, actual: u32 },

    #[error("read stalled at offset {offset}")]
    Stalled { offset: u32 },

    #[error("chunk of {len} bytes at offset {offset} overruns file size {total}")]
    ChunkOverrun { offset: u32, len: u32, total: u32 },

    #[error("file too large for the protocol: {0} bytes")]
    FileTooLarge(u64),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("cancelled")]
    Cancelled,

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl FsError {
    /// Whether retrying the whole operation may succeed.
    ///
    /// Transport trouble is retryable; desync, firmware status errors and
    /// caller misuse are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FsError::RetriesExhausted { .. } | FsError::Timeout { .. } | FsError::Disconnected
        )
    }

    /// Whether this is a protocol desynchronization.
    pub fn is_desync(&self) -> bool {
        matches!(
            self,
            FsError::Protocol(ProtocolError::UnexpectedCommand { .. })
        )
    }
}
