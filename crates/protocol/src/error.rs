//! Codec error types.

/// Errors produced while encoding or decoding BLEFS frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The leading command byte is not the one this exchange expects.
    ///
    /// Both parties have desynchronized; never retried.
    #[error("unexpected command 0x{actual:02x} (expected 0x{expected:02x})")]
    UnexpectedCommand { expected: u8, actual: u8 },

    #[error("unknown command 0x{0:02x}")]
    UnknownCommand(u8),

    #[error("empty frame")]
    EmptyFrame,

    #[error("frame 0x{command:02x} truncated: need {needed} bytes, got {actual}")]
    Truncated {
        command: u8,
        needed: usize,
        actual: usize,
    },

    #[error("path too long: {0} bytes (max {max})", max = u16::MAX)]
    PathTooLong(usize),

    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("invalid UTF-8 in path")]
    InvalidUtf8,
}
