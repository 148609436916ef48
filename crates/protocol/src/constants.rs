//! Command bytes, status codes and fixed frame sizes.
//!
//! These values are dictated by the watch firmware and are not
//! configurable.

use crate::ProtocolError;

/// Status byte reported by the firmware on success.
///
/// Any other value is a (negative, littlefs) error code.
pub const STATUS_OK: u8 = 0x01;

/// Bytes subtracted from the connection MTU to size read chunks.
pub const READ_CHUNK_OVERHEAD: usize = 12;

/// Bytes subtracted from the connection MTU to size write chunks.
pub const WRITE_CHUNK_OVERHEAD: usize = 16;

/// Directory entry flag: the entry is a directory.
pub const FLAG_DIRECTORY: u32 = 0x01;

/// Leading command byte of every BLEFS frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    ReadInit = 0x10,
    ReadResponse = 0x11,
    ReadContinue = 0x12,
    WriteInit = 0x20,
    WriteResponse = 0x21,
    WriteContinue = 0x22,
    Delete = 0x30,
    DeleteResponse = 0x31,
    Mkdir = 0x40,
    MkdirResponse = 0x41,
    List = 0x50,
    ListResponse = 0x51,
    Move = 0x60,
    MoveResponse = 0x61,
}

impl Command {
    /// Returns the raw command byte.
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Returns the response command that pairs with this request command.
    ///
    /// Response commands map to themselves.
    pub const fn response(self) -> Command {
        match self {
            Command::ReadInit | Command::ReadContinue | Command::ReadResponse => {
                Command::ReadResponse
            }
            Command::WriteInit | Command::WriteContinue | Command::WriteResponse => {
                Command::WriteResponse
            }
            Command::Delete | Command::DeleteResponse => Command::DeleteResponse,
            Command::Mkdir | Command::MkdirResponse => Command::MkdirResponse,
            Command::List | Command::ListResponse => Command::ListResponse,
            Command::Move | Command::MoveResponse => Command::MoveResponse,
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x10 => Command::ReadInit,
            0x11 => Command::ReadResponse,
            0x12 => Command::ReadContinue,
            0x20 => Command::WriteInit,
            0x21 => Command::WriteResponse,
            0x22 => Command::WriteContinue,
            0x30 => Command::Delete,
            0x31 => Command::DeleteResponse,
            0x40 => Command::Mkdir,
            0x41 => Command::MkdirResponse,
            0x50 => Command::List,
            0x51 => Command::ListResponse,
            0x60 => Command::Move,
            0x61 => Command::MoveResponse,
            other => return Err(ProtocolError::UnknownCommand(other)),
        })
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}(0x{:02x})", self.byte())
    }
}
