//! Response frames (watch -> phone).
//!
//! # Wire format
//!
//! ```text
//! READ   0x11: [cmd][status][pad 2][offset u32][total_size u32][chunk_len u32][chunk]
//! WRITE  0x21: [cmd][status][pad 2][offset u32][timestamp_ns u64][free_space u32]
//! DELETE 0x31: [cmd][status]
//! MKDIR  0x41: [cmd][status][pad 6][timestamp_ns u64]
//! LIST   0x51: [cmd][status][path_len u16][entry u32][total u32][flags u32][timestamp_ns u64][size u32][path]
//! MOVE   0x61: [cmd][status]
//! ```
//!
//! Decoding checks the leading command byte first; a mismatch is reported
//! as [`ProtocolError::UnexpectedCommand`] before any field is read.

use crate::constants::{Command, FLAG_DIRECTORY, STATUS_OK};
use crate::cursor::{FrameReader, payload_len, put_path_len};
use crate::ProtocolError;

/// Verifies that `buf` starts with `expected`.
pub fn expect_command(buf: &[u8], expected: Command) -> Result<(), ProtocolError> {
    let actual = *buf.first().ok_or(ProtocolError::EmptyFrame)?;
    if actual != expected.byte() {
        return Err(ProtocolError::UnexpectedCommand {
            expected: expected.byte(),
            actual,
        });
    }
    Ok(())
}

/// One chunk of a file being read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResponse {
    pub status: u8,
    /// Offset of `data` within the file.
    pub offset: u32,
    /// Size of the whole file.
    pub total_size: u32,
    pub data: Vec<u8>,
}

impl ReadResponse {
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_command(buf, Command::ReadResponse)?;
        let mut r = FrameReader::new(buf);
        r.skip(1)?;
        let status = r.u8()?;
        r.skip(2)?;
        let offset = r.u32()?;
        let total_size = r.u32()?;
        let chunk_len = r.u32()? as usize;
        let data = r.take(chunk_len)?.to_vec();
        Ok(Self {
            status,
            offset,
            total_size,
            data,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut out = Vec::with_capacity(16 + self.data.len());
        out.push(Command::ReadResponse.byte());
        out.push(self.status);
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.total_size.to_le_bytes());
        out.extend_from_slice(&payload_len(self.data.len())?.to_le_bytes());
        out.extend_from_slice(&self.data);
        Ok(out)
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Acknowledgement of a write-init or write-continue frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResponse {
    pub status: u8,
    pub offset: u32,
    pub timestamp: u64,
    /// Bytes still free on the watch's flash.
    pub free_space: u32,
}

impl WriteResponse {
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_command(buf, Command::WriteResponse)?;
        let mut r = FrameReader::new(buf);
        r.skip(1)?;
        let status = r.u8()?;
        r.skip(2)?;
        Ok(Self {
            status,
            offset: r.u32()?,
            timestamp: r.u64()?,
            free_space: r.u32()?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(20);
        out.push(Command::WriteResponse.byte());
        out.push(self.status);
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.free_space.to_le_bytes());
        out
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Decodes a `[cmd][status]` frame.
fn decode_status(buf: &[u8], command: Command) -> Result<u8, ProtocolError> {
    expect_command(buf, command)?;
    let mut r = FrameReader::new(buf);
    r.skip(1)?;
    r.u8()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteResponse {
    pub status: u8,
}

impl DeleteResponse {
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            status: decode_status(buf, Command::DeleteResponse)?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        vec![Command::DeleteResponse.byte(), self.status]
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveResponse {
    pub status: u8,
}

impl MoveResponse {
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            status: decode_status(buf, Command::MoveResponse)?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        vec![Command::MoveResponse.byte(), self.status]
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MkdirResponse {
    pub status: u8,
    pub timestamp: u64,
}

impl MkdirResponse {
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_command(buf, Command::MkdirResponse)?;
        let mut r = FrameReader::new(buf);
        r.skip(1)?;
        let status = r.u8()?;
        r.skip(6)?;
        Ok(Self {
            status,
            timestamp: r.u64()?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        out.push(Command::MkdirResponse.byte());
        out.push(self.status);
        out.extend_from_slice(&[0; 6]);
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// One directory listing notification.
///
/// The firmware answers a list request with one frame per entry followed by
/// a terminal frame whose `entry_number` is not below `total_entries`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Non-OK when the directory does not exist.
    pub status: u8,
    pub entry_number: u32,
    pub total_entries: u32,
    pub flags: u32,
    /// Modification time in nanoseconds since the Unix epoch.
    pub timestamp: u64,
    pub size: u32,
    /// Entry name relative to the listed directory.
    pub path: String,
}

impl DirEntry {
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        expect_command(buf, Command::ListResponse)?;
        let mut r = FrameReader::new(buf);
        r.skip(1)?;
        let status = r.u8()?;
        let path_len = r.u16()? as usize;
        let entry_number = r.u32()?;
        let total_entries = r.u32()?;
        let flags = r.u32()?;
        let timestamp = r.u64()?;
        let size = r.u32()?;
        let path = r.path(path_len)?;
        Ok(Self {
            status,
            entry_number,
            total_entries,
            flags,
            timestamp,
            size,
            path,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut out = Vec::with_capacity(28 + self.path.len());
        out.push(Command::ListResponse.byte());
        out.push(self.status);
        put_path_len(&mut out, &self.path)?;
        out.extend_from_slice(&self.entry_number.to_le_bytes());
        out.extend_from_slice(&self.total_entries.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(self.path.as_bytes());
        Ok(out)
    }

    /// Whether this frame describes a member of the directory rather than
    /// the terminal sentinel.
    pub fn is_valid(&self) -> bool {
        self.entry_number < self.total_entries
    }

    pub fn is_dir(&self) -> bool {
        self.flags & FLAG_DIRECTORY != 0
    }

    /// The terminal frame the firmware sends after the last entry.
    pub fn terminal(total_entries: u32) -> Self {
        Self {
            status: STATUS_OK,
            entry_number: total_entries,
            total_entries,
            flags: 0,
            timestamp: 0,
            size: 0,
            path: String::new(),
        }
    }
}
