//! Request frames (phone -> watch).
//!
//! # Wire format
//!
//! ```text
//! READ INIT      0x10: [cmd][pad][path_len u16][offset u32][chunk_size u32][path]
//! READ CONTINUE  0x12: [cmd][status=0x01][pad 2][offset u32][chunk_size u32]
//! WRITE INIT     0x20: [cmd][pad][path_len u16][offset u32][timestamp_ns u64][total_size u32][path]
//! WRITE CONTINUE 0x22: [cmd][status=0x01][pad 2][offset u32][data_len u32][data]
//! DELETE         0x30: [cmd][pad][path_len u16][path]
//! MKDIR          0x40: [cmd][pad][path_len u16][pad 4][timestamp_ns u64][path]
//! LIST           0x50: [cmd][pad][path_len u16][path]
//! MOVE           0x60: [cmd][pad][old_len u16][new_len u16][old][0x00][new]
//! ```

use crate::constants::{Command, STATUS_OK};
use crate::cursor::{FrameReader, payload_len, put_path_len};
use crate::ProtocolError;

/// A request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ReadInit {
        path: String,
        offset: u32,
        chunk_size: u32,
    },
    ReadContinue {
        offset: u32,
        chunk_size: u32,
    },
    WriteInit {
        path: String,
        offset: u32,
        /// Modification time in nanoseconds since the Unix epoch.
        timestamp: u64,
        total_size: u32,
    },
    WriteContinue {
        offset: u32,
        data: Vec<u8>,
    },
    Delete {
        path: String,
    },
    Mkdir {
        path: String,
        timestamp: u64,
    },
    List {
        path: String,
    },
    Move {
        old_path: String,
        new_path: String,
    },
}

impl Request {
    /// Returns the command byte this frame starts with.
    pub fn command(&self) -> Command {
        match self {
            Request::ReadInit { .. } => Command::ReadInit,
            Request::ReadContinue { .. } => Command::ReadContinue,
            Request::WriteInit { .. } => Command::WriteInit,
            Request::WriteContinue { .. } => Command::WriteContinue,
            Request::Delete { .. } => Command::Delete,
            Request::Mkdir { .. } => Command::Mkdir,
            Request::List { .. } => Command::List,
            Request::Move { .. } => Command::Move,
        }
    }

    /// Returns the command the watch answers this request with.
    pub fn response_command(&self) -> Command {
        self.command().response()
    }

    /// Serializes the request into its wire representation.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut out = Vec::with_capacity(32);
        out.push(self.command().byte());

        match self {
            Request::ReadInit {
                path,
                offset,
                chunk_size,
            } => {
                out.push(0);
                put_path_len(&mut out, path)?;
                out.extend_from_slice(&offset.to_le_bytes());
                out.extend_from_slice(&chunk_size.to_le_bytes());
                out.extend_from_slice(path.as_bytes());
            }
            Request::ReadContinue { offset, chunk_size } => {
                out.push(STATUS_OK);
                out.extend_from_slice(&[0, 0]);
                out.extend_from_slice(&offset.to_le_bytes());
                out.extend_from_slice(&chunk_size.to_le_bytes());
            }
            Request::WriteInit {
                path,
                offset,
                timestamp,
                total_size,
            } => {
                out.push(0);
                put_path_len(&mut out, path)?;
                out.extend_from_slice(&offset.to_le_bytes());
                out.extend_from_slice(&timestamp.to_le_bytes());
                out.extend_from_slice(&total_size.to_le_bytes());
                out.extend_from_slice(path.as_bytes());
            }
            Request::WriteContinue { offset, data } => {
                out.push(STATUS_OK);
                out.extend_from_slice(&[0, 0]);
                out.extend_from_slice(&offset.to_le_bytes());
                out.extend_from_slice(&payload_len(data.len())?.to_le_bytes());
                out.extend_from_slice(data);
            }
            Request::Delete { path } | Request::List { path } => {
                out.push(0);
                put_path_len(&mut out, path)?;
                out.extend_from_slice(path.as_bytes());
            }
            Request::Mkdir { path, timestamp } => {
                out.push(0);
                put_path_len(&mut out, path)?;
                out.extend_from_slice(&[0; 4]);
                out.extend_from_slice(&timestamp.to_le_bytes());
                out.extend_from_slice(path.as_bytes());
            }
            Request::Move { old_path, new_path } => {
                out.push(0);
                put_path_len(&mut out, old_path)?;
                put_path_len(&mut out, new_path)?;
                out.extend_from_slice(old_path.as_bytes());
                out.push(0);
                out.extend_from_slice(new_path.as_bytes());
            }
        }

        Ok(out)
    }

    /// Parses a request frame (the firmware's side of the exchange).
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let first = *buf.first().ok_or(ProtocolError::EmptyFrame)?;
        let command = Command::try_from(first)?;
        let mut r = FrameReader::new(buf);
        r.skip(1)?;

        let request = match command {
            Command::ReadInit => {
                r.skip(1)?;
                let path_len = r.u16()? as usize;
                let offset = r.u32()?;
                let chunk_size = r.u32()?;
                let path = r.path(path_len)?;
                Request::ReadInit {
                    path,
                    offset,
                    chunk_size,
                }
            }
            Command::ReadContinue => {
                r.skip(3)?;
                let offset = r.u32()?;
                let chunk_size = r.u32()?;
                Request::ReadContinue { offset, chunk_size }
            }
            Command::WriteInit => {
                r.skip(1)?;
                let path_len = r.u16()? as usize;
                let offset = r.u32()?;
                let timestamp = r.u64()?;
                let total_size = r.u32()?;
                let path = r.path(path_len)?;
                Request::WriteInit {
                    path,
                    offset,
                    timestamp,
                    total_size,
                }
            }
            Command::WriteContinue => {
                r.skip(3)?;
                let offset = r.u32()?;
                let len = r.u32()? as usize;
                let data = r.take(len)?.to_vec();
                Request::WriteContinue { offset, data }
            }
            Command::Delete => {
                r.skip(1)?;
                let path_len = r.u16()? as usize;
                Request::Delete {
                    path: r.path(path_len)?,
                }
            }
            Command::Mkdir => {
                r.skip(1)?;
                let path_len = r.u16()? as usize;
                r.skip(4)?;
                let timestamp = r.u64()?;
                let path = r.path(path_len)?;
                Request::Mkdir { path, timestamp }
            }
            Command::List => {
                r.skip(1)?;
                let path_len = r.u16()? as usize;
                Request::List {
                    path: r.path(path_len)?,
                }
            }
            Command::Move => {
                r.skip(1)?;
                let old_len = r.u16()? as usize;
                let new_len = r.u16()? as usize;
                let old_path = r.path(old_len)?;
                r.skip(1)?;
                let new_path = r.path(new_len)?;
                Request::Move { old_path, new_path }
            }
            response => return Err(ProtocolError::UnknownCommand(response.byte())),
        };

        Ok(request)
    }
}
