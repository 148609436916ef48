//! Little-endian field access for fixed-layout frames.

use crate::ProtocolError;

/// Sequential reader over a frame body.
///
/// Every accessor fails with [`ProtocolError::Truncated`] instead of
/// panicking when the frame is shorter than its layout requires.
pub(crate) struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn command(&self) -> u8 {
        self.buf.first().copied().unwrap_or(0)
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self.pos + n;
        if end > self.buf.len() {
            return Err(ProtocolError::Truncated {
                command: self.command(),
                needed: end,
                actual: self.buf.len(),
            });
        }
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<(), ProtocolError> {
        self.take(n).map(|_| ())
    }

    pub(crate) fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, ProtocolError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, ProtocolError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, ProtocolError> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_le_bytes(raw))
    }

    /// Reads `len` bytes as a UTF-8 path.
    pub(crate) fn path(&mut self, len: usize) -> Result<String, ProtocolError> {
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Returns everything after the current position.
    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }
}

/// Appends a path length field, rejecting paths that do not fit in `u16`.
pub(crate) fn put_path_len(out: &mut Vec<u8>, path: &str) -> Result<(), ProtocolError> {
    let len = u16::try_from(path.len()).map_err(|_| ProtocolError::PathTooLong(path.len()))?;
    out.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

/// Converts a payload length to its `u32` wire field.
pub(crate) fn payload_len(len: usize) -> Result<u32, ProtocolError> {
    u32::try_from(len).map_err(|_| ProtocolError::PayloadTooLarge(len))
}
