use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use blefs_protocol::{Command, Request, WriteResponse};
use blefs_transfer::ProgressReporter;

use super::check_status;
use crate::channel::RequestChannel;
use crate::characteristic::Characteristic;
use crate::error::FsError;

/// Streams `total_size` bytes from `source` into a remote file.
///
/// `timestamp` is the modification time in nanoseconds. Returns the bytes
/// sent, which always equals `total_size` on success.
pub(crate) async fn write_file<C, R>(
    channel: &mut RequestChannel<C>,
    path: &str,
    source: &mut R,
    total_size: u64,
    timestamp: u64,
    chunk_size: usize,
    progress: Option<&ProgressReporter>,
) -> Result<u64, FsError>
where
    C: Characteristic,
    R: AsyncRead + Unpin,
{
    let strict = channel.config().strict_status;
    let total = u32::try_from(total_size).map_err(|_| FsError::FileTooLarge(total_size))?;
    if let Some(p) = progress {
        p.set_total(total_size);
    }

    let init = Request::WriteInit {
        path: path.to_string(),
        offset: 0,
        timestamp,
        total_size: total,
    };
    let frame = channel.request(&init, false).await?;
    let ack = WriteResponse::decode(&frame)?;
    check_status(Command::WriteResponse, ack.status, strict)?;

    let mut buf = vec![0u8; chunk_size];
    let mut sent = 0u64;
    let mut exchanges = 0u32;

    while sent < total_size {
        let want = (total_size - sent).min(chunk_size as u64) as usize;
        let n = source.read(&mut buf[..want]).await?;
        if n == 0 {
            return Err(FsError::SourceExhausted {
                sent,
                total: total_size,
            });
        }

        let chunk = Request::WriteContinue {
            // Bounded by `total`, which fits in u32.
            offset: sent as u32,
            data: buf[..n].to_vec(),
        };
        let frame = channel.request(&chunk, false).await?;
        let ack = WriteResponse::decode(&frame)?;
        check_status(Command::WriteResponse, ack.status, strict)?;
        exchanges += 1;

        sent += n as u64;
        if let Some(p) = progress {
            p.add_bytes(n as u64);
        }
    }

    debug!(path, sent, exchanges, "write complete");
    Ok(sent)
}
