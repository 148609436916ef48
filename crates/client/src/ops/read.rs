use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use blefs_protocol::{Command, ReadResponse, Request};
use blefs_transfer::ProgressReporter;

use super::check_status;
use crate::channel::RequestChannel;
use crate::characteristic::Characteristic;
use crate::error::FsError;

/// Streams a remote file into `sink`, returning the bytes written.
///
/// Terminates once a response reaches the end of the file. Responses that
/// would keep the loop going without advancing (wrong offset, empty chunk,
/// chunk past the end) are errors.
pub(crate) async fn read_file<C, W>(
    channel: &mut RequestChannel<C>,
    path: &str,
    chunk_size: u32,
    sink: &mut W,
    progress: Option<&ProgressReporter>,
) -> Result<u64, FsError>
where
    C: Characteristic,
    W: AsyncWrite + Unpin,
{
    let strict = channel.config().strict_status;
    let mut request = Request::ReadInit {
        path: path.to_string(),
        offset: 0,
        chunk_size,
    };
    let mut expected_offset = 0u32;
    let mut received = 0u64;
    let mut exchanges = 0u32;

    loop {
        let frame = channel.request(&request, false).await?;
        let response = ReadResponse::decode(&frame)?;
        exchanges += 1;
        check_status(Command::ReadResponse, response.status, strict)?;

        if response.offset != expected_offset {
            return Err(FsError::OffsetMismatch {
                expected: expected_offset,
                actual: response.offset,
            });
        }
        if exchanges == 1
            && let Some(p) = progress
        {
            p.set_total(u64::from(response.total_size));
        }

        let chunk_len = response.data.len() as u32;
        sink.write_all(&response.data).await?;
        received += u64::from(chunk_len);
        if let Some(p) = progress {
            p.add_bytes(u64::from(chunk_len));
        }

        let remaining = response
            .total_size
            .checked_sub(response.offset)
            .and_then(|r| r.checked_sub(chunk_len))
            .ok_or(FsError::ChunkOverrun {
                offset: response.offset,
                len: chunk_len,
                total: response.total_size,
            })?;
        if remaining == 0 {
            break;
        }
        if chunk_len == 0 {
            return Err(FsError::Stalled {
                offset: response.offset,
            });
        }

        expected_offset = response.offset + chunk_len;
        request = Request::ReadContinue {
            offset: expected_offset,
            chunk_size,
        };
    }

    sink.flush().await?;
    debug!(path, received, exchanges, "read complete");
    Ok(received)
}
