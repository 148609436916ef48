use blefs_protocol::{Command, DirEntry, MkdirResponse, Request};

use super::check_status;
use crate::channel::RequestChannel;
use crate::characteristic::Characteristic;
use crate::error::FsError;
use crate::fs::File;

/// Lists the entries of `dir` in arrival order.
///
/// The first invalid entry ends the listing; when the very first response
/// is invalid (missing directory) the result is empty. A listing cut short
/// by cancellation fails with [`FsError::Cancelled`].
pub(crate) async fn list<C: Characteristic>(
    channel: &mut RequestChannel<C>,
    dir: &str,
) -> Result<Vec<File>, FsError> {
    let request = Request::List {
        path: blefs_protocol::wire_path(dir),
    };
    channel.request(&request, true).await?;

    let mut files = Vec::new();
    channel
        .drain(Command::ListResponse, |frame| {
            let entry = DirEntry::decode(frame)?;
            if !entry.is_valid() {
                return Ok(false);
            }
            files.push(File::from_entry(dir, entry));
            Ok(true)
        })
        .await?;

    if channel.is_cancelled() {
        return Err(FsError::Cancelled);
    }
    Ok(files)
}

/// Creates a single directory. The parent must exist.
pub(crate) async fn mkdir<C: Characteristic>(
    channel: &mut RequestChannel<C>,
    dir: &str,
) -> Result<(), FsError> {
    let strict = channel.config().strict_status;
    let request = Request::Mkdir {
        path: blefs_protocol::wire_path(dir),
        timestamp: 0,
    };
    let frame = channel.request(&request, false).await?;
    let response = MkdirResponse::decode(&frame)?;
    check_status(Command::MkdirResponse, response.status, strict)
}
