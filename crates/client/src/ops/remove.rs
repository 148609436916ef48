use blefs_protocol::{Command, DeleteResponse, MoveResponse, Request, wire_path};

use super::check_status;
use crate::channel::RequestChannel;
use crate::characteristic::Characteristic;
use crate::error::FsError;

/// Deletes a file or an empty directory.
pub(crate) async fn delete<C: Characteristic>(
    channel: &mut RequestChannel<C>,
    path: &str,
) -> Result<(), FsError> {
    let strict = channel.config().strict_status;
    let request = Request::Delete {
        path: wire_path(path),
    };
    let frame = channel.request(&request, false).await?;
    let response = DeleteResponse::decode(&frame)?;
    check_status(Command::DeleteResponse, response.status, strict)
}

pub(crate) async fn rename<C: Characteristic>(
    channel: &mut RequestChannel<C>,
    old_path: &str,
    new_path: &str,
) -> Result<(), FsError> {
    let strict = channel.config().strict_status;
    let request = Request::Move {
        old_path: wire_path(old_path),
        new_path: wire_path(new_path),
    };
    let frame = channel.request(&request, false).await?;
    let response = MoveResponse::decode(&frame)?;
    check_status(Command::MoveResponse, response.status, strict)
}
