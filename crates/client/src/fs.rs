//! Per-device filesystem handle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use blefs_protocol::constants::{READ_CHUNK_OVERHEAD, WRITE_CHUNK_OVERHEAD};
use blefs_protocol::{DirEntry, clean_path, join_paths, wire_path};
use blefs_transfer::{ProgressCallback, ProgressReporter};

use crate::channel::RequestChannel;
use crate::characteristic::Characteristic;
use crate::config::FsConfig;
use crate::error::FsError;
use crate::ops;

/// Serializes filesystem exchanges with one watch.
///
/// The firmware cannot multiplex filesystem requests, so every
/// [`FileSystem`] handle talking to the same device must share one lock.
#[derive(Debug, Clone, Default)]
pub struct DeviceLock(Arc<Mutex<()>>);

impl DeviceLock {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    /// Name as reported by the watch.
    pub name: String,
    /// Cleaned path from the root, without a leading slash.
    pub path: String,
    pub is_dir: bool,
    pub modified: DateTime<Utc>,
    pub size: u64,
}

impl File {
    pub(crate) fn from_entry(dir: &str, entry: DirEntry) -> Self {
        let secs = i64::try_from(entry.timestamp / 1_000_000_000).unwrap_or(i64::MAX);
        let nanos = (entry.timestamp % 1_000_000_000) as u32;
        Self {
            path: join_paths(dir, &entry.path),
            is_dir: entry.is_dir(),
            modified: DateTime::from_timestamp(secs, nanos).unwrap_or_default(),
            size: u64::from(entry.size),
            name: entry.path,
        }
    }
}

/// Filesystem operations against one connected watch.
///
/// Every operation takes the device lock for its whole duration, opens its
/// own [`RequestChannel`] and closes it on return, success or not.
/// Relative paths are resolved against the handle's working directory;
/// paths starting with `/` are resolved from the root.
pub struct FileSystem<C: Characteristic> {
    characteristic: Arc<C>,
    lock: DeviceLock,
    config: FsConfig,
    cwd: String,
    cancel: CancellationToken,
}

impl<C: Characteristic> Clone for FileSystem<C> {
    fn clone(&self) -> Self {
        Self {
            characteristic: Arc::clone(&self.characteristic),
            lock: self.lock.clone(),
            config: self.config.clone(),
            cwd: self.cwd.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<C: Characteristic> FileSystem<C> {
    /// Creates a handle with default configuration and a fresh lock.
    pub fn new(characteristic: Arc<C>) -> Self {
        Self::with_config(characteristic, FsConfig::default(), DeviceLock::new())
    }

    pub fn with_config(characteristic: Arc<C>, config: FsConfig, lock: DeviceLock) -> Self {
        Self {
            characteristic,
            lock,
            config,
            cwd: String::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// Working directory (cleaned, root is empty).
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    pub fn set_cwd(&mut self, path: &str) {
        self.cwd = self.resolve(path);
    }

    /// Resolves a caller path to a cleaned remote path.
    pub fn resolve(&self, path: &str) -> String {
        if path.starts_with('/') {
            clean_path(path)
        } else {
            join_paths(&self.cwd, path)
        }
    }

    /// Token cancelling every operation running on this handle and its
    /// clones.
    ///
    /// Cancellation is permanent: once cancelled, the handle and every clone
    /// sharing the token fail all further operations with
    /// [`FsError::Cancelled`] until [`reset_cancel`](Self::reset_cancel).
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Gives this handle a fresh cancellation token. Clones keep the old one.
    pub fn reset_cancel(&mut self) {
        self.cancel = CancellationToken::new();
    }

    /// Reads a remote file into `sink`, returning the number of bytes read.
    pub async fn read_file<W>(
        &self,
        path: &str,
        sink: &mut W,
        on_progress: Option<ProgressCallback>,
    ) -> Result<u64, FsError>
    where
        W: AsyncWrite + Unpin,
    {
        let target = self.resolve(path);
        let _guard = self.acquire().await?;
        let progress = self.reporter(format!("Reading {}", wire_path(&target)), on_progress);
        let chunk_size = ops::chunk_size(self.characteristic.mtu(), READ_CHUNK_OVERHEAD)?;
        let chunk_size = u32::try_from(chunk_size).unwrap_or(u32::MAX);

        let mut channel = self.open_channel().await?;
        let read = ops::read::read_file(
            &mut channel,
            &wire_path(&target),
            chunk_size,
            sink,
            progress.as_ref(),
        )
        .await?;
        info!(path = %target, bytes = read, "file read");
        Ok(read)
    }

    /// Writes `total_size` bytes from `source` to a remote file, stamped
    /// with the current time.
    pub async fn write_file<R>(
        &self,
        path: &str,
        source: &mut R,
        total_size: u64,
        on_progress: Option<ProgressCallback>,
    ) -> Result<u64, FsError>
    where
        R: AsyncRead + Unpin,
    {
        let target = self.resolve(path);
        let _guard = self.acquire().await?;
        let progress = self.reporter(format!("Writing {}", wire_path(&target)), on_progress);
        let chunk_size = ops::chunk_size(self.characteristic.mtu(), WRITE_CHUNK_OVERHEAD)?;
        let timestamp = Utc::now()
            .timestamp_nanos_opt()
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0);

        let mut channel = self.open_channel().await?;
        let sent = ops::write::write_file(
            &mut channel,
            &wire_path(&target),
            source,
            total_size,
            timestamp,
            chunk_size,
            progress.as_ref(),
        )
        .await?;
        info!(path = %target, bytes = sent, "file written");
        Ok(sent)
    }

    pub async fn delete_file(&self, path: &str) -> Result<(), FsError> {
        let target = self.resolve(path);
        let _guard = self.acquire().await?;
        let mut channel = self.open_channel().await?;
        ops::remove::delete(&mut channel, &target).await?;
        debug!(path = %target, "deleted");
        Ok(())
    }

    /// Lists a directory. A missing directory yields an empty list.
    pub async fn list_files(&self, path: &str) -> Result<Vec<File>, FsError> {
        let target = self.resolve(path);
        let _guard = self.acquire().await?;
        let mut channel = self.open_channel().await?;
        let files = ops::dir::list(&mut channel, &target).await?;
        debug!(path = %target, entries = files.len(), "listed");
        Ok(files)
    }

    pub async fn create_folder(&self, path: &str) -> Result<(), FsError> {
        let target = self.resolve(path);
        let _guard = self.acquire().await?;
        let mut channel = self.open_channel().await?;
        ops::dir::mkdir(&mut channel, &target).await?;
        debug!(path = %target, "folder created");
        Ok(())
    }

    /// Creates `path` and every missing ancestor.
    ///
    /// Existing directories along the way are left alone; an existing file
    /// in the way fails with [`FsError::NotADirectory`].
    pub async fn create_folder_all(&self, path: &str) -> Result<(), FsError> {
        let target = self.resolve(path);
        let _guard = self.acquire().await?;

        let mut current = String::new();
        for segment in target.split('/').filter(|s| !s.is_empty()) {
            let parent = std::mem::take(&mut current);
            current = join_paths(&parent, segment);

            let siblings = {
                let mut channel = self.open_channel().await?;
                ops::dir::list(&mut channel, &parent).await?
            };
            match siblings.iter().find(|f| f.name == segment) {
                Some(f) if f.is_dir => continue,
                Some(_) => return Err(FsError::NotADirectory(current)),
                None => {
                    let mut channel = self.open_channel().await?;
                    ops::dir::mkdir(&mut channel, &current).await?;
                    debug!(path = %current, "folder created");
                }
            }
        }
        Ok(())
    }

    /// Deletes `path` and, if it is a directory, everything below it.
    ///
    /// The root itself is emptied but never deleted.
    pub async fn remove_all(&self, path: &str) -> Result<(), FsError> {
        let target = self.resolve(path);
        let _guard = self.acquire().await?;

        // Depth-first: a directory is deleted once its children are gone.
        let mut stack = vec![(target, false)];
        while let Some((dir, emptied)) = stack.pop() {
            if emptied {
                if !dir.is_empty() {
                    let mut channel = self.open_channel().await?;
                    ops::remove::delete(&mut channel, &dir).await?;
                }
                continue;
            }

            let entries = {
                let mut channel = self.open_channel().await?;
                ops::dir::list(&mut channel, &dir).await?
            };
            stack.push((dir, true));
            for entry in entries {
                if entry.name == "." || entry.name == ".." {
                    continue;
                }
                if entry.is_dir {
                    stack.push((entry.path, false));
                } else {
                    let mut channel = self.open_channel().await?;
                    ops::remove::delete(&mut channel, &entry.path).await?;
                }
            }
        }
        Ok(())
    }

    /// Moves or renames a file or directory.
    pub async fn rename(&self, old_path: &str, new_path: &str) -> Result<(), FsError> {
        let old = self.resolve(old_path);
        let new = self.resolve(new_path);
        let _guard = self.acquire().await?;
        let mut channel = self.open_channel().await?;
        ops::remove::rename(&mut channel, &old, &new).await?;
        debug!(from = %old, to = %new, "renamed");
        Ok(())
    }

    async fn acquire(&self) -> Result<MutexGuard<'_, ()>, FsError> {
        if !self.characteristic.is_connected() {
            return Err(FsError::NotConnected);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FsError::Cancelled),
            guard = self.lock.0.lock() => Ok(guard),
        }
    }

    async fn open_channel(&self) -> Result<RequestChannel<C>, FsError> {
        RequestChannel::open(
            Arc::clone(&self.characteristic),
            self.config.clone(),
            self.cancel.child_token(),
        )
        .await
    }

    fn reporter(
        &self,
        stage: String,
        on_progress: Option<ProgressCallback>,
    ) -> Option<ProgressReporter> {
        on_progress.map(|cb| {
            let job_id = uuid::Uuid::new_v4().to_string();
            let reporter =
                ProgressReporter::start(job_id, stage, self.config.progress_interval, cb);
            debug!(job = reporter.job_id(), "progress reporting started");
            reporter
        })
    }
}
