//! Request/response exchanges over the notification stream.
//!
//! The characteristic offers no correlation between a write and the
//! notification answering it. The channel relies on the firmware serving
//! one exchange at a time: after writing a request, the next notification
//! is its response.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use blefs_protocol::{Command, Request, expect_command};

use crate::characteristic::Characteristic;
use crate::config::FsConfig;
use crate::error::{AttemptFailure, FsError};

/// One subscription to the filesystem characteristic, used for a single
/// operation.
///
/// Only one `send`/`drain` runs at a time (both take `&mut self`). The
/// subscription is cancelled when the channel is dropped.
pub struct RequestChannel<C: Characteristic> {
    characteristic: Arc<C>,
    config: FsConfig,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    /// Response kept by `send` for the next `drain`.
    stored: Option<Vec<u8>>,
    settled: bool,
    cancel: CancellationToken,
    _pump: JoinHandle<()>,
}

impl<C: Characteristic> RequestChannel<C> {
    /// Subscribes to notifications and starts forwarding them into the
    /// channel's queue.
    ///
    /// Cancelling `cancel` closes the channel.
    pub async fn open(
        characteristic: Arc<C>,
        config: FsConfig,
        cancel: CancellationToken,
    ) -> Result<Self, FsError> {
        let notifications = characteristic
            .subscribe()
            .await
            .map_err(FsError::Subscribe)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(notification_pump(notifications, tx, cancel.clone()));

        Ok(Self {
            characteristic,
            config,
            rx,
            stored: None,
            settled: false,
            cancel,
            _pump: pump,
        })
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// Encodes `request` and exchanges it for the matching response frame.
    pub async fn request(
        &mut self,
        request: &Request,
        keep_response: bool,
    ) -> Result<Vec<u8>, FsError> {
        let frame = request.encode()?;
        self.send(request.response_command(), &frame, keep_response)
            .await
    }

    /// Writes `frame` and waits for the next notification.
    ///
    /// Each attempt writes the same bytes and waits up to the response
    /// timeout; a failed write also consumes an attempt. The received
    /// frame must start with `expected`, otherwise the exchange fails
    /// immediately with a protocol error. With `keep_response`, the frame
    /// is also stored for the next [`drain`](Self::drain).
    pub async fn send(
        &mut self,
        expected: Command,
        frame: &[u8],
        keep_response: bool,
    ) -> Result<Vec<u8>, FsError> {
        let command = frame
            .first()
            .and_then(|b| Command::try_from(*b).ok())
            .unwrap_or(expected);

        if !self.settled {
            self.pause(self.config.settle_delay).await?;
            self.settled = true;
        }

        let attempts = self.config.max_attempts.max(1);
        let mut last = AttemptFailure::Timeout;

        for attempt in 1..=attempts {
            if attempt > 1 {
                self.discard_stale();
            }

            trace!(%command, attempt, len = frame.len(), "writing request");
            let written = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(FsError::Cancelled),
                result = self.characteristic.write(frame) => result,
            };
            if let Err(e) = written {
                warn!(%command, attempt, "characteristic write failed: {e}");
                last = AttemptFailure::Write(e.to_string());
                if attempt < attempts {
                    self.pause(self.config.retry_delay).await?;
                }
                continue;
            }

            let received = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(FsError::Cancelled),
                result = tokio::time::timeout(self.config.response_timeout, self.rx.recv()) => result,
            };

            match received {
                Ok(Some(response)) => {
                    trace!(%expected, len = response.len(), "received response");
                    expect_command(&response, expected)?;
                    if keep_response {
                        self.stored = Some(response.clone());
                    }
                    return Ok(response);
                }
                Ok(None) => {
                    if self.cancel.is_cancelled() {
                        return Err(FsError::Cancelled);
                    }
                    return Err(FsError::Disconnected);
                }
                Err(_) => {
                    debug!(%command, attempt, "no response within {:?}", self.config.response_timeout);
                    last = AttemptFailure::Timeout;
                }
            }
        }

        Err(FsError::RetriesExhausted {
            command,
            attempts,
            last,
        })
    }

    /// Feeds unsolicited frames to `on_receive` until it returns `false` or
    /// the notification stream ends.
    ///
    /// The response stored by the last `send(.., true)` is delivered first.
    /// Every frame must start with `expected`. The stream ending (including
    /// the channel being closed or cancelled) is a normal end of data.
    pub async fn drain<F>(&mut self, expected: Command, mut on_receive: F) -> Result<(), FsError>
    where
        F: FnMut(&[u8]) -> Result<bool, FsError>,
    {
        if let Some(stored) = self.stored.take()
            && !on_receive(&stored)?
        {
            return Ok(());
        }

        loop {
            let next = tokio::time::timeout(self.config.drain_idle_timeout, self.rx.recv())
                .await
                .map_err(|_| FsError::Timeout { command: expected })?;

            let Some(frame) = next else {
                debug!(%expected, "notification stream ended while draining");
                return Ok(());
            };

            trace!(%expected, len = frame.len(), "drained frame");
            expect_command(&frame, expected)?;
            if !on_receive(&frame)? {
                return Ok(());
            }
        }
    }

    /// Whether the channel's token was cancelled. A drain cut short by
    /// cancellation ends cleanly, so callers check this afterwards.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drops frames that arrived after an attempt already timed out, so
    /// the next notification answers the resend.
    fn discard_stale(&mut self) {
        while let Ok(frame) = self.rx.try_recv() {
            warn!(len = frame.len(), "discarding late frame before resend");
        }
    }

    async fn pause(&self, delay: std::time::Duration) -> Result<(), FsError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FsError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

impl<C: Characteristic> Drop for RequestChannel<C> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Forwards notifications into the channel queue until cancelled or the
/// subscription ends. Dropping `notifications` unsubscribes.
async fn notification_pump(
    mut notifications: crate::characteristic::Notifications,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = notifications.next() => match next {
                Some(frame) => {
                    if tx.send(frame).is_err() {
                        break;
                    }
                }
                None => {
                    debug!("notification subscription ended");
                    break;
                }
            }
        }
    }
}
