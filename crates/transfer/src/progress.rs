use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::trace;

use crate::TransferProgress;

/// Callback invoked with each progress report.
///
/// Called from the reporter's timer task and from teardown; it must not
/// call back into the same reporter.
pub type ProgressCallback = Arc<dyn Fn(TransferProgress) + Send + Sync>;

/// Shortest tick period; tokio intervals cannot have a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Periodically reports progress for a single transfer.
///
/// Byte accounting ([`add_bytes`](Self::add_bytes),
/// [`set_total`](Self::set_total)) is driven by the transfer loop, while a
/// background tokio task turns the counters into reports every interval.
/// Dropping the reporter (or calling [`finish`](Self::finish)) stops the
/// task and emits one final report with `total_progress == 1.0` and
/// `is_done == true`, whatever the counters say. No periodic report is
/// emitted after the final one.
pub struct ProgressReporter {
    shared: Arc<Shared>,
    stop: Option<oneshot::Sender<()>>,
}

struct Shared {
    job_id: String,
    stage: String,
    sent: AtomicU64,
    total: AtomicU64,
    callback: ProgressCallback,
    emit: Mutex<EmitState>,
}

struct EmitState {
    finished: bool,
    last_tick: Instant,
    last_sent: u64,
}

impl ProgressReporter {
    /// Starts a reporter and its timer task.
    ///
    /// Must be called from within a tokio runtime. A zero `interval` is
    /// treated as one millisecond.
    pub fn start(
        job_id: impl Into<String>,
        stage: impl Into<String>,
        interval: Duration,
        callback: ProgressCallback,
    ) -> Self {
        let now = Instant::now();
        let shared = Arc::new(Shared {
            job_id: job_id.into(),
            stage: stage.into(),
            sent: AtomicU64::new(0),
            total: AtomicU64::new(0),
            callback,
            emit: Mutex::new(EmitState {
                finished: false,
                last_tick: now,
                last_sent: 0,
            }),
        });

        let interval = interval.max(MIN_INTERVAL);
        let (tx, mut rx) = oneshot::channel();
        let mut ticker = tokio::time::interval_at(now + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let task_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = ticker.tick() => task_shared.tick(),
                    _ = &mut rx => break,
                }
            }
        });

        Self {
            shared,
            stop: Some(tx),
        }
    }

    /// Records `bytes` more transferred bytes.
    pub fn add_bytes(&self, bytes: u64) {
        self.shared.sent.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Sets the expected total size of the transfer.
    pub fn set_total(&self, total: u64) {
        self.shared.total.store(total, Ordering::Relaxed);
    }

    /// Bytes recorded so far.
    pub fn sent(&self) -> u64 {
        self.shared.sent.load(Ordering::Relaxed)
    }

    /// Current completion fraction (0 while the total is unknown).
    pub fn fraction(&self) -> f64 {
        self.shared.fraction()
    }

    /// Identifier carried by every report.
    pub fn job_id(&self) -> &str {
        &self.shared.job_id
    }

    /// Stops the timer and emits the final report.
    ///
    /// Idempotent; also performed on drop.
    pub fn finish(&mut self) {
        // Dropping the sender signals the task to exit.
        drop(self.stop.take());
        self.shared.finish();
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.finish();
    }
}

impl Shared {
    fn fraction(&self) -> f64 {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let sent = self.sent.load(Ordering::Relaxed);
        (sent as f64 / total as f64).min(1.0)
    }

    fn tick(&self) {
        let mut state = self.emit.lock().unwrap_or_else(PoisonError::into_inner);
        if state.finished {
            return;
        }

        let now = Instant::now();
        let elapsed_ms = now.duration_since(state.last_tick).as_secs_f64() * 1000.0;
        let sent = self.sent.load(Ordering::Relaxed);
        let total = self.total.load(Ordering::Relaxed);
        let delta = sent.saturating_sub(state.last_sent);
        state.last_tick = now;
        state.last_sent = sent;

        let bytes_per_ms = if elapsed_ms > 0.0 {
            delta as f64 / elapsed_ms
        } else {
            0.0
        };
        let time_remaining = (bytes_per_ms > 0.0).then(|| {
            let remaining_ms = total.saturating_sub(sent) as f64 / bytes_per_ms;
            Duration::from_secs_f64(remaining_ms / 1000.0)
        });

        trace!(job = %self.job_id, sent, total, bytes_per_ms, "progress tick");

        (self.callback)(TransferProgress {
            job_id: self.job_id.clone(),
            stage: self.stage.clone(),
            total_progress: self.fraction(),
            bytes_per_second: Some(bytes_per_ms * 1000.0),
            time_remaining,
            is_done: false,
        });
    }

    fn finish(&self) {
        let mut state = self.emit.lock().unwrap_or_else(PoisonError::into_inner);
        if state.finished {
            return;
        }
        state.finished = true;

        (self.callback)(TransferProgress {
            job_id: self.job_id.clone(),
            stage: self.stage.clone(),
            total_progress: 1.0,
            bytes_per_second: None,
            time_remaining: None,
            is_done: true,
        });
    }
}
