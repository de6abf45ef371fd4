//! Background face identification.
//!
//! One dedicated thread drains the frame slot, runs the identifier and offers
//! the result back. A failed frame is logged and skipped; it never stops the
//! loop. The loop observes cancellation at least once per poll interval.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::control::CancellationToken;
use crate::detect::{detect_in_frame_space, Detector, DetectorKind};
use crate::handoff::{Inbox, Publish, WorkerMailbox};

/// Default wait on the frame slot before re-checking cancellation.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

const JOIN_POLL: Duration = Duration::from_millis(5);

#[derive(Default, Debug)]
struct WorkerCounters {
    processed: AtomicU64,
    published: AtomicU64,
    dropped: AtomicU64,
    failures: AtomicU64,
}

/// Snapshot of worker activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub frames_processed: u64,
    pub results_published: u64,
    pub results_dropped: u64,
    pub failures: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    /// The thread did not finish in time and was left detached.
    TimedOut,
    Panicked,
    AlreadyStopped,
}

/// Handle to the running worker thread.
#[derive(Debug)]
pub struct WorkerHandle {
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
    counters: Arc<WorkerCounters>,
}

impl WorkerHandle {
    /// Spawn the worker. `identifier` must be a face identification capability.
    pub fn spawn(
        identifier: Box<dyn Detector>,
        mailbox: WorkerMailbox,
        cancel: CancellationToken,
        poll_interval: Duration,
    ) -> Result<Self> {
        if identifier.kind() != DetectorKind::FaceIdentification {
            return Err(anyhow!(
                "detector '{}' is not a face identifier ({:?})",
                identifier.name(),
                identifier.kind()
            ));
        }
        let counters = Arc::new(WorkerCounters::default());
        let thread_counters = counters.clone();
        let thread_cancel = cancel.clone();
        let join = std::thread::Builder::new()
            .name("face-identify".to_string())
            .spawn(move || {
                run_worker(
                    identifier,
                    mailbox,
                    thread_cancel,
                    poll_interval,
                    &thread_counters,
                )
            })
            .map_err(|e| anyhow!("failed to spawn identification worker: {}", e))?;

        Ok(Self {
            cancel,
            join: Some(join),
            counters,
        })
    }

    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|join| !join.is_finished())
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            frames_processed: self.counters.processed.load(Ordering::Relaxed),
            results_published: self.counters.published.load(Ordering::Relaxed),
            results_dropped: self.counters.dropped.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Cancel and wait up to `timeout` for the thread to exit.
    ///
    /// A thread still busy at the deadline is detached so shutdown never
    /// hangs. Subsequent calls return `AlreadyStopped`.
    pub fn stop(&mut self, timeout: Duration) -> JoinOutcome {
        self.cancel.cancel();
        let Some(join) = self.join.take() else {
            return JoinOutcome::AlreadyStopped;
        };
        let deadline = Instant::now() + timeout;
        while !join.is_finished() {
            if Instant::now() >= deadline {
                return JoinOutcome::TimedOut;
            }
            std::thread::sleep(JOIN_POLL);
        }
        match join.join() {
            Ok(()) => JoinOutcome::Joined,
            Err(_) => JoinOutcome::Panicked,
        }
    }
}

fn run_worker(
    mut identifier: Box<dyn Detector>,
    mailbox: WorkerMailbox,
    cancel: CancellationToken,
    poll_interval: Duration,
    counters: &WorkerCounters,
) {
    log::info!("identification worker started ({})", identifier.name());
    if let Err(err) = identifier.warm_up() {
        log::warn!("identification warm-up failed: {}", err);
    }

    while !cancel.is_cancelled() {
        let frame = match mailbox.wait_for_frame(poll_interval) {
            Inbox::Frame(frame) => frame,
            Inbox::Idle => continue,
            Inbox::Closed => {
                log::debug!("frame handoff closed");
                break;
            }
        };

        let result = match detect_in_frame_space(identifier.as_mut(), &frame) {
            Ok(result) => result,
            Err(err) => {
                counters.failures.fetch_add(1, Ordering::Relaxed);
                log::warn!("face identification error: {}", err);
                continue;
            }
        };
        counters.processed.fetch_add(1, Ordering::Relaxed);

        let faces = result.len();
        match mailbox.publish(result) {
            Publish::Published => {
                counters.published.fetch_add(1, Ordering::Relaxed);
                if faces > 0 {
                    log::debug!("identification found {} faces", faces);
                }
            }
            Publish::Dropped => {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                log::debug!("previous identification result unconsumed; dropped newest");
            }
            Publish::Closed => break,
        }
    }
    log::info!("identification worker stopped");
}
