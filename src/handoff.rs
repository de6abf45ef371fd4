//! Single-slot mailboxes between the orchestrator and the identification worker.
//!
//! Two capacity-1 channels: frames flow to the worker, results flow back. The
//! orchestrator is the only writer of the frame slot and the only reader of the
//! result slot; the worker is the opposite. Because each slot has exactly one
//! writer, "check full, then write" cannot race with another writer, and a
//! full slot means the write is dropped rather than queued or blocked on.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use std::time::Duration;

use crate::detect::DetectionResult;
use crate::frame::Frame;

/// Build a connected pair of mailbox ends.
pub fn handoff_channel() -> (FrameHandoff, WorkerMailbox) {
    let (frame_tx, frame_rx) = bounded(1);
    let (result_tx, result_rx) = bounded(1);
    (
        FrameHandoff {
            frames: frame_tx,
            results: result_rx,
        },
        WorkerMailbox {
            frames: frame_rx,
            results: result_tx,
        },
    )
}

/// Outcome of offering a frame to the worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submission {
    /// The slot was empty; a copy of the frame is now pending.
    Accepted,
    /// A previous frame is still pending. Nothing was copied.
    SlotBusy,
    /// The worker end is gone.
    Disconnected,
}

/// Orchestrator end. Every operation is non-blocking.
pub struct FrameHandoff {
    frames: Sender<Frame>,
    results: Receiver<DetectionResult>,
}

impl FrameHandoff {
    /// True while a submitted frame has not yet been taken by the worker.
    pub fn frame_pending(&self) -> bool {
        self.frames.is_full()
    }

    /// Submit a deep copy of `frame` if the frame slot is empty.
    pub fn try_submit(&self, frame: &Frame) -> Submission {
        if self.frames.is_full() {
            return Submission::SlotBusy;
        }
        match self.frames.try_send(frame.clone()) {
            Ok(()) => Submission::Accepted,
            Err(TrySendError::Full(_)) => Submission::SlotBusy,
            Err(TrySendError::Disconnected(_)) => Submission::Disconnected,
        }
    }

    /// Take the pending result, if any.
    pub fn try_take_result(&self) -> Option<DetectionResult> {
        if self.results.is_empty() {
            return None;
        }
        match self.results.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// What the worker observed while waiting for input.
#[derive(Debug)]
pub enum Inbox {
    Frame(Frame),
    /// Nothing arrived within the timeout.
    Idle,
    /// The orchestrator end was dropped.
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Publish {
    Published,
    /// The orchestrator has not consumed the previous result; this one is dropped.
    Dropped,
    Closed,
}

/// Worker end.
pub struct WorkerMailbox {
    frames: Receiver<Frame>,
    results: Sender<DetectionResult>,
}

impl WorkerMailbox {
    /// Wait up to `timeout` for a frame. This is the only blocking call on
    /// either side of the handoff.
    pub fn wait_for_frame(&self, timeout: Duration) -> Inbox {
        match self.frames.recv_timeout(timeout) {
            Ok(frame) => Inbox::Frame(frame),
            Err(RecvTimeoutError::Timeout) => Inbox::Idle,
            Err(RecvTimeoutError::Disconnected) => Inbox::Closed,
        }
    }

    /// Publish `result` if the result slot is empty.
    pub fn publish(&self, result: DetectionResult) -> Publish {
        if self.results.is_full() {
            return Publish::Dropped;
        }
        match self.results.try_send(result) {
            Ok(()) => Publish::Published,
            Err(TrySendError::Full(_)) => Publish::Dropped,
            Err(TrySendError::Disconnected(_)) => Publish::Closed,
        }
    }
}
