//! Lifecycle control: cancellation, detector enablement and shutdown.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::annotate::AnnotationSink;
use crate::ingest::FrameSource;
use crate::worker::{JoinOutcome, WorkerHandle};

/// Cooperative cancellation flag shared with the identification worker.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Enablement flags for the two detectors.
///
/// Written only through the setters below, read by the orchestrator once per
/// frame.
#[derive(Debug)]
pub struct DetectorToggles {
    object: AtomicBool,
    face: AtomicBool,
}

impl DetectorToggles {
    pub fn new(object_enabled: bool, face_enabled: bool) -> Self {
        Self {
            object: AtomicBool::new(object_enabled),
            face: AtomicBool::new(face_enabled),
        }
    }

    pub fn object_enabled(&self) -> bool {
        self.object.load(Ordering::SeqCst)
    }

    pub fn face_enabled(&self) -> bool {
        self.face.load(Ordering::SeqCst)
    }

    pub fn set_object_enabled(&self, enabled: bool) {
        self.object.store(enabled, Ordering::SeqCst);
    }

    pub fn set_face_enabled(&self, enabled: bool) {
        self.face.store(enabled, Ordering::SeqCst);
    }

    /// Flip object detection; returns the new state.
    pub fn toggle_object(&self) -> bool {
        !self.object.fetch_xor(true, Ordering::SeqCst)
    }

    /// Flip face identification; returns the new state.
    pub fn toggle_face(&self) -> bool {
        !self.face.fetch_xor(true, Ordering::SeqCst)
    }
}

impl Default for DetectorToggles {
    fn default() -> Self {
        Self::new(true, true)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    ShuttingDown,
    Stopped,
}

/// Discrete external inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlEvent {
    ToggleObject,
    ToggleFace,
    SwitchCamera,
    Quit,
    /// OS termination signal (SIGINT/SIGTERM).
    Terminate,
}

impl ControlEvent {
    /// Keyboard mapping: `q` quit, `o` object, `f` face, `c` camera.
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'q' => Some(ControlEvent::Quit),
            'o' => Some(ControlEvent::ToggleObject),
            'f' => Some(ControlEvent::ToggleFace),
            'c' => Some(ControlEvent::SwitchCamera),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShutdownReason {
    Quit,
    Signal,
    FrameLimit,
    /// Cleanup was requested without a prior shutdown event.
    Teardown,
    Fatal(String),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Quit => write!(f, "quit requested"),
            ShutdownReason::Signal => write!(f, "termination signal"),
            ShutdownReason::FrameLimit => write!(f, "frame limit reached"),
            ShutdownReason::Teardown => write!(f, "teardown without shutdown request"),
            ShutdownReason::Fatal(reason) => write!(f, "fatal error: {}", reason),
        }
    }
}

/// What the run loop must do after an event was applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Directive {
    Continue,
    SwitchCamera,
    Shutdown,
}

/// Running → ShuttingDown → Stopped.
#[derive(Debug)]
pub struct Lifecycle {
    state: LifecycleState,
    toggles: Arc<DetectorToggles>,
    cancel: CancellationToken,
    reason: Option<ShutdownReason>,
}

impl Lifecycle {
    pub fn new(toggles: Arc<DetectorToggles>, cancel: CancellationToken) -> Self {
        Self {
            state: LifecycleState::Running,
            toggles,
            cancel,
            reason: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LifecycleState::Running
    }

    pub fn shutdown_reason(&self) -> Option<&ShutdownReason> {
        self.reason.as_ref()
    }

    pub fn toggles(&self) -> &Arc<DetectorToggles> {
        &self.toggles
    }

    /// Apply one control event. Toggles only take effect while running.
    pub fn handle(&mut self, event: ControlEvent) -> Directive {
        match event {
            ControlEvent::Quit => {
                self.begin_shutdown(ShutdownReason::Quit);
                Directive::Shutdown
            }
            ControlEvent::Terminate => {
                self.begin_shutdown(ShutdownReason::Signal);
                Directive::Shutdown
            }
            _ if !self.is_running() => {
                log::warn!("ignoring {:?}: lifecycle is {:?}", event, self.state);
                Directive::Continue
            }
            ControlEvent::ToggleObject => {
                let enabled = self.toggles.toggle_object();
                log::info!("object detection {}", on_off(enabled));
                Directive::Continue
            }
            ControlEvent::ToggleFace => {
                let enabled = self.toggles.toggle_face();
                log::info!("face identification {}", on_off(enabled));
                Directive::Continue
            }
            ControlEvent::SwitchCamera => Directive::SwitchCamera,
        }
    }

    /// Leave `Running`. Later calls keep the first reason.
    pub fn begin_shutdown(&mut self, reason: ShutdownReason) {
        if self.state != LifecycleState::Running {
            return;
        }
        log::info!("shutting down: {}", reason);
        self.state = LifecycleState::ShuttingDown;
        self.reason = Some(reason);
    }

    /// Cancel the worker, join it with a bounded timeout, release the source
    /// and the sink, then mark the lifecycle stopped. Safe to call repeatedly.
    pub fn finish(
        &mut self,
        worker: &mut WorkerHandle,
        source: &mut dyn FrameSource,
        sink: &mut dyn AnnotationSink,
        join_timeout: Duration,
    ) {
        if self.state == LifecycleState::Stopped {
            return;
        }
        if self.state == LifecycleState::Running {
            self.begin_shutdown(ShutdownReason::Teardown);
        }

        self.cancel.cancel();
        match worker.stop(join_timeout) {
            JoinOutcome::Joined | JoinOutcome::AlreadyStopped => {}
            JoinOutcome::TimedOut => log::warn!(
                "identification worker did not stop within {:?}; detaching",
                join_timeout
            ),
            JoinOutcome::Panicked => log::error!("identification worker panicked"),
        }
        source.release();
        sink.close();

        self.state = LifecycleState::Stopped;
        log::info!("cleanup complete");
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}
