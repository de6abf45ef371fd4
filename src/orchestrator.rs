//! Dual-cadence detection orchestration.
//!
//! Runs on the display thread. Each frame the orchestrator may run the object
//! detector synchronously, may hand a frame copy to the identification worker,
//! and always polls for the worker's latest result. Every handoff operation
//! here is non-blocking.

use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::catalog::ClassCatalog;
use crate::control::DetectorToggles;
use crate::detect::{detect_in_frame_space, DetectionResult, Detector, DetectorKind};
use crate::frame::Frame;
use crate::fusion::fuse;
use crate::handoff::{FrameHandoff, Submission};

pub const DEFAULT_OBJECT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_FACE_INTERVAL: Duration = Duration::from_secs(2);

/// Minimum spacing between object detector runs and between face submissions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cadence {
    pub object_interval: Duration,
    pub face_interval: Duration,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            object_interval: DEFAULT_OBJECT_INTERVAL,
            face_interval: DEFAULT_FACE_INTERVAL,
        }
    }
}

/// Last known results and when each detector last fired. `None` timestamps
/// mean "never", so the first eligible frame always fires.
#[derive(Clone, Debug, Default)]
pub struct DetectionState {
    pub last_object: DetectionResult,
    pub last_face: DetectionResult,
    pub last_object_at: Option<Instant>,
    pub last_face_submit_at: Option<Instant>,
}

/// Per-orchestrator counters, reported in the periodic health line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OrchestratorStats {
    pub frames: u64,
    pub object_runs: u64,
    pub object_failures: u64,
    pub face_submissions: u64,
    pub face_results: u64,
}

pub struct Orchestrator {
    object_detector: Box<dyn Detector>,
    handoff: FrameHandoff,
    toggles: Arc<DetectorToggles>,
    cadence: Cadence,
    object_class_count: usize,
    state: DetectionState,
    stats: OrchestratorStats,
    worker_gone: bool,
}

impl Orchestrator {
    pub fn new(
        object_detector: Box<dyn Detector>,
        handoff: FrameHandoff,
        toggles: Arc<DetectorToggles>,
        cadence: Cadence,
        catalog: &ClassCatalog,
    ) -> Result<Self> {
        if object_detector.kind() != DetectorKind::Object {
            return Err(anyhow!(
                "detector '{}' is not an object detector ({:?})",
                object_detector.name(),
                object_detector.kind()
            ));
        }
        Ok(Self {
            object_detector,
            handoff,
            toggles,
            cadence,
            object_class_count: catalog.object_count(),
            state: DetectionState::default(),
            stats: OrchestratorStats::default(),
            worker_gone: false,
        })
    }

    pub fn state(&self) -> &DetectionState {
        &self.state
    }

    pub fn stats(&self) -> OrchestratorStats {
        self.stats
    }

    /// Process one frame captured at `now` and return the fused result.
    pub fn process_frame(&mut self, frame: &Frame, now: Instant) -> DetectionResult {
        self.stats.frames += 1;
        self.refresh_objects(frame, now);
        self.schedule_identification(frame, now);
        self.poll_identification();
        fuse(
            &self.state.last_object,
            &self.state.last_face,
            self.object_class_count,
        )
    }

    fn refresh_objects(&mut self, frame: &Frame, now: Instant) {
        if !self.toggles.object_enabled() {
            self.state.last_object.clear();
            return;
        }
        if !is_due(self.state.last_object_at, now, self.cadence.object_interval) {
            return;
        }
        self.state.last_object_at = Some(now);
        self.stats.object_runs += 1;
        match detect_in_frame_space(self.object_detector.as_mut(), frame) {
            Ok(result) => self.state.last_object = result,
            Err(err) => {
                self.stats.object_failures += 1;
                log::warn!("object detection error: {}", err);
                self.state.last_object.clear();
            }
        }
    }

    fn schedule_identification(&mut self, frame: &Frame, now: Instant) {
        if !self.toggles.face_enabled() {
            self.state.last_face.clear();
            return;
        }
        if !is_due(self.state.last_face_submit_at, now, self.cadence.face_interval) {
            return;
        }
        match self.handoff.try_submit(frame) {
            Submission::Accepted => {
                self.state.last_face_submit_at = Some(now);
                self.stats.face_submissions += 1;
            }
            Submission::SlotBusy => {}
            Submission::Disconnected => {
                if !self.worker_gone {
                    log::warn!("identification worker is gone; face results will not update");
                    self.worker_gone = true;
                }
            }
        }
    }

    fn poll_identification(&mut self) {
        let Some(result) = self.handoff.try_take_result() else {
            return;
        };
        // A result that lands after face identification was disabled is stale.
        if self.toggles.face_enabled() {
            self.stats.face_results += 1;
            self.state.last_face = result;
        }
    }
}

fn is_due(last: Option<Instant>, now: Instant, interval: Duration) -> bool {
    last.map_or(true, |at| now.saturating_duration_since(at) >= interval)
}
