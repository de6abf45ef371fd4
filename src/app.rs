//! Display-thread run loop.

use anyhow::{anyhow, Result};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::annotate::AnnotationSink;
use crate::catalog::ClassCatalog;
use crate::control::{
    CancellationToken, ControlEvent, DetectorToggles, Directive, Lifecycle, LifecycleState,
    ShutdownReason,
};
use crate::detect::Detector;
use crate::handoff::handoff_channel;
use crate::ingest::FrameSource;
use crate::orchestrator::{Cadence, Orchestrator, OrchestratorStats};
use crate::worker::{WorkerHandle, WorkerStats, DEFAULT_POLL_INTERVAL};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub cadence: Cadence,
    pub worker_poll: Duration,
    pub join_timeout: Duration,
    /// Stop after this many frames (demos, tests).
    pub max_frames: Option<u64>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            cadence: Cadence::default(),
            worker_poll: DEFAULT_POLL_INTERVAL,
            join_timeout: Duration::from_secs(1),
            max_frames: None,
        }
    }
}

/// How a run ended.
#[derive(Clone, Debug)]
pub struct SessionSummary {
    pub frames: u64,
    pub reason: ShutdownReason,
    pub orchestrator: OrchestratorStats,
    pub worker: WorkerStats,
    /// Frames captured while the source reported itself unhealthy.
    pub unhealthy_frames: u64,
    pub final_state: LifecycleState,
}

/// Orchestrator, identification worker and lifecycle, wired together.
pub struct Session {
    orchestrator: Orchestrator,
    worker: WorkerHandle,
    lifecycle: Lifecycle,
    options: SessionOptions,
    unhealthy_frames: u64,
}

impl Session {
    /// Spawn the identification worker and build the orchestrator around the
    /// other end of the handoff.
    pub fn start(
        object_detector: Box<dyn Detector>,
        face_identifier: Box<dyn Detector>,
        catalog: &ClassCatalog,
        toggles: Arc<DetectorToggles>,
        options: SessionOptions,
    ) -> Result<Self> {
        let (handoff, mailbox) = handoff_channel();
        let cancel = CancellationToken::new();
        let orchestrator = Orchestrator::new(
            object_detector,
            handoff,
            toggles.clone(),
            options.cadence,
            catalog,
        )?;
        let worker =
            WorkerHandle::spawn(face_identifier, mailbox, cancel.clone(), options.worker_poll)?;
        Ok(Self {
            orchestrator,
            worker,
            lifecycle: Lifecycle::new(toggles, cancel),
            options,
            unhealthy_frames: 0,
        })
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Run until a shutdown event, a resource failure or the frame limit.
    ///
    /// Cleanup always runs. Resource failures are returned as errors after
    /// cleanup; signalled shutdowns return a summary.
    pub fn run(
        mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn AnnotationSink,
        events: &Receiver<ControlEvent>,
    ) -> Result<SessionSummary> {
        log::info!(
            "session running on {} (object every {:?}, faces every {:?})",
            source.describe(),
            self.options.cadence.object_interval,
            self.options.cadence.face_interval
        );
        let outcome = self.drive(source, sink, events);
        if let Err(err) = &outcome {
            self.lifecycle
                .begin_shutdown(ShutdownReason::Fatal(err.to_string()));
        }
        self.lifecycle
            .finish(&mut self.worker, source, sink, self.options.join_timeout);

        outcome?;
        let orchestrator = self.orchestrator.stats();
        Ok(SessionSummary {
            frames: orchestrator.frames,
            reason: self
                .lifecycle
                .shutdown_reason()
                .cloned()
                .unwrap_or(ShutdownReason::Teardown),
            orchestrator,
            worker: self.worker.stats(),
            unhealthy_frames: self.unhealthy_frames,
            final_state: self.lifecycle.state(),
        })
    }

    fn drive(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn AnnotationSink,
        events: &Receiver<ControlEvent>,
    ) -> Result<()> {
        let mut last_health = Instant::now();
        let mut frames_since_health = 0u64;
        let mut source_healthy = true;

        while self.lifecycle.is_running() {
            while let Ok(event) = events.try_recv() {
                if self.lifecycle.handle(event) == Directive::SwitchCamera {
                    // A source left closed by a failed switch fails on the next frame.
                    if let Err(err) = source.switch_device() {
                        log::warn!("camera switch failed: {}", err);
                    }
                }
            }
            if !self.lifecycle.is_running() {
                break;
            }

            let frame = source
                .next_frame()
                .map_err(|e| anyhow!("{} stopped producing frames: {}", source.describe(), e))?;
            let healthy = source.is_healthy();
            if !healthy {
                self.unhealthy_frames += 1;
            }
            if healthy != source_healthy {
                if healthy {
                    log::info!("{} recovered", source.describe());
                } else {
                    log::warn!("{} reports unhealthy", source.describe());
                }
                source_healthy = healthy;
            }
            let fused = self.orchestrator.process_frame(&frame, Instant::now());
            sink.present(&frame, &fused)?;
            frames_since_health += 1;

            if last_health.elapsed() >= HEALTH_LOG_INTERVAL {
                let stats = self.orchestrator.stats();
                let worker = self.worker.stats();
                log::info!(
                    "health: {:.1} fps, source_healthy={} frames={} object_runs={} face_submissions={} face_results={} worker_dropped={} worker_failures={}",
                    frames_since_health as f64 / last_health.elapsed().as_secs_f64(),
                    source_healthy,
                    stats.frames,
                    stats.object_runs,
                    stats.face_submissions,
                    stats.face_results,
                    worker.results_dropped,
                    worker.failures
                );
                last_health = Instant::now();
                frames_since_health = 0;
            }

            if self
                .options
                .max_frames
                .is_some_and(|limit| self.orchestrator.stats().frames >= limit)
            {
                self.lifecycle.begin_shutdown(ShutdownReason::FrameLimit);
            }
        }
        Ok(())
    }
}
