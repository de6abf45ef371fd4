//! dualsight
//!
//! Real-time fusion of two independently-cadenced detectors over a live camera
//! stream.
//!
//! # Architecture
//!
//! Two threads take part in detection:
//!
//! 1. **Display thread**: owns the frame source, the `Orchestrator` and the
//!    annotation sink. Runs the object detector synchronously on its own
//!    cadence and never blocks on the face pipeline.
//! 2. **Identification worker**: drains a single-slot frame mailbox, runs the
//!    face identifier and offers the result back through a single-slot result
//!    mailbox. Stale work is dropped, never queued.
//!
//! Each frame, the orchestrator fuses the latest object result with the latest
//! face result into one `DetectionResult` over a shared `ClassCatalog`
//! numbering (identity classes follow object classes).
//!
//! # Module Structure
//!
//! - `frame`: owned RGB frames, resizing
//! - `ingest`: camera sources (synthetic, V4L2)
//! - `detect`: the `Detector` capability, results, backends
//! - `handoff`: single-slot mailboxes
//! - `worker`: background identification thread
//! - `orchestrator`, `fusion`: per-frame scheduling and merging
//! - `control`: cancellation, enablement toggles, lifecycle
//! - `app`: the display-thread run loop

pub mod annotate;
pub mod app;
pub mod catalog;
pub mod config;
pub mod control;
pub mod detect;
pub mod frame;
pub mod fusion;
pub mod handoff;
pub mod ingest;
pub mod orchestrator;
pub mod worker;

pub use annotate::{annotations, Annotation, AnnotationSink, LogSink};
pub use app::{Session, SessionOptions, SessionSummary};
pub use catalog::ClassCatalog;
pub use config::AppConfig;
pub use control::{
    CancellationToken, ControlEvent, DetectorToggles, Lifecycle, LifecycleState, ShutdownReason,
};
pub use detect::{
    detect_in_frame_space, BoundingBox, DetectError, Detection, DetectionResult, Detector,
    DetectorKind, StubFaceIdentifier, StubObjectDetector, UNMATCHED_IDENTITY,
};
#[cfg(feature = "backend-tract")]
pub use detect::{TractObjectConfig, TractObjectDetector};
pub use frame::Frame;
pub use fusion::fuse;
pub use handoff::{handoff_channel, FrameHandoff, Submission, WorkerMailbox};
pub use ingest::{CameraConfig, CameraSource, FrameSource};
pub use orchestrator::{Cadence, DetectionState, Orchestrator};
pub use worker::{JoinOutcome, WorkerHandle, WorkerStats};
