use std::fmt::Display;

use crate::detect::result::DetectionResult;
use crate::frame::Frame;

/// The two capability families the pipeline consumes.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorKind {
    /// General objects. Class indices address the object part of the catalog.
    Object,
    /// Face location + identity match. Class indices address the identity part
    /// of the catalog; `UNMATCHED_IDENTITY` marks a located but unknown face.
    FaceIdentification,
}

/// Class index a face identifier reports for a face it located but could not
/// match to a known identity.
pub const UNMATCHED_IDENTITY: i32 = -1;

/// Per-frame capability failure.
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    /// The capability itself failed on this frame.
    #[error("{detector} failed: {reason}")]
    Capability {
        detector: &'static str,
        reason: String,
    },
    /// The capability returned sequences of different lengths.
    #[error(
        "inconsistent detection result: {boxes} boxes, {class_ids} class ids, {confidences} confidences"
    )]
    Inconsistent {
        boxes: usize,
        class_ids: usize,
        confidences: usize,
    },
}

impl DetectError {
    pub fn capability(detector: &'static str, reason: impl Display) -> Self {
        DetectError::Capability {
            detector,
            reason: reason.to_string(),
        }
    }
}

/// Detection capability.
///
/// Implementations receive a frame already resized to `input_size()` (when they
/// declare one) and report boxes in that frame's coordinates. Mapping back to
/// the capture resolution is done by the caller.
pub trait Detector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    fn kind(&self) -> DetectorKind;

    /// Preferred processing resolution, if the capability has one.
    fn input_size(&self) -> Option<(u32, u32)> {
        None
    }

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, DetectError>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<(), DetectError> {
        Ok(())
    }
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn kind(&self) -> DetectorKind {
        (**self).kind()
    }

    fn input_size(&self) -> Option<(u32, u32)> {
        (**self).input_size()
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, DetectError> {
        (**self).detect(frame)
    }

    fn warm_up(&mut self) -> Result<(), DetectError> {
        (**self).warm_up()
    }
}
