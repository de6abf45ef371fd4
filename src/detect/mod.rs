mod backend;
mod backends;
mod result;

pub use backend::{DetectError, Detector, DetectorKind, UNMATCHED_IDENTITY};
pub use backends::{StubFaceIdentifier, StubObjectDetector};
#[cfg(feature = "backend-tract")]
pub use backends::{TractObjectConfig, TractObjectDetector};
pub use result::{BoundingBox, Detection, DetectionResult};

use crate::frame::Frame;

/// Run `detector` on `frame` and return boxes in `frame`'s own coordinates.
///
/// When the detector declares an input size different from the frame, the
/// frame is resized first and every box is mapped back with independent
/// horizontal and vertical factors (`original / processing`).
pub fn detect_in_frame_space<D: Detector + ?Sized>(
    detector: &mut D,
    frame: &Frame,
) -> Result<DetectionResult, DetectError> {
    let original = frame.dimensions();
    match detector.input_size() {
        Some(processing) if processing != original => {
            let resized = frame
                .resized(processing.0, processing.1)
                .map_err(|e| DetectError::capability(detector.name(), e))?;
            let result = detector.detect(&resized)?;
            Ok(result.rescaled(processing, original))
        }
        _ => detector.detect(frame),
    }
}
