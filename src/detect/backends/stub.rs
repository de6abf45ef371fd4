use crate::detect::backend::{DetectError, Detector, DetectorKind, UNMATCHED_IDENTITY};
use crate::detect::result::{BoundingBox, DetectionResult};
use crate::frame::Frame;

/// Stub object detector for testing and model-less runs.
///
/// Reports one box covering the centre quarter of the frame, cycling through
/// the object classes on successive calls.
pub struct StubObjectDetector {
    class_count: usize,
    input_size: Option<(u32, u32)>,
    calls: u64,
}

impl StubObjectDetector {
    pub fn new(class_count: usize) -> Self {
        Self {
            class_count,
            input_size: None,
            calls: 0,
        }
    }

    /// Ask the caller to resize frames to `width`x`height` before detection.
    pub fn with_input_size(mut self, width: u32, height: u32) -> Self {
        self.input_size = Some((width, height));
        self
    }
}

impl Detector for StubObjectDetector {
    fn name(&self) -> &'static str {
        "stub-object"
    }

    fn kind(&self) -> DetectorKind {
        DetectorKind::Object
    }

    fn input_size(&self) -> Option<(u32, u32)> {
        self.input_size
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, DetectError> {
        self.calls += 1;
        let mut result = DetectionResult::new();
        if self.class_count == 0 {
            return Ok(result);
        }
        let (w, h) = (frame.width() as i32, frame.height() as i32);
        let class_id = ((self.calls - 1) % self.class_count as u64) as i32;
        result.push(BoundingBox::new(w / 4, h / 4, w / 2, h / 2), class_id, 0.9);
        Ok(result)
    }
}

/// Stub face identifier.
///
/// Locates one face in the upper-left region of the frame and labels it by
/// cycling through "unmatched" and each known identity in turn.
pub struct StubFaceIdentifier {
    identity_count: usize,
    input_size: Option<(u32, u32)>,
    calls: u64,
}

impl StubFaceIdentifier {
    pub fn new(identity_count: usize) -> Self {
        Self {
            identity_count,
            input_size: None,
            calls: 0,
        }
    }

    pub fn with_input_size(mut self, width: u32, height: u32) -> Self {
        self.input_size = Some((width, height));
        self
    }
}

impl Detector for StubFaceIdentifier {
    fn name(&self) -> &'static str {
        "stub-face"
    }

    fn kind(&self) -> DetectorKind {
        DetectorKind::FaceIdentification
    }

    fn input_size(&self) -> Option<(u32, u32)> {
        self.input_size
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, DetectError> {
        let slot = self.calls % (self.identity_count as u64 + 1);
        self.calls += 1;
        let (class_id, confidence) = if slot == 0 {
            (UNMATCHED_IDENTITY, 0.5)
        } else {
            (slot as i32 - 1, 0.99)
        };
        let (w, h) = (frame.width() as i32, frame.height() as i32);
        let mut result = DetectionResult::new();
        result.push(BoundingBox::new(w / 8, h / 8, w / 5, h / 4), class_id, confidence);
        Ok(result)
    }
}
