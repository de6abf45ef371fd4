#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectError, Detector, DetectorKind};
use crate::detect::result::{BoundingBox, DetectionResult};
use crate::frame::Frame;

/// Decoding parameters for a YOLO-style ONNX object model.
#[derive(Clone, Debug)]
pub struct TractObjectConfig {
    pub input_width: u32,
    pub input_height: u32,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
}

impl Default for TractObjectConfig {
    fn default() -> Self {
        Self {
            input_width: 416,
            input_height: 416,
            confidence_threshold: 0.5,
            nms_threshold: 0.4,
        }
    }
}

/// Tract-based object detector for YOLO-style ONNX models.
///
/// Expects a single output of shape `[1, N, 5 + classes]` with rows
/// `[cx, cy, w, h, objectness, class scores...]` in input-pixel units.
pub struct TractObjectDetector {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    config: TractObjectConfig,
}

impl TractObjectDetector {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, config: TractObjectConfig) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(
                        1,
                        3,
                        config.input_height as usize,
                        config.input_width as usize
                    ),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self { model, config })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        if frame.dimensions() != (self.config.input_width, self.config.input_height) {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                frame.width(),
                frame.height(),
                self.config.input_width,
                self.config.input_height
            ));
        }
        let pixels = frame.pixels();
        let width = frame.width() as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, frame.height() as usize, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );
        Ok(input.into_tensor())
    }

    fn decode(&self, outputs: TVec<TValue>) -> Result<Vec<Candidate>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        let row_len = *shape.last().ok_or_else(|| anyhow!("model output has no shape"))?;
        if row_len < 6 {
            return Err(anyhow!("model output rows too short ({})", row_len));
        }
        let flat: Vec<f32> = view.iter().copied().collect();

        let mut candidates = Vec::new();
        for row in flat.chunks_exact(row_len) {
            let objectness = row[4];
            let Some((class_id, score)) = row[5..]
                .iter()
                .copied()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(&b.1))
            else {
                continue;
            };
            let confidence = objectness * score;
            if !confidence.is_finite() || confidence <= self.config.confidence_threshold {
                continue;
            }
            let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
            candidates.push(Candidate {
                bbox: BoundingBox::new(
                    (cx - w / 2.0) as i32,
                    (cy - h / 2.0) as i32,
                    w as i32,
                    h as i32,
                ),
                class_id: class_id as i32,
                confidence,
            });
        }
        Ok(candidates)
    }
}

struct Candidate {
    bbox: BoundingBox,
    class_id: i32,
    confidence: f32,
}

/// Greedy per-class non-max suppression. Returns indices to keep, highest
/// confidence first.
fn non_max_suppression(candidates: &[Candidate], iou_threshold: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| candidates[b].confidence.total_cmp(&candidates[a].confidence));

    let mut keep: Vec<usize> = Vec::new();
    for idx in order {
        let candidate = &candidates[idx];
        let suppressed = keep.iter().any(|&kept| {
            let other = &candidates[kept];
            other.class_id == candidate.class_id
                && other.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            keep.push(idx);
        }
    }
    keep
}

impl Detector for TractObjectDetector {
    fn name(&self) -> &'static str {
        "tract-object"
    }

    fn kind(&self) -> DetectorKind {
        DetectorKind::Object
    }

    fn input_size(&self) -> Option<(u32, u32)> {
        Some((self.config.input_width, self.config.input_height))
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, DetectError> {
        let input = self
            .build_input(frame)
            .map_err(|e| DetectError::capability(self.name(), e))?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| DetectError::capability(self.name(), format!("ONNX inference failed: {e}")))?;
        let candidates = self
            .decode(outputs)
            .map_err(|e| DetectError::capability(self.name(), e))?;

        let keep = non_max_suppression(&candidates, self.config.nms_threshold);
        let boxes = keep.iter().map(|&i| candidates[i].bbox).collect();
        let class_ids = keep.iter().map(|&i| candidates[i].class_id).collect();
        let confidences = keep.iter().map(|&i| candidates[i].confidence).collect();
        DetectionResult::from_parts(boxes, class_ids, confidences)
    }
}
