use super::backend::DetectError;

/// Axis-aligned box in pixel coordinates of a specific reference frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Map a box from a `from` (width, height) reference frame into a `to`
    /// reference frame. Each axis is scaled independently by `to / from` and
    /// truncated toward zero.
    pub fn rescale(&self, from: (u32, u32), to: (u32, u32)) -> BoundingBox {
        let sx = |v: i32| scale_axis(v, from.0, to.0);
        let sy = |v: i32| scale_axis(v, from.1, to.1);
        BoundingBox {
            x: sx(self.x),
            y: sy(self.y),
            width: sx(self.width),
            height: sy(self.height),
        }
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    /// Intersection over union, 0.0 for disjoint or degenerate boxes.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x) as i64;
        let y1 = self.y.max(other.y) as i64;
        let x2 = (self.x as i64 + self.width as i64).min(other.x as i64 + other.width as i64);
        let y2 = (self.y as i64 + self.height as i64).min(other.y as i64 + other.height as i64);
        let inter = (x2 - x1).max(0) * (y2 - y1).max(0);
        let union = self.area() + other.area() - inter;
        if union <= 0 {
            0.0
        } else {
            inter as f32 / union as f32
        }
    }
}

fn scale_axis(value: i32, from: u32, to: u32) -> i32 {
    if from == 0 {
        return value;
    }
    (value as i64 * to as i64 / from as i64) as i32
}

/// One detected instance, borrowed out of a `DetectionResult` row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_id: i32,
    pub confidence: f32,
}

/// Positionally aligned boxes, class indices and confidences.
///
/// The three sequences are private and only grow together, so row `i` always
/// describes one instance. An empty result means "no detections".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionResult {
    boxes: Vec<BoundingBox>,
    class_ids: Vec<i32>,
    confidences: Vec<f32>,
}

impl DetectionResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from three parallel sequences produced by a capability.
    ///
    /// Mismatched lengths are reported as `DetectError::Inconsistent` rather
    /// than truncated.
    pub fn from_parts(
        boxes: Vec<BoundingBox>,
        class_ids: Vec<i32>,
        confidences: Vec<f32>,
    ) -> Result<Self, DetectError> {
        if boxes.len() != class_ids.len() || boxes.len() != confidences.len() {
            return Err(DetectError::Inconsistent {
                boxes: boxes.len(),
                class_ids: class_ids.len(),
                confidences: confidences.len(),
            });
        }
        Ok(Self {
            boxes,
            class_ids,
            confidences,
        })
    }

    pub fn push(&mut self, bbox: BoundingBox, class_id: i32, confidence: f32) {
        self.boxes.push(bbox);
        self.class_ids.push(class_id);
        self.confidences.push(confidence);
    }

    pub fn clear(&mut self) {
        self.boxes.clear();
        self.class_ids.clear();
        self.confidences.clear();
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    pub fn class_ids(&self) -> &[i32] {
        &self.class_ids
    }

    pub fn confidences(&self) -> &[f32] {
        &self.confidences
    }

    pub fn get(&self, index: usize) -> Option<Detection> {
        Some(Detection {
            bbox: *self.boxes.get(index)?,
            class_id: *self.class_ids.get(index)?,
            confidence: *self.confidences.get(index)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Detection> + '_ {
        self.boxes
            .iter()
            .zip(&self.class_ids)
            .zip(&self.confidences)
            .map(|((bbox, class_id), confidence)| Detection {
                bbox: *bbox,
                class_id: *class_id,
                confidence: *confidence,
            })
    }

    /// Copy of this result with every box mapped from `from` into `to`.
    pub fn rescaled(&self, from: (u32, u32), to: (u32, u32)) -> DetectionResult {
        if from == to {
            return self.clone();
        }
        DetectionResult {
            boxes: self.boxes.iter().map(|b| b.rescale(from, to)).collect(),
            class_ids: self.class_ids.clone(),
            confidences: self.confidences.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescale_truncates_each_axis_independently() {
        let bbox = BoundingBox::new(10, 20, 33, 41);
        // 416x416 processing frame back to 1280x720.
        let scaled = bbox.rescale((416, 416), (1280, 720));
        assert_eq!(scaled.x, 10 * 1280 / 416);
        assert_eq!(scaled.y, 20 * 720 / 416);
        assert_eq!(scaled.width, 33 * 1280 / 416);
        assert_eq!(scaled.height, 41 * 720 / 416);
        assert_eq!(scaled, BoundingBox::new(30, 34, 101, 70));
    }

    #[test]
    fn rescale_is_identity_for_equal_frames() {
        let bbox = BoundingBox::new(-4, 7, 100, 50);
        assert_eq!(bbox.rescale((640, 480), (640, 480)), bbox);
    }

    #[test]
    fn from_parts_rejects_mismatched_lengths() {
        let err = DetectionResult::from_parts(
            vec![BoundingBox::new(0, 0, 1, 1), BoundingBox::new(1, 1, 1, 1)],
            vec![0],
            vec![0.9, 0.8],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DetectError::Inconsistent {
                boxes: 2,
                class_ids: 1,
                confidences: 2
            }
        ));
    }

    #[test]
    fn push_and_iter_stay_aligned() {
        let mut result = DetectionResult::new();
        result.push(BoundingBox::new(1, 2, 3, 4), 5, 0.5);
        result.push(BoundingBox::new(6, 7, 8, 9), -1, 0.25);

        let rows: Vec<Detection> = result.iter().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].class_id, -1);
        assert_eq!(result.get(0).map(|d| d.bbox.width), Some(3));
        assert!(result.get(2).is_none());

        result.clear();
        assert!(result.is_empty());
        assert!(result.class_ids().is_empty() && result.confidences().is_empty());
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(20, 20, 10, 10);
        assert_eq!(a.iou(&a), 1.0);
        assert_eq!(a.iou(&b), 0.0);
    }
}
