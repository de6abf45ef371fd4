use crate::detect::DetectionResult;

/// Merge object detections and face identifications into one result.
///
/// Object rows come first, unchanged. Face rows with a non-negative class are
/// appended in order with their class shifted by `object_class_count`; rows
/// with a negative class (unmatched faces), or whose shifted class would not
/// fit in an `i32`, are left out.
pub fn fuse(
    objects: &DetectionResult,
    faces: &DetectionResult,
    object_class_count: usize,
) -> DetectionResult {
    let mut fused = objects.clone();
    let Ok(offset) = i32::try_from(object_class_count) else {
        return fused;
    };
    for face in faces.iter().filter(|face| face.class_id >= 0) {
        // An id past the end of the numbering space cannot be labelled.
        let Some(class_id) = offset.checked_add(face.class_id) else {
            continue;
        };
        fused.push(face.bbox, class_id, face.confidence);
    }
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, UNMATCHED_IDENTITY};

    #[test]
    fn offsets_matched_faces_and_skips_unmatched() {
        let mut objects = DetectionResult::new();
        objects.push(BoundingBox::new(10, 10, 50, 50), 1, 0.8);

        let mut faces = DetectionResult::new();
        faces.push(BoundingBox::new(0, 0, 20, 20), UNMATCHED_IDENTITY, 0.5);
        faces.push(BoundingBox::new(30, 30, 20, 20), 0, 0.99);

        let fused = fuse(&objects, &faces, 3);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused.class_ids(), &[1, 3]);
        assert_eq!(fused.boxes()[1], BoundingBox::new(30, 30, 20, 20));
        assert_eq!(fused.confidences(), &[0.8, 0.99]);
    }

    #[test]
    fn oversized_face_class_is_skipped() {
        let mut objects = DetectionResult::new();
        objects.push(BoundingBox::new(0, 0, 5, 5), 0, 0.7);
        let mut faces = DetectionResult::new();
        faces.push(BoundingBox::new(1, 1, 2, 2), i32::MAX, 0.9);
        faces.push(BoundingBox::new(2, 2, 2, 2), 1, 0.9);

        let fused = fuse(&objects, &faces, 80);
        assert_eq!(fused.class_ids(), &[0, 81]);
    }

    #[test]
    fn empty_inputs_fuse_to_empty() {
        let fused = fuse(&DetectionResult::new(), &DetectionResult::new(), 80);
        assert!(fused.is_empty());
    }

    #[test]
    fn face_order_is_preserved_after_objects() {
        let objects = DetectionResult::new();
        let mut faces = DetectionResult::new();
        faces.push(BoundingBox::new(1, 0, 1, 1), 2, 0.9);
        faces.push(BoundingBox::new(2, 0, 1, 1), -3, 0.9);
        faces.push(BoundingBox::new(3, 0, 1, 1), 0, 0.9);

        let fused = fuse(&objects, &faces, 80);
        let xs: Vec<i32> = fused.boxes().iter().map(|b| b.x).collect();
        assert_eq!(xs, vec![1, 3]);
        assert_eq!(fused.class_ids(), &[82, 80]);
    }
}
