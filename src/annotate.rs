//! Annotation output.
//!
//! Drawing is external; the pipeline hands each frame's fused result to an
//! `AnnotationSink`.

use anyhow::Result;
use std::time::{Duration, Instant};

use crate::catalog::ClassCatalog;
use crate::detect::{BoundingBox, DetectionResult};
use crate::frame::Frame;

/// One labelled box ready for rendering.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub bbox: BoundingBox,
    pub class_id: i32,
    pub label: String,
    pub identity: bool,
}

/// Label every row of a fused result against the combined catalog.
pub fn annotations(result: &DetectionResult, catalog: &ClassCatalog) -> Vec<Annotation> {
    result
        .iter()
        .map(|d| Annotation {
            bbox: d.bbox,
            class_id: d.class_id,
            label: catalog.label(d.class_id, d.confidence),
            identity: catalog.is_identity(d.class_id),
        })
        .collect()
}

/// Receives fused results at display rate.
pub trait AnnotationSink {
    fn present(&mut self, frame: &Frame, fused: &DetectionResult) -> Result<()>;

    /// Release display resources. Must be idempotent.
    fn close(&mut self);
}

/// Sink that logs annotations, at most once per `interval`.
pub struct LogSink {
    catalog: ClassCatalog,
    interval: Duration,
    last_logged: Option<Instant>,
    last_summary: String,
    closed: bool,
}

impl LogSink {
    pub fn new(catalog: ClassCatalog, interval: Duration) -> Self {
        Self {
            catalog,
            interval,
            last_logged: None,
            last_summary: String::new(),
            closed: false,
        }
    }
}

impl AnnotationSink for LogSink {
    fn present(&mut self, frame: &Frame, fused: &DetectionResult) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let due = self
            .last_logged
            .map_or(true, |at| at.elapsed() >= self.interval);
        if !due {
            return Ok(());
        }
        let summary = annotations(fused, &self.catalog)
            .iter()
            .map(|a| {
                format!(
                    "{} @({},{} {}x{})",
                    a.label, a.bbox.x, a.bbox.y, a.bbox.width, a.bbox.height
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        if summary != self.last_summary {
            log::info!(
                "{}x{} frame: {}",
                frame.width(),
                frame.height(),
                if summary.is_empty() {
                    "no detections"
                } else {
                    summary.as_str()
                }
            );
            self.last_summary = summary;
        }
        self.last_logged = Some(Instant::now());
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            log::debug!("annotation log closed");
            self.closed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotations_use_combined_catalog_labels() {
        let catalog = ClassCatalog::new(
            vec!["person".into(), "car".into(), "dog".into()],
            vec!["alice".into()],
        );
        let mut fused = DetectionResult::new();
        fused.push(BoundingBox::new(0, 0, 10, 10), 1, 0.75);
        fused.push(BoundingBox::new(5, 5, 10, 10), 3, 0.99);

        let labelled = annotations(&fused, &catalog);
        assert_eq!(labelled[0].label, "car: 0.75");
        assert!(!labelled[0].identity);
        assert_eq!(labelled[1].label, "alice: 0.99");
        assert!(labelled[1].identity);
    }

    #[test]
    fn closing_twice_is_harmless() {
        let catalog = ClassCatalog::new(vec!["person".into()], Vec::new());
        let mut sink = LogSink::new(catalog, Duration::ZERO);
        let frame = Frame::filled(2, 2, [0, 0, 0]).unwrap();
        sink.present(&frame, &DetectionResult::new()).unwrap();
        sink.close();
        sink.close();
        sink.present(&frame, &DetectionResult::new()).unwrap();
    }
}
