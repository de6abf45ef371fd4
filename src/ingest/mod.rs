//! Frame sources.
//!
//! - `stub://...` devices: synthetic moving-pattern frames (testing, demos)
//! - V4L2 devices such as `/dev/video0` (feature: ingest-v4l2)
//!
//! Every source delivers RGB frames no larger than its configured maximum
//! working resolution, preserving aspect ratio.

pub mod camera;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
#[cfg(feature = "ingest-v4l2")]
mod v4l2;

use anyhow::Result;

use crate::frame::Frame;

pub use camera::{CameraConfig, CameraSource, CameraStats};

/// Anything the run loop can pull frames from.
pub trait FrameSource {
    /// Capture the next frame. An error is a resource failure.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Switch to the alternate device, if the source has one.
    fn switch_device(&mut self) -> Result<()> {
        anyhow::bail!("frame source has no alternate device")
    }

    /// Short human-readable description for logs.
    fn describe(&self) -> String;

    /// Whether the source is still delivering frames as expected.
    fn is_healthy(&self) -> bool {
        true
    }

    /// Release the underlying device. Must be idempotent.
    fn release(&mut self);
}
