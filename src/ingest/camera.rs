//! Live camera source.
//!
//! `CameraSource` picks a backend from the device string: `stub://` devices
//! are synthetic, anything else is a V4L2 device node. Frames are downscaled to
//! the configured maximum working resolution before they are returned.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

use super::FrameSource;
#[cfg(feature = "ingest-v4l2")]
use super::v4l2::DeviceSource;
use crate::frame::Frame;

/// Configuration for a camera source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraConfig {
    /// Device (e.g., "/dev/video0" or "stub://camera0").
    pub device: String,
    /// Device used by `switch_device`, if any.
    pub alternate_device: Option<String>,
    /// Requested capture rate.
    pub target_fps: u32,
    /// Requested capture width.
    pub width: u32,
    /// Requested capture height.
    pub height: u32,
    /// Frames wider or taller than this are downscaled.
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "stub://camera0".to_string(),
            alternate_device: None,
            target_fps: 30,
            width: 1280,
            height: 720,
            max_width: 1280,
            max_height: 720,
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub device: String,
}

pub struct CameraSource {
    config: CameraConfig,
    backend: Option<CameraBackend>,
    frames_captured: u64,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceSource),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        Ok(Self {
            config,
            backend: None,
            frames_captured: 0,
        })
    }

    /// Open the configured device.
    pub fn connect(&mut self) -> Result<()> {
        self.release();
        let backend = open_backend(&self.config)?;
        self.backend = Some(backend);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.backend.is_some()
    }

    pub fn device(&self) -> &str {
        &self.config.device
    }

    pub fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frames_captured,
            device: self.config.device.clone(),
        }
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Frame> {
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| anyhow!("camera {} is not open", self.config.device))?;
        let frame = match backend {
            CameraBackend::Synthetic(source) => source.next_frame()?,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.next_frame()?,
        };
        self.frames_captured += 1;
        frame.limited_to(self.config.max_width, self.config.max_height)
    }

    /// Release the current device and open the alternate one. The previous
    /// device becomes the new alternate, so switching twice returns.
    fn switch_device(&mut self) -> Result<()> {
        let Some(next) = self.config.alternate_device.clone() else {
            return Err(anyhow!("no alternate camera configured"));
        };
        self.release();
        let previous = std::mem::replace(&mut self.config.device, next);
        self.config.alternate_device = Some(previous);
        log::info!("switching camera to {}", self.config.device);
        self.connect()
            .map_err(|e| anyhow!("failed to open camera {}: {}", self.config.device, e))
    }

    fn describe(&self) -> String {
        format!("camera {}", self.config.device)
    }

    /// Closed cameras are unhealthy; a V4L2 device also goes unhealthy after a
    /// capture error or when frames stop arriving.
    fn is_healthy(&self) -> bool {
        match &self.backend {
            None => false,
            Some(CameraBackend::Synthetic(_)) => true,
            #[cfg(feature = "ingest-v4l2")]
            Some(CameraBackend::Device(source)) => source.is_healthy(),
        }
    }

    fn release(&mut self) {
        if self.backend.take().is_some() {
            log::info!("released camera {}", self.config.device);
        }
    }
}

fn open_backend(config: &CameraConfig) -> Result<CameraBackend> {
    if config.device.starts_with("stub://") {
        let mut source = SyntheticCamera::new(config);
        source.connect();
        return Ok(CameraBackend::Synthetic(source));
    }
    #[cfg(feature = "ingest-v4l2")]
    {
        let mut source = DeviceSource::new(config);
        source.connect()?;
        Ok(CameraBackend::Device(source))
    }
    #[cfg(not(feature = "ingest-v4l2"))]
    {
        Err(anyhow!(
            "camera {} requires the ingest-v4l2 feature",
            config.device
        ))
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    device: String,
    width: u32,
    height: u32,
    frame_interval: Duration,
    next_due: Option<Instant>,
    frame_count: u64,
}

impl SyntheticCamera {
    fn new(config: &CameraConfig) -> Self {
        let frame_interval = if config.target_fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / config.target_fps
        };
        Self {
            device: config.device.clone(),
            width: config.width.max(1),
            height: config.height.max(1),
            frame_interval,
            next_due: None,
            frame_count: 0,
        }
    }

    fn connect(&mut self) {
        log::info!(
            "CameraSource: connected to {} ({}x{}, synthetic)",
            self.device,
            self.width,
            self.height
        );
    }

    /// Paced to the configured frame rate, like a real device.
    fn next_frame(&mut self) -> Result<Frame> {
        if let Some(due) = self.next_due {
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
        }
        self.next_due = Some(Instant::now() + self.frame_interval);
        self.frame_count += 1;
        Frame::new(self.generate_pixels(), self.width, self.height)
    }

    /// Gradient background with a bright square sweeping left to right.
    fn generate_pixels(&self) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        let side = (w.min(h) / 4).max(1);
        let span = w.saturating_sub(side).max(1);
        let square_x = (self.frame_count as usize * 4) % span;
        let square_y = (h - side.min(h)) / 2;

        let mut pixels = vec![0u8; w * h * 3];
        for (i, px) in pixels.chunks_exact_mut(3).enumerate() {
            let (x, y) = (i % w, i / w);
            let inside = x >= square_x && x < square_x + side && y >= square_y && y < square_y + side;
            if inside {
                px.copy_from_slice(&[240, 240, 240]);
            } else {
                px[0] = (x * 255 / w.max(1)) as u8;
                px[1] = (y * 255 / h.max(1)) as u8;
                px[2] = 64;
            }
        }
        pixels
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> CameraConfig {
        CameraConfig {
            device: "stub://test".to_string(),
            alternate_device: Some("stub://other".to_string()),
            target_fps: 0,
            width: 640,
            height: 480,
            max_width: 320,
            max_height: 320,
        }
    }

    #[test]
    fn stub_camera_frames_are_limited_to_max_resolution() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        source.connect()?;

        let frame = source.next_frame()?;
        assert_eq!(frame.dimensions(), (320, 240));
        assert_eq!(source.stats().frames_captured, 1);
        Ok(())
    }

    #[test]
    fn synthetic_frames_change_over_time() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        source.connect()?;
        let first = source.next_frame()?;
        let second = source.next_frame()?;
        assert_ne!(first, second);
        Ok(())
    }

    #[test]
    fn release_is_idempotent_and_closes_the_source() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        source.connect()?;
        assert!(source.is_healthy());
        source.release();
        source.release();
        assert!(!source.is_open());
        assert!(!source.is_healthy());
        assert!(source.next_frame().is_err());
        Ok(())
    }

    #[test]
    fn switching_alternates_between_devices() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        source.connect()?;
        source.switch_device()?;
        assert_eq!(source.device(), "stub://other");
        assert!(source.is_open());
        source.switch_device()?;
        assert_eq!(source.device(), "stub://test");
        Ok(())
    }

    #[test]
    fn switching_without_alternate_fails() -> Result<()> {
        let mut config = stub_config();
        config.alternate_device = None;
        let mut source = CameraSource::new(config)?;
        source.connect()?;
        assert!(source.switch_device().is_err());
        assert_eq!(source.device(), "stub://test");
        Ok(())
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    #[test]
    fn device_nodes_require_the_v4l2_feature() -> Result<()> {
        let mut config = stub_config();
        config.device = "/dev/video0".to_string();
        let mut source = CameraSource::new(config)?;
        assert!(source.connect().is_err());
        Ok(())
    }
}
