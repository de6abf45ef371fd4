//! Owned RGB frames.
//!
//! A `Frame` owns its pixel buffer. `Clone` is a deep copy, which is what the
//! background identification worker receives: it never shares a buffer that the
//! capture loop may overwrite on the next frame.

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb};

/// Packed RGB24 frame, row-major, origin top-left.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Wrap an RGB24 buffer. The buffer length must be exactly `width * height * 3`.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("frame dimensions must be non-zero ({}x{})", width, height));
        }
        let expected = rgb_len(width, height)?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    /// Frame filled with a single colour.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self> {
        let len = rgb_len(width, height)?;
        let pixels = rgb.iter().copied().cycle().take(len).collect();
        Self::new(pixels, width, height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Resample to exactly `width`x`height` (aspect ratio is not preserved).
    pub fn resized(&self, width: u32, height: u32) -> Result<Frame> {
        if (width, height) == self.dimensions() {
            return Ok(self.clone());
        }
        if width == 0 || height == 0 {
            return Err(anyhow!("cannot resize frame to {}x{}", width, height));
        }
        let view: ImageBuffer<Rgb<u8>, &[u8]> =
            ImageBuffer::from_raw(self.width, self.height, self.pixels.as_slice())
                .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
        let resized = imageops::resize(&view, width, height, FilterType::Triangle);
        Frame::new(resized.into_raw(), width, height)
    }

    /// Downscale so the frame fits inside `max_width`x`max_height`, keeping the
    /// aspect ratio. Frames that already fit are returned unchanged.
    pub fn limited_to(self, max_width: u32, max_height: u32) -> Result<Frame> {
        let (width, height) = fit_within(self.width, self.height, max_width, max_height);
        if (width, height) == self.dimensions() {
            return Ok(self);
        }
        self.resized(width, height)
    }
}

/// Largest size with the same aspect ratio as `width`x`height` that fits in the
/// bounds. Never upscales and never returns a zero dimension.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let scale = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let scaled_w = ((width as f64 * scale) as u32).clamp(1, max_width.max(1));
    let scaled_h = ((height as f64 * scale) as u32).clamp(1, max_height.max(1));
    (scaled_w, scaled_h)
}

fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_length_mismatch() {
        assert!(Frame::new(vec![0u8; 10], 2, 2).is_err());
        assert!(Frame::new(Vec::new(), 0, 0).is_err());
    }

    #[test]
    fn resize_produces_requested_dimensions() -> Result<()> {
        let frame = Frame::filled(64, 48, [10, 20, 30])?;
        let small = frame.resized(16, 16)?;
        assert_eq!(small.dimensions(), (16, 16));
        assert_eq!(small.pixels().len(), 16 * 16 * 3);
        assert_eq!(&small.pixels()[..3], &[10, 20, 30]);
        Ok(())
    }

    #[test]
    fn fit_within_preserves_aspect_ratio() {
        assert_eq!(fit_within(1920, 1080, 1280, 720), (1280, 720));
        assert_eq!(fit_within(1600, 1200, 1280, 720), (960, 720));
        assert_eq!(fit_within(640, 480, 1280, 720), (640, 480));
    }

    #[test]
    fn limited_to_leaves_small_frames_alone() -> Result<()> {
        let frame = Frame::filled(320, 240, [1, 2, 3])?;
        let limited = frame.clone().limited_to(1280, 720)?;
        assert_eq!(limited, frame);

        let big = Frame::filled(2560, 1440, [1, 2, 3])?;
        assert_eq!(big.limited_to(1280, 720)?.dimensions(), (1280, 720));
        Ok(())
    }
}
