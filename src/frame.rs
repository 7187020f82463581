//! Pixel containers.
//!
//! - `Frame`: one RGB8 frame as delivered by a camera stream.
//! - `StillImage`: the encoded output of a capture, handed to the flow controller.
//!
//! `StillImage` is deliberately not `Clone`. The flow controller owns the only
//! copy; when it is replaced (retake) or cleared (reset) the bytes are zeroized
//! on drop so a discarded photo does not linger in memory.

use anyhow::{anyhow, Result};
use image::RgbImage;
use zeroize::Zeroize;

use crate::Facing;

/// Bytes per RGB8 pixel.
pub const RGB_CHANNELS: usize = 3;

// ----------------------------------------------------------------------------
// Frame: live pixels from a camera stream
// ----------------------------------------------------------------------------

/// A single RGB8 frame. Row-major, no padding.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Wrap raw RGB8 pixels, validating the buffer length against the dimensions.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("frame dimensions must be non-zero"));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(RGB_CHANNELS))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// RGB value at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * RGB_CHANNELS;
        Some([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ])
    }

    /// Luma plane (BT.601 weights), used by code scanners.
    pub fn to_luma(&self) -> Vec<u8> {
        self.data
            .chunks_exact(RGB_CHANNELS)
            .map(|px| {
                let y = 0.299_f32 * px[0] as f32 + 0.587_f32 * px[1] as f32 + 0.114_f32 * px[2] as f32;
                y.round().clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    /// Borrow the pixels as an `image` buffer for cropping and scaling.
    pub(crate) fn to_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

// ----------------------------------------------------------------------------
// StillImage: encoded capture result
// ----------------------------------------------------------------------------

/// Encoded still image (JPEG) produced by the capture pipeline.
pub struct StillImage {
    bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Facing of the session the still was taken with. Front stills are mirrored.
    pub facing: Facing,
}

impl StillImage {
    pub(crate) fn new(bytes: Vec<u8>, width: u32, height: u32, facing: Facing) -> Self {
        Self {
            bytes,
            width,
            height,
            facing,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode back to pixels. Used by previews and tests.
    pub fn decode(&self) -> Result<RgbImage> {
        let image =
            image::load_from_memory(&self.bytes).map_err(|e| anyhow!("decode still: {}", e))?;
        Ok(image.into_rgb8())
    }
}

impl std::fmt::Debug for StillImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the payload.
        f.debug_struct("StillImage")
            .field("len", &self.bytes.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("facing", &self.facing)
            .finish()
    }
}

impl Drop for StillImage {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_length_mismatch() {
        assert!(Frame::from_rgb(vec![0u8; 10], 2, 2).is_err());
        assert!(Frame::from_rgb(vec![], 0, 0).is_err());
    }

    #[test]
    fn frame_pixel_lookup() -> Result<()> {
        let data = vec![1, 2, 3, 4, 5, 6];
        let frame = Frame::from_rgb(data, 2, 1)?;
        assert_eq!(frame.pixel(1, 0), Some([4, 5, 6]));
        assert_eq!(frame.pixel(2, 0), None);
        Ok(())
    }

    #[test]
    fn luma_of_gray_is_gray() -> Result<()> {
        let frame = Frame::from_rgb(vec![128u8; 12], 2, 2)?;
        assert_eq!(frame.to_luma(), vec![128u8; 4]);
        Ok(())
    }

    #[test]
    fn still_debug_hides_bytes() {
        let still = StillImage::new(vec![0xFF, 0xD8, 0xFF], 1, 1, Facing::Back);
        let rendered = format!("{:?}", still);
        assert!(rendered.contains("len: 3"));
        assert!(!rendered.contains("255"));
    }
}
