//! Frame → still transform.
//!
//! Pure functions: crop the source frame to the target aspect ratio (centered),
//! scale to the output resolution, mirror for front-facing capture, encode JPEG.

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::ExtendedColorType;

use crate::frame::{Frame, StillImage};
use crate::{AspectRatio, Facing};

/// Region of the source frame kept by the crop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// Compute the centered crop of a `source_width x source_height` frame that
/// matches `target`.
///
/// Wider than target: equal margins come off left and right. Taller: equal
/// margins come off top and bottom. Same aspect: the full frame, zero offsets.
/// The kept extent is rounded to the nearest pixel and never exceeds the source.
/// An odd leftover pixel goes to the leading margin, so any actual crop has a
/// non-zero offset.
pub fn crop_to_aspect(source_width: u32, source_height: u32, target: AspectRatio) -> CropRegion {
    let sw = source_width as u64;
    let sh = source_height as u64;
    let tw = target.width as u64;
    let th = target.height as u64;

    // Compare sw/sh against tw/th without floating point.
    let source_cross = sw * th;
    let target_cross = sh * tw;

    if source_cross > target_cross {
        let width = ((sh * tw + th / 2) / th).clamp(1, sw);
        CropRegion {
            x: ((sw - width + 1) / 2) as u32,
            y: 0,
            width: width as u32,
            height: source_height,
        }
    } else if source_cross < target_cross {
        let height = ((sw * th + tw / 2) / tw).clamp(1, sh);
        CropRegion {
            x: 0,
            y: ((sh - height + 1) / 2) as u32,
            width: source_width,
            height: height as u32,
        }
    } else {
        CropRegion {
            x: 0,
            y: 0,
            width: source_width,
            height: source_height,
        }
    }
}

/// Output geometry and encoding for a still.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StillSpec {
    pub target: AspectRatio,
    pub output_width: u32,
    pub output_height: u32,
    /// JPEG quality, 1..=100.
    pub quality: u8,
}

/// Turn one frame into an encoded still.
///
/// Mirroring is applied iff `facing` is front, so the still matches the
/// mirrored preview the visitor saw.
pub fn render_still(frame: &Frame, facing: Facing, spec: &StillSpec) -> Result<StillImage> {
    if spec.output_width == 0 || spec.output_height == 0 {
        return Err(anyhow!("output resolution must be non-zero"));
    }
    let region = crop_to_aspect(frame.width, frame.height, spec.target);
    let source = frame.to_image()?;

    let cropped = imageops::crop_imm(&source, region.x, region.y, region.width, region.height)
        .to_image();
    let mut scaled = if cropped.dimensions() == (spec.output_width, spec.output_height) {
        cropped
    } else {
        imageops::resize(
            &cropped,
            spec.output_width,
            spec.output_height,
            FilterType::Triangle,
        )
    };
    if facing.is_mirrored() {
        imageops::flip_horizontal_in_place(&mut scaled);
    }

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, spec.quality.clamp(1, 100))
        .encode(
            scaled.as_raw(),
            scaled.width(),
            scaled.height(),
            ExtendedColorType::Rgb8,
        )
        .context("encode still as jpeg")?;

    log::debug!(
        "rendered still: crop {}x{}+{}+{} -> {}x{} ({} bytes, mirrored={})",
        region.width,
        region.height,
        region.x,
        region.y,
        scaled.width(),
        scaled.height(),
        bytes.len(),
        facing.is_mirrored()
    );

    Ok(StillImage::new(
        bytes,
        scaled.width(),
        scaled.height(),
        facing,
    ))
}
