//! Promo Booth
//!
//! Core of a trade-fair photo booth kiosk: a visitor takes a photo, is shown
//! the campaign tags, shares the photo (self-reported) and receives a reward.
//!
//! # Architecture
//!
//! Two pieces carry the logic:
//!
//! 1. **Flow controller** (`flow`): a linear state machine that owns the current
//!    step, the captured still and the tag string. Screens only read its state
//!    and call its transitions.
//! 2. **Capture pipeline** (`capture`): acquires one camera session at a time,
//!    retries once with relaxed constraints, and turns the current frame into a
//!    still cropped to the target aspect ratio, mirrored for front-facing capture.
//!
//! # Module Structure
//!
//! - `frame`: pixel containers (`Frame`, `StillImage`)
//! - `camera`: device backends (synthetic `stub://`, V4L2)
//! - `capture`: session lifecycle, crop math, encode
//! - `flow`: flow controller
//! - `scan`: optional code scanning for campaign tags
//! - `share`: clipboard and share surfaces
//! - `campaign`, `screen`: copy table and per-step view models
//! - `config`: file + environment configuration
//! - `kiosk`: input channel helpers for terminal front ends

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod camera;
pub mod campaign;
pub mod capture;
pub mod config;
pub mod flow;
pub mod frame;
pub mod kiosk;
pub mod scan;
pub mod screen;
pub mod share;

pub use camera::{open_camera, CameraDevice, CameraError, CameraStream, StreamRequest};
pub use camera::{SyntheticCamera, SyntheticConfig};
#[cfg(feature = "camera-v4l2")]
pub use camera::{V4l2Camera, V4l2Config};
pub use campaign::{Campaign, ScreenCopy};
pub use capture::{crop_to_aspect, CaptureSettings, CapturePipeline, CropRegion};
pub use flow::{FlowAction, FlowController, FlowError, FlowOptions, FlowState, Step};
pub use frame::{Frame, StillImage};
pub use kiosk::{camera_failure, next_line, KioskInput, Shutdown};
pub use scan::{normalize_tags, scan_stream, CodeScanner};
#[cfg(feature = "scan-qr")]
pub use scan::QrScanner;
pub use screen::{Action, Screen};
pub use share::{
    fallback_instructions, share_or_fallback, Clipboard, CommandClipboard, MemoryClipboard,
    OutboxShare, ShareError, ShareOutcome, ShareRequest, ShareSurface, UnsupportedShare,
};

/// Tag string shown when no code was scanned.
pub const DEFAULT_TAG_TEXT: &str =
    "@roccafunfactory #roccafunfactory #Spielwarenmesse2026 #GoldenBalloonDog";

/// Default output aspect ratio (portrait story format).
pub const DEFAULT_TARGET_ASPECT: AspectRatio = AspectRatio {
    width: 9,
    height: 16,
};

// -------------------- Facing --------------------

/// Which physical camera is active.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// User-facing camera. Previews and stills are mirrored.
    #[default]
    Front,
    /// Environment-facing camera.
    Back,
}

impl Facing {
    pub fn toggled(self) -> Self {
        match self {
            Facing::Front => Facing::Back,
            Facing::Back => Facing::Front,
        }
    }

    pub fn is_mirrored(self) -> bool {
        self == Facing::Front
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Facing::Front => "front",
            Facing::Back => "back",
        }
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Facing {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" | "user" => Ok(Facing::Front),
            "back" | "environment" => Ok(Facing::Back),
            other => Err(anyhow!("unknown camera facing: {}", other)),
        }
    }
}

// -------------------- Aspect Ratio --------------------

/// Width:height ratio in integer terms, e.g. 9:16.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("aspect ratio terms must be > 0"));
        }
        Ok(Self { width, height })
    }

    pub fn ratio(self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Width matching `height` at this ratio, rounded to the nearest pixel (at least 1).
    pub fn width_for(self, height: u32) -> u32 {
        let h = height as u64;
        let w = (h * self.width as u64 + self.height as u64 / 2) / self.height as u64;
        w.clamp(1, u32::MAX as u64) as u32
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (w, h) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("aspect ratio must look like W:H, got {}", s))?;
        let width = w
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid aspect width: {}", w))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid aspect height: {}", h))?;
        Self::new(width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_toggles_and_parses() -> Result<()> {
        assert_eq!(Facing::Front.toggled(), Facing::Back);
        assert_eq!(Facing::Back.toggled(), Facing::Front);
        assert_eq!("environment".parse::<Facing>()?, Facing::Back);
        assert!("sideways".parse::<Facing>().is_err());
        Ok(())
    }

    #[test]
    fn aspect_ratio_parses() -> Result<()> {
        let aspect: AspectRatio = "9:16".parse()?;
        assert_eq!(aspect, DEFAULT_TARGET_ASPECT);
        assert!("9x16".parse::<AspectRatio>().is_err());
        assert!("0:16".parse::<AspectRatio>().is_err());
        Ok(())
    }

    #[test]
    fn width_for_rounds_to_nearest_pixel() -> Result<()> {
        assert_eq!(DEFAULT_TARGET_ASPECT.width_for(1920), 1080);
        assert_eq!(AspectRatio::new(1, 1)?.width_for(160), 160);
        // 1920 * 16 / 9 = 3413.33
        assert_eq!(AspectRatio::new(16, 9)?.width_for(1920), 3413);
        assert_eq!(AspectRatio::new(1, 100)?.width_for(10), 1);
        Ok(())
    }
}
