//! Camera device backends.
//!
//! This module provides the device side of the capture pipeline:
//! - Synthetic `stub://` cameras (tests, demos, kiosks without hardware)
//! - USB/V4L2 devices (feature: camera-v4l2)
//!
//! A `CameraDevice` hands out at most one live `CameraStream` per `open` call.
//! Callers own the stream and must `stop()` it (or drop it) before opening the
//! next one; the capture pipeline enforces that ordering.
//!
//! Backends MUST NOT:
//! - Write frames to disk
//! - Log pixel content

#[cfg(feature = "camera-v4l2")]
mod normalize;
pub mod synthetic;
#[cfg(feature = "camera-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};
use std::fmt;

use crate::frame::Frame;
use crate::{AspectRatio, Facing};

pub use synthetic::{SyntheticCamera, SyntheticConfig, SyntheticTracker};
#[cfg(feature = "camera-v4l2")]
pub use v4l2::{V4l2Camera, V4l2Config};

// ----------------------------------------------------------------------------
// Stream request
// ----------------------------------------------------------------------------

/// What the pipeline asks a device for.
///
/// Resolution and aspect values are hints. A device that cannot honour them
/// answers `CameraError::Overconstrained`; the pipeline then retries with
/// `StreamRequest::relaxed`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamRequest {
    pub facing: Facing,
    pub ideal_width: Option<u32>,
    pub ideal_height: Option<u32>,
    pub ideal_aspect: Option<AspectRatio>,
}

impl StreamRequest {
    pub fn ideal(facing: Facing, width: u32, height: u32, aspect: AspectRatio) -> Self {
        Self {
            facing,
            ideal_width: Some(width),
            ideal_height: Some(height),
            ideal_aspect: Some(aspect),
        }
    }

    /// Minimal request: facing preference only, device defaults for the rest.
    pub fn relaxed(facing: Facing) -> Self {
        Self {
            facing,
            ideal_width: None,
            ideal_height: None,
            ideal_aspect: None,
        }
    }

    pub fn is_relaxed(&self) -> bool {
        self.ideal_width.is_none() && self.ideal_height.is_none() && self.ideal_aspect.is_none()
    }
}

// ----------------------------------------------------------------------------
// Errors
// ----------------------------------------------------------------------------

/// Camera failures as seen by the capture screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CameraError {
    /// The user or OS refused camera access.
    PermissionDenied,
    /// No camera, or the camera is held by another process.
    DeviceUnavailable(String),
    /// The device rejected the requested constraints.
    Overconstrained(String),
    /// `capture` was called without an active session.
    NoSession,
    /// The device delivered an unusable frame.
    Frame(String),
}

impl CameraError {
    /// Message shown on the capture screen before any retry is offered.
    pub fn user_message(&self) -> &'static str {
        match self {
            CameraError::PermissionDenied => {
                "Camera access was denied. Allow camera access and try again."
            }
            CameraError::DeviceUnavailable(_) => {
                "No camera is available right now. It may be in use by another app."
            }
            CameraError::Overconstrained(_) => "The camera does not support the requested mode.",
            CameraError::NoSession => "The camera is not ready yet.",
            CameraError::Frame(_) => "The camera returned an unreadable image. Please retry.",
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::PermissionDenied => write!(f, "camera permission denied"),
            CameraError::DeviceUnavailable(reason) => write!(f, "camera unavailable: {}", reason),
            CameraError::Overconstrained(reason) => {
                write!(f, "camera rejected constraints: {}", reason)
            }
            CameraError::NoSession => write!(f, "no active camera session"),
            CameraError::Frame(reason) => write!(f, "bad camera frame: {}", reason),
        }
    }
}

impl std::error::Error for CameraError {}

// ----------------------------------------------------------------------------
// Device traits
// ----------------------------------------------------------------------------

/// A live stream from a camera.
pub trait CameraStream {
    /// Facing actually delivered. May differ from the request after a relaxed retry.
    fn facing(&self) -> Facing;

    /// Native frame dimensions (width, height).
    fn dimensions(&self) -> (u32, u32);

    /// Pull the current frame.
    fn next_frame(&mut self) -> Result<Frame, CameraError>;

    /// Stop all underlying tracks. Idempotent.
    fn stop(&mut self);
}

/// A camera that can be asked for a stream.
pub trait CameraDevice {
    fn open(&mut self, request: &StreamRequest) -> Result<Box<dyn CameraStream>, CameraError>;

    /// Human-readable identifier for logs.
    fn describe(&self) -> String;
}

/// Open a camera device by URI.
///
/// - `stub://<name>[?options]` selects the synthetic camera
/// - `/dev/videoN` or `v4l2:///dev/videoN[?back=/dev/videoM]` selects V4L2
pub fn open_camera(uri: &str) -> Result<Box<dyn CameraDevice>> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(anyhow!("camera uri must not be empty"));
    }
    if uri.starts_with("stub://") {
        let config = SyntheticConfig::from_uri(uri)?;
        return Ok(Box::new(SyntheticCamera::new(config)));
    }
    if uri.starts_with("/dev/") || uri.starts_with("v4l2://") {
        #[cfg(feature = "camera-v4l2")]
        {
            let config = V4l2Config::from_uri(uri)?;
            return Ok(Box::new(V4l2Camera::new(config)));
        }
        #[cfg(not(feature = "camera-v4l2"))]
        {
            return Err(anyhow!("V4L2 cameras require the camera-v4l2 feature"));
        }
    }
    Err(anyhow!("unsupported camera uri: {}", uri))
}

/// Split `scheme://path?k=v&k2=v2` into its path and query pairs.
pub(crate) fn split_uri<'a>(uri: &'a str, scheme: &str) -> (&'a str, Vec<(&'a str, &'a str)>) {
    let rest = uri.strip_prefix(scheme).unwrap_or(uri);
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, query),
        None => (rest, ""),
    };
    let pairs = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .collect();
    (path, pairs)
}
