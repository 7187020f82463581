//! V4L2 camera backend.
//!
//! This module provides `V4l2Camera` for booths with USB/CSI cameras on Linux.
//!
//! V4L2 has no notion of facing, so the config maps each facing to a device
//! node. The front node is mandatory; the back node is optional. A hinted
//! request for a facing without a node is reported as overconstrained so the
//! pipeline's relaxed retry falls back to the front node.
//!
//! Format negotiation asks for RGB3 at the ideal size. When the driver refuses
//! and the request carries hints, the open fails as overconstrained; a relaxed
//! request accepts whatever format the driver keeps (RGB3, NV12, YUYV or MJPG).

use anyhow::{anyhow, Result};
use ouroboros::self_referencing;

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::{split_uri, CameraDevice, CameraError, CameraStream, StreamRequest};
use crate::frame::Frame;
use crate::Facing;

const EBUSY: i32 = 16;

/// Configuration for a V4L2 camera.
#[derive(Clone, Debug)]
pub struct V4l2Config {
    /// Device node used for front-facing capture (e.g., "/dev/video0").
    pub front_device: String,
    /// Optional device node for back-facing capture.
    pub back_device: Option<String>,
    /// Number of mmap buffers to queue.
    pub buffers: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            front_device: "/dev/video0".to_string(),
            back_device: None,
            buffers: 4,
        }
    }
}

impl V4l2Config {
    /// Parse `/dev/videoN` or `v4l2:///dev/videoN?back=/dev/videoM&buffers=4`.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let (path, pairs) = split_uri(uri, "v4l2://");
        if path.is_empty() {
            return Err(anyhow!("v4l2 uri is missing a device path"));
        }
        let mut config = Self {
            front_device: path.to_string(),
            ..Self::default()
        };
        for (key, value) in pairs {
            match key {
                "back" => config.back_device = Some(value.to_string()),
                "buffers" => {
                    config.buffers = value
                        .parse()
                        .map_err(|_| anyhow!("invalid buffer count: {}", value))?;
                }
                other => return Err(anyhow!("unknown v4l2 option: {}", other)),
            }
        }
        if config.buffers == 0 {
            return Err(anyhow!("v4l2 buffer count must be > 0"));
        }
        Ok(config)
    }
}

/// V4L2 camera device.
pub struct V4l2Camera {
    config: V4l2Config,
}

impl V4l2Camera {
    pub fn new(config: V4l2Config) -> Self {
        Self { config }
    }

    fn node_for(&self, request: &StreamRequest) -> Result<(String, Facing), CameraError> {
        match request.facing {
            Facing::Front => Ok((self.config.front_device.clone(), Facing::Front)),
            Facing::Back => match &self.config.back_device {
                Some(node) => Ok((node.clone(), Facing::Back)),
                None if request.is_relaxed() => {
                    Ok((self.config.front_device.clone(), Facing::Front))
                }
                None => Err(CameraError::Overconstrained(
                    "no back-facing device configured".to_string(),
                )),
            },
        }
    }
}

impl CameraDevice for V4l2Camera {
    fn open(&mut self, request: &StreamRequest) -> Result<Box<dyn CameraStream>, CameraError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let (node, facing) = self.node_for(request)?;

        let device = v4l::Device::with_path(&node).map_err(|err| map_io_error(&node, err))?;
        let mut format = device
            .format()
            .map_err(|err| map_io_error(&node, err))?;

        if let (Some(width), Some(height)) = (request.ideal_width, request.ideal_height) {
            format.width = width;
            format.height = height;
        }
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) if !request.is_relaxed() => {
                return Err(CameraError::Overconstrained(format!(
                    "{} refused format: {}",
                    node, err
                )));
            }
            Err(err) => {
                log::warn!("V4l2Camera: failed to set format on {}: {}", node, err);
                device.format().map_err(|err| map_io_error(&node, err))?
            }
        };

        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            CameraError::Overconstrained(format!(
                "{} delivers unsupported pixel format {}",
                node,
                String::from_utf8_lossy(&format.fourcc.repr)
            ))
        })?;

        let buffers = self.config.buffers;
        let state = V4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, buffers)
            },
        }
        .try_build()
        .map_err(|err| map_io_error(&node, err))?;

        log::info!(
            "V4l2Camera: opened {} ({}x{}, {:?}, {})",
            node,
            format.width,
            format.height,
            pixel_format,
            facing
        );

        Ok(Box::new(V4l2Stream {
            node,
            facing,
            width: format.width,
            height: format.height,
            pixel_format,
            state: Some(state),
        }))
    }

    fn describe(&self) -> String {
        match &self.config.back_device {
            Some(back) => format!("v4l2 front={} back={}", self.config.front_device, back),
            None => format!("v4l2 {}", self.config.front_device),
        }
    }
}

fn map_io_error(node: &str, err: std::io::Error) -> CameraError {
    if err.kind() == std::io::ErrorKind::PermissionDenied {
        return CameraError::PermissionDenied;
    }
    if err.raw_os_error() == Some(EBUSY) {
        return CameraError::DeviceUnavailable(format!("{} is in use", node));
    }
    CameraError::DeviceUnavailable(format!("{}: {}", node, err))
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this>,
}

struct V4l2Stream {
    node: String,
    facing: Facing,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    state: Option<V4l2State>,
}

impl CameraStream for V4l2Stream {
    fn facing(&self) -> Facing {
        self.facing
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<Frame, CameraError> {
        use v4l::io::traits::CaptureStream as _;

        let state = self.state.as_mut().ok_or(CameraError::NoSession)?;
        let raw = state
            .with_mut(|fields| fields.stream.next().map(|(buf, _meta)| buf.to_vec()))
            .map_err(|err| CameraError::Frame(format!("capture {}: {}", self.node, err)))?;

        let rgb = normalize_to_rgb(&raw, self.width, self.height, self.pixel_format)
            .map_err(|err| CameraError::Frame(err.to_string()))?;
        Frame::from_rgb(rgb, self.width, self.height)
            .map_err(|err| CameraError::Frame(err.to_string()))
    }

    fn stop(&mut self) {
        // Dropping the mmap stream issues STREAMOFF and releases the node.
        if self.state.take().is_some() {
            log::info!("V4l2Camera: released {}", self.node);
        }
    }
}

impl Drop for V4l2Stream {
    fn drop(&mut self) {
        self.stop();
    }
}
