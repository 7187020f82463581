//! Synthetic camera for `stub://` URIs.
//!
//! Produces deterministic gradient frames so crop and mirror behaviour can be
//! checked without hardware. The red channel ramps left to right and the green
//! channel ramps top to bottom.
//!
//! Failure modes can be scripted through the URI or `SyntheticConfig`:
//! - `deny=1`: every open fails with `PermissionDenied`
//! - `busy=1`: every open fails with `DeviceUnavailable`
//! - `strict=1`: any request carrying resolution/aspect hints is rejected as
//!   overconstrained (desktop webcams that dislike portrait hints)
//! - `only=front|back`: single-camera device; a hinted request for the other
//!   facing is overconstrained, a relaxed one gets the available camera

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{split_uri, CameraDevice, CameraError, CameraStream, StreamRequest};
use crate::frame::{Frame, RGB_CHANNELS};
use crate::Facing;

/// Configuration for a synthetic camera.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub name: String,
    /// Native frame width delivered regardless of hints.
    pub width: u32,
    /// Native frame height delivered regardless of hints.
    pub height: u32,
    pub deny_permission: bool,
    pub busy: bool,
    pub strict: bool,
    pub only: Option<Facing>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "stub://camera".to_string(),
            width: 1280,
            height: 720,
            deny_permission: false,
            busy: false,
            strict: false,
            only: None,
        }
    }
}

impl SyntheticConfig {
    /// Parse `stub://<name>?size=WxH&deny=1&busy=1&strict=1&only=front`.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let (name, pairs) = split_uri(uri, "stub://");
        let mut config = Self {
            name: format!("stub://{}", name),
            ..Self::default()
        };
        for (key, value) in pairs {
            match key {
                "size" => {
                    let (w, h) = value
                        .split_once('x')
                        .ok_or_else(|| anyhow!("stub size must look like WxH, got {}", value))?;
                    config.width = w
                        .parse()
                        .map_err(|_| anyhow!("invalid stub width: {}", w))?;
                    config.height = h
                        .parse()
                        .map_err(|_| anyhow!("invalid stub height: {}", h))?;
                    if config.width == 0 || config.height == 0 {
                        return Err(anyhow!("stub size must be non-zero"));
                    }
                }
                "deny" => config.deny_permission = parse_flag(value),
                "busy" => config.busy = parse_flag(value),
                "strict" => config.strict = parse_flag(value),
                "only" => config.only = Some(value.parse()?),
                other => return Err(anyhow!("unknown stub option: {}", other)),
            }
        }
        Ok(config)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value, "" | "1" | "true" | "yes")
}

/// Shared counters for observing a synthetic camera after it was boxed.
#[derive(Clone, Debug, Default)]
pub struct SyntheticTracker {
    live: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    opens: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
}

impl SyntheticTracker {
    /// Streams currently open and not stopped.
    pub fn live_sessions(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously live streams ever observed.
    pub fn peak_sessions(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Successful opens.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Open calls, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn stream_started(&self) {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(live, Ordering::SeqCst);
    }

    fn stream_stopped(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Synthetic camera device.
pub struct SyntheticCamera {
    config: SyntheticConfig,
    tracker: SyntheticTracker,
}

impl SyntheticCamera {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            tracker: SyntheticTracker::default(),
        }
    }

    pub fn tracker(&self) -> SyntheticTracker {
        self.tracker.clone()
    }
}

impl CameraDevice for SyntheticCamera {
    fn open(&mut self, request: &StreamRequest) -> Result<Box<dyn CameraStream>, CameraError> {
        self.tracker.attempts.fetch_add(1, Ordering::SeqCst);

        if self.config.deny_permission {
            return Err(CameraError::PermissionDenied);
        }
        if self.config.busy {
            return Err(CameraError::DeviceUnavailable(format!(
                "{} is busy",
                self.config.name
            )));
        }
        if self.config.strict && !request.is_relaxed() {
            return Err(CameraError::Overconstrained(
                "resolution/aspect hints not supported".to_string(),
            ));
        }

        let facing = match self.config.only {
            Some(only) if only != request.facing => {
                if !request.is_relaxed() {
                    return Err(CameraError::Overconstrained(format!(
                        "no {} camera on {}",
                        request.facing, self.config.name
                    )));
                }
                only
            }
            _ => request.facing,
        };

        self.tracker.stream_started();
        log::info!(
            "SyntheticCamera: opened {} ({}x{}, {})",
            self.config.name,
            self.config.width,
            self.config.height,
            facing
        );
        Ok(Box::new(SyntheticStream {
            width: self.config.width,
            height: self.config.height,
            facing,
            frame_count: 0,
            active: true,
            tracker: self.tracker.clone(),
        }))
    }

    fn describe(&self) -> String {
        format!("{} (synthetic)", self.config.name)
    }
}

struct SyntheticStream {
    width: u32,
    height: u32,
    facing: Facing,
    frame_count: u64,
    active: bool,
    tracker: SyntheticTracker,
}

impl SyntheticStream {
    fn generate_pixels(&self) -> Vec<u8> {
        let w = self.width as usize;
        let h = self.height as usize;
        let mut pixels = vec![0u8; w * h * RGB_CHANNELS];
        for y in 0..h {
            let g = ramp(y, h);
            for x in 0..w {
                let offset = (y * w + x) * RGB_CHANNELS;
                pixels[offset] = ramp(x, w);
                pixels[offset + 1] = g;
                pixels[offset + 2] = (self.frame_count % 256) as u8;
            }
        }
        pixels
    }
}

/// 0..=255 ramp over `len` positions.
fn ramp(pos: usize, len: usize) -> u8 {
    if len <= 1 {
        return 0;
    }
    ((pos * 255) / (len - 1)) as u8
}

impl CameraStream for SyntheticStream {
    fn facing(&self) -> Facing {
        self.facing
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<Frame, CameraError> {
        if !self.active {
            return Err(CameraError::NoSession);
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Frame::from_rgb(pixels, self.width, self.height)
            .map_err(|e| CameraError::Frame(e.to_string()))
    }

    fn stop(&mut self) {
        if self.active {
            self.active = false;
            self.tracker.stream_stopped();
            log::debug!("SyntheticCamera: stream stopped");
        }
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_TARGET_ASPECT;

    fn hinted(facing: Facing) -> StreamRequest {
        StreamRequest::ideal(facing, 1080, 1920, DEFAULT_TARGET_ASPECT)
    }

    #[test]
    fn parses_uri_options() -> Result<()> {
        let config = SyntheticConfig::from_uri("stub://desk?size=640x480&strict=1&only=front")?;
        assert_eq!(config.name, "stub://desk");
        assert_eq!((config.width, config.height), (640, 480));
        assert!(config.strict);
        assert_eq!(config.only, Some(Facing::Front));
        assert!(SyntheticConfig::from_uri("stub://desk?size=0x480").is_err());
        assert!(SyntheticConfig::from_uri("stub://desk?fps=30").is_err());
        Ok(())
    }

    #[test]
    fn frames_ramp_left_to_right() -> Result<()> {
        let mut camera = SyntheticCamera::new(SyntheticConfig {
            width: 8,
            height: 4,
            ..SyntheticConfig::default()
        });
        let mut stream = camera.open(&hinted(Facing::Back))?;
        let frame = stream.next_frame()?;
        assert_eq!(frame.pixel(0, 0).map(|p| p[0]), Some(0));
        assert_eq!(frame.pixel(7, 0).map(|p| p[0]), Some(255));
        assert_eq!(frame.pixel(0, 3).map(|p| p[1]), Some(255));
        Ok(())
    }

    #[test]
    fn strict_device_rejects_hints_but_accepts_relaxed() {
        let mut camera = SyntheticCamera::new(SyntheticConfig {
            strict: true,
            ..SyntheticConfig::default()
        });
        assert!(matches!(
            camera.open(&hinted(Facing::Front)),
            Err(CameraError::Overconstrained(_))
        ));
        assert!(camera.open(&StreamRequest::relaxed(Facing::Front)).is_ok());
    }

    #[test]
    fn single_camera_device_serves_relaxed_requests_with_its_own_facing() -> Result<()> {
        let mut camera = SyntheticCamera::new(SyntheticConfig {
            only: Some(Facing::Front),
            ..SyntheticConfig::default()
        });
        assert!(camera.open(&hinted(Facing::Back)).is_err());
        let stream = camera.open(&StreamRequest::relaxed(Facing::Back))?;
        assert_eq!(stream.facing(), Facing::Front);
        Ok(())
    }

    #[test]
    fn tracker_counts_live_sessions() -> Result<()> {
        let mut camera = SyntheticCamera::new(SyntheticConfig::default());
        let tracker = camera.tracker();
        let mut stream = camera.open(&hinted(Facing::Front))?;
        assert_eq!(tracker.live_sessions(), 1);
        stream.stop();
        stream.stop();
        assert_eq!(tracker.live_sessions(), 0);
        drop(stream);
        assert_eq!(tracker.live_sessions(), 0);
        assert_eq!(tracker.opens(), 1);
        Ok(())
    }

    #[test]
    fn stopped_stream_yields_no_frames() -> Result<()> {
        let mut camera = SyntheticCamera::new(SyntheticConfig::default());
        let mut stream = camera.open(&hinted(Facing::Front))?;
        stream.stop();
        assert_eq!(stream.next_frame().err(), Some(CameraError::NoSession));
        Ok(())
    }
}
