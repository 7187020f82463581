//! Capture pipeline.
//!
//! `CapturePipeline` owns the camera session for as long as the capture screen
//! is showing. It is responsible for:
//! - Acquiring a stream with ideal hints, retrying once with relaxed
//!   constraints when the device rejects them
//! - Releasing the previous session before acquiring the next one
//! - Releasing the session on drop, whatever path leaves the capture screen
//! - Producing a cropped, scaled, optionally mirrored, encoded still
//!
//! The pipeline only knows which flow steps show the camera
//! (`sync_to_step`); it has no knowledge of the flow after capture.

mod crop;

pub use crop::{crop_to_aspect, render_still, CropRegion, StillSpec};

use anyhow::{anyhow, Result};

use crate::camera::{CameraDevice, CameraError, CameraStream, StreamRequest};
use crate::flow::Step;
use crate::frame::StillImage;
use crate::scan::{scan_stream, CodeScanner};
use crate::{AspectRatio, Facing, DEFAULT_TARGET_ASPECT};

/// Default output resolution (portrait 1080p).
pub const DEFAULT_OUTPUT_WIDTH: u32 = 1080;
pub const DEFAULT_OUTPUT_HEIGHT: u32 = 1920;
/// Default JPEG quality.
pub const DEFAULT_JPEG_QUALITY: u8 = 88;

/// Resolution hints and output geometry for the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Hint sent to the device.
    pub ideal_width: u32,
    /// Hint sent to the device.
    pub ideal_height: u32,
    pub target_aspect: AspectRatio,
    pub output_width: u32,
    pub output_height: u32,
    pub jpeg_quality: u8,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            ideal_width: DEFAULT_OUTPUT_WIDTH,
            ideal_height: DEFAULT_OUTPUT_HEIGHT,
            target_aspect: DEFAULT_TARGET_ASPECT,
            output_width: DEFAULT_OUTPUT_WIDTH,
            output_height: DEFAULT_OUTPUT_HEIGHT,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl CaptureSettings {
    /// Output size for a still cropped to `target`.
    ///
    /// The configured size is used for the configured aspect. Any other target
    /// keeps `output_height` and takes its width from the target, so the still
    /// is never stretched.
    pub fn output_size(&self, target: AspectRatio) -> (u32, u32) {
        if target == self.target_aspect {
            (self.output_width, self.output_height)
        } else {
            (target.width_for(self.output_height), self.output_height)
        }
    }

    /// Reject output geometry that would distort a still at `target_aspect`.
    pub fn check_geometry(&self) -> Result<()> {
        if self.output_width == 0 || self.output_height == 0 {
            return Err(anyhow!("output resolution must be non-zero"));
        }
        let aspect = self.target_aspect;
        let expected = aspect.width_for(self.output_height);
        if self.output_width != expected {
            return Err(anyhow!(
                "output {}x{} does not match target aspect {}; set output width to {} or change the output height",
                self.output_width,
                self.output_height,
                aspect,
                expected
            ));
        }
        Ok(())
    }

    fn still_spec(&self, target: AspectRatio) -> StillSpec {
        let (output_width, output_height) = self.output_size(target);
        StillSpec {
            target,
            output_width,
            output_height,
            quality: self.jpeg_quality,
        }
    }
}

/// An active camera session. At most one exists per pipeline.
pub struct CameraSession {
    stream: Box<dyn CameraStream>,
    /// Facing the stream actually delivers.
    pub facing: Facing,
    /// True when the session came from the relaxed retry.
    pub relaxed: bool,
}

impl CameraSession {
    pub fn dimensions(&self) -> (u32, u32) {
        self.stream.dimensions()
    }

    fn stop(&mut self) {
        self.stream.stop();
    }
}

/// Camera-to-still pipeline over one device.
pub struct CapturePipeline {
    device: Box<dyn CameraDevice>,
    settings: CaptureSettings,
    /// Requested facing. The session may deliver another one after a relaxed retry.
    facing: Facing,
    session: Option<CameraSession>,
}

impl CapturePipeline {
    pub fn new(device: Box<dyn CameraDevice>, settings: CaptureSettings) -> Self {
        Self {
            device,
            settings,
            facing: Facing::Front,
            session: None,
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Requested facing.
    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn session(&self) -> Option<&CameraSession> {
        self.session.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Acquire a session for `facing`.
    ///
    /// Any active session is stopped first. The device is asked with the ideal
    /// hints; an overconstrained rejection triggers exactly one relaxed retry.
    /// Permission and availability failures are returned as-is.
    pub fn acquire(&mut self, facing: Facing) -> Result<&CameraSession, CameraError> {
        self.release();
        self.facing = facing;

        let ideal = StreamRequest::ideal(
            facing,
            self.settings.ideal_width,
            self.settings.ideal_height,
            self.settings.target_aspect,
        );
        let (stream, relaxed) = match self.device.open(&ideal) {
            Ok(stream) => (stream, false),
            Err(CameraError::Overconstrained(reason)) => {
                log::warn!(
                    "capture: {} rejected ideal constraints ({}); retrying relaxed",
                    self.device.describe(),
                    reason
                );
                let stream = self
                    .device
                    .open(&StreamRequest::relaxed(facing))
                    .map_err(|err| {
                        log::warn!("capture: relaxed request failed: {}", err);
                        err
                    })?;
                (stream, true)
            }
            Err(err) => {
                log::warn!("capture: {} unavailable: {}", self.device.describe(), err);
                return Err(err);
            }
        };

        let (width, height) = stream.dimensions();
        log::info!(
            "capture: session acquired on {} ({}x{}, requested {}, delivered {}{})",
            self.device.describe(),
            width,
            height,
            facing,
            stream.facing(),
            if relaxed { ", relaxed" } else { "" }
        );
        let session = CameraSession {
            facing: stream.facing(),
            stream,
            relaxed,
        };
        Ok(&*self.session.insert(session))
    }

    /// Hold a session exactly while `step` shows the camera.
    ///
    /// Leaving ScanCode/Capture releases the session. Entering them acquires
    /// one for `facing` unless a session is already open.
    pub fn sync_to_step(&mut self, step: Step, facing: Facing) -> Result<(), CameraError> {
        if !step.uses_camera() {
            self.release();
            return Ok(());
        }
        if self.session.is_none() {
            self.acquire(facing)?;
        }
        Ok(())
    }

    /// Flip front/back and acquire a fresh session.
    pub fn toggle_facing(&mut self) -> Result<&CameraSession, CameraError> {
        let next = self.facing.toggled();
        self.acquire(next)
    }

    /// Capture the current frame at the configured target aspect.
    pub fn capture(&mut self) -> Result<StillImage> {
        let target = self.settings.target_aspect;
        self.capture_with_aspect(target)
    }

    /// Capture the current frame cropped to `target`.
    pub fn capture_with_aspect(&mut self, target: AspectRatio) -> Result<StillImage> {
        let spec = self.settings.still_spec(target);
        let session = self.session.as_mut().ok_or(CameraError::NoSession)?;
        let frame = session.stream.next_frame()?;
        render_still(&frame, session.facing, &spec)
    }

    /// Poll the active session for a code. Shares the session used for capture.
    pub fn scan_code(
        &mut self,
        scanner: &mut dyn CodeScanner,
        max_frames: usize,
    ) -> Result<Option<String>, CameraError> {
        let session = self.session.as_mut().ok_or(CameraError::NoSession)?;
        scan_stream(session.stream.as_mut(), scanner, max_frames)
    }

    /// Stop the active session, if any.
    pub fn release(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
            log::info!("capture: session released ({})", session.facing);
        }
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{SyntheticCamera, SyntheticConfig};

    fn small_settings() -> CaptureSettings {
        CaptureSettings {
            output_width: 90,
            output_height: 160,
            ..CaptureSettings::default()
        }
    }

    fn pipeline(config: SyntheticConfig) -> (CapturePipeline, crate::camera::SyntheticTracker) {
        let camera = SyntheticCamera::new(config);
        let tracker = camera.tracker();
        (CapturePipeline::new(Box::new(camera), small_settings()), tracker)
    }

    #[test]
    fn acquire_uses_ideal_constraints_first() -> Result<()> {
        let (mut pipeline, tracker) = pipeline(SyntheticConfig::default());
        let session = pipeline.acquire(Facing::Back)?;
        assert!(!session.relaxed);
        assert_eq!(session.facing, Facing::Back);
        assert_eq!(tracker.attempts(), 1);
        Ok(())
    }

    #[test]
    fn overconstrained_request_is_retried_once_relaxed() -> Result<()> {
        let (mut pipeline, tracker) = pipeline(SyntheticConfig {
            strict: true,
            ..SyntheticConfig::default()
        });
        let session = pipeline.acquire(Facing::Back)?;
        assert!(session.relaxed);
        assert_eq!(tracker.attempts(), 2);
        assert_eq!(tracker.live_sessions(), 1);
        Ok(())
    }

    #[test]
    fn permission_denied_is_not_retried() {
        let (mut pipeline, tracker) = pipeline(SyntheticConfig {
            deny_permission: true,
            ..SyntheticConfig::default()
        });
        let err = pipeline.acquire(Facing::Front).err();
        assert_eq!(err, Some(CameraError::PermissionDenied));
        assert_eq!(tracker.attempts(), 1);
        assert!(!pipeline.is_active());
    }

    #[test]
    fn toggle_releases_before_reacquire() -> Result<()> {
        let (mut pipeline, tracker) = pipeline(SyntheticConfig::default());
        pipeline.acquire(Facing::Front)?;
        for _ in 0..5 {
            pipeline.toggle_facing()?;
            assert_eq!(tracker.live_sessions(), 1);
        }
        assert_eq!(tracker.peak_sessions(), 1);
        assert_eq!(tracker.opens(), 6);
        assert_eq!(pipeline.facing(), Facing::Back);
        Ok(())
    }

    #[test]
    fn toggle_on_single_camera_device_keeps_one_session() -> Result<()> {
        let (mut pipeline, tracker) = pipeline(SyntheticConfig {
            only: Some(Facing::Front),
            strict: true,
            ..SyntheticConfig::default()
        });
        pipeline.acquire(Facing::Front)?;
        // Relaxed retry on a single-camera device lands on the front camera.
        let session = pipeline.toggle_facing()?;
        assert_eq!(session.facing, Facing::Front);
        assert_eq!(tracker.live_sessions(), 1);
        Ok(())
    }

    #[test]
    fn drop_releases_session() -> Result<()> {
        let (mut pipeline, tracker) = pipeline(SyntheticConfig::default());
        pipeline.acquire(Facing::Front)?;
        drop(pipeline);
        assert_eq!(tracker.live_sessions(), 0);
        Ok(())
    }

    #[test]
    fn capture_without_session_fails() {
        let (mut pipeline, _tracker) = pipeline(SyntheticConfig::default());
        assert!(pipeline.capture().is_err());
    }

    struct FirstFrame;

    impl CodeScanner for FirstFrame {
        fn scan(&mut self, frame: &crate::frame::Frame) -> Option<String> {
            Some(format!("#frame{}x{}", frame.width, frame.height))
        }
    }

    #[test]
    fn scan_code_reads_from_active_session() -> Result<()> {
        let (mut pipeline, tracker) = pipeline(SyntheticConfig {
            width: 32,
            height: 24,
            ..SyntheticConfig::default()
        });
        assert_eq!(
            pipeline.scan_code(&mut FirstFrame, 3).err(),
            Some(CameraError::NoSession)
        );
        pipeline.acquire(Facing::Back)?;
        let found = pipeline.scan_code(&mut FirstFrame, 3)?;
        assert_eq!(found.as_deref(), Some("#frame32x24"));
        assert_eq!(tracker.live_sessions(), 1);
        Ok(())
    }

    #[test]
    fn capture_with_other_aspect_keeps_that_aspect() -> Result<()> {
        let (mut pipeline, _tracker) = pipeline(SyntheticConfig {
            width: 320,
            height: 180,
            ..SyntheticConfig::default()
        });
        pipeline.acquire(Facing::Back)?;
        let square = AspectRatio::new(1, 1)?;
        let still = pipeline.capture_with_aspect(square)?;
        assert_eq!((still.width, still.height), (160, 160));

        let landscape = AspectRatio::new(4, 3)?;
        let still = pipeline.capture_with_aspect(landscape)?;
        let ratio = still.width as f64 / still.height as f64;
        assert!((ratio - landscape.ratio()).abs() < 0.01, "ratio {}", ratio);
        assert_eq!(still.decode()?.dimensions(), (still.width, still.height));
        Ok(())
    }

    #[test]
    fn geometry_check_rejects_stretching_output() -> Result<()> {
        assert!(CaptureSettings::default().check_geometry().is_ok());
        let stretched = CaptureSettings {
            target_aspect: AspectRatio::new(1, 1)?,
            ..CaptureSettings::default()
        };
        let err = stretched.check_geometry().unwrap_err();
        assert!(err.to_string().contains("set output width to 1920"));
        let empty = CaptureSettings {
            output_height: 0,
            ..CaptureSettings::default()
        };
        assert!(empty.check_geometry().is_err());
        Ok(())
    }

    #[test]
    fn session_is_held_only_on_camera_steps() -> Result<()> {
        let (mut pipeline, tracker) = pipeline(SyntheticConfig::default());

        pipeline.sync_to_step(Step::Welcome, Facing::Front)?;
        assert_eq!(tracker.opens(), 0);

        pipeline.sync_to_step(Step::ScanCode, Facing::Front)?;
        pipeline.sync_to_step(Step::Capture, Facing::Front)?;
        // Scan and capture share one session.
        assert_eq!(tracker.opens(), 1);
        assert_eq!(tracker.live_sessions(), 1);

        for step in [Step::Preview, Step::CopyTags, Step::Share, Step::Reward] {
            pipeline.sync_to_step(Step::Capture, Facing::Front)?;
            pipeline.sync_to_step(step, Facing::Front)?;
            assert_eq!(tracker.live_sessions(), 0, "{} must not hold the camera", step);
        }
        assert_eq!(tracker.peak_sessions(), 1);
        Ok(())
    }

    #[test]
    fn sync_to_step_reports_acquire_failure() {
        let (mut pipeline, tracker) = pipeline(SyntheticConfig {
            busy: true,
            ..SyntheticConfig::default()
        });
        let err = pipeline.sync_to_step(Step::Capture, Facing::Front).err();
        assert!(matches!(err, Some(CameraError::DeviceUnavailable(_))));
        assert_eq!(tracker.live_sessions(), 0);
        assert!(pipeline.sync_to_step(Step::Preview, Facing::Front).is_ok());
    }

    #[test]
    fn capture_failure_keeps_camera_error() {
        let (mut pipeline, _tracker) = pipeline(SyntheticConfig::default());
        let err = pipeline.capture().unwrap_err();
        assert_eq!(err.downcast_ref::<CameraError>(), Some(&CameraError::NoSession));
    }

    #[test]
    fn capture_produces_target_geometry() -> Result<()> {
        let (mut pipeline, _tracker) = pipeline(SyntheticConfig {
            width: 320,
            height: 180,
            ..SyntheticConfig::default()
        });
        pipeline.acquire(Facing::Back)?;
        let still = pipeline.capture()?;
        assert_eq!((still.width, still.height), (90, 160));
        let decoded = still.decode()?;
        assert_eq!(decoded.dimensions(), (90, 160));
        Ok(())
    }

    #[test]
    fn front_capture_is_mirrored_back_is_not() -> Result<()> {
        let config = SyntheticConfig {
            width: 320,
            height: 180,
            ..SyntheticConfig::default()
        };

        let (mut back, _) = pipeline(config.clone());
        back.acquire(Facing::Back)?;
        let back_still = back.capture()?.decode()?;
        // Red ramps left to right in the source.
        assert!(back_still.get_pixel(2, 80)[0] < back_still.get_pixel(87, 80)[0]);

        let (mut front, _) = pipeline(config);
        front.acquire(Facing::Front)?;
        let front_still = front.capture()?.decode()?;
        assert!(front_still.get_pixel(2, 80)[0] > front_still.get_pixel(87, 80)[0]);
        Ok(())
    }
}
