//! Flow controller.
//!
//! Single source of truth for which screen is showing and for the data handed
//! between screens (the captured still and the tag string).
//!
//! ```text
//! Welcome -> [ScanCode] -> Capture -> Preview -> [CopyTags] -> Share -> Reward
//!    ^                                                                   |
//!    +------------------------------ reset ------------------------------+
//! ```
//!
//! The controller only sequences. It performs no I/O and never advances on its
//! own: every step change is an explicit call. An illegal call returns an error
//! and leaves the state untouched.
//!
//! The state is only reachable through read accessors:
//!
//! ```compile_fail
//! use promo_booth::{FlowController, FlowOptions, Step};
//! let mut flow = FlowController::new(FlowOptions::default());
//! flow.state().step = Step::Reward;
//! ```

use std::fmt;

use crate::frame::StillImage;
use crate::DEFAULT_TAG_TEXT;

/// Screens in flow order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Step {
    Welcome,
    ScanCode,
    Capture,
    Preview,
    CopyTags,
    Share,
    Reward,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Welcome => "welcome",
            Step::ScanCode => "scan_code",
            Step::Capture => "capture",
            Step::Preview => "preview",
            Step::CopyTags => "copy_tags",
            Step::Share => "share",
            Step::Reward => "reward",
        }
    }

    /// Steps that render the captured still and therefore require one.
    pub fn requires_image(self) -> bool {
        self >= Step::Preview
    }

    /// Steps that show a live camera feed.
    pub fn uses_camera(self) -> bool {
        matches!(self, Step::ScanCode | Step::Capture)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transition entry points, named for error reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowAction {
    Start,
    CodeScanned,
    Skip,
    Captured,
    Retake,
    Confirm,
    TagsCopied,
    Back,
    ShareComplete,
    Reset,
}

impl fmt::Display for FlowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowAction::Start => "start",
            FlowAction::CodeScanned => "code_scanned",
            FlowAction::Skip => "skip",
            FlowAction::Captured => "captured",
            FlowAction::Retake => "retake",
            FlowAction::Confirm => "confirm",
            FlowAction::TagsCopied => "tags_copied",
            FlowAction::Back => "back",
            FlowAction::ShareComplete => "share_complete",
            FlowAction::Reset => "reset",
        };
        f.write_str(name)
    }
}

/// Rejected transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowError {
    /// The action is not available from the current step.
    InvalidTransition { from: Step, action: FlowAction },
    /// `captured` was handed an empty image.
    EmptyImage,
    /// A scanned code decoded to nothing usable.
    EmptyTagText,
    /// A step that shows the photo was requested with no photo stored.
    MissingImage { action: FlowAction },
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowError::InvalidTransition { from, action } => {
                write!(f, "{} is not allowed from {}", action, from)
            }
            FlowError::EmptyImage => write!(f, "captured image is empty"),
            FlowError::EmptyTagText => write!(f, "scanned tag text is empty"),
            FlowError::MissingImage { action } => {
                write!(f, "{} requires a captured image", action)
            }
        }
    }
}

impl std::error::Error for FlowError {}

/// Per-deployment detours.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlowOptions {
    /// Route `start` through the code-scan screen.
    pub scan_code: bool,
    /// Route `confirm` through the tag-copy screen.
    pub copy_tags: bool,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            scan_code: false,
            copy_tags: true,
        }
    }
}

/// Everything the screens read.
#[derive(Debug)]
pub struct FlowState {
    step: Step,
    captured_image: Option<StillImage>,
    tag_text: String,
}

impl FlowState {
    fn initial(default_tags: &str) -> Self {
        Self {
            step: Step::Welcome,
            captured_image: None,
            tag_text: default_tags.to_string(),
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn captured_image(&self) -> Option<&StillImage> {
        self.captured_image.as_ref()
    }

    pub fn tag_text(&self) -> &str {
        &self.tag_text
    }
}

/// Linear onboarding state machine.
#[derive(Debug)]
pub struct FlowController {
    state: FlowState,
    options: FlowOptions,
    default_tags: String,
}

impl FlowController {
    pub fn new(options: FlowOptions) -> Self {
        Self::with_default_tags(options, DEFAULT_TAG_TEXT)
    }

    pub fn with_default_tags(options: FlowOptions, default_tags: &str) -> Self {
        Self {
            state: FlowState::initial(default_tags),
            options,
            default_tags: default_tags.to_string(),
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn step(&self) -> Step {
        self.state.step
    }

    pub fn captured_image(&self) -> Option<&StillImage> {
        self.state.captured_image.as_ref()
    }

    pub fn tag_text(&self) -> &str {
        &self.state.tag_text
    }

    /// Number shown by the step indicator; 0 where the indicator is hidden.
    pub fn step_number(&self) -> u8 {
        match self.state.step {
            Step::Welcome => 0,
            Step::ScanCode | Step::Capture | Step::Preview => 1,
            Step::CopyTags => 2,
            Step::Share => 3,
            Step::Reward => 4,
        }
    }

    pub fn shows_step_indicator(&self) -> bool {
        !matches!(self.state.step, Step::Welcome | Step::Reward)
    }

    /// Welcome → Capture, or → ScanCode when the scan detour is enabled.
    pub fn start(&mut self) -> Result<Step, FlowError> {
        self.expect(Step::Welcome, FlowAction::Start)?;
        let next = if self.options.scan_code {
            Step::ScanCode
        } else {
            Step::Capture
        };
        Ok(self.enter(next, FlowAction::Start))
    }

    /// ScanCode → Capture, replacing the tag string with the scanned one.
    pub fn code_scanned(&mut self, tag_text: &str) -> Result<Step, FlowError> {
        self.expect(Step::ScanCode, FlowAction::CodeScanned)?;
        let tag_text = tag_text.trim();
        if tag_text.is_empty() {
            return Err(FlowError::EmptyTagText);
        }
        self.state.tag_text = tag_text.to_string();
        Ok(self.enter(Step::Capture, FlowAction::CodeScanned))
    }

    /// ScanCode → Capture, keeping the current tag string.
    pub fn skip(&mut self) -> Result<Step, FlowError> {
        self.expect(Step::ScanCode, FlowAction::Skip)?;
        Ok(self.enter(Step::Capture, FlowAction::Skip))
    }

    /// Capture → Preview, storing the still. Any earlier still is dropped.
    pub fn captured(&mut self, image: StillImage) -> Result<Step, FlowError> {
        self.expect(Step::Capture, FlowAction::Captured)?;
        if image.is_empty() {
            return Err(FlowError::EmptyImage);
        }
        self.state.captured_image = Some(image);
        Ok(self.enter(Step::Preview, FlowAction::Captured))
    }

    /// Preview → Capture. The stored still stays until the next capture replaces it.
    pub fn retake(&mut self) -> Result<Step, FlowError> {
        self.expect(Step::Preview, FlowAction::Retake)?;
        Ok(self.enter(Step::Capture, FlowAction::Retake))
    }

    /// Preview → CopyTags (or → Share when the tag detour is off).
    pub fn confirm(&mut self) -> Result<Step, FlowError> {
        self.expect(Step::Preview, FlowAction::Confirm)?;
        self.require_image(FlowAction::Confirm)?;
        let next = if self.options.copy_tags {
            Step::CopyTags
        } else {
            Step::Share
        };
        Ok(self.enter(next, FlowAction::Confirm))
    }

    /// CopyTags → Share.
    pub fn tags_copied(&mut self) -> Result<Step, FlowError> {
        self.expect(Step::CopyTags, FlowAction::TagsCopied)?;
        self.require_image(FlowAction::TagsCopied)?;
        Ok(self.enter(Step::Share, FlowAction::TagsCopied))
    }

    /// Retreat one screen. Leaving Capture this way abandons the capture.
    pub fn back(&mut self) -> Result<Step, FlowError> {
        let next = match self.state.step {
            Step::ScanCode | Step::Capture => Step::Welcome,
            Step::CopyTags => Step::Preview,
            Step::Share if self.options.copy_tags => Step::CopyTags,
            Step::Share => Step::Preview,
            from @ (Step::Welcome | Step::Preview | Step::Reward) => {
                return Err(FlowError::InvalidTransition {
                    from,
                    action: FlowAction::Back,
                });
            }
        };
        if next.requires_image() {
            self.require_image(FlowAction::Back)?;
        }
        Ok(self.enter(next, FlowAction::Back))
    }

    /// Share → Reward. Self-reported: nothing checks that a post was made.
    pub fn share_complete(&mut self) -> Result<Step, FlowError> {
        self.expect(Step::Share, FlowAction::ShareComplete)?;
        self.require_image(FlowAction::ShareComplete)?;
        Ok(self.enter(Step::Reward, FlowAction::ShareComplete))
    }

    /// Any step → Welcome. Drops the still and restores the default tags.
    pub fn reset(&mut self) -> Step {
        let from = self.state.step;
        self.state = FlowState::initial(&self.default_tags);
        log::debug!("flow: {} -> {} ({})", from, Step::Welcome, FlowAction::Reset);
        Step::Welcome
    }

    fn expect(&self, step: Step, action: FlowAction) -> Result<(), FlowError> {
        if self.state.step != step {
            return Err(FlowError::InvalidTransition {
                from: self.state.step,
                action,
            });
        }
        Ok(())
    }

    fn require_image(&self, action: FlowAction) -> Result<(), FlowError> {
        if self.state.captured_image.is_none() {
            log::error!(
                "flow invariant violated: {} from {} with no captured image",
                action,
                self.state.step
            );
            return Err(FlowError::MissingImage { action });
        }
        Ok(())
    }

    fn enter(&mut self, next: Step, action: FlowAction) -> Step {
        log::debug!("flow: {} -> {} ({})", self.state.step, next, action);
        self.state.step = next;
        next
    }

    #[cfg(test)]
    fn force_step(&mut self, step: Step) {
        self.state.step = step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Facing;

    #[test]
    fn only_scan_and_capture_use_the_camera() {
        let camera_steps: Vec<Step> = [
            Step::Welcome,
            Step::ScanCode,
            Step::Capture,
            Step::Preview,
            Step::CopyTags,
            Step::Share,
            Step::Reward,
        ]
        .into_iter()
        .filter(|step| step.uses_camera())
        .collect();
        assert_eq!(camera_steps, vec![Step::ScanCode, Step::Capture]);
    }

    fn still(tag: u8) -> StillImage {
        StillImage::new(vec![0xFF, 0xD8, tag], 1, 1, Facing::Front)
    }

    #[test]
    fn start_goes_to_capture_by_default() {
        let mut flow = FlowController::new(FlowOptions::default());
        assert_eq!(flow.start(), Ok(Step::Capture));
    }

    #[test]
    fn start_goes_to_scan_when_enabled() {
        let mut flow = FlowController::new(FlowOptions {
            scan_code: true,
            ..FlowOptions::default()
        });
        assert_eq!(flow.start(), Ok(Step::ScanCode));
        assert_eq!(flow.code_scanned("  #booth42 "), Ok(Step::Capture));
        assert_eq!(flow.tag_text(), "#booth42");
    }

    #[test]
    fn skip_keeps_default_tags() {
        let mut flow = FlowController::new(FlowOptions {
            scan_code: true,
            ..FlowOptions::default()
        });
        flow.start().unwrap();
        assert_eq!(flow.skip(), Ok(Step::Capture));
        assert_eq!(flow.tag_text(), DEFAULT_TAG_TEXT);
    }

    #[test]
    fn empty_scan_payload_is_rejected() {
        let mut flow = FlowController::new(FlowOptions {
            scan_code: true,
            ..FlowOptions::default()
        });
        flow.start().unwrap();
        assert_eq!(flow.code_scanned("   "), Err(FlowError::EmptyTagText));
        assert_eq!(flow.step(), Step::ScanCode);
    }

    #[test]
    fn captured_rejects_empty_image() {
        let mut flow = FlowController::new(FlowOptions::default());
        flow.start().unwrap();
        let empty = StillImage::new(Vec::new(), 0, 0, Facing::Back);
        assert_eq!(flow.captured(empty), Err(FlowError::EmptyImage));
        assert_eq!(flow.step(), Step::Capture);
        assert!(flow.captured_image().is_none());
    }

    #[test]
    fn confirm_without_image_does_not_transition() {
        let mut flow = FlowController::new(FlowOptions::default());
        flow.force_step(Step::Preview);
        assert_eq!(
            flow.confirm(),
            Err(FlowError::MissingImage {
                action: FlowAction::Confirm
            })
        );
        assert_eq!(flow.step(), Step::Preview);
    }

    #[test]
    fn confirm_skips_tag_screen_when_disabled() {
        let mut flow = FlowController::new(FlowOptions {
            copy_tags: false,
            ..FlowOptions::default()
        });
        flow.start().unwrap();
        flow.captured(still(1)).unwrap();
        assert_eq!(flow.confirm(), Ok(Step::Share));
        assert_eq!(flow.back(), Ok(Step::Preview));
    }

    #[test]
    fn illegal_actions_leave_state_untouched() {
        let mut flow = FlowController::new(FlowOptions::default());
        assert_eq!(
            flow.share_complete(),
            Err(FlowError::InvalidTransition {
                from: Step::Welcome,
                action: FlowAction::ShareComplete
            })
        );
        assert!(flow.retake().is_err());
        assert!(flow.skip().is_err());
        assert!(flow.back().is_err());
        assert_eq!(flow.step(), Step::Welcome);
    }

    #[test]
    fn back_from_capture_abandons_to_welcome() {
        let mut flow = FlowController::new(FlowOptions::default());
        flow.start().unwrap();
        assert_eq!(flow.back(), Ok(Step::Welcome));
        assert_eq!(flow.start(), Ok(Step::Capture));
    }

    #[test]
    fn reset_from_every_step_restores_initial_state() {
        let steps = [
            Step::Welcome,
            Step::ScanCode,
            Step::Capture,
            Step::Preview,
            Step::CopyTags,
            Step::Share,
            Step::Reward,
        ];
        for step in steps {
            let mut flow = FlowController::new(FlowOptions {
                scan_code: true,
                copy_tags: true,
            });
            flow.start().unwrap();
            flow.code_scanned("#scanned").unwrap();
            flow.captured(still(7)).unwrap();
            flow.force_step(step);

            assert_eq!(flow.reset(), Step::Welcome);
            assert_eq!(flow.step(), Step::Welcome);
            assert!(flow.captured_image().is_none());
            assert_eq!(flow.tag_text(), DEFAULT_TAG_TEXT);
        }
    }

    #[test]
    fn step_indicator_numbers() {
        let mut flow = FlowController::new(FlowOptions::default());
        assert_eq!(flow.step_number(), 0);
        assert!(!flow.shows_step_indicator());
        flow.start().unwrap();
        assert_eq!(flow.step_number(), 1);
        flow.captured(still(1)).unwrap();
        flow.confirm().unwrap();
        assert_eq!(flow.step_number(), 2);
        flow.tags_copied().unwrap();
        assert_eq!(flow.step_number(), 3);
        flow.share_complete().unwrap();
        assert_eq!(flow.step_number(), 4);
        assert!(!flow.shows_step_indicator());
    }

    #[test]
    fn custom_default_tags_survive_reset() {
        let mut flow = FlowController::with_default_tags(FlowOptions::default(), "#fair");
        assert_eq!(flow.tag_text(), "#fair");
        flow.start().unwrap();
        flow.reset();
        assert_eq!(flow.tag_text(), "#fair");
    }
}
