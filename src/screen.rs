//! Per-step view models.
//!
//! A `Screen` is what a front end draws for the current flow state: copy from
//! the campaign table, the step indicator, and the actions the visitor can
//! take. Actions map one-to-one onto controller transitions or capture
//! pipeline operations.

use std::fmt::Write as _;

use crate::camera::CameraError;
use crate::campaign::Campaign;
use crate::flow::{FlowController, Step};

/// Something the visitor can do on a screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Start,
    Scan,
    Skip,
    TakePhoto,
    SwitchCamera,
    Retake,
    Confirm,
    CopyTags,
    Next,
    Share,
    Done,
    Back,
    Retry,
    Reset,
}

impl Action {
    /// Single-key shortcut used by terminal front ends.
    pub fn key(self) -> &'static str {
        match self {
            Action::Start => "s",
            Action::Scan => "q",
            Action::Skip => "k",
            Action::TakePhoto => "p",
            Action::SwitchCamera => "f",
            Action::Retake => "r",
            Action::Confirm => "y",
            Action::CopyTags => "c",
            Action::Next => "n",
            Action::Share => "h",
            Action::Done => "d",
            Action::Back => "b",
            Action::Retry => "t",
            Action::Reset => "x",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        ALL_ACTIONS
            .iter()
            .copied()
            .find(|action| action.key() == key.trim())
    }
}

const ALL_ACTIONS: [Action; 14] = [
    Action::Start,
    Action::Scan,
    Action::Skip,
    Action::TakePhoto,
    Action::SwitchCamera,
    Action::Retake,
    Action::Confirm,
    Action::CopyTags,
    Action::Next,
    Action::Share,
    Action::Done,
    Action::Back,
    Action::Retry,
    Action::Reset,
];

/// A labelled action on a screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScreenAction {
    pub action: Action,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Screen {
    pub step: Step,
    pub title: String,
    pub body: Vec<String>,
    /// Step indicator value, `None` where the indicator is hidden.
    pub indicator: Option<u8>,
    /// Tag string, on screens that show it.
    pub tags: Option<String>,
    pub actions: Vec<ScreenAction>,
}

impl Screen {
    /// Screen for the controller's current step.
    pub fn for_flow(flow: &FlowController, campaign: &Campaign) -> Self {
        let step = flow.step();
        let copy = campaign.screens.for_step(step);
        let primary = copy.primary.clone();
        let secondary = copy.secondary.clone().unwrap_or_else(|| "Back".to_string());

        let actions = match step {
            Step::Welcome => vec![labelled(Action::Start, primary)],
            Step::ScanCode => vec![
                labelled(Action::Scan, primary),
                labelled(Action::Skip, secondary),
                labelled(Action::Back, "Back".to_string()),
            ],
            Step::Capture => vec![
                labelled(Action::TakePhoto, primary),
                labelled(Action::SwitchCamera, "Switch camera".to_string()),
                labelled(Action::Back, secondary),
            ],
            Step::Preview => vec![
                labelled(Action::Confirm, primary),
                labelled(Action::Retake, secondary),
            ],
            Step::CopyTags => vec![
                labelled(Action::CopyTags, "Copy tags".to_string()),
                labelled(Action::Next, primary),
                labelled(Action::Back, secondary),
            ],
            Step::Share => vec![
                labelled(Action::CopyTags, "Copy tags".to_string()),
                labelled(Action::Share, "Share photo".to_string()),
                labelled(Action::Done, primary),
                labelled(Action::Back, secondary),
            ],
            Step::Reward => vec![labelled(Action::Reset, primary)],
        };

        let tags = matches!(step, Step::CopyTags | Step::Share).then(|| flow.tag_text().to_string());

        Self {
            step,
            title: copy.title.clone(),
            body: copy.body.clone(),
            indicator: flow.shows_step_indicator().then(|| flow.step_number()),
            tags,
            actions,
        }
    }

    /// Error overlay for the capture or scan screen. The message always comes
    /// before the retry/back choice.
    pub fn camera_error(flow: &FlowController, campaign: &Campaign, error: &CameraError) -> Self {
        let mut screen = Self::for_flow(flow, campaign);
        screen.body = vec![error.user_message().to_string()];
        screen.actions = vec![
            labelled(Action::Retry, "Try again".to_string()),
            labelled(Action::Back, "Go back".to_string()),
        ];
        if flow.step() == Step::ScanCode {
            screen
                .actions
                .insert(1, labelled(Action::Skip, "Continue without code".to_string()));
        }
        screen
    }

    pub fn offers(&self, action: Action) -> bool {
        self.actions.iter().any(|entry| entry.action == action)
    }

    /// Plain-text rendering for terminal kiosks.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(step) = self.indicator {
            let _ = writeln!(out, "[step {}/4]", step);
        }
        let _ = writeln!(out, "== {} ==", self.title);
        for line in &self.body {
            let _ = writeln!(out, "{}", line);
        }
        if let Some(tags) = &self.tags {
            let _ = writeln!(out, "\n  {}\n", tags);
        }
        for entry in &self.actions {
            let _ = writeln!(out, "  [{}] {}", entry.action.key(), entry.label);
        }
        out
    }
}

fn labelled(action: Action, label: String) -> ScreenAction {
    ScreenAction { action, label }
}
