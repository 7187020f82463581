//! Campaign copy and branding.
//!
//! One screen per flow step, parameterised by this table. Deployments override
//! any field from the config file; missing fields keep the built-in copy.

use serde::{Deserialize, Serialize};

use crate::flow::Step;
use crate::DEFAULT_TAG_TEXT;

/// Copy for one screen.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScreenCopy {
    pub title: String,
    pub body: Vec<String>,
    /// Label of the main action.
    pub primary: String,
    /// Label of the secondary action (back, retake, skip), if any.
    pub secondary: Option<String>,
}

impl ScreenCopy {
    fn new(title: &str, body: &[&str], primary: &str, secondary: Option<&str>) -> Self {
        Self {
            title: title.to_string(),
            body: body.iter().map(|line| line.to_string()).collect(),
            primary: primary.to_string(),
            secondary: secondary.map(str::to_string),
        }
    }
}

/// Per-step copy table.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScreenTable {
    pub welcome: ScreenCopy,
    pub scan_code: ScreenCopy,
    pub capture: ScreenCopy,
    pub preview: ScreenCopy,
    pub copy_tags: ScreenCopy,
    pub share: ScreenCopy,
    pub reward: ScreenCopy,
}

impl Default for ScreenTable {
    fn default() -> Self {
        Self {
            welcome: ScreenCopy::new(
                "Win a Golden Balloon Dog!",
                &[
                    "Take a photo at our stand.",
                    "Share it with our official tags.",
                    "Collect your prize.",
                ],
                "Start",
                None,
            ),
            scan_code: ScreenCopy::new(
                "Scan the stand code",
                &["Point the camera at the QR code to unlock the official tags."],
                "Scan",
                Some("Skip"),
            ),
            capture: ScreenCopy::new(
                "Find the perfect angle!",
                &["Live preview"],
                "Take photo",
                Some("Back"),
            ),
            preview: ScreenCopy::new(
                "Do you like this photo?",
                &[],
                "Use this one",
                Some("Retake"),
            ),
            copy_tags: ScreenCopy::new(
                "Copy the official tags",
                &["Paste them into your post so we can find it."],
                "Next",
                Some("Back"),
            ),
            share: ScreenCopy::new(
                "Post it on social media",
                &[
                    "1. Copy the official tags",
                    "2. Publish your photo",
                ],
                "Done! Show my prize",
                Some("Back"),
            ),
            reward: ScreenCopy::new(
                "Congratulations!",
                &["Show this screen at the stand to collect your prize."],
                "Start over",
                None,
            ),
        }
    }
}

impl ScreenTable {
    pub fn for_step(&self, step: Step) -> &ScreenCopy {
        match step {
            Step::Welcome => &self.welcome,
            Step::ScanCode => &self.scan_code,
            Step::Capture => &self.capture,
            Step::Preview => &self.preview,
            Step::CopyTags => &self.copy_tags,
            Step::Share => &self.share,
            Step::Reward => &self.reward,
        }
    }
}

/// Campaign branding and copy.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Campaign {
    pub name: String,
    /// Tag string used until a code is scanned, and after every reset.
    pub default_tags: String,
    pub share_title: String,
    /// Text handed to the share surface; `{tags}` is replaced by the tag string.
    pub share_text: String,
    /// File name of the still when shared or saved.
    pub image_file_name: String,
    pub screens: ScreenTable,
}

impl Default for Campaign {
    fn default() -> Self {
        Self {
            name: "Rocca Fun Factory Challenge".to_string(),
            default_tags: DEFAULT_TAG_TEXT.to_string(),
            share_title: "Rocca Fun Factory Challenge".to_string(),
            share_text: "Paste the tags here: {tags}".to_string(),
            image_file_name: "rocca-fun-factory.jpg".to_string(),
            screens: ScreenTable::default(),
        }
    }
}

impl Campaign {
    pub fn share_text_for(&self, tags: &str) -> String {
        self.share_text.replace("{tags}", tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_override_keeps_defaults() -> anyhow::Result<()> {
        let json = r#"{
            "name": "Spring Fair",
            "screens": { "reward": { "title": "Well done!" } }
        }"#;
        let campaign: Campaign = serde_json::from_str(json)?;
        assert_eq!(campaign.name, "Spring Fair");
        assert_eq!(campaign.default_tags, DEFAULT_TAG_TEXT);
        assert_eq!(campaign.screens.reward.title, "Well done!");
        assert!(campaign.screens.reward.body.is_empty());
        assert_eq!(campaign.screens.welcome, ScreenTable::default().welcome);
        Ok(())
    }

    #[test]
    fn share_text_substitutes_tags() {
        let campaign = Campaign::default();
        assert_eq!(
            campaign.share_text_for("#a #b"),
            "Paste the tags here: #a #b"
        );
    }
}
