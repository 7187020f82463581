//! Clipboard and share surfaces.
//!
//! Both are best-effort boundaries. A clipboard write reports success only so
//! the screen can flash an acknowledgement. A share attempt that is
//! unsupported or fails turns into manual instructions; it never blocks the
//! self-reported "done" action that leads to the reward.

use anyhow::{anyhow, Context, Result};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::campaign::Campaign;
use crate::frame::StillImage;

// ----------------------------------------------------------------------------
// Clipboard
// ----------------------------------------------------------------------------

pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> Result<()>;
}

/// In-process clipboard. Keeps the last written text.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Option<String>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<&str> {
        self.contents.as_deref()
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> Result<()> {
        self.contents = Some(text.to_string());
        Ok(())
    }
}

/// Pipes text into an external clipboard tool (e.g. `wl-copy`, `xclip -selection clipboard`).
#[derive(Clone, Debug)]
pub struct CommandClipboard {
    program: String,
    args: Vec<String>,
}

impl CommandClipboard {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace-separated command line.
    pub fn from_command_line(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| anyhow!("clipboard command must not be empty"))?;
        Ok(Self::new(program, parts.collect()))
    }
}

impl Clipboard for CommandClipboard {
    fn write_text(&mut self, text: &str) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawn clipboard command {}", self.program))?;
        {
            let stdin = child
                .stdin
                .as_mut()
                .ok_or_else(|| anyhow!("clipboard command has no stdin"))?;
            stdin
                .write_all(text.as_bytes())
                .context("write clipboard text")?;
        }
        // Close stdin so the tool sees EOF.
        drop(child.stdin.take());
        let status = child.wait().context("wait for clipboard command")?;
        if !status.success() {
            return Err(anyhow!("clipboard command {} exited with {}", self.program, status));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Share surface
// ----------------------------------------------------------------------------

/// A file attached to a share request. Borrows the still; no copy is made.
#[derive(Clone, Debug)]
pub struct ShareFile<'a> {
    pub name: String,
    pub mime: &'static str,
    pub bytes: &'a [u8],
}

/// `{files, title, text}` handed to a share surface.
#[derive(Clone, Debug)]
pub struct ShareRequest<'a> {
    pub files: Vec<ShareFile<'a>>,
    pub title: String,
    pub text: String,
}

impl<'a> ShareRequest<'a> {
    pub fn for_still(campaign: &Campaign, still: &'a StillImage, tags: &str) -> Self {
        Self {
            files: vec![ShareFile {
                name: campaign.image_file_name.clone(),
                mime: "image/jpeg",
                bytes: still.as_bytes(),
            }],
            title: campaign.share_title.clone(),
            text: campaign.share_text_for(tags),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShareError {
    /// No share surface on this device.
    Unsupported,
    Failed(String),
}

impl fmt::Display for ShareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShareError::Unsupported => write!(f, "sharing is not supported here"),
            ShareError::Failed(reason) => write!(f, "share failed: {}", reason),
        }
    }
}

impl std::error::Error for ShareError {}

/// Result of a share attempt. Completion and cancellation look the same.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShareOutcome {
    /// Handed to the surface. Says nothing about whether a post was made.
    Handed { location: Option<PathBuf> },
    /// Manual steps to show instead.
    Fallback(String),
}

pub trait ShareSurface {
    fn share(&mut self, request: &ShareRequest<'_>) -> Result<ShareOutcome, ShareError>;
}

/// Device without a share surface.
#[derive(Debug, Default)]
pub struct UnsupportedShare;

impl ShareSurface for UnsupportedShare {
    fn share(&mut self, _request: &ShareRequest<'_>) -> Result<ShareOutcome, ShareError> {
        Err(ShareError::Unsupported)
    }
}

/// Kiosk share surface: drops the files plus a caption into an outbox
/// directory picked up by the stand's sharing station.
#[derive(Debug)]
pub struct OutboxShare {
    dir: PathBuf,
    sequence: u64,
}

impl OutboxShare {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sequence: 0,
        }
    }

    fn write_entry(&mut self, request: &ShareRequest<'_>) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create outbox {}", self.dir.display()))?;
        self.sequence += 1;
        let entry = self.dir.join(format!(
            "share-{}-{:04}",
            std::process::id(),
            self.sequence
        ));
        std::fs::create_dir_all(&entry)
            .with_context(|| format!("create outbox entry {}", entry.display()))?;
        for file in &request.files {
            let name = Path::new(&file.name)
                .file_name()
                .ok_or_else(|| anyhow!("invalid share file name: {}", file.name))?;
            std::fs::write(entry.join(name), file.bytes)
                .with_context(|| format!("write {}", file.name))?;
        }
        let caption = format!("{}\n{}\n", request.title, request.text);
        std::fs::write(entry.join("caption.txt"), caption).context("write caption")?;
        Ok(entry)
    }
}

impl ShareSurface for OutboxShare {
    fn share(&mut self, request: &ShareRequest<'_>) -> Result<ShareOutcome, ShareError> {
        let entry = self
            .write_entry(request)
            .map_err(|err| ShareError::Failed(format!("{:#}", err)))?;
        log::info!("share: queued {} file(s) in {}", request.files.len(), entry.display());
        Ok(ShareOutcome::Handed {
            location: Some(entry),
        })
    }
}

/// Manual steps shown when no share surface is usable.
pub fn fallback_instructions(tags: &str) -> String {
    format!(
        "To share on Instagram:\n1. Save the photo\n2. Open Instagram\n3. Paste the tags: {}",
        tags
    )
}

/// Try the surface; fall back to instructions on any failure.
pub fn share_or_fallback(
    surface: &mut dyn ShareSurface,
    request: &ShareRequest<'_>,
    tags: &str,
) -> ShareOutcome {
    match surface.share(request) {
        Ok(outcome) => outcome,
        Err(ShareError::Unsupported) => {
            log::info!("share: no share surface, showing manual steps");
            ShareOutcome::Fallback(fallback_instructions(tags))
        }
        Err(err) => {
            log::warn!("share: {}", err);
            ShareOutcome::Fallback(fallback_instructions(tags))
        }
    }
}
