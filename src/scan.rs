//! Code scanning for campaign tags.
//!
//! A booth can ask visitors to scan a code printed at the stand; its payload
//! replaces the default tag string. Scanning is per frame: a frame either
//! decodes or it does not.

use regex::Regex;
use std::sync::OnceLock;

use crate::camera::{CameraError, CameraStream};
use crate::frame::Frame;

/// Decodes a text payload from a frame.
pub trait CodeScanner {
    fn scan(&mut self, frame: &Frame) -> Option<String>;
}

/// Poll `stream` until `scanner` decodes a payload or `max_frames` frames were tried.
///
/// Returns `Ok(None)` when the budget runs out; the caller decides whether to
/// keep scanning or offer "skip".
pub fn scan_stream(
    stream: &mut dyn CameraStream,
    scanner: &mut dyn CodeScanner,
    max_frames: usize,
) -> Result<Option<String>, CameraError> {
    for attempt in 1..=max_frames {
        let frame = stream.next_frame()?;
        if let Some(payload) = scanner.scan(&frame) {
            log::info!("scan: code decoded after {} frame(s)", attempt);
            return Ok(Some(payload));
        }
    }
    log::debug!("scan: no code in {} frame(s)", max_frames);
    Ok(None)
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[@#][\p{L}\p{N}_.]*[\p{L}\p{N}_]").expect("tag pattern compiles")
    })
}

/// Reduce a scanned payload to its `@handle` / `#hashtag` tokens.
///
/// Tokens keep their order and are de-duplicated. Payloads without any token
/// (plain text, URLs) are returned trimmed.
pub fn normalize_tags(payload: &str) -> String {
    let mut tokens: Vec<&str> = Vec::new();
    for token in tag_pattern().find_iter(payload).map(|m| m.as_str()) {
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    if tokens.is_empty() {
        return payload.trim().to_string();
    }
    tokens.join(" ")
}

// ----------------------------------------------------------------------------
// QR scanner (feature: scan-qr)
// ----------------------------------------------------------------------------

/// QR decoder over the frame's luma plane.
#[cfg(feature = "scan-qr")]
#[derive(Debug, Default)]
pub struct QrScanner {
    frames_scanned: u64,
}

#[cfg(feature = "scan-qr")]
impl QrScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_scanned(&self) -> u64 {
        self.frames_scanned
    }
}

#[cfg(feature = "scan-qr")]
impl CodeScanner for QrScanner {
    fn scan(&mut self, frame: &Frame) -> Option<String> {
        self.frames_scanned += 1;
        let width = frame.width as usize;
        let height = frame.height as usize;
        let luma = frame.to_luma();
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| luma[y * width + x]);
        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_meta, content)) => {
                    let content = content.trim().to_string();
                    if !content.is_empty() {
                        return Some(content);
                    }
                }
                Err(err) => log::debug!("scan: qr grid found but not decoded: {:?}", err),
            }
        }
        None
    }
}
