//! Terminal kiosk plumbing shared by the booth loop.
//!
//! Keyboard lines and Ctrl-C arrive on one channel. Every place that waits for
//! input goes through `next_line`, so a shutdown is never swallowed by a
//! nested prompt.

use std::ops::ControlFlow;
use std::sync::mpsc::Receiver;

use crate::camera::CameraError;

/// One event from the kiosk's input channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KioskInput {
    Line(String),
    Eof,
    Interrupt,
}

/// Why the loop must stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shutdown {
    /// Input closed, or every sender is gone.
    Eof,
    /// Ctrl-C.
    Interrupt,
}

/// Wait for the next line, or the reason to stop.
pub fn next_line(input: &Receiver<KioskInput>) -> ControlFlow<Shutdown, String> {
    match input.recv() {
        Ok(KioskInput::Line(line)) => ControlFlow::Continue(line),
        Ok(KioskInput::Interrupt) => ControlFlow::Break(Shutdown::Interrupt),
        Ok(KioskInput::Eof) | Err(_) => ControlFlow::Break(Shutdown::Eof),
    }
}

/// Camera failure behind an operation error, if that is what failed.
///
/// Capture and scan report device problems as `CameraError` wrapped in
/// `anyhow`; anything else (e.g. an encoder error) is not shown as a camera
/// problem.
pub fn camera_failure(err: &anyhow::Error) -> Option<CameraError> {
    err.downcast_ref::<CameraError>().cloned()
}
