//! booth - interactive photo booth kiosk on a terminal
//!
//! Drives the flow controller from single-key commands on stdin, keeps one
//! camera session open while the scan or capture screen is showing, and
//! releases it as soon as the visitor leaves those screens.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufRead, IsTerminal};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use promo_booth::config::BoothConfig;
use promo_booth::{
    camera_failure, next_line, open_camera, share_or_fallback, Action, CameraError,
    CapturePipeline, Clipboard, CommandClipboard, FlowController, KioskInput, MemoryClipboard,
    OutboxShare, Screen, ShareOutcome, ShareRequest, Shutdown, Step,
};

#[path = "../ui.rs"]
mod ui;

/// Frames polled per scan attempt before offering the choices again.
#[cfg(feature = "scan-qr")]
const SCAN_FRAME_BUDGET: usize = 90;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML by extension). Falls back to BOOTH_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Camera URI (stub://name, /dev/videoN, v4l2:///dev/videoN?back=/dev/videoM).
    #[arg(long)]
    camera: Option<String>,
    /// Ask visitors to scan the stand code before the photo.
    #[arg(long)]
    scan_code: bool,
    /// Skip the dedicated tag copy screen.
    #[arg(long)]
    no_copy_tags: bool,
    /// Directory the share station picks photos up from.
    #[arg(long)]
    outbox: Option<PathBuf>,
    /// Clipboard command, e.g. "wl-copy" or "xclip -selection clipboard".
    #[arg(long, env = "BOOTH_CLIPBOARD")]
    clipboard: Option<String>,
    /// UI mode: auto|plain|pretty
    #[arg(long, default_value = "auto")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let mut cfg = match &args.config {
        Some(path) => BoothConfig::load_from(Some(path))?,
        None => BoothConfig::load()?,
    };
    if let Some(camera) = args.camera {
        cfg.camera_uri = camera;
    }
    if args.scan_code {
        cfg.flow.scan_code = true;
    }
    if args.no_copy_tags {
        cfg.flow.copy_tags = false;
    }
    if let Some(outbox) = args.outbox {
        cfg.outbox = outbox;
    }
    if let Some(command) = args.clipboard {
        cfg.clipboard_command = Some(command);
    }

    let device = {
        let _stage = ui.stage("Open camera device");
        open_camera(&cfg.camera_uri)?
    };
    let mut pipeline = CapturePipeline::new(device, cfg.capture);
    let mut clipboard: Box<dyn Clipboard> = match cfg.clipboard_command.as_deref() {
        Some(command) => Box::new(CommandClipboard::from_command_line(command)?),
        None => Box::new(MemoryClipboard::new()),
    };
    let mut outbox = OutboxShare::new(cfg.outbox.clone());
    let mut flow = FlowController::with_default_tags(cfg.flow, &cfg.campaign.default_tags);

    let (tx, rx) = mpsc::channel();
    let interrupt_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(KioskInput::Interrupt);
    })
    .context("error setting Ctrl-C handler")?;
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(KioskInput::Line(line)).is_err() {
                        return;
                    }
                }
                Err(_) => break,
            }
        }
        let _ = tx.send(KioskInput::Eof);
    });

    log::info!(
        "booth ready: camera={} scan_code={} copy_tags={} outbox={}",
        cfg.camera_uri,
        cfg.flow.scan_code,
        cfg.flow.copy_tags,
        cfg.outbox.display()
    );

    let mut camera_error: Option<CameraError> = None;
    let mut facing = cfg.initial_facing;
    let shutdown = loop {
        if !flow.step().uses_camera() {
            camera_error = None;
        }
        if camera_error.is_none() {
            let _stage = (flow.step().uses_camera() && !pipeline.is_active())
                .then(|| ui.stage("Start camera"));
            if let Err(err) = pipeline.sync_to_step(flow.step(), facing) {
                camera_error = Some(err);
            }
        }

        let screen = match &camera_error {
            Some(err) => Screen::camera_error(&flow, &cfg.campaign, err),
            None => Screen::for_flow(&flow, &cfg.campaign),
        };
        println!("{}", screen.render());
        if flow.step() == Step::Preview {
            if let Some(still) = flow.captured_image() {
                println!("  photo: {}x{}, {} bytes\n", still.width, still.height, still.len());
            }
        }

        let line = match next_line(&rx) {
            ControlFlow::Continue(line) => line,
            ControlFlow::Break(reason) => break reason,
        };
        let Some(action) = Action::from_key(&line).filter(|action| screen.offers(*action)) else {
            if !line.trim().is_empty() {
                println!("  unknown choice: {}", line.trim());
            }
            continue;
        };

        let result: Result<()> = match action {
            Action::Start => flow.start().map(drop).map_err(Into::into),
            Action::Skip => {
                camera_error = None;
                flow.skip().map(drop).map_err(Into::into)
            }
            Action::Scan => match scan(&mut pipeline, &mut flow, &ui, &rx) {
                Ok(ControlFlow::Continue(())) => Ok(()),
                Ok(ControlFlow::Break(reason)) => break reason,
                Err(err) => Err(err),
            },
            Action::TakePhoto => {
                let mut stage = ui.stage("Capture photo");
                match pipeline.capture() {
                    Ok(still) => flow.captured(still).map(drop).map_err(Into::into),
                    Err(err) => {
                        stage.fail();
                        Err(err)
                    }
                }
            }
            Action::SwitchCamera => {
                facing = pipeline.facing().toggled();
                pipeline.toggle_facing().map(drop).map_err(Into::into)
            }
            Action::Retake => flow.retake().map(drop).map_err(Into::into),
            Action::Confirm => flow.confirm().map(drop).map_err(Into::into),
            Action::CopyTags => {
                match clipboard.write_text(flow.tag_text()) {
                    Ok(()) => ui.flash("Copied!", Duration::from_millis(800)),
                    Err(err) => log::warn!("clipboard: {:#}", err),
                }
                Ok(())
            }
            Action::Next => flow.tags_copied().map(drop).map_err(Into::into),
            Action::Share => {
                if let Some(still) = flow.captured_image() {
                    let request = ShareRequest::for_still(&cfg.campaign, still, flow.tag_text());
                    match share_or_fallback(&mut outbox, &request, flow.tag_text()) {
                        ShareOutcome::Handed { location: Some(path) } => {
                            println!("  photo queued at {}", path.display())
                        }
                        ShareOutcome::Handed { location: None } => println!("  photo shared"),
                        ShareOutcome::Fallback(steps) => println!("{}", steps),
                    }
                }
                Ok(())
            }
            Action::Done => flow.share_complete().map(drop).map_err(Into::into),
            Action::Back => {
                camera_error = None;
                flow.back().map(drop).map_err(Into::into)
            }
            Action::Retry => {
                // Reopen from scratch; a failed frame read may leave a stale session.
                camera_error = None;
                pipeline.release();
                Ok(())
            }
            Action::Reset => {
                flow.reset();
                facing = cfg.initial_facing;
                Ok(())
            }
        };
        if let Err(err) = result {
            if let Some(failure) = camera_failure(&err) {
                camera_error = Some(failure);
            }
            log::warn!("{:#}", err);
        }
    };

    if shutdown == Shutdown::Interrupt {
        log::info!("shutdown signal received, releasing camera");
    }
    pipeline.release();
    Ok(())
}

#[cfg(feature = "scan-qr")]
fn scan(
    pipeline: &mut CapturePipeline,
    flow: &mut FlowController,
    ui: &ui::Ui,
    _input: &mpsc::Receiver<KioskInput>,
) -> Result<ControlFlow<Shutdown>> {
    let mut scanner = promo_booth::QrScanner::new();
    let found = {
        let _stage = ui.stage("Scan code");
        pipeline.scan_code(&mut scanner, SCAN_FRAME_BUDGET)?
    };
    match found {
        Some(payload) => {
            flow.code_scanned(&promo_booth::normalize_tags(&payload))?;
        }
        None => println!("  no code found, try again or skip"),
    }
    Ok(ControlFlow::Continue(()))
}

/// Without a decoder the stand code is typed in by staff.
#[cfg(not(feature = "scan-qr"))]
fn scan(
    _pipeline: &mut CapturePipeline,
    flow: &mut FlowController,
    _ui: &ui::Ui,
    input: &mpsc::Receiver<KioskInput>,
) -> Result<ControlFlow<Shutdown>> {
    println!("  Type the code text and press enter:");
    let payload = match next_line(input) {
        ControlFlow::Continue(payload) => payload,
        ControlFlow::Break(reason) => {
            log::info!("scan: input closed before a code was entered");
            return Ok(ControlFlow::Break(reason));
        }
    };
    flow.code_scanned(&promo_booth::normalize_tags(&payload))?;
    Ok(ControlFlow::Continue(()))
}
