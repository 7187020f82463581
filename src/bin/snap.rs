//! snap - one-shot capture of a booth still to a JPEG file
//!
//! Runs the capture pipeline once outside the flow: acquire, capture, release.
//! Handy for framing the stand camera and checking crop and mirroring.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use promo_booth::capture::{DEFAULT_JPEG_QUALITY, DEFAULT_OUTPUT_HEIGHT};
use promo_booth::{open_camera, AspectRatio, CaptureSettings, CapturePipeline, Facing};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about = "Capture one promo booth still")]
struct Args {
    /// Camera URI (stub://name, /dev/videoN, v4l2:///dev/videoN?back=/dev/videoM).
    #[arg(long, env = "BOOTH_CAMERA", default_value = "stub://snap")]
    camera: String,
    /// Camera facing: front|back. Front captures are mirrored.
    #[arg(long, default_value = "front")]
    facing: Facing,
    /// Target aspect ratio, W:H.
    #[arg(long, env = "BOOTH_ASPECT", default_value = "9:16")]
    aspect: AspectRatio,
    /// Output width in pixels. Defaults to the width matching --aspect at --height.
    #[arg(long)]
    width: Option<u32>,
    /// Output height in pixels.
    #[arg(long, default_value_t = DEFAULT_OUTPUT_HEIGHT)]
    height: u32,
    /// JPEG quality, 1..=100.
    #[arg(long, env = "BOOTH_JPEG_QUALITY", default_value_t = DEFAULT_JPEG_QUALITY)]
    quality: u8,
    /// Output file.
    #[arg(long, default_value = "snap.jpg")]
    output: PathBuf,
    /// UI mode: auto|plain|pretty
    #[arg(long, default_value = "auto")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if !(1..=100).contains(&args.quality) {
        return Err(anyhow!("quality must be in 1..=100"));
    }

    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let width = args.width.unwrap_or_else(|| args.aspect.width_for(args.height));
    let settings = CaptureSettings {
        ideal_width: width,
        ideal_height: args.height,
        target_aspect: args.aspect,
        output_width: width,
        output_height: args.height,
        jpeg_quality: args.quality,
    };
    settings.check_geometry()?;
    let device = open_camera(&args.camera)?;
    let mut pipeline = CapturePipeline::new(device, settings);

    {
        let mut stage = ui.stage("Start camera");
        if let Err(err) = pipeline.acquire(args.facing) {
            stage.fail();
            log::warn!("snap: {}", err.user_message());
            return Err(err).context("camera unavailable");
        }
    }

    let still = {
        let _stage = ui.stage("Capture still");
        pipeline.capture()?
    };
    pipeline.release();

    {
        let _stage = ui.stage("Write JPEG");
        std::fs::write(&args.output, still.as_bytes())
            .with_context(|| format!("failed to write {}", args.output.display()))?;
    }
    ui.flash(
        &format!(
            "saved {} ({}x{}, {}, {} bytes)",
            args.output.display(),
            still.width,
            still.height,
            still.facing,
            still.len()
        ),
        Duration::from_millis(500),
    );
    Ok(())
}
