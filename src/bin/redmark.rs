//! redmark - detect and box red objects in a video
//!
//! This binary:
//! 1. Loads configuration (defaults, REDMARK_CONFIG file, REDMARK_* env, CLI flags)
//! 2. Opens the input video and, unless disabled, the output video
//! 3. Segments, annotates and writes every frame in order
//! 4. Shows live previews (feature: window) or watches stdin for quit keys
//! 5. Stops at end of stream, on a cancellation key, or on Ctrl-C
//!
//! Exit status is non-zero only for setup failures.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use redmark::{
    CancelToken, FileMedia, HeadlessPresenter, PipelineError, Presenter, RedmarkConfig,
    RunSummary, VideoPipeline,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input video path (needs the `ffmpeg` feature), or
    /// stub://name[?frames=N&fps=F] for a built-in synthetic clip.
    #[arg(long)]
    input: Option<String>,
    /// Output video path (needs the `ffmpeg` feature; stub://name discards frames).
    #[arg(long, conflicts_with = "no_output")]
    output: Option<String>,
    /// Do not write an output video.
    #[arg(long)]
    no_output: bool,
    /// Minimum contour area; only strictly larger objects are boxed.
    #[arg(long)]
    min_area: Option<f64>,
    /// Four-character output codec tag.
    #[arg(long, value_name = "FOURCC")]
    codec: Option<String>,
    /// Directory for annotated/mask preview JPEGs.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
    /// Write previews every N frames.
    #[arg(long, value_name = "N")]
    snapshot_every: Option<u64>,
    /// Ignore quit keys on stdin (terminal mode only).
    #[arg(long)]
    no_keys: bool,
    /// Use the terminal presenter even when preview windows are available.
    #[arg(long)]
    headless: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args) {
        Ok(summary) => {
            log::info!(
                "redmark finished: {} frames, {} objects boxed ({:?})",
                summary.frames_processed,
                summary.detections,
                summary.termination
            );
        }
        Err(e) => {
            log::error!("{} error: {}", e.kind(), e);
            std::process::exit(1);
        }
    }
}

fn run(args: Args) -> Result<RunSummary, PipelineError> {
    let cfg = load_config(&args)?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel()).context("install Ctrl-C handler")?;

    let presenter = build_presenter(&args, &cfg)?;

    log::info!(
        "redmark running: input={} output={} min_area={}",
        cfg.input,
        cfg.output.as_deref().unwrap_or("<none>"),
        cfg.pipeline.min_area
    );

    let mut pipeline =
        VideoPipeline::new(&cfg.pipeline, FileMedia::new(), presenter).with_cancel_token(cancel);
    pipeline.run(&cfg.input, cfg.output.as_deref())
}

fn build_presenter(args: &Args, cfg: &RedmarkConfig) -> anyhow::Result<Box<dyn Presenter>> {
    if let Some(presenter) = window_presenter(args, cfg) {
        return Ok(presenter);
    }
    let mut presenter = HeadlessPresenter::new().with_cancel_keys(cfg.pipeline.cancel_keys);
    if !args.no_keys {
        presenter = presenter.with_stdin_keys();
    }
    if let Some(dir) = &cfg.snapshot_dir {
        presenter = presenter.with_snapshots(dir, cfg.snapshot_every)?;
        log::info!("writing preview snapshots to {}", dir.display());
    }
    Ok(Box::new(presenter))
}

#[cfg(feature = "window")]
fn window_presenter(args: &Args, cfg: &RedmarkConfig) -> Option<Box<dyn Presenter>> {
    if args.headless {
        return None;
    }
    log::info!("showing preview windows; press a cancellation key in either window to stop");
    Some(Box::new(redmark::WindowPresenter::new(
        cfg.pipeline.cancel_keys,
    )))
}

#[cfg(not(feature = "window"))]
fn window_presenter(args: &Args, _cfg: &RedmarkConfig) -> Option<Box<dyn Presenter>> {
    if !args.headless {
        log::debug!("built without the window feature; using terminal keys");
    }
    None
}

fn load_config(args: &Args) -> anyhow::Result<RedmarkConfig> {
    let mut cfg = RedmarkConfig::load()?;
    if let Some(input) = &args.input {
        cfg.input = input.clone();
    }
    if args.no_output {
        cfg.output = None;
    } else if let Some(output) = &args.output {
        cfg.output = Some(output.clone());
    }
    if let Some(min_area) = args.min_area {
        cfg.pipeline.min_area = min_area;
    }
    if let Some(codec) = &args.codec {
        cfg.pipeline.codec = codec.parse()?;
    }
    if let Some(dir) = &args.snapshot_dir {
        cfg.snapshot_dir = Some(dir.clone());
    }
    if let Some(every) = args.snapshot_every {
        cfg.snapshot_every = every;
    }
    cfg.validate()?;
    Ok(cfg)
}
