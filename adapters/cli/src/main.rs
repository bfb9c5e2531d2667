#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that loads a stage file and runs it.

mod behaviors;
mod stage_file;

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use gridstage_rendering::{HeadlessBackend, Presentation, RenderingBackend};
use gridstage_rendering_macroquad::MacroquadBackend;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::stage_file::StageFile;

/// Stage file used when `--stage-file` is not given.
pub(crate) const DEMO_STAGES: &str = include_str!("../stages/demo.toml");

/// Command-line arguments accepted by the gridstage binary.
#[derive(Debug, Parser)]
#[command(name = "gridstage", about = "Runs tile-map stages in a window or headless")]
struct CliArgs {
    /// Frames to run when headless.
    #[arg(long, default_value_t = 600)]
    frames: u64,
    /// Opens a window instead of running headless.
    #[arg(long)]
    window: bool,
    /// Multiplies the window size relative to the surface.
    #[arg(long, default_value_t = 1.0)]
    scale: f32,
    /// TOML stage file to load instead of the built-in demo.
    #[arg(long, value_name = "PATH")]
    stage_file: Option<PathBuf>,
    /// Seed for randomised behaviours.
    #[arg(long, default_value_t = 0x5eed)]
    seed: u64,
    /// Log filter directives, overriding `RUST_LOG`.
    #[arg(long, value_name = "FILTER")]
    log: Option<String>,
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log.as_deref());

    let source = match &args.stage_file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read stage file {}", path.display()))?,
        None => DEMO_STAGES.to_owned(),
    };
    let file = StageFile::parse(&source)?;
    let mut engine = file.build(args.seed)?;
    behaviors::bind_controls(&mut engine);
    engine.init().context("failed to start the first stage")?;
    info!(
        stages = engine.stages().count(),
        seed = args.seed,
        window = args.window,
        "engine ready"
    );

    let presentation = Presentation::new("gridstage");
    if args.window {
        MacroquadBackend::new()
            .with_vsync(true)
            .with_window_scale(args.scale)
            .run(presentation, engine)
    } else {
        HeadlessBackend::new(args.frames).run(presentation, engine)
    }
}

fn init_tracing(directives: Option<&str>) {
    let filter = directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
