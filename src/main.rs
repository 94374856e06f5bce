use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lane_heading::{DetectorConfig, FitMode, FrameSink, LaneDetector, NullSink, WindowSink};

#[derive(Parser, Debug)]
#[command(name = "lane_heading", about = "Lane detection and steering heading from a video")]
struct Cli {
    /// Video file, or a camera index such as `0`
    video: String,

    /// TOML file overriding the default thresholds and geometry
    #[arg(long)]
    config: Option<PathBuf>,

    /// Allow quadratic fits for curved road
    #[arg(long)]
    curved: bool,

    /// Process without opening a window
    #[arg(long)]
    headless: bool,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lane_heading=info")))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DetectorConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => DetectorConfig::default(),
    };
    let mut detector = LaneDetector::new(config).context("building detector")?;

    let mode = if cli.curved { FitMode::Curved } else { FitMode::Straight };
    let mut sink: Box<dyn FrameSink> = if cli.headless {
        Box::new(NullSink)
    } else {
        Box::new(WindowSink::new("Lane View").context("opening display window")?)
    };

    info!(video = %cli.video, ?mode, "starting");
    let ok = detector.detect_lane(&cli.video, mode, sink.as_mut());

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
