use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ppe_watch::overlay::DEFAULT_CAPTION_SCALE;
use ppe_watch::records::DetectionRecordReader;
use ppe_watch::session::{FrameSource, ImageDirectory, NoFrames};
use ppe_watch::{ArtifactSink, CaptionFont, Dispatcher, FsArtifactSink, SentryConfig, Session};

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "ppe-watch",
    version,
    about = "Helmet compliance alerts from per-frame detector output",
    long_about = None
)]
struct Cli {
    /// Detection records, one JSON object per frame per line
    #[arg(short, long)]
    detections: PathBuf,

    /// Directory of decoded frames named frame_NNNNNN.jpg / .png
    #[arg(short, long)]
    frames: Option<PathBuf>,

    /// Output directory for crops (persons/, vehicles/)
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Alert log path (reset at start); defaults to <output-dir>/alerts.log
    #[arg(long)]
    alert_log: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip records before this frame index
    #[arg(long, default_value_t = 0)]
    start_frame: u64,

    /// Write annotated frames to <output-dir>/annotated
    #[arg(long)]
    annotate: bool,

    /// TrueType font for box captions on annotated frames
    #[arg(long, requires = "annotate")]
    font: Option<PathBuf>,

    /// Caption height in pixels
    #[arg(long, default_value_t = DEFAULT_CAPTION_SCALE)]
    caption_size: f32,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    // Respect RUST_LOG; default to info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SentryConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SentryConfig::default(),
    };
    let dispatcher = Dispatcher::new(config).context("invalid configuration")?;

    let alert_log = cli
        .alert_log
        .clone()
        .unwrap_or_else(|| cli.output_dir.join("alerts.log"));
    let sink = FsArtifactSink::new(
        cli.output_dir.join("persons"),
        cli.output_dir.join("vehicles"),
        &alert_log,
    )
    .context("preparing output directories")?;

    info!("detections : {}", cli.detections.display());
    info!("output     : {}", cli.output_dir.display());
    info!("alert log  : {}", alert_log.display());

    match &cli.frames {
        Some(dir) => {
            let frames = ImageDirectory::new(dir)
                .with_context(|| format!("opening frame directory {}", dir.display()))?;
            run(&cli, dispatcher, sink, frames)
        }
        None => {
            info!("no frame directory given; crops will be skipped");
            run(&cli, dispatcher, sink, NoFrames)
        }
    }
}

fn run<S: ArtifactSink, F: FrameSource>(
    cli: &Cli,
    dispatcher: Dispatcher,
    sink: S,
    frames: F,
) -> Result<()> {
    let records = DetectionRecordReader::open(&cli.detections)
        .with_context(|| format!("opening {}", cli.detections.display()))?;

    let mut session = Session::new(dispatcher, sink, frames).with_start_frame(cli.start_frame);
    if cli.annotate {
        session = session
            .with_annotation_dir(cli.output_dir.join("annotated"))
            .context("creating annotation directory")?;

        match &cli.font {
            Some(path) => {
                let font = CaptionFont::from_file(path)
                    .with_context(|| format!("loading font {}", path.display()))?
                    .with_scale(cli.caption_size);
                session = session.with_caption_font(font);
            }
            None => info!("no --font given; annotated frames will have boxes only"),
        }
    }

    let summary = session.run(records).context("processing detections")?;

    println!(
        "Processed {} frames: {} helmet violations, {} new vehicles, {} compliant person detections",
        summary.frames, summary.violations, summary.sightings, summary.compliant_persons
    );
    Ok(())
}
