use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "wavescope", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the oscilloscope video of a job (requires `ffmpeg`).
    Render(RenderArgs),
    /// Paint the channel layout with a synthetic wave as a PNG.
    Preview(PreviewArgs),
    /// Render a single video frame as a PNG.
    Frame(FrameArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Render job JSON.
    #[arg(long)]
    job: PathBuf,

    /// Override the job's output path.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Override the encoder executable.
    #[arg(long)]
    ffmpeg: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Render job JSON.
    #[arg(long)]
    job: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Render job JSON.
    #[arg(long)]
    job: PathBuf,

    /// Frame index (0-based).
    #[arg(long)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Preview(args) => cmd_preview(args),
        Command::Frame(args) => cmd_frame(args),
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut job = wavescope::RenderJob::from_path(&args.job)?;
    if let Some(out) = args.out {
        job.output = out;
    }
    if args.ffmpeg.is_some() {
        job.ffmpeg_path = args.ffmpeg;
    }
    if job.ffmpeg_path.is_none() && !wavescope::encode::is_ffmpeg_on_path() {
        tracing::warn!("ffmpeg was not found on PATH");
    }

    let worker = wavescope::RenderWorker::new()?;
    if !worker.work(&job) {
        anyhow::bail!("render worker is busy");
    }
    let outcome = loop {
        if let Some(outcome) = worker.recv_outcome_timeout(Duration::from_secs(1)) {
            break outcome;
        }
        tracing::info!(progress = format!("{:.1}%", worker.progress() * 100.0), "rendering");
    };

    if !outcome.ok {
        anyhow::bail!("render failed: {}", outcome.message);
    }
    eprintln!("wrote {}", job.output.display());
    Ok(())
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let job = wavescope::RenderJob::from_path(&args.job)?;
    let typesetter = job
        .label_font
        .as_ref()
        .map(wavescope::LabelTypesetter::from_path)
        .transpose()?;
    let preview = wavescope::PreviewRenderer::new(&job.channels, &job.global, typesetter)?;
    let frame = preview.paint()?;
    save_png(&frame, &args.out)
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let job = wavescope::RenderJob::from_path(&args.job)?;
    let mut renderer = wavescope::ScopeRenderer::from_job(&job)?;
    let target = wavescope::FrameIndex(args.frame);
    while renderer.frames_advanced() <= target {
        if !renderer.has_frames_remaining() {
            anyhow::bail!("input ends before frame {}", args.frame);
        }
        renderer.advance_frame()?;
    }
    let frame = renderer.paint()?;
    save_png(&frame, &args.out)
}

fn save_png(frame: &wavescope::FrameRGBA, out: &Path) -> anyhow::Result<()> {
    wavescope::encode::ensure_parent_dir(out)?;
    frame
        .to_rgba_image()?
        .save_with_format(out, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", out.display()))?;
    eprintln!("wrote {}", out.display());
    Ok(())
}
