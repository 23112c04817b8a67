mod settings;
mod sources;

#[cfg(feature = "opencv")]
mod opencv_source;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "opencv")]
const VIDEO_SUPPORT: &str = "Video files (.mov, .mp4, .avi, .mkv) are decoded with OpenCV.";
#[cfg(not(feature = "opencv"))]
const VIDEO_SUPPORT: &str = "This build reads frame directories only. Rebuild with `--features opencv` \
to decode video files (.mov, .mp4, .avi, .mkv).";

#[derive(Parser)]
#[command(name = "motion_batch", version)]
#[command(about = "Finds motion in every video or frame directory of a folder and saves the frames that contain it")]
#[command(after_help = VIDEO_SUPPORT)]
struct Cli {
    /// Directory holding video files and/or directories of still frames.
    input: PathBuf,

    /// Root of the per-source output directories.
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// TOML file with pipeline settings (defaults to ./motion_sentry.toml if present).
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: settings::Overrides,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("motion_batch=info,motion_sentry=info,warn")),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    let config = settings::load(cli.config.as_deref(), &cli.overrides)?;
    info!(?config, "pipeline configuration");

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; finishing the current stream");
                stop.store(true, Ordering::Relaxed);
            }
        });
    }

    let specs = sources::discover(&cli.input)?;
    if specs.is_empty() {
        warn!(input = %cli.input.display(), "no videos or frame directories found");
        return Ok(());
    }

    if !cfg!(feature = "opencv") && specs.iter().any(|spec| matches!(spec, sources::SourceSpec::Video(_))) {
        warn!("video files found but this build lacks the `opencv` feature; they will be reported as unavailable");
    }

    let mut failed = 0usize;
    for spec in specs {
        if stop.load(Ordering::Relaxed) {
            info!("stopping before {}", spec.path().display());
            break;
        }

        info!(source = %spec.path().display(), "starting stream");
        let job = {
            let output = cli.output.clone();
            let config = config.clone();
            let stop = Arc::clone(&stop);
            let spec = spec.clone();
            tokio::task::spawn_blocking(move || sources::process(&spec, &output, config, &stop))
        };

        match job.await? {
            Ok(summary) => info!(
                source = %spec.path().display(),
                read = summary.frames_read,
                processed = summary.frames_processed,
                persisted = summary.frames_persisted,
                write_failures = summary.write_failures,
                background = summary.background_written,
                "finished stream"
            ),
            Err(err) => {
                failed += 1;
                error!(source = %spec.path().display(), error = %err, "stream failed");
            }
        }
    }

    if failed > 0 {
        warn!(failed, "some streams could not be processed");
    }
    Ok(())
}
