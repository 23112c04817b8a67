// Discovery of the streams found in an input directory, and the blocking job
// that runs one of them through a fresh pipeline.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use motion_sentry::utils::image_helper::{is_frame_file, DirectoryFrameStore, ImageSequenceSource};
use motion_sentry::{MotionPipeline, PipelineConfig, RunSummary, VideoSource};
use tracing::info;

/// Container extensions treated as video files.
pub const VIDEO_EXTENSIONS: [&str; 4] = ["mov", "mp4", "avi", "mkv"];

/// One stream to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// A video container decoded with OpenCV.
    Video(PathBuf),
    /// A directory of still frames.
    Frames(PathBuf),
}

impl SourceSpec {
    pub fn path(&self) -> &Path {
        match self {
            SourceSpec::Video(path) | SourceSpec::Frames(path) => path,
        }
    }

    /// File name without extension; names the per-source output directory.
    pub fn stem(&self) -> String {
        self.path()
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "source".to_string())
    }

    pub fn open(&self) -> motion_sentry::Result<Box<dyn VideoSource + Send>> {
        match self {
            SourceSpec::Frames(dir) => Ok(Box::new(ImageSequenceSource::open(dir)?)),
            SourceSpec::Video(path) => open_video(path),
        }
    }
}

#[cfg(feature = "opencv")]
fn open_video(path: &Path) -> motion_sentry::Result<Box<dyn VideoSource + Send>> {
    Ok(Box::new(crate::opencv_source::OpenCvSource::open(path)?))
}

#[cfg(not(feature = "opencv"))]
fn open_video(path: &Path) -> motion_sentry::Result<Box<dyn VideoSource + Send>> {
    Err(motion_sentry::MotionError::SourceUnavailable {
        source_name: path.display().to_string(),
        reason: "video decoding requires the `opencv` feature".into(),
    })
}

fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

fn holds_frames(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .any(|entry| entry.path().is_file() && is_frame_file(&entry.path()))
        })
        .unwrap_or(false)
}

/// Lists the video files and frame directories directly inside `input`,
/// sorted by path.
pub fn discover(input: &Path) -> Result<Vec<SourceSpec>> {
    let entries = fs::read_dir(input).with_context(|| format!("cannot list input directory {}", input.display()))?;

    let mut specs: Vec<SourceSpec> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter_map(|path| {
            if path.is_file() && is_video_file(&path) {
                Some(SourceSpec::Video(path))
            } else if path.is_dir() && holds_frames(&path) {
                Some(SourceSpec::Frames(path))
            } else {
                None
            }
        })
        .collect();
    specs.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(specs)
}

/// Runs one stream to completion, writing into `<output_root>/<stem>/`.
pub fn process(
    spec: &SourceSpec,
    output_root: &Path,
    config: PipelineConfig,
    stop: &AtomicBool,
) -> motion_sentry::Result<RunSummary> {
    let mut source = spec.open()?;
    let mut store = DirectoryFrameStore::new(output_root.join(spec.stem()));
    info!(source = source.name(), output = %store.dir().display(), "processing stream");

    let pipeline = MotionPipeline::new(config)?;
    pipeline.run(&mut source, &mut store, stop)
}
