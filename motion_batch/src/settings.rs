// Layered pipeline configuration: built-in defaults, then an optional TOML
// file, then `MOTION_SENTRY__*` environment variables, then command-line flags.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use config::{Config, Environment, File};
use motion_sentry::PipelineConfig;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_NAME: &str = "motion_sentry";
pub const ENV_PREFIX: &str = "MOTION_SENTRY";

/// Command-line overrides; each one wins over every other layer.
#[derive(Debug, Default, Clone, Args)]
pub struct Overrides {
    /// Process every Nth frame.
    #[arg(long)]
    pub skip_frames: Option<u64>,
    /// Minimum contour area (pixels) for a region to count as motion.
    #[arg(long)]
    pub contour_area_threshold: Option<f64>,
    /// Background model variance threshold.
    #[arg(long)]
    pub var_threshold: Option<f64>,
    /// IoU above which overlapping boxes are suppressed.
    #[arg(long)]
    pub nms_iou_threshold: Option<f64>,
    /// Frames remembered by the background model.
    #[arg(long)]
    pub history: Option<u32>,
    /// Equalize grayscale histograms before estimation.
    #[arg(long)]
    pub hist_eq: bool,
    /// Disable shadow detection; shadowed pixels then count as foreground.
    #[arg(long)]
    pub no_shadows: bool,
}

pub fn load(config_file: Option<&Path>, overrides: &Overrides) -> Result<PipelineConfig> {
    build(config_file, Environment::with_prefix(ENV_PREFIX), overrides)
}

fn build(config_file: Option<&Path>, env: Environment, overrides: &Overrides) -> Result<PipelineConfig> {
    let file = match config_file {
        Some(path) => File::from(path).required(true),
        None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
    };

    let settings = Config::builder()
        .add_source(file)
        .add_source(env.separator("__").try_parsing(true))
        .set_override_option("skip_frames", overrides.skip_frames)?
        .set_override_option("contour_area_threshold", overrides.contour_area_threshold)?
        .set_override_option("var_threshold", overrides.var_threshold)?
        .set_override_option("nms_iou_threshold", overrides.nms_iou_threshold)?
        .set_override_option("history", overrides.history.map(u64::from))?
        .set_override_option("use_hist_eq", overrides.hist_eq.then_some(true))?
        .set_override_option("detect_shadows", overrides.no_shadows.then_some(false))?
        .build()
        .context("failed to assemble configuration")?;

    let pipeline: PipelineConfig = settings
        .try_deserialize()
        .context("configuration does not describe a pipeline")?;
    pipeline.validate()?;
    Ok(pipeline)
}
