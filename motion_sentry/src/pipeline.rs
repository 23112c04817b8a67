// THEORY:
// The `pipeline` module is the top-level API of the motion engine. It wires the
// core modules into one per-frame procedure and decides, for every sampled
// frame, whether it carries enough motion to be kept.
//
// Key architectural principles:
// 1.  **Fixed Stage Order**: A processed frame always walks
//     estimating -> cleaning -> extracting -> suppressing -> deciding, and the
//     pipeline records which stage it is in. No stage is skipped or reordered.
// 2.  **Sampling Before Work**: Only every Nth frame (`skip_frames`) is touched
//     at all. Unsampled frames are counted and dropped; they never reach the
//     background model nor the background buffer.
// 3.  **Collaborators at the Edges**: `ingest` is pure computation on one frame.
//     `run` is the only place that talks to a `VideoSource` and a `FrameStore`,
//     and a failing write never stops the stream.

use std::sync::atomic::{AtomicBool, Ordering};

use image::RgbImage;
use serde::Deserialize;
use tracing::{debug, info, trace, warn};

use crate::collaborators::{FrameStore, VideoSource};
use crate::core_modules::background_aggregator::BackgroundAggregator;
use crate::core_modules::blob_detector::{blob_detector, DEFAULT_MIN_AREA};
use crate::core_modules::box_suppressor::{suppress, uniform_scores, DEFAULT_IOU_THRESHOLD};
use crate::core_modules::foreground_estimator::ForegroundEstimator;
use crate::core_modules::frame::{draw_boxes, equalize, to_grayscale, ColorFrame};
use crate::core_modules::mask_cleaner::mask_cleaner;
use crate::core_modules::motion_blob::BoundingBox;
use crate::core_modules::motion_history::MotionHistory;
use crate::core_modules::pixel_mixture::MixtureParams;
use crate::error::{MotionError, Result};

/// Key under which the median background is stored.
pub const BACKGROUND_KEY: &str = "background.jpg";

/// Tunable behavior of the `MotionPipeline`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Process only frames whose 1-based index is a multiple of this.
    pub skip_frames: u64,
    /// Minimum contour area, in pixels, for a region to count as motion.
    pub contour_area_threshold: f64,
    /// Squared Mahalanobis distance deciding whether a pixel fits the background.
    pub var_threshold: f64,
    /// Equalize the grayscale histogram before estimation.
    pub use_hist_eq: bool,
    /// Boxes overlapping a kept box by more than this IoU are discarded.
    pub nms_iou_threshold: f64,
    /// Number of frames the background model effectively remembers.
    pub history: u32,
    pub detect_shadows: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            skip_frames: 5,
            contour_area_threshold: DEFAULT_MIN_AREA,
            var_threshold: 50.0,
            use_hist_eq: false,
            nms_iou_threshold: DEFAULT_IOU_THRESHOLD,
            history: 500,
            detect_shadows: true,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.skip_frames == 0 {
            return Err(MotionError::InvalidConfig("skip_frames must be at least 1".into()));
        }
        if !(self.var_threshold.is_finite() && self.var_threshold > 0.0) {
            return Err(MotionError::InvalidConfig(format!(
                "var_threshold must be positive, got {}",
                self.var_threshold
            )));
        }
        if self.history == 0 {
            return Err(MotionError::InvalidConfig("history must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.nms_iou_threshold) {
            return Err(MotionError::InvalidConfig(format!(
                "nms_iou_threshold must lie in [0, 1], got {}",
                self.nms_iou_threshold
            )));
        }
        if self.contour_area_threshold.is_nan() || self.contour_area_threshold < 0.0 {
            return Err(MotionError::InvalidConfig(format!(
                "contour_area_threshold must not be negative, got {}",
                self.contour_area_threshold
            )));
        }
        Ok(())
    }

    fn mixture_params(&self) -> MixtureParams {
        MixtureParams::new(self.history, self.var_threshold as f32, self.detect_shadows)
    }
}

/// Where the pipeline currently is within the handling of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    AwaitingFrame,
    Estimating,
    Cleaning,
    Extracting,
    Suppressing,
    Deciding,
    Done,
}

/// Everything the pipeline concluded about one processed frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    /// 1-based index among all frames read, sampled or not.
    pub frame_index: u64,
    /// Boxes of every region above the area threshold.
    pub candidate_boxes: Vec<BoundingBox>,
    /// Boxes left after non-maximum suppression.
    pub kept_boxes: Vec<BoundingBox>,
    pub significant: bool,
    /// The frame with the kept boxes drawn on it; present only when significant.
    pub annotated: Option<RgbImage>,
}

impl FrameReport {
    /// Storage key of the annotated frame.
    pub fn key(&self) -> String {
        format!("frame_{}.jpg", self.frame_index)
    }
}

#[derive(Debug, Clone)]
pub enum FrameOutcome {
    Skipped { frame_index: u64 },
    Processed(FrameReport),
}

/// Counters describing one call to `MotionPipeline::run`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_read: u64,
    pub frames_processed: u64,
    pub frames_persisted: u64,
    pub write_failures: u64,
    pub background_written: bool,
}

/// The main, top-level struct of the motion engine. One instance per stream.
pub struct MotionPipeline {
    config: PipelineConfig,
    estimator: ForegroundEstimator,
    aggregator: BackgroundAggregator,
    history: MotionHistory,
    stage: PipelineStage,
    frames_read: u64,
    frames_processed: u64,
}

impl MotionPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            estimator: ForegroundEstimator::new(config.mixture_params()),
            aggregator: BackgroundAggregator::new(),
            history: MotionHistory::new(),
            stage: PipelineStage::AwaitingFrame,
            frames_read: 0,
            frames_processed: 0,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn history(&self) -> &MotionHistory {
        &self.history
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Number of frames waiting in the background buffer.
    pub fn buffered_frames(&self) -> usize {
        self.aggregator.len()
    }

    /// Feeds the next frame of the stream.
    ///
    /// A frame whose size differs from the stream's first frame yields
    /// `DimensionMismatch` and leaves every model untouched.
    pub fn ingest(&mut self, frame: ColorFrame) -> Result<FrameOutcome> {
        self.enter(PipelineStage::AwaitingFrame);
        self.frames_read += 1;
        let frame_index = self.frames_read;
        if frame_index % self.config.skip_frames != 0 {
            trace!(frame_index, "frame not sampled");
            return Ok(FrameOutcome::Skipped { frame_index });
        }

        self.enter(PipelineStage::Estimating);
        let mut gray = to_grayscale(&frame);
        if self.config.use_hist_eq {
            gray = equalize(&gray);
        }
        let confidence = match self.estimator.update(&gray) {
            Ok(map) => map,
            Err(err) => {
                self.enter(PipelineStage::AwaitingFrame);
                return Err(err);
            }
        };

        self.enter(PipelineStage::Cleaning);
        let mask = mask_cleaner::clean(&confidence);

        self.enter(PipelineStage::Extracting);
        let candidate_boxes = blob_detector::extract(&mask, self.config.contour_area_threshold);

        self.enter(PipelineStage::Suppressing);
        let scores = uniform_scores(candidate_boxes.len());
        let kept_boxes: Vec<BoundingBox> = suppress(&candidate_boxes, &scores, self.config.nms_iou_threshold)
            .into_iter()
            .map(|index| candidate_boxes[index])
            .collect();

        self.enter(PipelineStage::Deciding);
        let significant = !kept_boxes.is_empty();
        self.history.push(significant);
        let annotated = significant.then(|| {
            let mut copy = frame.clone();
            draw_boxes(&mut copy, &kept_boxes);
            copy
        });
        self.aggregator.add(frame)?;
        self.frames_processed += 1;

        self.enter(PipelineStage::Done);
        debug!(
            frame_index,
            candidates = candidate_boxes.len(),
            kept = kept_boxes.len(),
            significant,
            "processed frame"
        );

        Ok(FrameOutcome::Processed(FrameReport {
            frame_index,
            candidate_boxes,
            kept_boxes,
            significant,
            annotated,
        }))
    }

    /// Ends the stream and reduces the buffered frames to a median background.
    /// Returns `None` if no frame was ever sampled.
    pub fn finish(self) -> Option<RgbImage> {
        self.aggregator.finalize()
    }

    /// Drains `source` through the pipeline, persisting significant frames and
    /// finally the background into `store`.
    ///
    /// `stop` is checked once per frame. A read failure ends the stream like an
    /// end-of-stream would; a frame of the wrong size aborts it with an error.
    pub fn run<S, F>(mut self, source: &mut S, store: &mut F, stop: &AtomicBool) -> Result<RunSummary>
    where
        S: VideoSource + ?Sized,
        F: FrameStore + ?Sized,
    {
        let mut summary = RunSummary::default();

        loop {
            if stop.load(Ordering::Relaxed) {
                info!(source = source.name(), frames_read = summary.frames_read, "stop requested");
                break;
            }
            let frame = match source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    warn!(source = source.name(), error = %err, "read failed; ending stream");
                    break;
                }
            };
            summary.frames_read += 1;

            let FrameOutcome::Processed(report) = self.ingest(frame)? else {
                continue;
            };
            summary.frames_processed += 1;

            if let Some(annotated) = report.annotated.as_ref() {
                let key = report.key();
                match store.write(&key, annotated) {
                    Ok(()) => {
                        summary.frames_persisted += 1;
                        info!(key = %key, boxes = report.kept_boxes.len(), "persisted motion frame");
                    }
                    Err(err) => {
                        summary.write_failures += 1;
                        warn!(key = %key, error = %err, "could not persist frame");
                    }
                }
            }
        }

        match self.finish() {
            Some(background) => match store.write(BACKGROUND_KEY, &background) {
                Ok(()) => {
                    summary.background_written = true;
                    info!(key = BACKGROUND_KEY, "persisted background");
                }
                Err(err) => {
                    summary.write_failures += 1;
                    warn!(key = BACKGROUND_KEY, error = %err, "could not persist background");
                }
            },
            None => debug!("no frame sampled; skipping background"),
        }

        Ok(summary)
    }

    fn enter(&mut self, stage: PipelineStage) {
        trace!(?stage, "entering stage");
        self.stage = stage;
    }
}
