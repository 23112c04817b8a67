// THEORY:
// This file is the main entry point for the `motion_sentry` library crate.
// It exposes the `MotionPipeline` and its associated data structures
// (`PipelineConfig`, `FrameOutcome`, `RunSummary`) as the high-level interface
// for the whole motion engine, together with the two collaborator seams
// (`VideoSource`, `FrameStore`) that connect it to the outside world.
//
// The per-frame algorithms live in `core_modules`. Each of them is usable on its
// own (the estimator, the cleaner, the extractor, the suppressor and the
// aggregator), but most consumers only need the pipeline.

pub mod collaborators;
pub mod core_modules;
pub mod error;
pub mod pipeline;
pub mod utils;

pub use collaborators::{FrameStore, MemoryFrameStore, MemorySource, VideoSource};
pub use error::{MotionError, Result};
pub use pipeline::{FrameOutcome, FrameReport, MotionPipeline, PipelineConfig, PipelineStage, RunSummary};
