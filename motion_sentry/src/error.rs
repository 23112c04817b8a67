use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = MotionError> = std::result::Result<T, E>;

/// Everything that can stop a stream (or a single write) from going through.
///
/// Only `SourceUnavailable` and `DimensionMismatch` end a stream. A
/// `WriteFailure` is reported by the store and logged by the driver, which
/// keeps going with the next frame.
#[derive(Debug, Error)]
pub enum MotionError {
    #[error("video source `{source_name}` is unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("frame is {}x{} but the stream started at {}x{}", .found.0, .found.1, .expected.0, .expected.1)]
    DimensionMismatch { expected: (u32, u32), found: (u32, u32) },

    #[error("failed to write `{key}`")]
    WriteFailure {
        key: String,
        #[source]
        source: image::ImageError,
    },

    #[error("could not decode frame {}", .path.display())]
    FrameDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

impl MotionError {
    /// True for errors that end the current stream.
    pub fn is_stream_fatal(&self) -> bool {
        matches!(
            self,
            MotionError::SourceUnavailable { .. } | MotionError::DimensionMismatch { .. }
        )
    }
}
