// THEORY:
// The `BackgroundAggregator` produces the single image that best represents the
// empty scene. It keeps every sampled color frame of the run and, once the
// stream is over, takes the median of each pixel channel across all of them.
//
// The median is what makes this robust: an object that covers a pixel in a
// minority of the samples is simply outvoted by the frames where the pixel shows
// the static scene. No learning rate, no warm-up.
//
// Resource note: the buffer is the only part of the engine whose memory grows
// with the length of the stream (one full frame per sampled interval). It is not
// capped; crossing `LARGE_BUFFER_BYTES` is logged once so long runs are visible.

use image::RgbImage;
use tracing::warn;

use crate::core_modules::frame::{ensure_dimensions, ColorFrame};
use crate::error::Result;

/// Buffer size that triggers the one-time memory warning.
pub const LARGE_BUFFER_BYTES: usize = 1 << 30;

/// Append-only store of sampled frames, reduced once into a median image.
#[derive(Default)]
pub struct BackgroundAggregator {
    frames: Vec<ColorFrame>,
    warned_about_size: bool,
}

impl BackgroundAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Bytes currently held by the buffered frames.
    pub fn buffered_bytes(&self) -> usize {
        self.frames.iter().map(|frame| frame.as_raw().len()).sum()
    }

    /// Appends a frame. All frames must share the first frame's dimensions.
    pub fn add(&mut self, frame: ColorFrame) -> Result<()> {
        if let Some(first) = self.frames.first() {
            ensure_dimensions(first.dimensions(), frame.dimensions())?;
        }
        self.frames.push(frame);

        if !self.warned_about_size {
            let bytes = self.buffered_bytes();
            if bytes > LARGE_BUFFER_BYTES {
                warn!(
                    frames = self.frames.len(),
                    bytes, "background buffer is large; memory grows with stream length"
                );
                self.warned_about_size = true;
            }
        }
        Ok(())
    }

    /// Reduces the buffer to its per-pixel, per-channel median.
    /// Returns `None` when no frame was ever added.
    pub fn finalize(self) -> Option<RgbImage> {
        let first = self.frames.first()?;
        let (width, height) = first.dimensions();
        let len = first.as_raw().len();

        let mut samples = Vec::with_capacity(self.frames.len());
        let mut median = Vec::with_capacity(len);
        for index in 0..len {
            samples.clear();
            samples.extend(self.frames.iter().map(|frame| frame.as_raw()[index]));
            median.push(median_of(&mut samples));
        }
        RgbImage::from_raw(width, height, median)
    }
}

/// Median of a non-empty sample set; even counts average the two middle
/// values, rounding down.
fn median_of(samples: &mut [u8]) -> u8 {
    samples.sort_unstable();
    let mid = samples.len() / 2;
    if samples.len() % 2 == 1 {
        samples[mid]
    } else {
        ((samples[mid - 1] as u16 + samples[mid] as u16) / 2) as u8
    }
}
