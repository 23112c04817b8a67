// THEORY:
// The `ForegroundEstimator` is the owner and operator of the whole grid of
// `PixelMixture`s. It is not an analyzer itself but a manager: it slices each
// grayscale frame into per-pixel observations, hands each one to the mixture
// responsible for that location, and collects their verdicts into a single
// "confidence map".
//
// Key architectural principles:
// 1.  **Exclusive Ownership**: The background model lives here and nowhere else.
//     The mixtures are updated in place on an owned buffer; no state is shared.
// 2.  **Fixed Geometry**: The model is sized by the first frame it sees. A frame
//     of any other size is a configuration error for the stream and is rejected
//     without touching the model.
// 3.  **Stateless Output**: The confidence map is produced fresh for each frame
//     (0 = background, 127 = shadow, 255 = foreground) and is not retained.

use image::{GrayImage, Luma};
use tracing::debug;

use crate::core_modules::frame::{ensure_dimensions, GrayFrame};
use crate::core_modules::pixel_mixture::{MixtureParams, PixelMixture};
use crate::error::Result;

/// Manages the per-pixel mixture models and turns frames into confidence maps.
pub struct ForegroundEstimator {
    params: MixtureParams,
    /// `(width, height)` fixed by the first frame.
    dimensions: Option<(u32, u32)>,
    /// One mixture per pixel, row-major.
    mixtures: Vec<PixelMixture>,
    frames_seen: u64,
}

impl ForegroundEstimator {
    pub fn new(params: MixtureParams) -> Self {
        Self {
            params,
            dimensions: None,
            mixtures: Vec::new(),
            frames_seen: 0,
        }
    }

    pub fn params(&self) -> &MixtureParams {
        &self.params
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Read access to the model of a single pixel, mainly for inspection.
    pub fn mixture_at(&self, x: u32, y: u32) -> Option<&PixelMixture> {
        let (width, height) = self.dimensions?;
        if x >= width || y >= height {
            return None;
        }
        self.mixtures.get((y * width + x) as usize)
    }

    /// Learns from `frame` and returns its confidence map.
    pub fn update(&mut self, frame: &GrayFrame) -> Result<GrayImage> {
        let (width, height) = frame.dimensions();
        match self.dimensions {
            Some(expected) => ensure_dimensions(expected, (width, height))?,
            None => {
                debug!(width, height, "initializing background model");
                self.dimensions = Some((width, height));
                self.mixtures = vec![PixelMixture::new(); (width as usize) * (height as usize)];
            }
        }

        let confidence: Vec<u8> = self
            .mixtures
            .iter_mut()
            .zip(frame.as_raw().iter())
            .map(|(mixture, &value)| mixture.observe(value as f32, &self.params).confidence())
            .collect();

        self.frames_seen += 1;
        Ok(GrayImage::from_raw(width, height, confidence)
            .unwrap_or_else(|| GrayImage::from_pixel(width, height, Luma([0]))))
    }

    /// Forgets everything learned so far. The next frame sizes a fresh model.
    pub fn reset(&mut self) {
        self.dimensions = None;
        self.mixtures.clear();
        self.frames_seen = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MotionError;

    fn flat(width: u32, height: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([value]))
    }

    #[test]
    fn warm_up_reports_background() {
        let mut estimator = ForegroundEstimator::new(MixtureParams::default());
        let map = estimator.update(&flat(8, 6, 90)).unwrap();
        assert_eq!(map.dimensions(), (8, 6));
        assert!(map.pixels().all(|p| p.0[0] == 0));
        assert_eq!(estimator.frames_seen(), 1);
    }

    #[test]
    fn changed_region_lights_up() {
        let mut estimator = ForegroundEstimator::new(MixtureParams::new(500, 16.0, true));
        for _ in 0..5 {
            estimator.update(&flat(10, 10, 0)).unwrap();
        }
        let mut frame = flat(10, 10, 0);
        for y in 2..5 {
            for x in 3..7 {
                frame.put_pixel(x, y, Luma([255]));
            }
        }
        let map = estimator.update(&frame).unwrap();
        for (x, y, pixel) in map.enumerate_pixels() {
            let inside = (3..7).contains(&x) && (2..5).contains(&y);
            assert_eq!(pixel.0[0], if inside { 255 } else { 0 }, "pixel ({x}, {y})");
        }
    }

    #[test]
    fn size_change_is_rejected_without_touching_the_model() {
        let mut estimator = ForegroundEstimator::new(MixtureParams::default());
        estimator.update(&flat(4, 4, 10)).unwrap();
        let err = estimator.update(&flat(5, 4, 10)).unwrap_err();
        assert!(matches!(err, MotionError::DimensionMismatch { expected: (4, 4), found: (5, 4) }));
        assert_eq!(estimator.frames_seen(), 1);
        assert!(estimator.update(&flat(4, 4, 10)).is_ok());
    }

    #[test]
    fn reset_allows_a_new_geometry() {
        let mut estimator = ForegroundEstimator::new(MixtureParams::default());
        estimator.update(&flat(4, 4, 10)).unwrap();
        estimator.reset();
        assert!(estimator.dimensions().is_none());
        assert!(estimator.update(&flat(6, 2, 10)).is_ok());
        assert_eq!(estimator.dimensions(), Some((6, 2)));
        assert!(estimator.mixture_at(5, 1).is_some());
        assert!(estimator.mixture_at(6, 1).is_none());
    }
}
