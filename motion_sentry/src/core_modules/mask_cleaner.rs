// THEORY:
// The `mask_cleaner` turns the estimator's confidence map into a binary motion
// mask that the blob detector can trust. Raw foreground maps are noisy: single
// flickering pixels, thin edges from camera shake, shadows, small holes inside
// moving objects. Cleaning is a fixed sequence of pure transforms:
//
// 1.  **Binarize**: anything brighter than `BINARY_THRESHOLD` is "on" (255).
//     Shadows (127) fall below it and are dropped here.
// 2.  **Median**: a 5x5 median removes salt-and-pepper pixels without blurring
//     the edges of real objects.
// 3.  **Open**: erosion then dilation with a 5x5 square wipes out specks and
//     thin lines that survived the median.
// 4.  **Close**: dilation then erosion with the same square fills small holes
//     inside solid regions.
//
// The cleaner is a stateless utility: identical input always gives identical
// output, and it never changes the image dimensions.

pub mod mask_cleaner {
    use image::{GrayImage, Luma};
    use imageproc::distance_transform::Norm;
    use imageproc::filter::median_filter;
    use imageproc::morphology::{close, open};

    /// Confidence values strictly above this become foreground.
    pub const BINARY_THRESHOLD: u8 = 127;
    /// Half-size of the median window (5x5).
    pub const MEDIAN_RADIUS: u32 = 2;
    /// Chebyshev radius of the structuring square (5x5).
    pub const MORPH_RADIUS: u8 = 2;

    /// The full cleaning sequence: binarize, median, open, close.
    pub fn clean(confidence_map: &GrayImage) -> GrayImage {
        let binary = binarize(confidence_map, BINARY_THRESHOLD);
        let smoothed = median_filter(&binary, MEDIAN_RADIUS, MEDIAN_RADIUS);
        let opened = open(&smoothed, Norm::LInf, MORPH_RADIUS);
        close(&opened, Norm::LInf, MORPH_RADIUS)
    }

    /// Maps values above `threshold` to 255 and everything else to 0.
    pub fn binarize(image: &GrayImage, threshold: u8) -> GrayImage {
        let (width, height) = image.dimensions();
        let data = image
            .as_raw()
            .iter()
            .map(|&value| if value > threshold { 255 } else { 0 })
            .collect();
        GrayImage::from_raw(width, height, data)
            .unwrap_or_else(|| GrayImage::from_pixel(width, height, Luma([0])))
    }
}
