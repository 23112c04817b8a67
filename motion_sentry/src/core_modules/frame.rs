// THEORY:
// The `frame` module holds the two pixel grids the engine works with and the
// single-frame transforms between them. A color frame (`RgbImage`) is what the
// video source hands us and what ends up on disk; a grayscale frame
// (`GrayImage`) is what the background model learns from.
//
// Everything here is single-frame scope: no history, no neighbors in time.
// Luminance uses the Rec. 601 weights, evaluated in 14-bit fixed point so the
// result is identical on every platform and matches what capture libraries
// produce for BGR→GRAY.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::core_modules::motion_blob::BoundingBox;
use crate::error::{MotionError, Result};

pub type ColorFrame = RgbImage;
pub type GrayFrame = GrayImage;

/// Color used to outline kept detections on persisted frames.
pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Outline thickness in pixels.
pub const BOX_THICKNESS: u32 = 3;

const LUMA_SHIFT: u32 = 14;
const LUMA_R: u32 = 4899; // 0.299 * 2^14
const LUMA_G: u32 = 9617; // 0.587 * 2^14
const LUMA_B: u32 = 1868; // 0.114 * 2^14

/// Rec. 601 luminance of a single RGB pixel, rounded to the nearest integer.
pub fn luminance(pixel: &Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    let weighted = r as u32 * LUMA_R + g as u32 * LUMA_G + b as u32 * LUMA_B;
    ((weighted + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT) as u8
}

/// Converts a color frame into the grayscale frame the estimator consumes.
pub fn to_grayscale(frame: &ColorFrame) -> GrayFrame {
    let (width, height) = frame.dimensions();
    GrayImage::from_fn(width, height, |x, y| Luma([luminance(frame.get_pixel(x, y))]))
}

/// Spreads the grayscale histogram over the full 0..=255 range.
pub fn equalize(frame: &GrayFrame) -> GrayFrame {
    imageproc::contrast::equalize_histogram(frame)
}

/// Fails with `DimensionMismatch` unless `found` equals `expected`.
pub fn ensure_dimensions(expected: (u32, u32), found: (u32, u32)) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(MotionError::DimensionMismatch { expected, found })
    }
}

/// Draws every box onto the frame as a `BOX_THICKNESS` wide outline.
/// Boxes are clipped to the frame; outlines grow inwards from the box edge.
pub fn draw_boxes(frame: &mut ColorFrame, boxes: &[BoundingBox]) {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    for bounding_box in boxes {
        let x1 = bounding_box.x1.min(width - 1);
        let y1 = bounding_box.y1.min(height - 1);
        let x2 = bounding_box.x2.min(width - 1);
        let y2 = bounding_box.y2.min(height - 1);

        for inset in 0..BOX_THICKNESS {
            let (left, top) = (x1 + inset, y1 + inset);
            if left + inset > x2 || top + inset > y2 {
                break;
            }
            let rect_width = x2 - x1 + 1 - 2 * inset;
            let rect_height = y2 - y1 + 1 - 2 * inset;
            let rect = Rect::at(left as i32, top as i32).of_size(rect_width, rect_height);
            draw_hollow_rect_mut(frame, rect, BOX_COLOR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luminance_matches_rec601_weights() {
        assert_eq!(luminance(&Rgb([0, 0, 0])), 0);
        assert_eq!(luminance(&Rgb([255, 255, 255])), 255);
        assert_eq!(luminance(&Rgb([255, 0, 0])), 76);
        assert_eq!(luminance(&Rgb([0, 255, 0])), 150);
        assert_eq!(luminance(&Rgb([0, 0, 255])), 29);
    }

    #[test]
    fn grayscale_keeps_dimensions() {
        let frame = RgbImage::from_pixel(7, 3, Rgb([10, 20, 30]));
        let gray = to_grayscale(&frame);
        assert_eq!(gray.dimensions(), (7, 3));
        assert!(gray.pixels().all(|p| p.0[0] == luminance(&Rgb([10, 20, 30]))));
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        assert!(ensure_dimensions((4, 4), (4, 4)).is_ok());
        let err = ensure_dimensions((4, 4), (4, 5)).unwrap_err();
        assert!(matches!(err, MotionError::DimensionMismatch { expected: (4, 4), found: (4, 5) }));
    }

    #[test]
    fn drawn_boxes_outline_without_filling() {
        let mut frame = RgbImage::new(40, 40);
        draw_boxes(&mut frame, &[BoundingBox::new(5, 5, 30, 30)]);
        assert_eq!(*frame.get_pixel(5, 5), BOX_COLOR);
        assert_eq!(*frame.get_pixel(7, 7), BOX_COLOR);
        assert_eq!(*frame.get_pixel(30, 17), BOX_COLOR);
        assert_eq!(*frame.get_pixel(17, 17), Rgb([0, 0, 0]));
        assert_eq!(*frame.get_pixel(4, 4), Rgb([0, 0, 0]));
    }

    #[test]
    fn boxes_past_the_edge_are_clipped() {
        let mut frame = RgbImage::new(10, 10);
        draw_boxes(&mut frame, &[BoundingBox::new(2, 2, 50, 50)]);
        assert_eq!(*frame.get_pixel(9, 9), BOX_COLOR);
    }
}
