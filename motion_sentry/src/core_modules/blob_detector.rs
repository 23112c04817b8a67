// THEORY:
// The `BlobDetector` is the engine of the spatial grouping layer. It takes the
// cleaned binary mask of a single frame and finds the spatially coherent regions
// of motion in it, the "blobs".
//
// Algorithm steps:
// 1.  **Border Following**: The outer boundary of every connected component of
//     "on" pixels is traced. Only external boundaries matter: holes inside a
//     region, and islands sitting inside those holes, are ignored, so one
//     object yields exactly one outline. Tracing runs on a copy of the mask
//     framed by one row/column of zeros, so a region touching the image edge
//     (or filling the whole image) is still seen as an outer border.
// 2.  **Area Filtering**: Each outline is measured by the area of the polygon it
//     encloses, not by the area of its bounding box. A long, thin or sparse
//     streak can span a huge rectangle while enclosing almost nothing, and the
//     region area is what separates it from a real object.
// 3.  **Data Aggregation**: Surviving outlines are reduced to their enclosing
//     axis-aligned `BoundingBox` and packaged as `MotionBlob`s.
// 4.  **Stateless Utility**: `find_blobs` knows nothing about earlier frames and
//     promises nothing about the order of the blobs it returns.

use crate::core_modules::motion_blob::{BoundingBox, MotionBlob};

/// Minimum traced-region area used when the caller has no better idea.
pub const DEFAULT_MIN_AREA: f64 = 10_000.0;

pub mod blob_detector {
    use super::*;
    use image::GrayImage;
    use imageproc::contours::{find_contours, BorderType, Contour};
    use imageproc::point::Point;

    /// Finds every external blob whose traced area is at least `min_area`.
    pub fn find_blobs(mask: &GrayImage, min_area: f64) -> Vec<MotionBlob> {
        find_contours::<u32>(&framed(mask))
            .into_iter()
            .filter(is_external)
            .filter_map(|contour| {
                let points = unframe(&contour.points);
                let contour_area = polygon_area(&points);
                if contour_area < min_area {
                    return None;
                }
                let bounding_box = enclosing_box(&points)?;
                Some(MotionBlob {
                    bounding_box,
                    contour_area,
                    boundary_length: points.len(),
                })
            })
            .collect()
    }

    /// Copy of `mask` surrounded by a one-pixel zero border.
    fn framed(mask: &GrayImage) -> GrayImage {
        let (width, height) = mask.dimensions();
        let mut framed = GrayImage::new(width + 2, height + 2);
        image::imageops::replace(&mut framed, mask, 1, 1);
        framed
    }

    /// Moves points traced on a framed mask back into the original coordinates.
    fn unframe(points: &[Point<u32>]) -> Vec<Point<u32>> {
        points
            .iter()
            .map(|p| Point::new(p.x.saturating_sub(1), p.y.saturating_sub(1)))
            .collect()
    }

    /// Convenience wrapper returning only the boxes.
    pub fn extract(mask: &GrayImage, min_area: f64) -> Vec<BoundingBox> {
        find_blobs(mask, min_area)
            .into_iter()
            .map(|blob| blob.bounding_box)
            .collect()
    }

    /// Outer borders that are not nested inside another region's hole.
    fn is_external(contour: &Contour<u32>) -> bool {
        matches!(contour.border_type, BorderType::Outer) && contour.parent.is_none()
    }

    /// Shoelace area of the closed polygon through the boundary pixel centers.
    pub fn polygon_area(points: &[Point<u32>]) -> f64 {
        if points.len() < 3 {
            return 0.0;
        }
        let twice_area: i64 = points
            .iter()
            .zip(points.iter().cycle().skip(1))
            .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
            .sum();
        twice_area.abs() as f64 / 2.0
    }

    /// Bounding rectangle reported as `(x, y, x + width, y + height)`.
    fn enclosing_box(points: &[Point<u32>]) -> Option<BoundingBox> {
        let min_x = points.iter().map(|p| p.x).min()?;
        let min_y = points.iter().map(|p| p.y).min()?;
        let max_x = points.iter().map(|p| p.x).max()?;
        let max_y = points.iter().map(|p| p.y).max()?;
        Some(BoundingBox::from_origin(
            min_x,
            min_y,
            max_x - min_x + 1,
            max_y - min_y + 1,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::blob_detector::*;
    use super::*;
    use image::{GrayImage, Luma};

    fn square_mask(width: u32, height: u32, x0: u32, y0: u32, side: u32) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        mask
    }

    #[test]
    fn large_square_yields_one_tight_box() {
        let mask = square_mask(200, 200, 20, 30, 110);
        let blobs = find_blobs(&mask, DEFAULT_MIN_AREA);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].bounding_box.as_tuple(), (20, 30, 130, 140));
        assert!((blobs[0].contour_area - 109.0 * 109.0).abs() < 1e-9);
    }

    #[test]
    fn small_square_is_filtered_out() {
        let mask = square_mask(200, 200, 20, 30, 90);
        assert!(extract(&mask, DEFAULT_MIN_AREA).is_empty());
        assert_eq!(extract(&mask, 1000.0).len(), 1);
    }

    #[test]
    fn empty_mask_has_no_blobs() {
        assert!(extract(&GrayImage::new(64, 64), 0.0).is_empty());
    }

    #[test]
    fn sparse_streak_is_rejected_despite_large_box() {
        let mut mask = GrayImage::new(200, 200);
        for i in 10..160 {
            mask.put_pixel(i, i, Luma([255]));
        }
        assert!(extract(&mask, 100.0).is_empty());
    }

    #[test]
    fn holes_and_islands_are_ignored() {
        // A 120x120 ring with a 40x40 island in its hole.
        let mut mask = square_mask(200, 200, 10, 10, 120);
        for y in 30..110 {
            for x in 30..110 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        for y in 50..90 {
            for x in 50..90 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let boxes = extract(&mask, 100.0);
        assert_eq!(boxes, vec![BoundingBox::new(10, 10, 130, 130)]);
    }

    #[test]
    fn separate_regions_give_separate_boxes() {
        let mut mask = square_mask(300, 150, 10, 10, 120);
        for y in 10..130 {
            for x in 170..290 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let mut boxes = extract(&mask, DEFAULT_MIN_AREA);
        boxes.sort_by_key(|b| b.x1);
        assert_eq!(
            boxes,
            vec![BoundingBox::new(10, 10, 130, 130), BoundingBox::new(170, 10, 290, 130)]
        );
    }

    #[test]
    fn regions_touching_any_edge_are_found() {
        let cases = [
            ((0, 20), (0, 20, 60, 80)),
            ((20, 0), (20, 0, 80, 60)),
            ((40, 20), (40, 20, 100, 80)),
            ((20, 40), (20, 40, 80, 100)),
            ((0, 0), (0, 0, 60, 60)),
        ];
        for ((x0, y0), expected) in cases {
            let mask = square_mask(100, 100, x0, y0, 60);
            let blobs = find_blobs(&mask, 1000.0);
            assert_eq!(blobs.len(), 1, "square at ({x0}, {y0})");
            assert_eq!(blobs[0].bounding_box.as_tuple(), expected);
            assert!((blobs[0].contour_area - 59.0 * 59.0).abs() < 1e-9);
        }
    }

    #[test]
    fn full_mask_is_one_frame_sized_blob() {
        let mask = GrayImage::from_pixel(100, 100, Luma([255]));
        assert_eq!(extract(&mask, 1000.0), vec![BoundingBox::new(0, 0, 100, 100)]);
    }

    #[test]
    fn cleaned_full_mask_is_still_extracted() {
        use crate::core_modules::mask_cleaner::mask_cleaner::clean;
        let cleaned = clean(&GrayImage::from_pixel(100, 100, Luma([255])));
        assert_eq!(extract(&cleaned, 1000.0).len(), 1);
    }

    #[test]
    fn polygon_area_of_degenerate_outlines_is_zero() {
        use imageproc::point::Point;
        assert_eq!(polygon_area(&[]), 0.0);
        assert_eq!(polygon_area(&[Point::new(1, 1), Point::new(2, 2)]), 0.0);
        let square = [Point::new(0, 0), Point::new(4, 0), Point::new(4, 4), Point::new(0, 4)];
        assert_eq!(polygon_area(&square), 16.0);
    }
}
