// THEORY:
// The `motion_blob` module holds the data containers of the spatial layer. A
// `MotionBlob` is one connected region of foreground pixels in a single frame,
// summarized by its enclosing `BoundingBox` and the area of its traced outline.
//
// Like every container in this crate they are "dumb": they know how to measure
// themselves (area, overlap) but have no memory of earlier frames.

/// An axis-aligned box in pixel coordinates with `x1 <= x2` and `y1 <= y2`.
///
/// Areas and overlaps use inclusive pixel arithmetic, so a box always covers
/// at least one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    /// Builds a box from two corners in any order.
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Box spanning `width x height` pixels from `(x, y)`, the way contour
    /// bounding rectangles are reported: `(x, y, x + width, y + height)`.
    pub fn from_origin(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1 + 1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1 + 1
    }

    /// Inclusive area: `(x2 - x1 + 1) * (y2 - y1 + 1)`.
    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Inclusive overlap area with `other`; 0 when disjoint.
    pub fn intersection_area(&self, other: &BoundingBox) -> u64 {
        let left = self.x1.max(other.x1) as i64;
        let top = self.y1.max(other.y1) as i64;
        let right = self.x2.min(other.x2) as i64;
        let bottom = self.y2.min(other.y2) as i64;
        let width = (right - left + 1).max(0) as u64;
        let height = (bottom - top + 1).max(0) as u64;
        width * height
    }

    /// Intersection over union, 0.0 when the union is empty.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;
        if union == 0 {
            return 0.0;
        }
        intersection as f64 / union as f64
    }

    pub fn as_tuple(&self) -> (u32, u32, u32, u32) {
        (self.x1, self.y1, self.x2, self.y2)
    }
}

/// A single connected region of motion detected in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionBlob {
    /// The rectangle enclosing the traced outline.
    pub bounding_box: BoundingBox,
    /// Area enclosed by the traced outer boundary, in pixels.
    pub contour_area: f64,
    /// Number of points on the traced boundary.
    pub boundary_length: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_are_normalized() {
        let b = BoundingBox::new(10, 20, 5, 2);
        assert_eq!(b.as_tuple(), (5, 2, 10, 20));
    }

    #[test]
    fn area_is_inclusive() {
        assert_eq!(BoundingBox::new(0, 0, 0, 0).area(), 1);
        assert_eq!(BoundingBox::new(0, 0, 50, 50).area(), 51 * 51);
        assert_eq!(BoundingBox::from_origin(3, 4, 10, 5).as_tuple(), (3, 4, 13, 9));
    }

    #[test]
    fn identical_boxes_fully_overlap() {
        let b = BoundingBox::new(3, 7, 40, 19);
        assert!((b.iou(&b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn disjoint_boxes_do_not_overlap() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(11, 0, 20, 10);
        let c = BoundingBox::new(50, 50, 60, 60);
        assert_eq!(a.intersection_area(&b), 0);
        assert_eq!(a.iou(&b), 0.0);
        assert_eq!(a.iou(&c), 0.0);
    }

    #[test]
    fn partial_overlap() {
        let a = BoundingBox::new(0, 0, 50, 50);
        let b = BoundingBox::new(5, 5, 55, 55);
        let intersection = 46 * 46;
        assert_eq!(a.intersection_area(&b), intersection);
        let expected = intersection as f64 / (2.0 * 51.0 * 51.0 - intersection as f64);
        assert!((a.iou(&b) - expected).abs() < 1e-12);
        assert!(a.iou(&b) > 0.3);
    }
}
