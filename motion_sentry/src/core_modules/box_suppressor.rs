// THEORY:
// The `box_suppressor` removes redundant detections. After cleaning, one moving
// object can still produce several heavily overlapping boxes (a person split at
// the waist, a car and its reflection). Greedy non-maximum suppression keeps one
// representative per cluster of overlapping boxes.
//
// Algorithm:
// 1.  Order candidates by descending score; equal scores keep their original
//     order, so the result is reproducible.
// 2.  Take the best remaining candidate and keep it.
// 3.  Drop every remaining candidate whose IoU with the kept box is above the
//     threshold. A candidate only survives a round if it overlaps the kept box
//     by at most the threshold.
// 4.  Repeat until nothing remains. O(n^2) comparisons, n is a handful per frame.
//
// Scores: the blob detector has no per-box confidence signal, so every box is
// scored 1.0 through `uniform_scores`. That function is the one place a real
// score (region area, solidity, persistence) would be plugged in.

use crate::core_modules::motion_blob::BoundingBox;

pub const DEFAULT_IOU_THRESHOLD: f64 = 0.3;

/// Intersection over union with inclusive pixel arithmetic.
pub fn intersection_over_union(a: &BoundingBox, b: &BoundingBox) -> f64 {
    a.iou(b)
}

/// One score per box, all 1.0.
pub fn uniform_scores(count: usize) -> Vec<f64> {
    vec![1.0; count]
}

/// Greedy non-maximum suppression.
///
/// Returns the indices of the boxes to keep, best score first. A box without a
/// matching entry in `scores` is scored 0.
pub fn suppress(boxes: &[BoundingBox], scores: &[f64], iou_threshold: f64) -> Vec<usize> {
    if boxes.len() <= 1 {
        return (0..boxes.len()).collect();
    }

    let score_of = |index: usize| scores.get(index).copied().unwrap_or(0.0);
    let mut order: Vec<usize> = (0..boxes.len()).collect();
    // Stable sort: ties stay in index order.
    order.sort_by(|&a, &b| score_of(b).total_cmp(&score_of(a)));

    let mut keep = Vec::new();
    while !order.is_empty() {
        let best = order[0];
        keep.push(best);
        order = order[1..]
            .iter()
            .copied()
            .filter(|&candidate| boxes[best].iou(&boxes[candidate]) <= iou_threshold)
            .collect();
    }
    keep
}

/// Runs `suppress` with uniform scores and returns the surviving boxes.
pub fn suppress_boxes(boxes: &[BoundingBox], iou_threshold: f64) -> Vec<BoundingBox> {
    suppress(boxes, &uniform_scores(boxes.len()), iou_threshold)
        .into_iter()
        .map(|index| boxes[index])
        .collect()
}
