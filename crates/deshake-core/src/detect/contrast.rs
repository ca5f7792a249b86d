//! Texture scoring of detection cells.

use crate::consts::{CELL_SIZE, CONTRAST_THRESHOLD};
use crate::frame::{Canvas, Pixel};
use crate::geometry::{RectIter, Vec2};

/// Scores the texture of a cell at `top_left` on the given canvas.
///
/// Over the cell interior the signed horizontal and vertical finite
/// differences (at distance `CELL_SIZE / 2`) are tracked for their minima
/// and maxima; the score is the absolute product of all four extremes.
/// Flat areas score 0, strong two-dimensional structure scores high.
pub fn score_cell<P: Pixel>(canvas: &Canvas<P>, top_left: Vec2<i32>) -> u32 {
    let dist = (CELL_SIZE / 2) as i32;
    let h = Vec2::new(dist, 0);
    let v = Vec2::new(0, dist);
    let interior = Vec2::splat(CELL_SIZE - CELL_SIZE / 2);

    let mut min_v = i32::MAX;
    let mut max_v = i32::MIN;
    let mut min_h = i32::MAX;
    let mut max_h = i32::MIN;

    for i in RectIter::new(interior) {
        let p = canvas.get(top_left + i).intensity();
        let dh = p - canvas.get(top_left + i + h).intensity();
        let dv = p - canvas.get(top_left + i + v).intensity();
        min_v = min_v.min(dv);
        max_v = max_v.max(dv);
        min_h = min_h.min(dh);
        max_h = max_h.max(dh);
    }

    let score = (min_v as i64 * max_v as i64).abs() * (min_h as i64 * max_h as i64).abs();
    score.min(u32::MAX as i64) as u32
}

/// Contrast weight of a cell: the margin above the selection threshold,
/// or 0 for cells to be discarded.
pub fn contrast_weight(score: u32) -> u32 {
    if score >= CONTRAST_THRESHOLD {
        score - CONTRAST_THRESHOLD
    } else {
        0
    }
}
