//! SAD block matching between two canvases.

use crate::frame::{Canvas, Pixel};
use crate::geometry::{RectIter, Vec2};

/// Sum of absolute differences between the window of `curr` at `pos` and
/// the window of `reference` at `ref_pos`, both of extent `rect`.
///
/// Accumulation aborts as soon as the running sum reaches `threshold`,
/// so a caller keeping its running minimum skips hopeless offsets early.
/// Windows reaching past a canvas read zero pixels.
pub fn sad<P: Pixel>(
    curr: &Canvas<P>,
    reference: &Canvas<P>,
    pos: Vec2<i32>,
    ref_pos: Vec2<i32>,
    rect: Vec2<u32>,
    threshold: u32,
) -> u32 {
    let w = rect.x as i32;
    let h = rect.y as i32;
    let inside = |c: &Canvas<P>, p: Vec2<i32>| {
        p.x >= 0 && p.y >= 0 && p.x + w <= c.dim().x as i32 && p.y + h <= c.dim().y as i32
    };

    let mut acc = 0u32;
    if inside(curr, pos) && inside(reference, ref_pos) {
        for y in 0..h {
            let a = &curr.row((pos.y + y) as usize)[pos.x as usize..(pos.x + w) as usize];
            let b = &reference.row((ref_pos.y + y) as usize)
                [ref_pos.x as usize..(ref_pos.x + w) as usize];
            for (pa, pb) in a.iter().zip(b) {
                acc += P::sad(*pa, *pb);
            }
            if acc >= threshold {
                break;
            }
        }
    } else {
        for i in RectIter::new(rect) {
            acc += P::sad(curr.get(pos + i), reference.get(ref_pos + i));
            if acc >= threshold {
                break;
            }
        }
    }
    acc
}

/// Runs the matcher over a set of candidate offsets and returns the offset
/// with the smallest SAD together with that SAD.
///
/// Ties keep the earlier candidate, so search iterators ordered from the
/// most probable offset outward settle on the least surprising match.
pub fn best_offset<P: Pixel>(
    curr: &Canvas<P>,
    reference: &Canvas<P>,
    pos: Vec2<i32>,
    rect: Vec2<u32>,
    offsets: impl Iterator<Item = Vec2<i32>>,
) -> (Vec2<i32>, u32) {
    let mut best = Vec2::splat(0);
    let mut min = u32::MAX;
    for offset in offsets {
        let cost = sad(curr, reference, pos, pos + offset, rect, min);
        if cost < min {
            min = cost;
            best = offset;
        }
    }
    (best, min)
}
