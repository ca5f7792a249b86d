//! Power-of-two image pyramids for coarse-to-fine matching.

use super::canvas::{Canvas, Pixel};
use super::Frame;
use crate::error::{DeshakeError, Result};
use crate::geometry::Vec2;

/// A tower of progressively halved canvases.
///
/// Level 0 has the source dimensions; level `k+1` is level `k` with both
/// dimensions halved (floor), each output pixel being the integer mean of
/// the corresponding 2x2 block. Levels are created while both dimensions
/// exceed `min_dim`.
#[derive(Clone, Debug)]
pub struct Pyramid<P: Pixel> {
    levels: Vec<Canvas<P>>,
}

impl<P: Pixel> Pyramid<P> {
    pub fn new(dim: Vec2<u32>, min_dim: u32) -> Result<Self> {
        let mut levels = Vec::new();
        let mut d = dim;
        while d.x > min_dim && d.y > min_dim {
            levels.push(Canvas::new(d));
            d = Vec2::new(d.x / 2, d.y / 2);
        }
        if levels.is_empty() {
            return Err(DeshakeError::InvalidDimensions {
                width: dim.x,
                height: dim.y,
            });
        }
        Ok(Self { levels })
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, k: usize) -> &Canvas<P> {
        &self.levels[k]
    }

    pub fn smallest(&self) -> &Canvas<P> {
        self.levels.last().expect("pyramid has at least one level")
    }

    /// Rebuilds the whole tower from a frame: level 0 is copied, every
    /// further level packed by 2x2 averaging.
    pub fn build(&mut self, frame: &Frame) {
        self.levels[0].fill_from_frame(frame);
        for k in 1..self.levels.len() {
            let (lo, hi) = self.levels.split_at_mut(k);
            pack_level(&mut hi[0], &lo[k - 1]);
        }
    }

    /// Copies all levels from a pyramid of identical geometry.
    pub fn copy_from(&mut self, src: &Pyramid<P>) {
        debug_assert_eq!(self.levels.len(), src.levels.len());
        for (dst, src) in self.levels.iter_mut().zip(&src.levels) {
            dst.copy_from(src);
        }
    }
}

fn pack_level<P: Pixel>(dst: &mut Canvas<P>, src: &Canvas<P>) {
    let dim = dst.dim();
    for y in 0..dim.y as i32 {
        for x in 0..dim.x as i32 {
            let s = Vec2::new(x * 2, y * 2);
            let v = P::avg4(
                src.get(s),
                src.get(Vec2::new(s.x + 1, s.y)),
                src.get(Vec2::new(s.x + 1, s.y + 1)),
                src.get(Vec2::new(s.x, s.y + 1)),
            );
            dst.set(Vec2::new(x, y), v);
        }
    }
}
