//! Radial (barrel) lens distortion model.

use crate::geometry::Vec2;

/// Iteration cap of the inverse solver.
const MAX_ITERATIONS: usize = 64;

/// Inverse solver convergence bound, per axis, in pixels.
const EPSILON: f32 = 0.1;

/// Degree-3 radial polynomial in r-squared:
/// `factor(r2) = 1 + k0*r2 + k1*r2^2 + k2*r2^3`.
///
/// `to` maps linear coordinates into the distorted image, `from` undoes it
/// with a fixed-point iteration. A `ratio` above 1 evaluates the same
/// coefficients on a sub-sampled plane.
#[derive(Clone, Copy, Debug)]
pub struct Barrel {
    k: [f32; 3],
    center: Vec2<f32>,
}

impl Barrel {
    pub fn new(k: [f32; 3], width: u32, height: u32) -> Self {
        Self {
            k,
            center: Vec2::new(width as f32 / 2.0, height as f32 / 2.0),
        }
    }

    /// Distortion-free lens.
    pub fn identity(width: u32, height: u32) -> Self {
        Self::new([0.0; 3], width, height)
    }

    pub fn is_identity(&self) -> bool {
        self.k == [0.0; 3]
    }

    #[inline]
    fn factor(&self, rq: f32) -> f32 {
        1.0 + rq * (self.k[0] + rq * (self.k[1] + rq * self.k[2]))
    }

    /// Linear space to distorted space.
    pub fn to(&self, src: Vec2<f32>, ratio: f32) -> Vec2<f32> {
        if self.is_identity() {
            return src;
        }
        let center = self.center / ratio;
        let p = (src - center) * ratio;
        let out = p / self.factor(p.qsize());
        out / ratio + center
    }

    /// Distorted space back to linear space.
    ///
    /// Solved iteratively: the initial guess applies the forward polynomial,
    /// then each step feeds the residual back into the estimate. Terminates
    /// early when both axes are within [`EPSILON`]; if the iteration cap is
    /// reached the best estimate so far is returned.
    pub fn from(&self, src: Vec2<f32>, ratio: f32) -> Vec2<f32> {
        if self.is_identity() {
            return src;
        }
        let center = self.center / ratio;
        let p = (src - center) * ratio;
        let mut estimated = p * self.factor(p.qsize());

        for _ in 0..MAX_ITERATIONS {
            let reality = estimated / self.factor(estimated.qsize());
            estimated += p - reality;
            if (p.x - reality.x).abs() < EPSILON && (p.y - reality.y).abs() < EPSILON {
                break;
            }
        }

        estimated / ratio + center
    }
}
