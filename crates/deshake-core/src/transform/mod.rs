//! Per-frame camera transforms and their arithmetic.

pub mod smooth;

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::geometry::Vec2;

/// One frame's camera motion or correction.
///
/// `zoom` is a percentage, `alpha` radians. `barrel` and `rshutter` carry
/// the lens and rolling-shutter coefficients through the pipeline. `extra`
/// flags frames with unreliable estimates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub alpha: f64,
    pub zoom: f64,
    pub barrel: f64,
    pub rshutter: f64,
    pub extra: i32,
}

impl Transform {
    pub fn new(x: f64, y: f64, alpha: f64, zoom: f64) -> Self {
        Self {
            x,
            y,
            alpha,
            zoom,
            ..Default::default()
        }
    }

    pub fn translation(x: f64, y: f64) -> Self {
        Self::new(x, y, 0.0, 0.0)
    }

    pub fn is_identity(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.alpha == 0.0 && self.zoom == 0.0
    }

    /// Zoom required so the frame warped by `self` leaves no uncovered
    /// border, in percent.
    pub fn required_zoom(&self, width: u32, height: u32) -> f64 {
        let translation = 2.0
            * f64::max(
                self.x.abs() / width as f64,
                self.y.abs() / height as f64,
            );
        100.0 * (translation + self.alpha.sin().abs())
    }
}

impl Add for Transform {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            alpha: self.alpha + rhs.alpha,
            zoom: self.zoom + rhs.zoom,
            barrel: self.barrel + rhs.barrel,
            rshutter: self.rshutter + rhs.rshutter,
            extra: (self.extra != 0 || rhs.extra != 0) as i32,
        }
    }
}

impl Sub for Transform {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            alpha: self.alpha - rhs.alpha,
            zoom: self.zoom - rhs.zoom,
            barrel: self.barrel - rhs.barrel,
            rshutter: self.rshutter - rhs.rshutter,
            extra: (self.extra != 0 || rhs.extra != 0) as i32,
        }
    }
}

impl Mul<f64> for Transform {
    type Output = Self;
    fn mul(self, f: f64) -> Self {
        Self {
            x: self.x * f,
            y: self.y * f,
            alpha: self.alpha * f,
            zoom: self.zoom * f,
            barrel: self.barrel * f,
            rshutter: self.rshutter * f,
            extra: self.extra,
        }
    }
}

/// A transform with the rotation/zoom matrix pre-multiplied, for per-pixel
/// application.
#[derive(Clone, Copy, Debug)]
pub struct PreparedTransform {
    pub zcos_a: f64,
    pub zsin_a: f64,
    pub c_x: f64,
    pub c_y: f64,
    pub t_x: f64,
    pub t_y: f64,
}

impl PreparedTransform {
    pub fn new(t: &Transform, width: u32, height: u32) -> Self {
        let z = 1.0 + t.zoom / 100.0;
        Self {
            zcos_a: z * t.alpha.cos(),
            zsin_a: z * t.alpha.sin(),
            c_x: width as f64 / 2.0,
            c_y: height as f64 / 2.0,
            t_x: t.x,
            t_y: t.y,
        }
    }

    /// Maps a point through rotation/zoom about the frame center plus the
    /// translation.
    pub fn apply(&self, v: Vec2<f64>) -> Vec2<f64> {
        let rx = v.x - self.c_x;
        let ry = v.y - self.c_y;
        Vec2::new(
            self.zcos_a * rx + self.zsin_a * ry + self.t_x + self.c_x,
            -self.zsin_a * rx + self.zcos_a * ry + self.t_y + self.c_y,
        )
    }
}

/// Median of x and y over a set of transforms; other fields zero.
pub fn median_xy(ts: &[Transform]) -> Transform {
    if ts.is_empty() {
        return Transform::default();
    }
    let mut xs: Vec<f64> = ts.iter().map(|t| t.x).collect();
    let mut ys: Vec<f64> = ts.iter().map(|t| t.y).collect();
    Transform::translation(median(&mut xs), median(&mut ys))
}

/// Mean of x and y with the upper and lower pentile removed.
pub fn cleanmean_xy(ts: &[Transform]) -> Transform {
    if ts.is_empty() {
        return Transform::default();
    }
    let mut xs: Vec<f64> = ts.iter().map(|t| t.x).collect();
    let mut ys: Vec<f64> = ts.iter().map(|t| t.y).collect();
    Transform::translation(cleanmean(&mut xs), cleanmean(&mut ys))
}

/// Per-axis min and max of x/y after cutting `percentile` percent of the
/// extremes on each side.
pub fn cleanmaxmin_xy(ts: &[Transform], percentile: usize) -> (Transform, Transform) {
    let cut = ts.len() * percentile / 100;
    let mut xs: Vec<f64> = ts.iter().map(|t| t.x).collect();
    let mut ys: Vec<f64> = ts.iter().map(|t| t.y).collect();
    xs.sort_by(f64::total_cmp);
    ys.sort_by(f64::total_cmp);
    let min = Transform::translation(xs[cut], ys[cut]);
    let max = Transform::translation(xs[xs.len() - cut - 1], ys[ys.len() - cut - 1]);
    (min, max)
}

/// Median of a slice; sorts in place.
pub fn median(ds: &mut [f64]) -> f64 {
    ds.sort_by(f64::total_cmp);
    let half = ds.len() / 2;
    if ds.len() % 2 == 1 {
        ds[half]
    } else {
        (ds[half - 1] + ds[half]) / 2.0
    }
}

/// Mean with the upper and lower pentile (20% each) removed; sorts in place.
pub fn cleanmean(ds: &mut [f64]) -> f64 {
    ds.sort_by(f64::total_cmp);
    let cut = ds.len() / 5;
    let kept = &ds[cut..ds.len() - cut];
    kept.iter().sum::<f64>() / kept.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn add_sub_roundtrip() {
        let a = Transform::new(1.0, 2.0, 0.1, 5.0);
        let b = Transform::new(-0.5, 1.0, 0.05, 1.0);
        let c = a + b - b;
        assert_abs_diff_eq!(c.x, a.x);
        assert_abs_diff_eq!(c.y, a.y);
        assert_abs_diff_eq!(c.alpha, a.alpha);
        assert_abs_diff_eq!(c.zoom, a.zoom);
    }

    #[test]
    fn prepared_identity_moves_nothing() {
        let pt = PreparedTransform::new(&Transform::default(), 640, 480);
        let p = pt.apply(Vec2::new(100.0, 50.0));
        assert_abs_diff_eq!(p.x, 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.y, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn cleanmean_drops_outliers() {
        let mut vals = vec![0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 100.0];
        assert_abs_diff_eq!(cleanmean(&mut vals), 1.0);
    }

    #[test]
    fn required_zoom_translation_only() {
        let t = Transform::translation(16.0, 0.0);
        assert_abs_diff_eq!(t.required_zoom(320, 240), 10.0);
    }
}
