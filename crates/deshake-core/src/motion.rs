//! Local motion measurements and their reduction to frame transforms.

use crate::frame::FrameInfo;
use crate::geometry::Vec2;
use crate::transform::{cleanmean, Transform};

/// The source window of a measurement: a square patch centered at `pos`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Field {
    pub pos: Vec2<i32>,
    pub size: u32,
}

/// One measured local motion.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LocalMotion {
    /// Measured displacement.
    pub v: Vec2<i32>,
    /// The window the measurement was taken from.
    pub f: Field,
    /// Contrast of the window.
    pub contrast: f64,
    /// Match quality, lower is better; -1 marks a rejected measurement.
    pub match_quality: f64,
}

impl LocalMotion {
    pub fn rejected() -> Self {
        Self {
            match_quality: -1.0,
            ..Default::default()
        }
    }
}

/// Mean x/y of the motions with the upper and lower pentile removed
/// per axis.
pub fn cleanmean_motions(motions: &[LocalMotion]) -> Vec2<f64> {
    if motions.is_empty() {
        return Vec2::splat(0.0);
    }
    let mut xs: Vec<f64> = motions.iter().map(|m| m.v.x as f64).collect();
    let mut ys: Vec<f64> = motions.iter().map(|m| m.v.y as f64).collect();
    Vec2::new(cleanmean(&mut xs), cleanmean(&mut ys))
}

/// Mean match quality with the extremes removed.
pub fn cleanmean_match(motions: &[LocalMotion]) -> f64 {
    if motions.is_empty() {
        return 0.0;
    }
    let mut ms: Vec<f64> = motions.iter().map(|m| m.match_quality).collect();
    cleanmean(&mut ms)
}

/// Estimates the frame transform explaining a set of local motions.
///
/// Translation is the pentile-cleaned mean of the vectors. Rotation is the
/// cleaned mean of per-field angle deltas about the frame center; fields
/// closer to the center than `min_radius` contribute too little leverage
/// and are skipped.
pub fn motions_to_transform(
    info: &FrameInfo,
    motions: &[LocalMotion],
    min_radius: f64,
) -> Transform {
    if motions.is_empty() {
        return Transform {
            extra: 1,
            ..Default::default()
        };
    }
    let t = cleanmean_motions(motions);

    let center = Vec2::new(info.width as f64 / 2.0, info.height as f64 / 2.0);
    let mut angles: Vec<f64> = Vec::with_capacity(motions.len());
    for m in motions {
        let before = m.f.pos.to_f64() - center;
        let after = (m.f.pos + m.v).to_f64() - center - t;
        if before.qsize().sqrt() < min_radius {
            continue;
        }
        angles.push(after.y.atan2(after.x) - before.y.atan2(before.x));
    }
    let alpha = if angles.len() > 2 {
        cleanmean(&mut angles)
    } else {
        0.0
    };

    Transform::new(t.x, t.y, alpha, 0.0)
}
