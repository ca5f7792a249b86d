//! Low-pass smoothing of the camera path.
//!
//! The batch smoothers rewrite a whole transform sequence in place so that
//! every entry becomes the correction to apply to its frame: the original
//! motion minus the smoothed camera path. The sliding smoother does the
//! same one frame at a time for streaming use.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::Transform;

/// Camera path smoothing flavour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CamPath {
    /// Sliding-window moving average with drift compensation.
    Avg,
    /// Gaussian low-pass kernel.
    #[default]
    Gaussian,
    /// Reserved; currently falls back to gaussian.
    OptimalL1,
}

/// Smooths `ts` with the selected algorithm.
pub fn camera_path(ts: &mut [Transform], algo: CamPath, smoothing: usize, relative: bool) {
    match algo {
        CamPath::Avg => camera_path_avg(ts, smoothing, relative),
        CamPath::Gaussian => camera_path_gaussian(ts, smoothing, relative),
        CamPath::OptimalL1 => {
            warn!("optimalL1 camera path not implemented, using gaussian");
            camera_path_gaussian(ts, smoothing, relative);
        }
    }
}

/// The gaussian kernel used for a half-window of `smoothing` frames.
pub fn gaussian_kernel(smoothing: usize) -> Vec<f64> {
    let s = smoothing * 2 + 1;
    let mu = smoothing as f64;
    let sigma2 = (mu / 2.0) * (mu / 2.0);
    let mut kernel = vec![0.0; s];
    for i in 0..=smoothing {
        let w = (-((i as f64 - mu) * (i as f64 - mu)) / sigma2).exp();
        kernel[i] = w;
        kernel[s - i - 1] = w;
    }
    kernel
}

/// Gaussian low-pass over the cumulative camera path.
///
/// With `relative` set, the per-frame motions are integrated first; each
/// output entry is then the original absolute position minus its smoothed
/// counterpart.
pub fn camera_path_gaussian(ts: &mut [Transform], smoothing: usize, relative: bool) {
    if ts.is_empty() {
        return;
    }
    if relative {
        integrate(ts);
    }
    if smoothing == 0 {
        return;
    }
    let kernel = gaussian_kernel(smoothing);
    let s = kernel.len();
    let mu = smoothing;
    let orig = ts.to_vec();

    for i in 0..ts.len() {
        let mut weight_sum = 0.0;
        let mut avg = Transform::default();
        for (k, &w) in kernel.iter().enumerate().take(s) {
            let idx = i as i64 + k as i64 - mu as i64;
            if idx >= 0 && (idx as usize) < orig.len() {
                weight_sum += w;
                avg = avg + orig[idx as usize] * w;
            }
        }
        if weight_sum > 0.0 {
            avg = avg * (1.0 / weight_sum);
            ts[i] = ts[i] - avg;
        }
    }
}

/// Moving-average low-pass over the relative motions.
///
/// The window sum is maintained incrementally. A secondary one-sided
/// average over the already-filtered signal (time constant `1 / (2s)`)
/// is subtracted to keep the filtered path from accumulating drift.
pub fn camera_path_avg(ts: &mut [Transform], smoothing: usize, relative: bool) {
    if ts.is_empty() {
        return;
    }
    if smoothing > 0 {
        let orig = ts.to_vec();
        let s = smoothing * 2 + 1;
        let tau = 1.0 / (2.0 * s as f64);
        let mut drift = Transform::default();

        // Hypothetical window sum centered one step before the first frame,
        // assuming the camera keeps its initial motion.
        let mut sum = Transform::default();
        for t in orig.iter().take(smoothing) {
            sum = sum + *t;
        }
        sum = sum * 2.0;

        for i in 0..ts.len() {
            let out = i as i64 - smoothing as i64 - 1;
            if out >= 0 {
                sum = sum - orig[out as usize];
            }
            if i + smoothing < orig.len() {
                sum = sum + orig[i + smoothing];
            }
            let avg = sum * (1.0 / s as f64);
            ts[i] = orig[i] - avg;
            drift = drift * (1.0 - tau) + ts[i] * tau;
            ts[i] = ts[i] - drift;
        }
    }
    if relative {
        integrate(ts);
    }
}

/// Relative-to-absolute conversion in place.
pub fn integrate(ts: &mut [Transform]) {
    for i in 1..ts.len() {
        ts[i] = ts[i] + ts[i - 1];
    }
}

/// Inverts every transform.
pub fn invert(ts: &mut [Transform]) {
    for t in ts.iter_mut() {
        *t = *t * -1.0;
    }
}

/// Clamps translations to `max_shift` and rotation to `max_angle`;
/// -1 leaves the corresponding limit open.
pub fn clamp_limits(ts: &mut [Transform], max_shift: i32, max_angle: f64) {
    if max_shift >= 0 {
        let m = max_shift as f64;
        for t in ts.iter_mut() {
            t.x = t.x.clamp(-m, m);
            t.y = t.y.clamp(-m, m);
        }
    }
    if max_angle >= 0.0 {
        for t in ts.iter_mut() {
            t.alpha = t.alpha.clamp(-max_angle, max_angle);
        }
    }
}

/// Optimal-zoom policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptZoom {
    Off,
    /// One static zoom chosen so 99% of the frames show no border.
    #[default]
    Static,
    /// Per-frame zoom, slid forward and backward at `zoom_speed`.
    Adaptive,
}

/// Applies zoom to the transform sequence.
///
/// `Static` derives one global zoom from the percentile-cleaned extremes
/// of the translations; `Adaptive` computes the per-frame required zoom
/// and propagates it in both directions so the virtual camera zooms
/// smoothly; `Off` only applies the user zoom.
pub fn apply_zoom(
    ts: &mut [Transform],
    opt_zoom: OptZoom,
    zoom: f64,
    zoom_speed: f64,
    width: u32,
    height: u32,
) {
    let mut global = zoom;
    if opt_zoom == OptZoom::Static && ts.len() > 1 {
        let (min_t, max_t) = super::cleanmaxmin_xy(ts, 1);
        let zx = 2.0 * f64::max(max_t.x, min_t.x.abs()) / width as f64;
        let zy = 2.0 * f64::max(max_t.y, min_t.y.abs()) / height as f64;
        global = (global + 100.0 * f64::max(zx, zy)).clamp(-60.0, 60.0);
    }

    match opt_zoom {
        OptZoom::Adaptive if ts.len() > 1 => {
            let zooms: Vec<f64> = ts
                .iter()
                .map(|t| t.required_zoom(width, height))
                .collect();
            let (pre, post) = if zoom > 0.0 { (zoom, 0.0) } else { (0.0, zoom) };
            let mean_zoom = zooms.iter().sum::<f64>() / zooms.len() as f64 + pre;

            let mut req = mean_zoom;
            for (t, &z) in ts.iter_mut().zip(&zooms) {
                req = f64::max(req, z);
                t.zoom = f64::max(t.zoom, req);
                req = f64::max(mean_zoom, req - zoom_speed);
            }
            req = mean_zoom;
            for (t, &z) in ts.iter_mut().zip(&zooms).rev() {
                req = f64::max(req, z);
                t.zoom = f64::max(t.zoom, req) + post;
                req = f64::max(mean_zoom, req - zoom_speed);
            }
        }
        _ => {
            if global != 0.0 {
                for t in ts.iter_mut() {
                    t.zoom += global;
                }
            }
        }
    }
}

/// One-sided streaming smoother keeping only two state transforms.
///
/// Per frame: `avg <- (1-s)*avg + s*t`, emit `t - avg + accum`, then decay
/// `accum` by `tau` so corrections do not build up, with `s = 1/(sigma+1)`
/// and `tau = 1/(3(sigma+1))`.
#[derive(Clone, Debug, Default)]
pub struct SlidingSmoother {
    avg: Transform,
    accum: Transform,
    zoom_avg: f64,
    initialized: bool,
}

impl SlidingSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one relative transform, returning the correction for its frame.
    #[allow(clippy::too_many_arguments)]
    pub fn step(
        &mut self,
        t: Transform,
        smoothing: usize,
        max_shift: i32,
        max_angle: f64,
        opt_zoom: OptZoom,
        zoom: f64,
        width: u32,
        height: u32,
    ) -> Transform {
        if !self.initialized {
            self.avg = t;
            self.accum = Transform::default();
            self.zoom_avg = 0.0;
            self.initialized = true;
            return self.accum;
        }

        let s = 1.0 / (smoothing as f64 + 1.0);
        let tau = 1.0 / (3.0 * (smoothing as f64 + 1.0));
        if smoothing > 0 {
            self.avg = self.avg * (1.0 - s) + t * s;
        } else {
            self.avg = t;
        }

        let mut out = t - self.avg;
        out = out + self.accum;
        self.accum = out;
        if smoothing > 0 {
            self.accum = self.accum * (1.0 - tau);
        }

        if max_shift >= 0 {
            out.x = out.x.clamp(-(max_shift as f64), max_shift as f64);
            out.y = out.y.clamp(-(max_shift as f64), max_shift as f64);
        }
        if max_angle >= 0.0 {
            out.alpha = out.alpha.clamp(-max_angle, max_angle);
        }

        if opt_zoom != OptZoom::Off && smoothing > 0 {
            let zx = 2.0 * out.x / width as f64;
            let zy = 2.0 * out.y / height as f64;
            let req = 100.0 * f64::max(zx.abs(), zy.abs());
            self.zoom_avg = self.zoom_avg * (1.0 - s) + req * s;
            out.zoom = self.zoom_avg;
        }
        if zoom != 0.0 {
            out.zoom += zoom;
        }
        out
    }
}
