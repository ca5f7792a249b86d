use approx::assert_abs_diff_eq;
use deshake_core::transform::smooth::{
    apply_zoom, camera_path_avg, camera_path_gaussian, clamp_limits, OptZoom, SlidingSmoother,
};
use deshake_core::transform::Transform;

/// The smoothed component removed by the gaussian path filter.
fn smoothed_component(len: usize, impulse_at: usize, amplitude: f64, sigma: usize) -> Vec<f64> {
    let mut ts = vec![Transform::default(); len];
    ts[impulse_at] = Transform::translation(amplitude, 0.0);
    let orig: Vec<f64> = ts.iter().map(|t| t.x).collect();
    camera_path_gaussian(&mut ts, sigma, false);
    orig.iter()
        .zip(&ts)
        .map(|(o, t)| o - t.x)
        .collect()
}

#[test]
fn gaussian_impulse_response() {
    let sigma = 15usize;
    let peak = 20usize;
    let smoothed = smoothed_component(41, peak, 10.0, sigma);

    // Reference kernel, computed independently.
    let sigma2 = (sigma as f64 / 2.0).powi(2);
    let weight = |d: i64| (-(d * d) as f64 / sigma2).exp();
    let kernel_sum: f64 = (-(sigma as i64)..=sigma as i64).map(weight).sum();

    // The peak stays at the impulse index with amplitude 1 / kernel_sum.
    assert_abs_diff_eq!(smoothed[peak], 10.0 / kernel_sum, epsilon = 1e-9);
    let max = smoothed
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .unwrap();
    assert_eq!(max.0, peak);

    // Symmetric falloff around the peak while the kernel fits the sequence.
    for d in 1..=5usize {
        assert_abs_diff_eq!(smoothed[peak - d], smoothed[peak + d], epsilon = 1e-9);
        assert!(smoothed[peak + d] < smoothed[peak + d - 1]);
    }

    // Away from the impulse nothing leaks in.
    assert_abs_diff_eq!(smoothed[peak + sigma + 1], 0.0);
    assert_abs_diff_eq!(smoothed[peak - sigma - 1], 0.0);

    // Where the kernel fits entirely, the response is the normalized kernel.
    for d in 0..=5i64 {
        assert_abs_diff_eq!(
            smoothed[(peak as i64 + d) as usize],
            10.0 * weight(d) / kernel_sum,
            epsilon = 1e-9
        );
    }
}

#[test]
fn gaussian_integrates_relative_input() {
    // Constant relative motion integrates to a linear path; far from the
    // ends the gaussian average of a line reproduces the line, leaving
    // no correction.
    let mut ts = vec![Transform::translation(3.0, 0.0); 101];
    camera_path_gaussian(&mut ts, 10, true);
    assert_abs_diff_eq!(ts[50].x, 0.0, epsilon = 1e-9);
}

#[test]
fn avg_drift_compensation_is_bounded() {
    let mut ts: Vec<Transform> = (0..300)
        .map(|i| Transform::translation(if i % 2 == 0 { 4.0 } else { -4.0 }, 0.0))
        .collect();
    camera_path_avg(&mut ts, 6, false);
    for t in &ts {
        assert!(t.x.abs() <= 8.0, "filtered correction {} escaped", t.x);
    }
}

#[test]
fn limits_clamp_only_when_set() {
    let mut ts = vec![Transform::new(30.0, -40.0, 0.5, 0.0)];
    clamp_limits(&mut ts, -1, -1.0);
    assert_abs_diff_eq!(ts[0].x, 30.0);

    clamp_limits(&mut ts, 25, 0.2);
    assert_abs_diff_eq!(ts[0].x, 25.0);
    assert_abs_diff_eq!(ts[0].y, -25.0);
    assert_abs_diff_eq!(ts[0].alpha, 0.2);
}

#[test]
fn static_zoom_covers_translations() {
    let mut ts: Vec<Transform> = (0..100)
        .map(|i| Transform::translation(if i == 50 { 16.0 } else { 8.0 }, 0.0))
        .collect();
    apply_zoom(&mut ts, OptZoom::Static, 0.0, 0.25, 320, 240);
    // The percentile cut drops the single spike; 2 * 8 / 320 = 5%.
    assert_abs_diff_eq!(ts[0].zoom, 5.0, epsilon = 1e-9);
    assert!(ts.iter().all(|t| (t.zoom - 5.0).abs() < 1e-9));
}

#[test]
fn adaptive_zoom_never_uncovers_borders() {
    let mut ts: Vec<Transform> = (0..60)
        .map(|i| Transform::translation(((i % 7) as f64 - 3.0) * 4.0, 0.0))
        .collect();
    let required: Vec<f64> = ts.iter().map(|t| t.required_zoom(320, 240)).collect();
    apply_zoom(&mut ts, OptZoom::Adaptive, 0.0, 0.25, 320, 240);
    for (t, req) in ts.iter().zip(&required) {
        assert!(t.zoom >= *req - 1e-9);
    }
}

#[test]
fn sliding_smoother_starts_neutral_and_tracks() {
    let mut smoother = SlidingSmoother::new();
    let first = smoother.step(
        Transform::translation(5.0, 0.0),
        10,
        -1,
        -1.0,
        OptZoom::Off,
        0.0,
        320,
        240,
    );
    assert!(first.is_identity());

    // A constant relative motion is camera movement, not shake; the
    // corrections must stay small.
    let mut max_correction: f64 = 0.0;
    for _ in 0..100 {
        let out = smoother.step(
            Transform::translation(5.0, 0.0),
            10,
            -1,
            -1.0,
            OptZoom::Off,
            0.0,
            320,
            240,
        );
        max_correction = max_correction.max(out.x.abs());
    }
    assert!(
        max_correction < 25.0,
        "sliding corrections grew to {max_correction}"
    );
}
