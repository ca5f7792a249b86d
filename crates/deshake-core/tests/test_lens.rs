use deshake_core::geometry::Vec2;
use deshake_core::lens::Barrel;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const K: [f32; 3] = [8e-8, -3.8e-15, 9e-23];

#[test]
fn round_trip_stays_within_a_fifth_of_a_pixel() {
    let lens = Barrel::new(K, 3840, 2160);
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..1000 {
        let p = Vec2::new(
            rng.random_range(0.0..3840.0f32),
            rng.random_range(0.0..2160.0f32),
        );

        let there = lens.from(lens.to(p, 1.0), 1.0);
        assert!(
            (there.x - p.x).abs() < 0.2 && (there.y - p.y).abs() < 0.2,
            "from(to({p:?})) drifted to {there:?}"
        );

        let back = lens.to(lens.from(p, 1.0), 1.0);
        assert!(
            (back.x - p.x).abs() < 0.2 && (back.y - p.y).abs() < 0.2,
            "to(from({p:?})) drifted to {back:?}"
        );
    }
}

#[test]
fn distortion_pulls_corners_inward() {
    let lens = Barrel::new(K, 3840, 2160);
    let corner = Vec2::new(0.0f32, 0.0);
    let d = lens.to(corner, 1.0);
    // Barrel distortion moves off-center points toward the center.
    assert!(d.x > corner.x && d.y > corner.y);
}

#[test]
fn identity_on_subsampled_plane() {
    let lens = Barrel::identity(3840, 2160);
    let p = Vec2::new(512.25f32, 300.5);
    assert_eq!(lens.to(p, 2.0), p);
    assert_eq!(lens.from(p, 2.0), p);
}
