mod common;

use common::gray_frame;
use deshake_core::frame::{Luma, Pyramid};
use deshake_core::geometry::Vec2;

#[test]
fn level_dimensions_are_floored_halves() {
    let frame = gray_frame(322, 242, |x, y| ((x * 3 + y * 5) % 256) as u8);
    let mut p = Pyramid::<Luma>::new(Vec2::new(322, 242), 16).unwrap();
    p.build(&frame);

    for k in 0..p.level_count() {
        let expected = Vec2::new(322 >> k, 242 >> k);
        assert_eq!(p.level(k).dim(), expected, "level {k}");
    }
}

#[test]
fn every_level_is_the_2x2_mean_of_its_parent() {
    let frame = gray_frame(128, 96, |x, y| ((x * 7 + y * 13 + x * y) % 256) as u8);
    let mut p = Pyramid::<Luma>::new(Vec2::new(128, 96), 8).unwrap();
    p.build(&frame);

    for k in 1..p.level_count() {
        let dim = p.level(k).dim();
        for y in 0..dim.y as i32 {
            for x in 0..dim.x as i32 {
                let s = Vec2::new(x * 2, y * 2);
                let mean = (p.level(k - 1).get(s).0 as u32
                    + p.level(k - 1).get(Vec2::new(s.x + 1, s.y)).0 as u32
                    + p.level(k - 1).get(Vec2::new(s.x, s.y + 1)).0 as u32
                    + p.level(k - 1).get(Vec2::new(s.x + 1, s.y + 1)).0 as u32)
                    / 4;
                assert_eq!(p.level(k).get(Vec2::new(x, y)).0 as u32, mean);
            }
        }
    }
}

#[test]
fn four_by_four_average_example() {
    // Pixel value i*10 + j at row i, column j.
    let frame = gray_frame(4, 4, |x, y| (y * 10 + x) as u8);
    let mut p = Pyramid::<Luma>::new(Vec2::new(4, 4), 1).unwrap();
    p.build(&frame);
    assert_eq!(p.level(1).get(Vec2::new(0, 0)), Luma(5));
    // (22 + 23 + 32 + 33) / 4 = 27 in integer arithmetic.
    assert_eq!(p.level(1).get(Vec2::new(1, 1)), Luma(27));
}

#[test]
fn level_zero_is_a_copy() {
    let frame = gray_frame(64, 64, |x, y| ((x ^ y) % 256) as u8);
    let mut p = Pyramid::<Luma>::new(Vec2::new(64, 64), 16).unwrap();
    p.build(&frame);
    let plane = frame.plane(0);
    for y in 0..64usize {
        for x in 0..64usize {
            assert_eq!(
                p.level(0).get(Vec2::new(x as i32, y as i32)).0,
                plane.data[y * plane.stride + x]
            );
        }
    }
}
