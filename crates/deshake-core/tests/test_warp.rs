mod common;

use common::{find_bright_region, gray_frame, square_frame};
use deshake_core::frame::{Frame, FrameInfo, PixelFormat};
use deshake_core::lens::Barrel;
use deshake_core::transform::Transform;
use deshake_core::warp::{warp_frame, CropMode, Interpolation};

#[test]
fn identity_transform_copies_every_plane() {
    let info = FrameInfo::new(96, 64, PixelFormat::Yuv420p).unwrap();
    let mut src = Frame::allocate(info).unwrap();
    for p in 0..3 {
        let plane = src.plane_mut(p);
        for (i, v) in plane.data.iter_mut().enumerate() {
            *v = ((i * (p + 3)) % 256) as u8;
        }
    }
    let mut dst = Frame::allocate(info).unwrap();
    for interp in [
        Interpolation::Zero,
        Interpolation::Linear,
        Interpolation::Bilinear,
        Interpolation::Bicubic,
    ] {
        warp_frame(
            &mut dst,
            &src,
            &Transform::default(),
            &Barrel::identity(96, 64),
            interp,
            CropMode::Black,
        )
        .unwrap();
        for p in 0..3 {
            assert_eq!(dst.plane(p).data, src.plane(p).data, "plane {p}");
        }
    }
}

#[test]
fn integer_translation_moves_content_exactly() {
    let src = square_frame(128, 96, 40, 40, 12);
    let mut dst = Frame::allocate(*src.info()).unwrap();
    let t = Transform::translation(5.0, 3.0);
    warp_frame(
        &mut dst,
        &src,
        &t,
        &Barrel::identity(128, 96),
        Interpolation::Zero,
        CropMode::Black,
    )
    .unwrap();
    assert_eq!(find_bright_region(&dst, 200), Some((45, 43)));
}

#[test]
fn uncovered_border_is_black() {
    let src = gray_frame(64, 64, |_, _| 200);
    let mut dst = Frame::allocate(*src.info()).unwrap();
    warp_frame(
        &mut dst,
        &src,
        &Transform::translation(10.0, 0.0),
        &Barrel::identity(64, 64),
        Interpolation::Zero,
        CropMode::Black,
    )
    .unwrap();
    let p = dst.plane(0);
    // Columns with no source coverage become black, the rest keep the gray.
    assert_eq!(p.data[32 * p.stride], 0);
    assert_eq!(p.data[32 * p.stride + 5], 0);
    assert_eq!(p.data[32 * p.stride + 20], 200);
}

#[test]
fn keep_mode_preserves_existing_pixels() {
    let src = gray_frame(64, 64, |_, _| 200);
    let mut dst = Frame::allocate(*src.info()).unwrap();
    dst.fill(33, 0x80);
    warp_frame(
        &mut dst,
        &src,
        &Transform::translation(10.0, 0.0),
        &Barrel::identity(64, 64),
        Interpolation::Zero,
        CropMode::Keep,
    )
    .unwrap();
    let p = dst.plane(0);
    assert_eq!(p.data[32 * p.stride + 2], 33);
    assert_eq!(p.data[32 * p.stride + 20], 200);
}

#[test]
fn rotation_keeps_the_center_fixed() {
    let src = gray_frame(65, 65, |x, y| if x == 32 && y == 32 { 255 } else { 40 });
    let mut dst = Frame::allocate(*src.info()).unwrap();
    warp_frame(
        &mut dst,
        &src,
        &Transform::new(0.0, 0.0, 0.3, 0.0),
        &Barrel::identity(65, 65),
        Interpolation::Zero,
        CropMode::Black,
    )
    .unwrap();
    let p = dst.plane(0);
    assert_eq!(p.data[32 * p.stride + 32], 255);
}

#[test]
fn zoom_shrinks_content() {
    // Positive zoom magnifies: the square's apparent size grows.
    let src = square_frame(128, 128, 48, 48, 32);
    let mut dst = Frame::allocate(*src.info()).unwrap();
    warp_frame(
        &mut dst,
        &src,
        &Transform::new(0.0, 0.0, 0.0, 25.0),
        &Barrel::identity(128, 128),
        Interpolation::Bilinear,
        CropMode::Black,
    )
    .unwrap();
    let count_bright = |f: &Frame| {
        f.plane(0)
            .data
            .iter()
            .filter(|&&v| v > 128)
            .count()
    };
    assert!(count_bright(&dst) > count_bright(&src));
}

#[test]
fn geometry_mismatch_is_rejected() {
    let src = gray_frame(64, 64, |_, _| 0);
    let mut dst =
        Frame::allocate(FrameInfo::new(32, 32, PixelFormat::Gray8).unwrap()).unwrap();
    assert!(warp_frame(
        &mut dst,
        &src,
        &Transform::default(),
        &Barrel::identity(64, 64),
        Interpolation::Zero,
        CropMode::Black,
    )
    .is_err());
}
