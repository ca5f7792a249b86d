mod common;

use common::{find_bright_region, square_frame};
use deshake_core::corrector::{Corrector, CorrectorConfig};
use deshake_core::frame::{Frame, FrameInfo, PixelFormat};
use deshake_core::transform::smooth::OptZoom;
use deshake_core::transform::Transform;
use deshake_core::warp::{CropMode, Interpolation};

fn plain_config() -> CorrectorConfig {
    CorrectorConfig {
        smoothing: 15,
        opt_zoom: OptZoom::Off,
        crop: CropMode::Black,
        interpol: Interpolation::Zero,
        ..Default::default()
    }
}

/// Ten frames of a square jittering around a fixed spot, with the
/// per-frame motions a detector would have measured.
fn jittering_scene(w: u32, h: u32) -> (Vec<Frame>, Vec<Transform>) {
    // Zero-mean shake offsets of the content.
    let ox: [i32; 10] = [0, 1, -1, 0, 1, 0, -1, 1, 0, -1];
    let oy: [i32; 10] = [0, -1, 1, 1, 0, -1, 0, 0, 1, -1];

    let frames: Vec<Frame> = (0..10)
        .map(|i| {
            square_frame(
                w,
                h,
                (60 + ox[i]) as usize,
                (40 + oy[i]) as usize,
                16,
            )
        })
        .collect();
    // Content shifting by d is measured as motion -d.
    let transforms = (0..10)
        .map(|i| {
            if i == 0 {
                Transform::default()
            } else {
                Transform::translation(
                    (ox[i - 1] - ox[i]) as f64,
                    (oy[i - 1] - oy[i]) as f64,
                )
            }
        })
        .collect();
    (frames, transforms)
}

#[test]
fn smoothed_corrections_hold_the_square_still() {
    let (frames, transforms) = jittering_scene(192, 144);
    let info = *frames[0].info();
    let mut corrector = Corrector::from_transforms(transforms, info, plain_config()).unwrap();

    let mut dst = Frame::allocate(info).unwrap();
    let mut positions = Vec::new();
    for src in &frames {
        corrector.apply_next(src, &mut dst).unwrap();
        positions.push(find_bright_region(&dst, 200).expect("square visible"));
    }

    // Wherever the stabilized square settles, it must stay put.
    let (x0, y0) = positions[0];
    for (i, (x, y)) in positions.iter().enumerate() {
        assert!(
            x.abs_diff(x0) <= 1 && y.abs_diff(y0) <= 1,
            "square wandered to ({x},{y}) in frame {i}, started at ({x0},{y0})"
        );
    }
}

#[test]
fn identity_transforms_pass_frames_through() {
    let info = FrameInfo::new(160, 132, PixelFormat::Gray8).unwrap();
    let src = square_frame(160, 132, 60, 60, 16);
    let mut corrector = Corrector::from_transforms(
        vec![Transform::default(); 4],
        info,
        plain_config(),
    )
    .unwrap();
    let mut dst = Frame::allocate(info).unwrap();
    for _ in 0..4 {
        corrector.apply_next(&src, &mut dst).unwrap();
        assert_eq!(dst.plane(0).data, src.plane(0).data);
    }
}

#[test]
fn frames_past_the_transform_list_pass_through() {
    let info = FrameInfo::new(160, 132, PixelFormat::Gray8).unwrap();
    let src = square_frame(160, 132, 60, 60, 16);
    let mut corrector =
        Corrector::from_transforms(vec![Transform::default()], info, plain_config()).unwrap();
    let mut dst = Frame::allocate(info).unwrap();
    corrector.apply_next(&src, &mut dst).unwrap();
    corrector.apply_next(&src, &mut dst).unwrap();
    assert_eq!(dst.plane(0).data, src.plane(0).data);
}

#[test]
fn keep_border_reveals_the_previous_frame() {
    let info = FrameInfo::new(160, 132, PixelFormat::Gray8).unwrap();
    let conf = CorrectorConfig {
        smoothing: 0,
        opt_zoom: OptZoom::Off,
        crop: CropMode::Keep,
        interpol: Interpolation::Zero,
        relative: false,
        ..Default::default()
    };
    // Frame 1 applies no correction, frame 2 a large shift.
    let ts = vec![Transform::default(), Transform::translation(30.0, 0.0)];
    let mut corrector = Corrector::from_transforms(ts, info, conf).unwrap();

    let first = square_frame(160, 132, 4, 60, 8);
    let second = square_frame(160, 132, 80, 80, 8);
    let mut dst = Frame::allocate(info).unwrap();

    corrector.apply_next(&first, &mut dst).unwrap();
    assert_eq!(dst.plane(0).data, first.plane(0).data);

    corrector.apply_next(&second, &mut dst).unwrap();
    let p = dst.plane(0);
    // The shifted square from the second frame.
    assert_eq!(p.data[80 * p.stride + 110], 255);
    // The uncovered left band still shows the first frame's square.
    assert_eq!(p.data[60 * p.stride + 6], 255);
}
