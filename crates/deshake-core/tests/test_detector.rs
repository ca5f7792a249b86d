mod common;

use common::{gray_frame, square_frame};
use deshake_core::detect::cells::{history_slot, FilterLayer};
use deshake_core::detect::{Detector, DetectorConfig};
use deshake_core::frame::{Frame, FrameInfo, PixelFormat};
use deshake_core::geometry::Vec2;
use deshake_core::io::binary::{Deserializer, Serializer};

const W: u32 = 192;
const H: u32 = 144;

/// A frame whose content is the pattern `f` shifted by `(dx, dy)` inside a
/// patch, black elsewhere.
fn patch_frame(dx: i32, dy: i32, patch: (i32, i32, i32)) -> Frame {
    let (px, py, ps) = patch;
    gray_frame(W, H, |x, y| {
        let x = x as i32;
        let y = y as i32;
        if x >= px + dx && x < px + dx + ps && y >= py + dy && y < py + dy + ps {
            let a = x - dx;
            let b = y - dy;
            ((a * a * 3 + b * b * 7 + a * b) % 251) as u8
        } else {
            0
        }
    })
}

#[test]
fn static_scene_measures_zero_everywhere() {
    let info = FrameInfo::new(W, H, PixelFormat::Gray8).unwrap();
    let mut detector = Detector::new(info, DetectorConfig::default()).unwrap();

    for _ in 0..4 {
        let mut frame = square_frame(W, H, 60, 60, 16);
        let motions = detector.process_frame(&mut frame).unwrap();
        for m in &motions {
            assert_eq!(m.v, Vec2::new(0, 0));
        }
    }

    let slot = history_slot(detector.frame_count());
    for cell in &detector.grid().cells {
        for dir in &cell.directions {
            assert_eq!(dir.velo[slot].meas, Vec2::new(0, 0));
        }
    }
}

#[test]
fn translation_is_recovered_on_textured_cells() {
    let info = FrameInfo::new(W, H, PixelFormat::Gray8).unwrap();
    let mut detector = Detector::new(info, DetectorConfig::default()).unwrap();

    let patch = (48, 36, 64);
    let fast = FilterLayer::Fast.index();
    for i in 0..6i32 {
        let mut frame = patch_frame(2 * i, i, patch);
        let motions = detector.process_frame(&mut frame).unwrap();

        if i >= 2 {
            // Cells whose window lies well inside the moving patch must
            // measure exactly the content shift, negated.
            let slot = history_slot(detector.frame_count());
            let (px, py, ps) = patch;
            let (lo_x, lo_y) = (px + 2 * i + 12, py + i + 12);
            let (hi_x, hi_y) = (px + 2 * i + ps - 12, py + i + ps - 12);
            let mut interior = 0;
            for cell in &detector.grid().cells {
                let c = cell.position;
                if c.x - 4 >= lo_x && c.x + 4 <= hi_x && c.y - 4 >= lo_y && c.y + 4 <= hi_y {
                    interior += 1;
                    assert_eq!(
                        cell.directions[fast].velo[slot].meas,
                        Vec2::new(-2, -1),
                        "cell at {:?}",
                        c
                    );
                }
            }
            assert!(interior > 10, "only {interior} interior cells");

            // The surviving motions agree with the shift.
            assert!(!motions.is_empty());
            let exact = motions
                .iter()
                .filter(|m| m.v == Vec2::new(-2, -1))
                .count();
            assert!(
                exact * 2 >= motions.len(),
                "{exact} of {} motions match",
                motions.len()
            );
        }
    }
}

#[test]
fn uniform_frames_serialize_empty_blocks() {
    let info = FrameInfo::new(W, H, PixelFormat::Gray8).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flat.gbl");

    let mut detector = Detector::new(info, DetectorConfig::default()).unwrap();
    detector.attach_serializer(Serializer::create(&path, info.dim()).unwrap());

    for _ in 0..3 {
        let mut frame = gray_frame(W, H, |_, _| 128);
        let motions = detector.process_frame(&mut frame).unwrap();
        assert!(motions.is_empty());
        for cell in &detector.grid().cells {
            assert_eq!(cell.qf_contrast, 0);
        }
    }
    drop(detector);

    let parsed = Deserializer::load(&path).unwrap();
    assert_eq!(parsed.frames.len(), 3);
    assert!(parsed.frames.iter().all(|f| f.is_empty()));
}

#[test]
fn config_ranges_are_enforced() {
    let info = FrameInfo::new(W, H, PixelFormat::Gray8).unwrap();
    let bad = DetectorConfig {
        shakiness: 0,
        ..Default::default()
    };
    assert!(Detector::new(info, bad).is_err());

    let bad = DetectorConfig {
        min_contrast: 1.5,
        ..Default::default()
    };
    assert!(Detector::new(info, bad).is_err());
}

#[test]
fn mismatched_frames_are_rejected() {
    let info = FrameInfo::new(W, H, PixelFormat::Gray8).unwrap();
    let mut detector = Detector::new(info, DetectorConfig::default()).unwrap();
    let other = FrameInfo::new(W, H - 4, PixelFormat::Gray8).unwrap();
    let mut frame = Frame::allocate(other).unwrap();
    assert!(detector.process_frame(&mut frame).is_err());
}

#[test]
fn too_small_frames_are_rejected() {
    let info = FrameInfo::new(64, 64, PixelFormat::Gray8).unwrap();
    assert!(Detector::new(info, DetectorConfig::default()).is_err());
}
