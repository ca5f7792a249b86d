#![allow(dead_code)]

use deshake_core::frame::{Frame, FrameInfo, PixelFormat};

/// Gray frame with per-pixel values from `f`.
pub fn gray_frame(w: u32, h: u32, f: impl Fn(usize, usize) -> u8) -> Frame {
    let info = FrameInfo::new(w, h, PixelFormat::Gray8).unwrap();
    let mut frame = Frame::allocate(info).unwrap();
    let plane = frame.plane_mut(0);
    let stride = plane.stride;
    for y in 0..h as usize {
        for x in 0..w as usize {
            plane.data[y * stride + x] = f(x, y);
        }
    }
    frame
}

/// Black frame with a white square of side `size` whose top-left corner is
/// at `(sx, sy)`.
pub fn square_frame(w: u32, h: u32, sx: usize, sy: usize, size: usize) -> Frame {
    gray_frame(w, h, |x, y| {
        if x >= sx && x < sx + size && y >= sy && y < sy + size {
            255
        } else {
            0
        }
    })
}

/// Top-left corner of the brightest connected region (first pixel above
/// the threshold in row-major order, refined to the region's minima).
pub fn find_bright_region(frame: &Frame, threshold: u8) -> Option<(usize, usize)> {
    let plane = frame.plane(0);
    let mut min_x = usize::MAX;
    let mut min_y = usize::MAX;
    for y in 0..plane.height {
        for x in 0..plane.width {
            if plane.data[y * plane.stride + x] >= threshold {
                min_x = min_x.min(x);
                min_y = min_y.min(y);
            }
        }
    }
    if min_x == usize::MAX {
        None
    } else {
        Some((min_x, min_y))
    }
}
