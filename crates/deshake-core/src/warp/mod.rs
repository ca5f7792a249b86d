//! Inverse per-plane frame warping.
//!
//! For every destination pixel the source coordinate is recovered by
//! undoing the lens distortion, applying the inverse rotation/zoom about
//! the frame center plus the translation, and re-applying the lens. The
//! source is then sampled with the configured interpolator.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{DeshakeError, Result};
use crate::frame::Frame;
use crate::geometry::Vec2;
use crate::lens::Barrel;
use crate::transform::Transform;

/// Pixel sampler used when reading the source at real-valued coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Nearest neighbour.
    Zero,
    /// Linear along x only.
    Linear,
    /// Bi-linear, with a border-safe variant near the edges.
    #[default]
    Bilinear,
    /// Catmull-Rom bi-cubic (alpha = -0.5).
    Bicubic,
}

/// Policy for destination pixels with no source coverage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropMode {
    /// Reveal the previous stabilized frame (or whatever the destination
    /// already holds).
    #[default]
    Keep,
    /// Paint uncovered pixels black.
    Black,
}

#[inline]
fn pix(img: &[u8], stride: usize, x: i32, y: i32) -> u8 {
    img[y as usize * stride + x as usize]
}

#[inline]
fn pixel_or(img: &[u8], stride: usize, w: i32, h: i32, x: i32, y: i32, def: u8) -> u8 {
    if x < 0 || y < 0 || x >= w || y >= h {
        def
    } else {
        pix(img, stride, x, y)
    }
}

fn ip_zero(img: &[u8], stride: usize, w: i32, h: i32, x: f32, y: f32, def: u8) -> u8 {
    pixel_or(
        img,
        stride,
        w,
        h,
        (x + 0.5).floor() as i32,
        (y + 0.5).floor() as i32,
        def,
    )
}

fn ip_linear(img: &[u8], stride: usize, w: i32, h: i32, x: f32, y: f32, def: u8) -> u8 {
    let x_f = x.floor() as i32;
    let x_c = x_f + 1;
    let y_n = (y + 0.5).floor() as i32;
    let v1 = pixel_or(img, stride, w, h, x_c, y_n, def) as f32;
    let v2 = pixel_or(img, stride, w, h, x_f, y_n, def) as f32;
    let s = v1 * (x - x_f as f32) + v2 * (x_c as f32 - x);
    (s + 0.5).clamp(0.0, 255.0) as u8
}

/// Bi-linear sampler that clamps every tap; used by the other samplers at
/// and beyond the border.
fn ip_bilinear_border(img: &[u8], stride: usize, w: i32, h: i32, x: f32, y: f32, def: u8) -> u8 {
    let x_f = x.floor() as i32;
    let x_c = x_f + 1;
    let y_f = y.floor() as i32;
    let y_c = y_f + 1;
    let v1 = pixel_or(img, stride, w, h, x_c, y_c, def) as f32;
    let v2 = pixel_or(img, stride, w, h, x_c, y_f, def) as f32;
    let v3 = pixel_or(img, stride, w, h, x_f, y_c, def) as f32;
    let v4 = pixel_or(img, stride, w, h, x_f, y_f, def) as f32;
    let fx = x - x_f as f32;
    let s = (v1 * fx + v3 * (1.0 - fx)) * (y - y_f as f32)
        + (v2 * fx + v4 * (1.0 - fx)) * (y_c as f32 - y);
    (s + 0.5).clamp(0.0, 255.0) as u8
}

fn ip_bilinear(img: &[u8], stride: usize, w: i32, h: i32, x: f32, y: f32, def: u8) -> u8 {
    if x < 0.0 || x > (w - 2) as f32 || y < 0.0 || y > (h - 2) as f32 {
        return ip_bilinear_border(img, stride, w, h, x, y, def);
    }
    let x_f = x.floor() as i32;
    let x_c = x_f + 1;
    let y_f = y.floor() as i32;
    let y_c = y_f + 1;
    let v1 = pix(img, stride, x_c, y_c) as f32;
    let v2 = pix(img, stride, x_c, y_f) as f32;
    let v3 = pix(img, stride, x_f, y_c) as f32;
    let v4 = pix(img, stride, x_f, y_f) as f32;
    let fx = x - x_f as f32;
    let s = (v1 * fx + v3 * (1.0 - fx)) * (y - y_f as f32)
        + (v2 * fx + v4 * (1.0 - fx)) * (y_c as f32 - y);
    (s + 0.5).clamp(0.0, 255.0) as u8
}

/// Catmull-Rom kernel for alpha = -0.5 along one axis.
#[inline]
fn bicub_kernel(t: f32, a0: f32, a1: f32, a2: f32, a3: f32) -> f32 {
    (2.0 * a1
        + t * ((-a0 + a2)
            + t * ((2.0 * a0 - 5.0 * a1 + 4.0 * a2 - a3) + t * (-a0 + 3.0 * (a1 - a2) + a3))))
        / 2.0
}

fn ip_bicubic(img: &[u8], stride: usize, w: i32, h: i32, x: f32, y: f32, def: u8) -> u8 {
    if x < 1.0 || x > (w - 3) as f32 || y < 1.0 || y > (h - 3) as f32 {
        return ip_bilinear_border(img, stride, w, h, x, y, def);
    }
    let x_f = x.floor() as i32;
    let y_f = y.floor() as i32;
    let tx = x - x_f as f32;

    let row = |dy: i32| -> f32 {
        let yy = y_f + dy;
        bicub_kernel(
            tx,
            pix(img, stride, x_f - 1, yy) as f32,
            pix(img, stride, x_f, yy) as f32,
            pix(img, stride, x_f + 1, yy) as f32,
            pix(img, stride, x_f + 2, yy) as f32,
        )
    };
    let v = bicub_kernel(y - y_f as f32, row(-1), row(0), row(1), row(2));
    (v + 0.5).clamp(0.0, 255.0) as u8
}

type InterpFn = fn(&[u8], usize, i32, i32, f32, f32, u8) -> u8;

fn sampler(ip: Interpolation) -> InterpFn {
    match ip {
        Interpolation::Zero => ip_zero,
        Interpolation::Linear => ip_linear,
        Interpolation::Bilinear => ip_bilinear,
        Interpolation::Bicubic => ip_bicubic,
    }
}

/// Warps `src` into `dst` with the inverse of `t`.
///
/// The zero transform short-circuits to a plane copy. With
/// [`CropMode::Black`] uncovered pixels become black (`0` luma, `0x80`
/// chroma); with [`CropMode::Keep`] they keep whatever `dst` already holds.
pub fn warp_frame(
    dst: &mut Frame,
    src: &Frame,
    t: &Transform,
    lens: &Barrel,
    interpolation: Interpolation,
    crop: CropMode,
) -> Result<()> {
    if src.info() != dst.info() {
        return Err(DeshakeError::IncompatibleGeometry(format!(
            "warp source {:?} vs destination {:?}",
            src.info(),
            dst.info()
        )));
    }
    if t.is_identity() {
        if !dst.same_storage(src) {
            dst.copy_from(src)?;
        }
        return Ok(());
    }

    let info = *src.info();
    let interp = sampler(interpolation);

    for plane in 0..info.format.plane_count() {
        let (sub_w, sub_h) = info.format.sub_shift(plane);
        let dim = info.plane_dim(plane);
        let (w, h) = (dim.x as i32, dim.y as i32);
        let ratio = (1u32 << sub_w) as f32;

        let black: u8 = if plane == 0 || plane == 3 { 0 } else { 0x80 };
        let center_src = Vec2::new(w as f32 / 2.0, h as f32 / 2.0);
        let center_dst = center_src;

        // Inverse rotation and zoom, baked into two basis vectors.
        let z = 1.0 - (t.zoom / 100.0) as f32;
        let alpha = -t.alpha as f32;
        let rot_a = Vec2::new(alpha.cos() * z, -alpha.sin() * z);
        let rot_b = Vec2::new(-rot_a.y, rot_a.x);
        let tr = Vec2::new(
            t.x as f32 / (1 << sub_w) as f32,
            t.y as f32 / (1 << sub_h) as f32,
        );
        let center_tr = center_src - tr;
        // Linear row-time skew: the rolling-shutter coefficient shifts each
        // row horizontally in proportion to its distance from the center.
        let rshutter = t.rshutter as f32 / (1 << sub_h) as f32;

        let sp = src.plane(plane);
        let src_stride = sp.stride;
        let src_data = &sp.data;
        let dp = dst.plane_mut(plane);
        let dst_stride = dp.stride;

        dp.data
            .par_chunks_mut(dst_stride)
            .take(h as usize)
            .enumerate()
            .for_each(|(y, out)| {
                let skew = rshutter * (y as f32 - center_dst.y);
                for x in 0..w {
                    let lin = lens.from(Vec2::new(x as f32, y as f32), ratio);
                    let delta = lin - center_dst;
                    let stabilized = Vec2::new(
                        rot_a.x * delta.x + rot_b.x * delta.y + center_tr.x - skew,
                        rot_a.y * delta.x + rot_b.y * delta.y + center_tr.y,
                    );
                    let lensed = lens.to(stabilized, ratio);
                    let def = if crop == CropMode::Black {
                        black
                    } else {
                        out[x as usize]
                    };
                    out[x as usize] =
                        interp(src_data, src_stride, w, h, lensed.x, lensed.y, def);
                }
            });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameInfo, PixelFormat};

    #[test]
    fn bicubic_kernel_interpolates_endpoints() {
        assert_eq!(bicub_kernel(0.0, 10.0, 20.0, 30.0, 40.0), 20.0);
        assert_eq!(bicub_kernel(1.0, 10.0, 20.0, 30.0, 40.0), 30.0);
    }

    #[test]
    fn identity_is_bytewise_copy() {
        let info = FrameInfo::new(32, 24, PixelFormat::Gray8).unwrap();
        let mut src = Frame::allocate(info).unwrap();
        for (i, v) in src.plane_mut(0).data.iter_mut().enumerate() {
            *v = (i % 251) as u8;
        }
        let mut dst = Frame::allocate(info).unwrap();
        warp_frame(
            &mut dst,
            &src,
            &Transform::default(),
            &Barrel::identity(32, 24),
            Interpolation::Bicubic,
            CropMode::Black,
        )
        .unwrap();
        assert_eq!(dst.plane(0).data, src.plane(0).data);
    }
}
