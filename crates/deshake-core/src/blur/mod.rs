//! Separable box blur used to smooth frames before matching.
//!
//! Both passes keep a running sum so each output pixel costs one add and
//! one subtract regardless of kernel size. Edges replicate the first/last
//! sample of the row or column.

use rayon::prelude::*;

use crate::error::Result;
use crate::frame::{Frame, FrameInfo};

/// What happens to the chroma planes of the destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlurPolicy {
    /// Blur chroma too, with kernel `size / 2 + 1` (skipped below 2).
    FullColor,
    /// Copy chroma from the source unchanged.
    KeepColor,
    /// Leave destination chroma untouched.
    NoColor,
}

/// Box blur of `src` into `dst`. The kernel is forced odd, at least 3 and at
/// most half the smaller frame dimension. Kernels below 2 are a no-op copy.
pub fn box_blur(dst: &mut Frame, src: &Frame, kernel: u32, policy: BlurPolicy) -> Result<()> {
    let info = *src.info();
    if kernel < 2 {
        dst.copy_from(src)?;
        return Ok(());
    }
    let max = (info.width.min(info.height) / 2).max(3);
    let size = (kernel | 1).clamp(3, max) as usize;

    let mut tmp = vec![0u8; src.plane(0).stride * src.plane(0).height];
    blur_plane(dst, src, &mut tmp, &info, 0, size);

    // The chroma kernel is used as-is: the passes divide by the kernel
    // size directly and don't need it odd.
    let chroma_size = size / 2 + 1;
    match policy {
        BlurPolicy::FullColor if chroma_size > 1 => {
            for plane in 1..info.format.plane_count() {
                blur_plane(dst, src, &mut tmp, &info, plane, chroma_size);
            }
        }
        BlurPolicy::FullColor | BlurPolicy::KeepColor => {
            for plane in 1..info.format.plane_count() {
                let sp = src.plane(plane);
                let dp = dst.plane_mut(plane);
                for y in 0..sp.height {
                    dp.row_mut(y)[..sp.width].copy_from_slice(&sp.row(y)[..sp.width]);
                }
            }
        }
        BlurPolicy::NoColor => {}
    }
    Ok(())
}

fn blur_plane(
    dst: &mut Frame,
    src: &Frame,
    tmp: &mut [u8],
    info: &FrameInfo,
    plane: usize,
    size: usize,
) {
    let dim = info.plane_dim(plane);
    // Packed formats are blurred byte-wise across the interleaved row.
    let (w, h) = (
        dim.x as usize * info.format.bytes_per_pixel(),
        dim.y as usize,
    );
    let sp = src.plane(plane);
    let src_stride = sp.stride;
    let tmp_stride = src_stride;
    blur_rows(tmp, &sp.data, w, h, tmp_stride, src_stride, size);
    let dp = dst.plane_mut(plane);
    let dst_stride = dp.stride;
    blur_cols(&mut dp.data, tmp, w, h, dst_stride, tmp_stride, size);
}

/// Horizontal pass: every row slides its own accumulator.
fn blur_rows(
    dst: &mut [u8],
    src: &[u8],
    width: usize,
    height: usize,
    dst_stride: usize,
    src_stride: usize,
    size: usize,
) {
    let half = size / 2;
    dst.par_chunks_mut(dst_stride)
        .take(height)
        .enumerate()
        .for_each(|(y, out)| {
            let row = &src[y * src_stride..y * src_stride + width];
            // Seed with the replicated left edge plus the right half window.
            let mut acc = row[0] as u32 * (half as u32 + 1);
            let mut end = 0usize;
            for _ in 0..half {
                acc += row[end] as u32;
                end = (end + 1).min(width - 1);
            }
            let mut start = 0usize;
            for x in 0..width {
                acc = acc + row[end] as u32 - row[start] as u32;
                if x > half {
                    start += 1;
                }
                if x < width - half - 1 {
                    end += 1;
                }
                out[x] = (acc / size as u32) as u8;
            }
        });
}

/// Vertical pass: one accumulator per column, swept row by row.
fn blur_cols(
    dst: &mut [u8],
    src: &[u8],
    width: usize,
    height: usize,
    dst_stride: usize,
    src_stride: usize,
    size: usize,
) {
    let half = size / 2;
    let row_at = |y: usize| &src[y * src_stride..y * src_stride + width];

    let mut acc = vec![0u32; width];
    let top = row_at(0);
    for x in 0..width {
        acc[x] = top[x] as u32 * (half as u32 + 1);
    }
    let mut end = 0usize;
    for _ in 0..half {
        let row = row_at(end);
        for x in 0..width {
            acc[x] += row[x] as u32;
        }
        end = (end + 1).min(height - 1);
    }

    let mut start = 0usize;
    for y in 0..height {
        let add = row_at(end);
        let sub = row_at(start);
        let out = &mut dst[y * dst_stride..y * dst_stride + width];
        for x in 0..width {
            acc[x] = acc[x] + add[x] as u32 - sub[x] as u32;
            out[x] = (acc[x] / size as u32) as u8;
        }
        if y > half {
            start += 1;
        }
        if y < height - half - 1 {
            end += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;

    fn gray(w: u32, h: u32, f: impl Fn(usize, usize) -> u8) -> Frame {
        let info = FrameInfo::new(w, h, PixelFormat::Gray8).unwrap();
        let mut frame = Frame::allocate(info).unwrap();
        let plane = frame.plane_mut(0);
        let s = plane.stride;
        for y in 0..h as usize {
            for x in 0..w as usize {
                plane.data[y * s + x] = f(x, y);
            }
        }
        frame
    }

    #[test]
    fn uniform_frame_is_unchanged() {
        let src = gray(32, 32, |_, _| 100);
        let mut dst = Frame::allocate(*src.info()).unwrap();
        box_blur(&mut dst, &src, 9, BlurPolicy::NoColor).unwrap();
        assert!(dst.plane(0).data.iter().all(|&v| v == 100));
    }

    #[test]
    fn impulse_spreads_to_kernel_width() {
        let src = gray(33, 33, |x, y| if x == 16 && y == 16 { 255 } else { 0 });
        let mut dst = Frame::allocate(*src.info()).unwrap();
        box_blur(&mut dst, &src, 5, BlurPolicy::NoColor).unwrap();
        let p = dst.plane(0);
        // The center keeps 255/25 of the energy.
        assert_eq!(p.data[16 * p.stride + 16], 255 / 25);
        // Outside the 5x5 support everything stays zero.
        assert_eq!(p.data[16 * p.stride + 20], 0);
        assert_eq!(p.data[20 * p.stride + 16], 0);
    }
}
