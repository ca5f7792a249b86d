//! Owned pixel canvases used by the detection pyramids.

use ndarray::Array2;

use super::Frame;
use crate::geometry::Vec2;

/// A matcher pixel: either plain luma or an interleaved RGB triple.
///
/// The matcher cost and the pyramid packing are the only operations the
/// detector needs, so they live on the pixel itself.
pub trait Pixel: Copy + Default + PartialEq + Send + Sync + 'static {
    /// Sum of absolute channel differences.
    fn sad(a: Self, b: Self) -> u32;

    /// Integer mean of a 2x2 block.
    fn avg4(a: Self, b: Self, c: Self, d: Self) -> Self;

    /// Scalar intensity used by the contrast selector.
    fn intensity(self) -> i32;

    /// Reads the pixel at `(x, y)` from a frame of a compatible format.
    fn read(frame: &Frame, x: usize, y: usize) -> Self;
}

/// Single 8-bit luminance sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Luma(pub u8);

impl Pixel for Luma {
    #[inline]
    fn sad(a: Self, b: Self) -> u32 {
        (a.0 as i32 - b.0 as i32).unsigned_abs()
    }

    #[inline]
    fn avg4(a: Self, b: Self, c: Self, d: Self) -> Self {
        Luma(((a.0 as u32 + b.0 as u32 + c.0 as u32 + d.0 as u32) / 4) as u8)
    }

    #[inline]
    fn intensity(self) -> i32 {
        self.0 as i32
    }

    #[inline]
    fn read(frame: &Frame, x: usize, y: usize) -> Self {
        let plane = frame.plane(0);
        Luma(plane.data[y * plane.stride + x])
    }
}

/// Interleaved RGB sample (byte order of the source format).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgb(pub [u8; 3]);

impl Pixel for Rgb {
    #[inline]
    fn sad(a: Self, b: Self) -> u32 {
        let mut acc = 0u32;
        for k in 0..3 {
            acc += (a.0[k] as i32 - b.0[k] as i32).unsigned_abs();
        }
        acc
    }

    #[inline]
    fn avg4(a: Self, b: Self, c: Self, d: Self) -> Self {
        let mut out = [0u8; 3];
        for k in 0..3 {
            out[k] =
                ((a.0[k] as u32 + b.0[k] as u32 + c.0[k] as u32 + d.0[k] as u32) / 4) as u8;
        }
        Rgb(out)
    }

    #[inline]
    fn intensity(self) -> i32 {
        self.0[0] as i32 + self.0[1] as i32 + self.0[2] as i32
    }

    #[inline]
    fn read(frame: &Frame, x: usize, y: usize) -> Self {
        let plane = frame.plane(0);
        let bpp = frame.info().format.bytes_per_pixel();
        let off = y * plane.stride + x * bpp;
        Rgb([plane.data[off], plane.data[off + 1], plane.data[off + 2]])
    }
}

/// A dense owned raster of matcher pixels.
///
/// Reads outside the canvas yield the zero pixel; the block matcher and the
/// contrast selector rely on this at frame borders.
#[derive(Clone, Debug)]
pub struct Canvas<P: Pixel> {
    data: Array2<P>,
}

impl<P: Pixel> Canvas<P> {
    pub fn new(dim: Vec2<u32>) -> Self {
        Self {
            data: Array2::from_elem((dim.y as usize, dim.x as usize), P::default()),
        }
    }

    pub fn dim(&self) -> Vec2<u32> {
        let (h, w) = self.data.dim();
        Vec2::new(w as u32, h as u32)
    }

    pub fn width(&self) -> u32 {
        self.dim().x
    }

    pub fn height(&self) -> u32 {
        self.dim().y
    }

    /// Border-safe read: coordinates outside the canvas return `P::default()`.
    #[inline]
    pub fn get(&self, p: Vec2<i32>) -> P {
        let (h, w) = self.data.dim();
        if p.x < 0 || p.y < 0 || p.x as usize >= w || p.y as usize >= h {
            P::default()
        } else {
            self.data[(p.y as usize, p.x as usize)]
        }
    }

    #[inline]
    pub fn set(&mut self, p: Vec2<i32>, v: P) {
        let (h, w) = self.data.dim();
        if p.x >= 0 && p.y >= 0 && (p.x as usize) < w && (p.y as usize) < h {
            self.data[(p.y as usize, p.x as usize)] = v;
        }
    }

    /// Contiguous pixels of one row.
    #[inline]
    pub fn row(&self, y: usize) -> &[P] {
        self.data
            .row(y)
            .to_slice()
            .expect("canvas rows are contiguous")
    }

    /// Fills the canvas from the matcher-visible content of `frame`.
    /// The frame must be at least as large as the canvas.
    pub fn fill_from_frame(&mut self, frame: &Frame) {
        let (h, w) = self.data.dim();
        for y in 0..h {
            for x in 0..w {
                self.data[(y, x)] = P::read(frame, x, y);
            }
        }
    }

    pub fn copy_from(&mut self, src: &Canvas<P>) {
        debug_assert_eq!(self.data.dim(), src.data.dim());
        self.data.assign(&src.data);
    }
}
