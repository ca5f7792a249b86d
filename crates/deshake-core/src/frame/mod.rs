//! Planar frame storage and pixel format descriptions.

pub mod canvas;
pub mod pyramid;

pub use canvas::{Canvas, Luma, Pixel, Rgb};
pub use pyramid::Pyramid;

use serde::{Deserialize, Serialize};

use crate::error::{DeshakeError, Result};
use crate::geometry::Vec2;

/// Supported pixel layouts.
///
/// Planar YUV formats carry one byte per sample and chroma planes
/// sub-sampled by the power-of-two shifts reported by [`PixelFormat::sub_shift`].
/// Packed RGB formats carry a single interleaved plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Gray8,
    Yuv410p,
    Yuv411p,
    Yuv420p,
    Yuv422p,
    Yuv440p,
    Yuv444p,
    Yuva420p,
    Rgb24,
    Bgr24,
    Rgba32,
}

impl PixelFormat {
    pub fn plane_count(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Yuva420p => 4,
            PixelFormat::Rgb24 | PixelFormat::Bgr24 | PixelFormat::Rgba32 => 1,
            _ => 3,
        }
    }

    pub fn is_packed_rgb(self) -> bool {
        matches!(
            self,
            PixelFormat::Rgb24 | PixelFormat::Bgr24 | PixelFormat::Rgba32
        )
    }

    /// Bytes per sample in a plane (3 or 4 for interleaved RGB).
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => 3,
            PixelFormat::Rgba32 => 4,
            _ => 1,
        }
    }

    /// `(horizontal, vertical)` chroma sub-sampling shifts for a plane.
    pub fn sub_shift(self, plane: usize) -> (u8, u8) {
        if plane == 0 || self.is_packed_rgb() {
            return (0, 0);
        }
        // The alpha plane of YUVA matches the luma plane.
        if self == PixelFormat::Yuva420p && plane == 3 {
            return (0, 0);
        }
        match self {
            PixelFormat::Yuv410p => (2, 2),
            PixelFormat::Yuv411p => (2, 0),
            PixelFormat::Yuv420p | PixelFormat::Yuva420p => (1, 1),
            PixelFormat::Yuv422p => (1, 0),
            PixelFormat::Yuv440p => (0, 1),
            _ => (0, 0),
        }
    }
}

/// Geometry and layout of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl FrameInfo {
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(DeshakeError::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            format,
        })
    }

    pub fn dim(&self) -> Vec2<u32> {
        Vec2::new(self.width, self.height)
    }

    /// Width and height of the given plane in samples.
    pub fn plane_dim(&self, plane: usize) -> Vec2<u32> {
        let (sw, sh) = self.format.sub_shift(plane);
        Vec2::new(self.width >> sw, self.height >> sh)
    }

    /// Minimal row stride of the given plane in bytes.
    pub fn min_stride(&self, plane: usize) -> usize {
        self.plane_dim(plane).x as usize * self.format.bytes_per_pixel()
    }
}

/// One image plane: a byte buffer with an explicit row stride.
#[derive(Clone, Debug)]
pub struct Plane {
    pub data: Vec<u8>,
    pub stride: usize,
    pub width: usize,
    pub height: usize,
}

impl Plane {
    fn allocate(width: usize, height: usize, stride: usize) -> Result<Self> {
        let bytes = stride
            .checked_mul(height)
            .ok_or(DeshakeError::AllocationFailed { bytes: usize::MAX })?;
        let mut data = Vec::new();
        data.try_reserve_exact(bytes)
            .map_err(|_| DeshakeError::AllocationFailed { bytes })?;
        data.resize(bytes, 0);
        Ok(Self {
            data,
            stride,
            width,
            height,
        })
    }

    pub fn row(&self, y: usize) -> &[u8] {
        &self.data[y * self.stride..y * self.stride + self.stride]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let s = self.stride;
        &mut self.data[y * s..y * s + s]
    }
}

/// A planar frame owning 1-4 planes.
#[derive(Clone, Debug)]
pub struct Frame {
    info: FrameInfo,
    planes: Vec<Plane>,
}

impl Frame {
    /// Allocates a zeroed frame with minimal strides.
    pub fn allocate(info: FrameInfo) -> Result<Self> {
        let mut planes = Vec::with_capacity(info.format.plane_count());
        for p in 0..info.format.plane_count() {
            let dim = info.plane_dim(p);
            let stride = info.min_stride(p);
            planes.push(Plane::allocate(dim.x as usize, dim.y as usize, stride)?);
        }
        Ok(Self { info, planes })
    }

    /// Wraps caller-provided plane buffers. Strides must cover the plane
    /// widths.
    pub fn from_planes(info: FrameInfo, planes: Vec<Plane>) -> Result<Self> {
        if planes.len() != info.format.plane_count() {
            return Err(DeshakeError::UnsupportedPixelFormat(format!(
                "{:?} expects {} planes, got {}",
                info.format,
                info.format.plane_count(),
                planes.len()
            )));
        }
        for (i, plane) in planes.iter().enumerate() {
            if plane.stride < info.min_stride(i) {
                return Err(DeshakeError::IncompatibleGeometry(format!(
                    "plane {i} stride {} below minimum {}",
                    plane.stride,
                    info.min_stride(i)
                )));
            }
        }
        Ok(Self { info, planes })
    }

    pub fn info(&self) -> &FrameInfo {
        &self.info
    }

    pub fn plane(&self, idx: usize) -> &Plane {
        &self.planes[idx]
    }

    pub fn plane_mut(&mut self, idx: usize) -> &mut Plane {
        &mut self.planes[idx]
    }

    /// Identity of the backing storage, used to detect aliased in-place
    /// operations.
    pub fn same_storage(&self, other: &Frame) -> bool {
        self.planes[0].data.as_ptr() == other.planes[0].data.as_ptr()
    }

    /// Copies pixel data from a frame with identical layout.
    pub fn copy_from(&mut self, src: &Frame) -> Result<()> {
        if self.info != src.info {
            return Err(DeshakeError::IncompatibleGeometry(format!(
                "cannot copy {:?} into {:?}",
                src.info, self.info
            )));
        }
        for (dst, src) in self.planes.iter_mut().zip(&src.planes) {
            let row_bytes = dst.width * self.info.format.bytes_per_pixel();
            for y in 0..dst.height {
                dst.row_mut(y)[..row_bytes].copy_from_slice(&src.row(y)[..row_bytes]);
            }
        }
        Ok(())
    }

    /// Fills luma with `luma` and chroma planes with `chroma`.
    pub fn fill(&mut self, luma: u8, chroma: u8) {
        for (i, plane) in self.planes.iter_mut().enumerate() {
            let v = if i == 0 || i == 3 { luma } else { chroma };
            plane.data.fill(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_dims_follow_subsampling() {
        let info = FrameInfo::new(64, 48, PixelFormat::Yuv420p).unwrap();
        assert_eq!(info.plane_dim(0), Vec2::new(64, 48));
        assert_eq!(info.plane_dim(1), Vec2::new(32, 24));
        assert_eq!(info.plane_dim(2), Vec2::new(32, 24));
    }

    #[test]
    fn zero_dimensions_rejected() {
        assert!(FrameInfo::new(0, 48, PixelFormat::Gray8).is_err());
        assert!(FrameInfo::new(64, 0, PixelFormat::Gray8).is_err());
    }

    #[test]
    fn packed_is_single_plane() {
        let info = FrameInfo::new(16, 16, PixelFormat::Rgb24).unwrap();
        let frame = Frame::allocate(info).unwrap();
        assert_eq!(frame.planes.len(), 1);
        assert_eq!(frame.plane(0).stride, 48);
    }

    #[test]
    fn copy_requires_same_info() {
        let a = Frame::allocate(FrameInfo::new(16, 16, PixelFormat::Gray8).unwrap()).unwrap();
        let mut b =
            Frame::allocate(FrameInfo::new(16, 8, PixelFormat::Gray8).unwrap()).unwrap();
        assert!(b.copy_from(&a).is_err());
    }
}
