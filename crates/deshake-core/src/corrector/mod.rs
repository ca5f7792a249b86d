//! Pass two: from serialized cell motions to stabilized frames.
//!
//! The corrector turns the per-frame cell records into raw frame
//! transforms (de-linearized through the lens model), smooths the camera
//! path, clamps and zooms the corrections, and warps each incoming frame.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DeshakeError, Result};
use crate::frame::{Frame, FrameInfo};
use crate::geometry::Vec2;
use crate::io::binary::{CellRecord, MotionFile};
use crate::lens::Barrel;
use crate::transform::smooth::{self, CamPath, OptZoom};
use crate::transform::Transform;
use crate::warp::{warp_frame, CropMode, Interpolation};

/// Corrector options.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectorConfig {
    /// Half-window length of the path smoother.
    pub smoothing: u32,
    /// Translation clamp in pixels; -1 is unlimited.
    pub max_shift: i32,
    /// Rotation clamp in radians; -1 is unlimited.
    pub max_angle: f64,
    /// Border policy of the warp.
    pub crop: CropMode,
    /// Additional zoom percentage.
    pub zoom: f64,
    /// Optimal zoom policy.
    pub opt_zoom: OptZoom,
    /// Zoom change per frame for the adaptive policy.
    pub zoom_speed: f64,
    /// Source sampler.
    pub interpol: Interpolation,
    /// Path smoother flavour.
    pub cam_path: CamPath,
    /// Treat the input transforms as frame-to-frame motions.
    pub relative: bool,
    /// Invert the corrections (for externally estimated paths).
    pub invert: bool,
    /// Barrel distortion coefficients of the recording lens.
    pub lens_k: [f32; 3],
}

impl Default for CorrectorConfig {
    fn default() -> Self {
        Self {
            smoothing: 15,
            max_shift: -1,
            max_angle: -1.0,
            crop: CropMode::Keep,
            zoom: 0.0,
            opt_zoom: OptZoom::Static,
            zoom_speed: 0.25,
            interpol: Interpolation::Bilinear,
            cam_path: CamPath::Gaussian,
            relative: true,
            invert: false,
            lens_k: [0.0; 3],
        }
    }
}

impl CorrectorConfig {
    pub fn validate(&self, info: &FrameInfo) -> Result<Self> {
        let mut conf = *self;
        if conf.max_shift > info.width as i32 / 2 {
            conf.max_shift = info.width as i32 / 2;
        }
        if conf.max_shift > info.height as i32 / 2 {
            conf.max_shift = info.height as i32 / 2;
        }
        if conf.zoom_speed < 0.0 {
            return Err(DeshakeError::ConfigInvalid(format!(
                "zoomspeed {} must not be negative",
                conf.zoom_speed
            )));
        }
        Ok(conf)
    }
}

/// Applies smoothed corrections to a frame stream.
pub struct Corrector {
    info: FrameInfo,
    conf: CorrectorConfig,
    lens: Barrel,
    transforms: Vec<Transform>,
    next: usize,
    /// Last stabilized frame, kept while `crop` is [`CropMode::Keep`].
    border_buf: Option<Frame>,
}

impl Corrector {
    /// Builds the corrector from a deserialized transforms file.
    pub fn from_motion_file(
        file: &MotionFile,
        info: FrameInfo,
        conf: CorrectorConfig,
    ) -> Result<Self> {
        if file.dim != info.dim() {
            return Err(DeshakeError::IncompatibleGeometry(format!(
                "transforms were detected on {}x{}, frames are {}x{}",
                file.dim.x, file.dim.y, info.width, info.height
            )));
        }
        let lens = Barrel::new(conf.lens_k, info.width, info.height);
        let raw: Vec<Transform> = file
            .frames
            .iter()
            .map(|cells| frame_transform(cells, &lens))
            .collect();
        Self::from_transforms(raw, info, conf)
    }

    /// Builds the corrector from per-frame raw transforms.
    pub fn from_transforms(
        mut transforms: Vec<Transform>,
        info: FrameInfo,
        conf: CorrectorConfig,
    ) -> Result<Self> {
        let conf = conf.validate(&info)?;
        info!(
            frames = transforms.len(),
            smoothing = conf.smoothing,
            "preparing camera path"
        );

        smooth::camera_path(
            &mut transforms,
            conf.cam_path,
            conf.smoothing as usize,
            conf.relative,
        );
        if conf.invert {
            smooth::invert(&mut transforms);
        }
        smooth::clamp_limits(&mut transforms, conf.max_shift, conf.max_angle);
        smooth::apply_zoom(
            &mut transforms,
            conf.opt_zoom,
            conf.zoom,
            conf.zoom_speed,
            info.width,
            info.height,
        );

        Ok(Self {
            info,
            conf,
            lens: Barrel::new(conf.lens_k, info.width, info.height),
            transforms,
            next: 0,
            border_buf: None,
        })
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    /// Warps the next frame of the stream into `dst`.
    ///
    /// Frames beyond the transforms list pass through unchanged. In
    /// keep-border mode missing pixels reveal the previous stabilized
    /// frame, held in a buffer allocated on first use.
    pub fn apply_next(&mut self, src: &Frame, dst: &mut Frame) -> Result<()> {
        if *src.info() != self.info || *dst.info() != self.info {
            return Err(DeshakeError::IncompatibleGeometry(
                "corrector frames must match the detected geometry".into(),
            ));
        }
        let t = match self.transforms.get(self.next) {
            Some(t) => *t,
            None => {
                debug!(frame = self.next, "past end of transforms, copying");
                dst.copy_from(src)?;
                self.next += 1;
                return Ok(());
            }
        };
        self.next += 1;

        match self.conf.crop {
            CropMode::Black => {
                warp_frame(dst, src, &t, &self.lens, self.conf.interpol, CropMode::Black)?
            }
            CropMode::Keep => {
                if self.border_buf.is_none() {
                    let mut buf = Frame::allocate(self.info)?;
                    buf.copy_from(src)?;
                    self.border_buf = Some(buf);
                }
                let buf = self.border_buf.as_mut().expect("allocated above");
                warp_frame(buf, src, &t, &self.lens, self.conf.interpol, CropMode::Keep)?;
                dst.copy_from(buf)?;
            }
        }
        Ok(())
    }
}

/// Reduces one frame's cell records to a raw frame transform.
///
/// Valid FAST-layer cells vote with their fused vectors, de-linearized
/// through the lens; the rotation comes from the polar angle change of each
/// cell about the mean cell position. A frame without valid FAST cells
/// yields the identity, tagged in `extra`.
fn frame_transform(cells: &[CellRecord], lens: &Barrel) -> Transform {
    let fast = 0usize;
    let mut offset = Vec2::new(0.0f64, 0.0);
    let mut center = Vec2::new(0.0f64, 0.0);
    let mut count = 0usize;

    for cell in cells {
        let dir = &cell.directions[fast];
        if !dir.is_valid() {
            continue;
        }
        let pos = Vec2::new(cell.position.x as f32, cell.position.y as f32);
        let moved = Vec2::new(
            pos.x + dir.value.val.x as f32,
            pos.y + dir.value.val.y as f32,
        );
        let lin_pos = lens.from(pos, 1.0);
        let lin_moved = lens.from(moved, 1.0);
        offset += Vec2::new(
            (lin_moved.x - lin_pos.x) as f64,
            (lin_moved.y - lin_pos.y) as f64,
        );
        center += Vec2::new(lin_pos.x as f64, lin_pos.y as f64);
        count += 1;
    }
    if count == 0 {
        return Transform {
            extra: 1,
            ..Default::default()
        };
    }
    let offset = offset / count as f64;
    let center = center / count as f64;

    let mut angle_sum = 0.0f64;
    let mut angle_count = 0usize;
    for cell in cells {
        let dir = &cell.directions[fast];
        if !dir.is_valid() {
            continue;
        }
        let pos = Vec2::new(cell.position.x as f32, cell.position.y as f32);
        let moved = Vec2::new(
            pos.x + dir.value.val.x as f32,
            pos.y + dir.value.val.y as f32,
        );
        let before = lens.from(pos, 1.0);
        let after = lens.from(moved, 1.0);
        let b = Vec2::new(before.x as f64 - center.x, before.y as f64 - center.y);
        let a = Vec2::new(
            after.x as f64 - center.x - offset.x,
            after.y as f64 - center.y - offset.y,
        );
        // Cells close to the rotation center carry no usable angle.
        if b.qsize().sqrt() < 32.0 {
            continue;
        }
        angle_sum += a.y.atan2(a.x) - b.y.atan2(b.x);
        angle_count += 1;
    }
    let alpha = if angle_count > 2 {
        angle_sum / angle_count as f64
    } else {
        0.0
    };

    Transform::new(offset.x, offset.y, alpha, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::cells::LAYER_COUNT;
    use crate::frame::PixelFormat;
    use crate::io::binary::DirRecord;
    use approx::assert_abs_diff_eq;

    fn cell(x: u32, y: u32, vx: i32, vy: i32, valid: bool) -> CellRecord {
        let mut c = CellRecord {
            position: Vec2::new(x, y),
            directions: [DirRecord::default(); LAYER_COUNT],
        };
        c.directions[0].value.val = Vec2::new(vx, vy);
        c.directions[0].flags = if valid { 0 } else { 1 };
        c
    }

    #[test]
    fn translation_from_valid_cells() {
        let lens = Barrel::identity(320, 240);
        let cells: Vec<_> = (0..8)
            .map(|i| cell(40 + i * 32, 120, -2, -1, true))
            .collect();
        let t = frame_transform(&cells, &lens);
        assert_abs_diff_eq!(t.x, -2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(t.y, -1.0, epsilon = 1e-6);
        assert_eq!(t.extra, 0);
    }

    #[test]
    fn invalid_cells_are_ignored() {
        let lens = Barrel::identity(320, 240);
        let mut cells: Vec<_> = (0..8)
            .map(|i| cell(40 + i * 32, 120, -2, -1, true))
            .collect();
        cells.push(cell(160, 60, 50, 50, false));
        let t = frame_transform(&cells, &lens);
        assert_abs_diff_eq!(t.x, -2.0, epsilon = 1e-6);
    }

    #[test]
    fn empty_frame_is_identity() {
        let lens = Barrel::identity(320, 240);
        let t = frame_transform(&[], &lens);
        assert!(t.is_identity());
        assert_eq!(t.extra, 1);
    }

    #[test]
    fn geometry_mismatch_rejected() {
        let file = MotionFile {
            dim: Vec2::new(640, 480),
            frames: vec![],
        };
        let info = FrameInfo::new(320, 240, PixelFormat::Gray8).unwrap();
        assert!(Corrector::from_motion_file(&file, info, CorrectorConfig::default()).is_err());
    }
}
