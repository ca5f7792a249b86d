//! Legacy measurement-field detector.
//!
//! The alternative front-end over the same SAD matcher: a fixed grid of
//! measurement fields is filtered by Michelson contrast, searched coarsely
//! with a strided spiral, then refined by step halving. A second pass with
//! small fields is seeded with the transform recovered from the coarse
//! pass. Produces [`LocalMotion`] lists for the text transforms format.

use rayon::prelude::*;
use tracing::{debug, warn};

use super::DetectorConfig;
use crate::blur::{box_blur, BlurPolicy};
use crate::error::{DeshakeError, Result};
use crate::frame::{Frame, FrameInfo, Plane};
use crate::geometry::{StepSpiral, Vec2};
use crate::motion::{cleanmean_match, motions_to_transform, Field, LocalMotion};
use crate::transform::{PreparedTransform, Transform};

/// Geometry of one measurement pass.
#[derive(Clone, Debug)]
pub struct FieldLayout {
    pub field_size: u32,
    pub max_shift: i32,
    pub step_size: u32,
    pub rows: usize,
    pub cols: usize,
    pub fields: Vec<Field>,
    pub max_fields: usize,
    pub contrast_threshold: f64,
}

impl FieldLayout {
    fn new(
        info: &FrameInfo,
        size: u32,
        max_shift: i32,
        step_size: u32,
        keep_border: bool,
        spacing: u32,
        contrast_threshold: f64,
        accuracy: u32,
    ) -> Self {
        let w = info.width as i32;
        let h = info.height as i32;
        let pitch = (size + spacing) as i32;
        let rows = ((h - 2 * max_shift) / pitch - 1).max(3) as usize;
        let cols = ((w - 2 * max_shift) / pitch - 1).max(3) as usize;

        // Field centers stay this far away from the image boundary.
        let border = if keep_border {
            size as i32 / 2 + max_shift + step_size as i32
        } else {
            step_size as i32
        };
        let step_x = (w - 2 * border) / (cols as i32 - 1).max(1);
        let step_y = (h - 2 * border) / (rows as i32 - 1).max(1);

        let mut fields = Vec::with_capacity(rows * cols);
        for j in 0..rows as i32 {
            for i in 0..cols as i32 {
                fields.push(Field {
                    pos: Vec2::new(border + i * step_x, border + j * step_y),
                    size,
                });
            }
        }
        let max_fields = (accuracy as usize * fields.len()) / 15;
        Self {
            field_size: size,
            max_shift,
            step_size,
            rows,
            cols,
            fields,
            max_fields,
            contrast_threshold,
        }
    }
}

/// Michelson contrast `(max - min) / (max + min)` of the field window.
fn field_contrast(plane: &Plane, bpp: usize, field: &Field) -> f64 {
    let s2 = field.size as i32 / 2;
    let mut acc = 0.0;
    for ch in 0..bpp {
        let mut min = u8::MAX;
        let mut max = u8::MIN;
        for y in field.pos.y - s2..field.pos.y + s2 {
            for x in field.pos.x - s2..field.pos.x + s2 {
                let xc = (x.max(0) as usize).min(plane.width - 1);
                let yc = (y.max(0) as usize).min(plane.height - 1);
                let v = plane.data[yc * plane.stride + xc * bpp + ch];
                min = min.min(v);
                max = max.max(v);
            }
        }
        if max as u32 + min as u32 > 0 {
            acc += (max - min) as f64 / (max as u32 + min as u32) as f64;
        }
    }
    acc / bpp as f64
}

/// SAD of the field window against the reference shifted by `offset`,
/// aborting once `threshold` is exceeded.
fn field_sad(
    curr: &Plane,
    prev: &Plane,
    bpp: usize,
    field: &Field,
    offset: Vec2<i32>,
    threshold: u32,
) -> u32 {
    let s2 = field.size as i32 / 2;
    let row_px = field.size as usize * bpp;
    let mut acc = 0u32;
    for y in 0..field.size as i32 {
        let cy = ((field.pos.y - s2 + y).max(0) as usize).min(curr.height - 1);
        let py = ((field.pos.y - s2 + y + offset.y).max(0) as usize).min(prev.height - 1);
        let cx = ((field.pos.x - s2).max(0) as usize).min(curr.width - 1);
        let px = ((field.pos.x - s2 + offset.x).max(0) as usize).min(prev.width - 1);
        let c_row = &curr.data[cy * curr.stride + cx * bpp..];
        let p_row = &prev.data[py * prev.stride + px * bpp..];
        let n = row_px.min(c_row.len()).min(p_row.len());
        for i in 0..n {
            acc += (c_row[i] as i32 - p_row[i] as i32).unsigned_abs();
        }
        if acc > threshold {
            break;
        }
    }
    acc
}

struct ContrastIdx {
    contrast: f64,
    index: usize,
}

/// Picks the best `max_fields` fields by contrast, quota'd per horizontal
/// segment so measurements spread over the whole frame, then topped up
/// globally from the leftovers.
fn select_fields(plane: &Plane, bpp: usize, layout: &FieldLayout) -> Vec<ContrastIdx> {
    let ci: Vec<ContrastIdx> = layout
        .fields
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let c = field_contrast(plane, bpp, field);
            ContrastIdx {
                contrast: if c < layout.contrast_threshold { 0.0 } else { c },
                index,
            }
        })
        .collect();

    let mut remaining: Vec<(f64, usize)> = ci.iter().map(|c| (c.contrast, c.index)).collect();
    let mut good = Vec::new();

    let segments = layout.rows + 1;
    let seg_len = ci.len() / segments + 1;
    let quota = layout.max_fields / segments;
    for seg in 0..segments {
        let start = seg * seg_len;
        let end = ((seg + 1) * seg_len).min(ci.len());
        if start >= end {
            continue;
        }
        remaining[start..end].sort_by(|a, b| b.0.total_cmp(&a.0));
        for slot in remaining[start..end].iter_mut().take(quota) {
            if slot.0 > 0.0 {
                good.push(ContrastIdx {
                    contrast: slot.0,
                    index: slot.1,
                });
                slot.0 = 0.0;
            }
        }
    }

    let missing = layout.max_fields.saturating_sub(good.len());
    if missing > 0 {
        remaining.sort_by(|a, b| b.0.total_cmp(&a.0));
        for &(contrast, index) in remaining.iter().take(missing) {
            if contrast > 0.0 {
                good.push(ContrastIdx { contrast, index });
            }
        }
    }
    good
}

/// Coarse spiral search plus step-halving refinement for one field.
fn field_trans(
    curr: &Plane,
    prev: &Plane,
    bpp: usize,
    info: &FrameInfo,
    layout: &FieldLayout,
    field: &Field,
    offset_pt: Option<&PreparedTransform>,
) -> LocalMotion {
    let max_shift = layout.max_shift;
    let mut step = layout.step_size as i32;

    let offset = match offset_pt {
        Some(pt) => {
            let pos = field.pos.to_f64();
            let moved = pt.apply(pos);
            let offset = (moved - pos).round_i32();
            // The seeded window has to fit with the search margin.
            let s2 = field.size as i32 / 2;
            let margin = s2 + max_shift + step;
            let p = field.pos + offset;
            if p.x - margin < 0
                || p.x + margin >= info.width as i32
                || p.y - margin < 0
                || p.y + margin >= info.height as i32
            {
                return LocalMotion::rejected();
            }
            offset
        }
        None => Vec2::splat(0),
    };

    let mut best = Vec2::splat(0);
    let mut min = u32::MAX;
    for probe in StepSpiral::new(max_shift, step as u32) {
        let cost = field_sad(curr, prev, bpp, field, probe + offset, min);
        if cost < min {
            min = cost;
            best = probe;
        }
    }

    while step > 1 {
        let center = best;
        let new_step = step / 2;
        let r = step - new_step;
        let mut y = center.y - r;
        while y <= center.y + r {
            let mut x = center.x - r;
            while x <= center.x + r {
                if x != center.x || y != center.y {
                    let probe = Vec2::new(x, y);
                    let cost = field_sad(curr, prev, bpp, field, probe + offset, min);
                    if cost < min {
                        min = cost;
                        best = probe;
                    }
                }
                x += new_step;
            }
            y += new_step;
        }
        step = new_step;
    }

    // A best match at the rim of the search area is not trustworthy.
    if best.x.abs() >= max_shift + layout.step_size as i32 - 1
        || best.y.abs() >= max_shift + layout.step_size as i32 - 1
    {
        return LocalMotion::rejected();
    }

    LocalMotion {
        v: best + offset,
        f: *field,
        contrast: 0.0,
        match_quality: min as f64 / (field.size * field.size) as f64,
    }
}

/// Shakiness/accuracy driven two-pass detector over measurement fields.
pub struct FieldDetector {
    info: FrameInfo,
    conf: DetectorConfig,
    coarse: FieldLayout,
    fine: FieldLayout,
    curr: Frame,
    prev: Frame,
    frame_num: u64,
    first_frame: bool,
}

impl FieldDetector {
    pub fn new(info: FrameInfo, mut conf: DetectorConfig) -> Result<Self> {
        conf.validate()?;
        let min_dim = info.width.min(info.height);
        if min_dim < 64 {
            return Err(DeshakeError::ConfigInvalid(format!(
                "frame {}x{} too small for field detection",
                info.width, info.height
            )));
        }
        let max_shift = (min_dim as i32 / 7).max(16);
        let field_size = (min_dim / 10).max(16);
        let field_size_fine = (min_dim / 60).max(6);

        let coarse = FieldLayout::new(
            &info,
            field_size,
            max_shift,
            conf.step_size,
            true,
            0,
            conf.min_contrast,
            conf.accuracy,
        );
        let fine = FieldLayout::new(
            &info,
            field_size_fine,
            field_size_fine as i32,
            2,
            true,
            field_size_fine,
            conf.min_contrast / 2.0,
            conf.accuracy,
        );
        debug!(
            coarse_fields = coarse.fields.len(),
            fine_fields = fine.fields.len(),
            max_shift,
            "field detector ready"
        );
        Ok(Self {
            info,
            conf,
            coarse,
            fine,
            curr: Frame::allocate(info)?,
            prev: Frame::allocate(info)?,
            frame_num: 0,
            first_frame: true,
        })
    }

    pub fn info(&self) -> &FrameInfo {
        &self.info
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_num
    }

    /// Registers the frame against the previous one (or the tripod
    /// reference) and returns the surviving local motions.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<Vec<LocalMotion>> {
        if *frame.info() != self.info {
            return Err(DeshakeError::IncompatibleGeometry(format!(
                "detector built for {:?}, frame is {:?}",
                self.info,
                frame.info()
            )));
        }
        if self.info.format.is_packed_rgb() {
            self.curr.copy_from(frame)?;
        } else {
            box_blur(&mut self.curr, frame, self.conf.step_size, BlurPolicy::NoColor)?;
        }

        let motions = if self.first_frame {
            self.first_frame = false;
            Vec::new()
        } else {
            self.detect()
        };

        // Tripod mode keeps the reference frame fixed once reached.
        let tripod = self.conf.virtual_tripod;
        if tripod == 0 || self.frame_num < tripod {
            self.prev.copy_from(&self.curr)?;
        }
        self.frame_num += 1;
        Ok(motions)
    }

    fn detect(&mut self) -> Vec<LocalMotion> {
        let coarse = self.calc_trans_fields(&self.coarse, None);
        if coarse.is_empty() {
            warn!(
                frame = self.frame_num,
                "too low contrast, no translations detected"
            );
            return coarse;
        }

        let seed = motions_to_transform(&self.info, &coarse, self.coarse.max_shift as f64);
        let pt = PreparedTransform::new(&seed, self.info.width, self.info.height);
        let fine = self.calc_trans_fields(&self.fine, Some(&pt));

        // Fine measurements matching worse than the coarse average are noise.
        let mean_match = cleanmean_match(&coarse);
        let mut out = coarse;
        out.extend(
            fine.into_iter()
                .filter(|m| m.match_quality <= mean_match),
        );
        out
    }

    /// Seed transform of the most recent coarse pass, for callers that want
    /// a per-frame transform without post-processing the motion list.
    pub fn frame_transform(&self, motions: &[LocalMotion]) -> Transform {
        motions_to_transform(&self.info, motions, self.coarse.max_shift as f64)
    }

    fn calc_trans_fields(
        &self,
        layout: &FieldLayout,
        offset: Option<&PreparedTransform>,
    ) -> Vec<LocalMotion> {
        let bpp = self.info.format.bytes_per_pixel();
        let curr = self.curr.plane(0);
        let prev = self.prev.plane(0);

        let good = select_fields(curr, bpp, layout);
        let mut motions: Vec<LocalMotion> = good
            .par_iter()
            .filter_map(|ci| {
                let mut m = field_trans(
                    curr,
                    prev,
                    bpp,
                    &self.info,
                    layout,
                    &layout.fields[ci.index],
                    offset,
                );
                if m.match_quality < 0.0 {
                    None
                } else {
                    m.contrast = ci.contrast;
                    Some(m)
                }
            })
            .collect();
        motions.sort_by_key(|m| (m.f.pos.y, m.f.pos.x));
        motions
    }
}
