//! Multi-timescale motion detection.
//!
//! Each frame is blurred, folded into a pyramid, and matched per detection
//! cell against five reference pyramids: the previous frame (FAST), two
//! slowly refreshed references (SLOW_A/B, period 15, phases 0 and 8) and
//! two near-static references (STATIC_A/B, period 60, phases 0 and 30).
//! Measurements are sanitized by the outlier filter, refined down the
//! pyramid, serialized, and returned as local motions.

pub mod cells;
pub mod contrast;
pub mod correlate;
pub mod draw;
pub mod fields;
pub mod outlier;

use std::fs::File;
use std::io::BufWriter;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::blur::{box_blur, BlurPolicy};
use crate::consts::{
    BORDER_DIV, CELL_SIZE, DEV_FACTOR, PYRAMID_MIN_DIM, SLOW_PERIOD, SLOW_PHASE, STATIC_PERIOD,
    STATIC_PHASE,
};
use crate::error::{DeshakeError, Result};
use crate::frame::{Frame, FrameInfo, Luma, Pixel, Pyramid, Rgb};
use crate::geometry::{RectIter, SpiralIter, Vec2};
use crate::io::binary::Serializer;
use crate::motion::{Field, LocalMotion};
use cells::{history_slot, CellGrid, FilterLayer, LAYER_COUNT};

/// Detector options. Ranges follow the long-standing filter interface.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// How shaky the footage is, 1..=10.
    pub shakiness: u32,
    /// Measurement thoroughness, 1..=15; at least `shakiness / 2`.
    pub accuracy: u32,
    /// Coarse search step before refinement, 1..=32.
    pub step_size: u32,
    /// Fields below this contrast are discarded, 0.0..=1.0.
    pub min_contrast: f64,
    /// Overlay detected fields on the frame: 0 off, 1 fields, 2 + search areas.
    pub show: u32,
    /// If above 0, keep the references taken at that frame forever.
    pub virtual_tripod: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            shakiness: 5,
            accuracy: 15,
            step_size: 6,
            min_contrast: 0.25,
            show: 0,
            virtual_tripod: 0,
        }
    }
}

impl DetectorConfig {
    /// Checks ranges and resolves inter-option constraints.
    pub fn validate(&mut self) -> Result<()> {
        if !(1..=10).contains(&self.shakiness) {
            return Err(DeshakeError::ConfigInvalid(format!(
                "shakiness {} out of range 1..=10",
                self.shakiness
            )));
        }
        if !(1..=15).contains(&self.accuracy) {
            return Err(DeshakeError::ConfigInvalid(format!(
                "accuracy {} out of range 1..=15",
                self.accuracy
            )));
        }
        if !(1..=32).contains(&self.step_size) {
            return Err(DeshakeError::ConfigInvalid(format!(
                "stepsize {} out of range 1..=32",
                self.step_size
            )));
        }
        if !(0.0..=1.0).contains(&self.min_contrast) {
            return Err(DeshakeError::ConfigInvalid(format!(
                "mincontrast {} out of range 0..=1",
                self.min_contrast
            )));
        }
        if self.show > 2 {
            return Err(DeshakeError::ConfigInvalid(format!(
                "show {} out of range 0..=2",
                self.show
            )));
        }
        if self.accuracy < self.shakiness / 2 {
            self.accuracy = self.shakiness / 2;
            info!(accuracy = self.accuracy, "accuracy raised to shakiness / 2");
        }
        if self.accuracy > 9 && self.step_size > 6 {
            self.step_size = 6;
            info!("stepsize capped to 6 for high accuracy");
        }
        Ok(())
    }
}

/// Pyramid slot indices: two fast slots ping-pong per frame, the rest hold
/// the slow and static references.
const SLOT_SLOW_A: usize = 2;
const SLOT_SLOW_B: usize = 3;
const SLOT_STATIC_A: usize = 4;
const SLOT_STATIC_B: usize = 5;
const SLOT_COUNT: usize = 6;

struct PyramidStack<P: Pixel> {
    slots: Vec<Pyramid<P>>,
}

impl<P: Pixel> PyramidStack<P> {
    fn new(dim: Vec2<u32>, min_dim: u32) -> Result<Self> {
        let mut slots = Vec::with_capacity(SLOT_COUNT);
        for _ in 0..SLOT_COUNT {
            slots.push(Pyramid::new(dim, min_dim)?);
        }
        Ok(Self { slots })
    }

    fn level_count(&self) -> usize {
        self.slots[0].level_count()
    }

    fn reference(&self, layer: FilterLayer, idx_prev: usize) -> &Pyramid<P> {
        match layer {
            FilterLayer::Fast => &self.slots[idx_prev],
            FilterLayer::SlowA => &self.slots[SLOT_SLOW_A],
            FilterLayer::SlowB => &self.slots[SLOT_SLOW_B],
            FilterLayer::StaticA => &self.slots[SLOT_STATIC_A],
            FilterLayer::StaticB => &self.slots[SLOT_STATIC_B],
        }
    }
}

enum Pyramids {
    Luma(PyramidStack<Luma>),
    Rgb(PyramidStack<Rgb>),
}

/// Multi-timescale motion detector.
pub struct Detector {
    info: FrameInfo,
    conf: DetectorConfig,
    cells: CellGrid,
    pyramids: Pyramids,
    blurred: Frame,
    serializer: Option<Serializer<BufWriter<File>>>,
    frame_idx: u64,
    idx_current: usize,
    idx_prev: usize,
    detect_range: u32,
    first_frame: bool,
}

impl Detector {
    pub fn new(info: FrameInfo, mut conf: DetectorConfig) -> Result<Self> {
        conf.validate()?;
        let dim = info.dim();
        let pyramids = if info.format.is_packed_rgb() {
            Pyramids::Rgb(PyramidStack::new(dim, PYRAMID_MIN_DIM)?)
        } else {
            Pyramids::Luma(PyramidStack::new(dim, PYRAMID_MIN_DIM)?)
        };
        let (smallest, levels) = match &pyramids {
            Pyramids::Luma(s) => (s.slots[0].smallest().dim(), s.level_count()),
            Pyramids::Rgb(s) => (s.slots[0].smallest().dim(), s.level_count()),
        };
        let cells = CellGrid::new(smallest, levels);
        info!(
            width = info.width,
            height = info.height,
            levels,
            cells = cells.len(),
            "motion detector ready"
        );
        Ok(Self {
            info,
            conf,
            cells,
            pyramids,
            blurred: Frame::allocate(info)?,
            serializer: None,
            frame_idx: 0,
            idx_current: 0,
            idx_prev: 0,
            detect_range: info.width / BORDER_DIV,
            first_frame: true,
        })
    }

    /// Streams one binary block per processed frame into `serializer`.
    pub fn attach_serializer(&mut self, serializer: Serializer<BufWriter<File>>) {
        self.serializer = Some(serializer);
    }

    pub fn info(&self) -> &FrameInfo {
        &self.info
    }

    pub fn grid(&self) -> &CellGrid {
        &self.cells
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_idx
    }

    /// Processes one frame, returning the valid FAST-layer motions.
    ///
    /// With `show` above 0 the detected cells are drawn onto the frame.
    pub fn process_frame(&mut self, frame: &mut Frame) -> Result<Vec<LocalMotion>> {
        if *frame.info() != self.info {
            return Err(DeshakeError::IncompatibleGeometry(format!(
                "detector built for {:?}, frame is {:?}",
                self.info,
                frame.info()
            )));
        }

        // Smooth before matching; packed frames are matched as-is.
        if self.info.format.is_packed_rgb() {
            self.blurred.copy_from(frame)?;
        } else {
            box_blur(&mut self.blurred, frame, self.conf.step_size, BlurPolicy::NoColor)?;
        }

        let old_idx = self.frame_idx;
        self.idx_prev = (old_idx & 1) as usize;
        self.frame_idx += 1;
        self.idx_current = (self.frame_idx & 1) as usize;

        let params = FrameParams {
            slot: history_slot(self.frame_idx),
            prev_slot: history_slot(self.frame_idx.wrapping_sub(1)),
            idx_current: self.idx_current,
            idx_prev: self.idx_prev,
            detect_range: self.detect_range,
            refresh: RefreshPlan::at(old_idx, self.conf.virtual_tripod),
            first_frame: self.first_frame,
        };
        self.first_frame = false;

        match &mut self.pyramids {
            Pyramids::Luma(stack) => detect_frame(stack, &mut self.cells, &self.blurred, &params),
            Pyramids::Rgb(stack) => detect_frame(stack, &mut self.cells, &self.blurred, &params),
        }

        if self.cells.cells.iter().all(|c| c.qf_contrast == 0) {
            warn!(
                frame = old_idx,
                "no cell passed the contrast gate, emitting empty motion set"
            );
        }

        if let Some(ser) = &mut self.serializer {
            ser.write_frame(&self.cells, params.slot)?;
        }

        let motions = self.collect_motions(params.slot);
        debug!(
            frame = old_idx,
            motions = motions.len(),
            valid_cells = self.cells.valid_count(),
            "frame processed"
        );

        if self.conf.show > 0 && !self.info.format.is_packed_rgb() {
            draw::overlay(frame, &self.cells, params.slot, self.conf.show);
        }
        Ok(motions)
    }

    fn collect_motions(&self, slot: usize) -> Vec<LocalMotion> {
        let fast = FilterLayer::Fast.index();
        self.cells
            .cells
            .iter()
            .filter(|c| c.directions[fast].is_valid())
            .map(|c| LocalMotion {
                v: c.directions[fast].velo[slot].val,
                f: Field {
                    pos: c.position,
                    size: c.size.x,
                },
                contrast: c.qf_contrast as f64,
                match_quality: c.match_quality[fast],
            })
            .collect()
    }
}

/// Per-frame invariants threaded through the generic detection steps.
struct FrameParams {
    slot: usize,
    prev_slot: usize,
    idx_current: usize,
    idx_prev: usize,
    detect_range: u32,
    refresh: RefreshPlan,
    first_frame: bool,
}

/// Which reference slots are refreshed from the current pyramid this frame.
#[derive(Clone, Copy, Debug, Default)]
struct RefreshPlan {
    slow_a: bool,
    slow_b: bool,
    static_a: bool,
    static_b: bool,
}

impl RefreshPlan {
    fn at(idx: u64, tripod: u64) -> Self {
        if tripod > 0 && idx >= tripod {
            return Self::default();
        }
        Self {
            slow_a: idx % SLOW_PERIOD == 0,
            slow_b: idx == 0 || (idx + SLOW_PHASE) % SLOW_PERIOD == 0,
            static_a: idx % STATIC_PERIOD == 0,
            static_b: idx == 0 || (idx + STATIC_PHASE) % STATIC_PERIOD == 0,
        }
    }
}

fn detect_frame<P: Pixel>(
    stack: &mut PyramidStack<P>,
    cells: &mut CellGrid,
    blurred: &Frame,
    params: &FrameParams,
) {
    advance_pyramids(stack, blurred, params);
    select_cells(stack, cells, params);
    estimate(stack, cells, params);
    for layer in 0..LAYER_COUNT {
        outlier::filter_layer(cells, layer, params.slot, params.prev_slot, DEV_FACTOR);
    }
    refine(stack, cells, params);
}

fn advance_pyramids<P: Pixel>(stack: &mut PyramidStack<P>, blurred: &Frame, params: &FrameParams) {
    stack.slots[params.idx_current].build(blurred);

    if params.first_frame {
        // Both fast slots start from the first frame, so FAST measures no
        // motion instead of matching against an empty canvas.
        let (a, b) = stack.slots.split_at_mut(1);
        if params.idx_current == 0 {
            b[0].copy_from(&a[0]);
        } else {
            a[0].copy_from(&b[0]);
        }
    }

    let (fast, refs) = stack.slots.split_at_mut(SLOT_SLOW_A);
    let current = &fast[params.idx_current];
    if params.refresh.slow_a {
        refs[SLOT_SLOW_A - 2].copy_from(current);
    }
    if params.refresh.slow_b {
        refs[SLOT_SLOW_B - 2].copy_from(current);
    }
    if params.refresh.static_a {
        refs[SLOT_STATIC_A - 2].copy_from(current);
    }
    if params.refresh.static_b {
        refs[SLOT_STATIC_B - 2].copy_from(current);
    }
}

/// Scores the texture of every cell on the smallest pyramid level.
fn select_cells<P: Pixel>(stack: &PyramidStack<P>, cells: &mut CellGrid, params: &FrameParams) {
    let canvas = stack.slots[params.idx_current].smallest();
    cells.cells.par_iter_mut().for_each(|cell| {
        let top_left = ((cell.idx + Vec2::splat(1)) * CELL_SIZE).to_i32();
        let score = contrast::score_cell(canvas, top_left);
        cell.qf_contrast = contrast::contrast_weight(score);
    });
}

/// Coarse spiral search per cell and layer at the smallest pyramid level.
fn estimate<P: Pixel>(stack: &PyramidStack<P>, cells: &mut CellGrid, params: &FrameParams) {
    let level = stack.level_count() - 1;
    let curr = stack.slots[params.idx_current].level(level);
    let range = params.detect_range >> (level as u32 + 1);
    let t = params.slot;

    let refs: Vec<_> = FilterLayer::ALL
        .iter()
        .map(|&l| stack.reference(l, params.idx_prev).level(level))
        .collect();

    cells.cells.par_iter_mut().for_each(|cell| {
        let size = Vec2::new(
            (cell.size.x >> level).max(1),
            (cell.size.y >> level).max(1),
        );
        let pos = Vec2::new(cell.position.x >> level, cell.position.y >> level);
        let top_left = pos - size.to_i32() / 2;
        let area = (size.x * size.y) as f64;

        for (layer, &reference) in refs.iter().enumerate() {
            let dir = &mut cell.directions[layer];
            dir.clear_flags();
            let (best, cost) = correlate::best_offset(
                curr,
                reference,
                top_left,
                size,
                SpiralIter::centered(range),
            );
            let scaled = best * (1 << level);
            dir.velo[t].meas = scaled;
            dir.velo[t].val = scaled;
            dir.velo[t].esti = scaled;
            dir.velo[t].contrast = cell.qf_contrast;
            cell.match_quality[layer] = cost as f64 / area;
        }
    });
}

/// Walks still-valid directions back toward level 0, keeping the search
/// within one pixel of the up-scaled previous best at every level.
fn refine<P: Pixel>(stack: &PyramidStack<P>, cells: &mut CellGrid, params: &FrameParams) {
    let levels = stack.level_count();
    let t = params.slot;

    cells.cells.par_iter_mut().for_each(|cell| {
        for layer in FilterLayer::ALL {
            let li = layer.index();
            if !cell.directions[li].is_valid() {
                continue;
            }
            for p in (0..levels - 1).rev() {
                let curr = stack.slots[params.idx_current].level(p);
                let reference = stack.reference(layer, params.idx_prev).level(p);
                let size = Vec2::new(
                    (cell.size.x >> p).max(1),
                    (cell.size.y >> p).max(1),
                );
                let pos = Vec2::new(cell.position.x >> p, cell.position.y >> p);
                let top_left = pos - size.to_i32() / 2;
                let dv = cell.directions[li].velo[t].val / (1 << p);

                let (best, cost) = if layer == FilterLayer::Fast {
                    correlate::best_offset(
                        curr,
                        reference,
                        top_left,
                        size,
                        RectIter::span(dv - Vec2::splat(1), dv + Vec2::splat(1)),
                    )
                } else {
                    correlate::best_offset(
                        curr,
                        reference,
                        top_left,
                        size,
                        SpiralIter::span(dv - Vec2::splat(1), dv + Vec2::splat(1)),
                    )
                };
                cell.directions[li].velo[t].val = best * (1 << p);
                if p == 0 {
                    cell.match_quality[li] = cost as f64 / (size.x * size.y) as f64;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_refresh_schedule() {
        // Frame 0 seeds every reference.
        let plan = RefreshPlan::at(0, 0);
        assert!(plan.slow_a && plan.slow_b && plan.static_a && plan.static_b);

        // SLOW_A refreshes every 15 frames, SLOW_B 7 frames later.
        for idx in 1..240u64 {
            let plan = RefreshPlan::at(idx, 0);
            assert_eq!(plan.slow_a, idx % 15 == 0, "frame {idx}");
            assert_eq!(plan.slow_b, idx % 15 == 8, "frame {idx}");
            assert_eq!(plan.static_a, idx % 60 == 0, "frame {idx}");
            assert_eq!(plan.static_b, idx % 60 == 30, "frame {idx}");
        }
    }

    #[test]
    fn tripod_freezes_references() {
        for idx in 3..120u64 {
            let plan = RefreshPlan::at(idx, 3);
            assert!(!plan.slow_a && !plan.slow_b && !plan.static_a && !plan.static_b);
        }
        // Before the tripod frame the normal schedule applies.
        assert!(RefreshPlan::at(0, 3).slow_a);
    }

    #[test]
    fn accuracy_is_floored_by_shakiness() {
        let mut conf = DetectorConfig {
            shakiness: 10,
            accuracy: 1,
            ..Default::default()
        };
        conf.validate().unwrap();
        assert_eq!(conf.accuracy, 5);
    }

    #[test]
    fn stepsize_capped_for_high_accuracy() {
        let mut conf = DetectorConfig {
            accuracy: 12,
            step_size: 12,
            ..Default::default()
        };
        conf.validate().unwrap();
        assert_eq!(conf.step_size, 6);
    }
}
