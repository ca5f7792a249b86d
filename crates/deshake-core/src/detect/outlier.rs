//! Kalman-style fusion of measured cell motions with neighbourhood and
//! history estimates.

use rayon::prelude::*;

use super::cells::{flags, CellGrid};
use crate::consts::{MIN_QSIZE, MIN_SURROUND};
use crate::geometry::Vec2;

#[inline]
fn div_round(n: i64, d: i64) -> i32 {
    let half = d / 2;
    let r = if n >= 0 { n + half } else { n - half };
    (r / d) as i32
}

#[inline]
fn round_vec(x: i64, y: i64, d: i64) -> Vec2<i32> {
    Vec2::new(div_round(x, d), div_round(y, d))
}

/// Fuses the measured vectors of one layer at history slot `t0`.
///
/// For every cell the mean `va` of the eight surrounding measurements
/// (clipped at the grid border) and the previous fused value `v1` form an
/// estimate `(va + v1) / 2`. Measurement and estimate are blended by their
/// quality weights; cells whose estimation error dominates are flagged
/// `ESTI_DEV`, cells without texture `CONTRAST`, cells without enough
/// neighbours `SURROUNDINGS`. Flagged cells keep their fused value.
///
/// Near-zero measurements (squared size below `MIN_QSIZE`) skip the fusion
/// and are accepted as-is.
pub fn filter_layer(grid: &mut CellGrid, layer: usize, t0: usize, t1: usize, dev_factor: i64) {
    // Snapshot of this frame's measurements, so the parallel pass below is
    // deterministic regardless of cell order.
    let meas: Vec<Vec2<i32>> = grid
        .cells
        .iter()
        .map(|c| c.directions[layer].velo[t0].meas)
        .collect();
    let dim = grid.dim;

    grid.cells.par_iter_mut().for_each(|cell| {
        let qf_contrast = cell.qf_contrast;
        let dir = &mut cell.directions[layer];
        let v0 = dir.velo[t0].meas;
        let v1 = dir.velo[t1].val;

        if qf_contrast == 0 {
            dir.set(flags::CONTRAST);
        }

        // Neighbourhood mean and nearest-neighbour distance.
        let mut acc = Vec2::new(0i64, 0i64);
        let mut count = 0i64;
        let mut nearest = u32::MAX;
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = cell.idx.x as i64 + dx;
                let ny = cell.idx.y as i64 + dy;
                if nx < 0 || ny < 0 || nx >= dim.x as i64 || ny >= dim.y as i64 {
                    continue;
                }
                let n = meas[(ny * dim.x as i64 + nx) as usize];
                acc.x += n.x as i64;
                acc.y += n.y as i64;
                count += 1;
                let d = (n - v0).qsize() as f64;
                nearest = nearest.min(d.sqrt().round() as u32);
            }
        }

        if (count as usize) < MIN_SURROUND {
            dir.set(flags::SURROUNDINGS);
            dir.velo[t0].val = v0;
            dir.velo[t0].esti = v0;
            dir.velo[t0].contrast = qf_contrast;
            return;
        }
        let va = round_vec(acc.x, acc.y, count);
        dir.velo[t0].dist = nearest;
        dir.velo[t0].contrast = qf_contrast;

        if (v0.qsize() as i64) < MIN_QSIZE {
            dir.velo[t0].val = v0;
            dir.velo[t0].esti = v0;
            return;
        }

        let dt = v0 - v1;
        let ds = v0 - va;
        let estimated = round_vec((va.x + v1.x) as i64, (va.y + v1.y) as i64, 2);
        let qf_measured = 4 * v0.qsize() as i64;
        let qf_estimated = (dt.qsize() as i64 + 4 * ds.qsize() as i64) * dev_factor;

        let denom = qf_measured + qf_estimated;
        dir.velo[t0].esti = estimated;
        dir.velo[t0].val = round_vec(
            v0.x as i64 * qf_measured + estimated.x as i64 * qf_estimated,
            v0.y as i64 * qf_measured + estimated.y as i64 * qf_estimated,
            denom,
        );

        if qf_estimated > qf_measured {
            dir.set(flags::ESTI_DEV);
        }
    });
}
