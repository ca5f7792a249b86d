//! Overlay drawing of detection results onto the luma plane.

use super::cells::{CellGrid, FilterLayer};
use crate::frame::{Frame, Plane};
use crate::geometry::Vec2;
use crate::motion::LocalMotion;

fn put(plane: &mut Plane, x: i32, y: i32, value: u8) {
    if x >= 0 && y >= 0 && (x as usize) < plane.width && (y as usize) < plane.height {
        let stride = plane.stride;
        plane.data[y as usize * stride + x as usize] = value;
    }
}

/// Filled box centered at `center`.
fn draw_box(plane: &mut Plane, center: Vec2<i32>, size: Vec2<i32>, value: u8) {
    for dy in -size.y / 2..size.y / 2 {
        for dx in -size.x / 2..size.x / 2 {
            put(plane, center.x + dx, center.y + dy, value);
        }
    }
}

/// Rectangle outline centered at `center`.
fn draw_rectangle(plane: &mut Plane, center: Vec2<i32>, size: Vec2<i32>, value: u8) {
    for dx in -size.x / 2..size.x / 2 {
        put(plane, center.x + dx, center.y - size.y / 2, value);
        put(plane, center.x + dx, center.y + size.y / 2, value);
    }
    for dy in -size.y / 2..size.y / 2 {
        put(plane, center.x - size.x / 2, center.y + dy, value);
        put(plane, center.x + size.x / 2, center.y + dy, value);
    }
}

/// Line of the given thickness between two points.
fn draw_line(plane: &mut Plane, from: Vec2<i32>, to: Vec2<i32>, thickness: i32, value: u8) {
    let d = to - from;
    let steps = d.x.abs().max(d.y.abs()).max(1);
    for s in 0..=steps {
        let x = from.x + d.x * s / steps;
        let y = from.y + d.y * s / steps;
        for t in -thickness / 2..=thickness / 2 {
            if d.x.abs() > d.y.abs() {
                put(plane, x, y + t, value);
            } else {
                put(plane, x + t, y, value);
            }
        }
    }
}

/// Draws the FAST-layer state of every cell: a rectangle around the cell
/// (bright for valid cells) and its motion vector. At `show` level 2 the
/// search area rectangle is added.
pub fn overlay(frame: &mut Frame, cells: &CellGrid, slot: usize, show: u32) {
    let plane = frame.plane_mut(0);
    let fast = FilterLayer::Fast.index();

    for cell in &cells.cells {
        let dir = &cell.directions[fast];
        let pos = cell.position;
        let v = dir.velo[slot].val;
        let size = cell.size.to_i32();

        if show > 1 {
            draw_rectangle(plane, pos, size * 2, 80);
        }

        if dir.is_valid() {
            draw_rectangle(plane, pos, size, 255);
            draw_box(plane, pos + v, Vec2::splat(3), 255);
            draw_line(plane, pos, pos + v, 2, 0);
        } else {
            draw_rectangle(plane, pos, size, 40);
        }
    }
}

/// Draws measurement-field motions: the field outline, its vector, and at
/// `show` level 2 the scan area.
pub fn motions_overlay(frame: &mut Frame, motions: &[LocalMotion], show: u32, max_shift: i32) {
    let plane = frame.plane_mut(0);
    for m in motions {
        let size = Vec2::splat(m.f.size as i32);
        if show > 1 {
            draw_rectangle(plane, m.f.pos, size + Vec2::splat(2 * max_shift), 80);
        }
        draw_rectangle(plane, m.f.pos, size, 255);
        draw_box(plane, m.f.pos + m.v, Vec2::splat(3), 255);
        draw_line(plane, m.f.pos, m.f.pos + m.v, 2, 0);
    }
}
