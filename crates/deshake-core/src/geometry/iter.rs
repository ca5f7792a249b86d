//! Finite lattice iterators replacing ad-hoc search loops.

use super::Vec2;

/// Visits every integer coordinate of an axis-aligned rectangle in row-major
/// order. Bounds are inclusive.
#[derive(Clone, Debug)]
pub struct RectIter {
    min: Vec2<i32>,
    max: Vec2<i32>,
    cur: Vec2<i32>,
    done: bool,
}

impl RectIter {
    /// Iterates `(0,0) ..= (size-1, size-1)`.
    pub fn new(size: Vec2<u32>) -> Self {
        Self::span(
            Vec2::splat(0),
            Vec2::new(size.x as i32 - 1, size.y as i32 - 1),
        )
    }

    /// Iterates `min ..= max` component-wise.
    pub fn span(min: Vec2<i32>, max: Vec2<i32>) -> Self {
        let done = min.x > max.x || min.y > max.y;
        Self {
            min,
            max,
            cur: min,
            done,
        }
    }
}

impl Iterator for RectIter {
    type Item = Vec2<i32>;

    fn next(&mut self) -> Option<Vec2<i32>> {
        if self.done {
            return None;
        }
        let out = self.cur;
        if self.cur.x < self.max.x {
            self.cur.x += 1;
        } else if self.cur.y < self.max.y {
            self.cur.x = self.min.x;
            self.cur.y += 1;
        } else {
            self.done = true;
        }
        Some(out)
    }
}

/// Direction of travel along the spiral.
#[derive(Clone, Copy, Debug)]
enum Heading {
    Right,
    Down,
    Left,
    Up,
}

/// Spirals outward from the center of a bounding box, visiting each lattice
/// point of the box exactly once.
///
/// The walk goes right, down, left, up with run lengths 1, 1, 2, 2, 3, ...;
/// points that fall outside the box are skipped, and iteration ends once the
/// whole box has been covered.
#[derive(Clone, Debug)]
pub struct SpiralIter {
    min: Vec2<i32>,
    max: Vec2<i32>,
    cur: Vec2<i32>,
    heading: Heading,
    limit: u32,
    step: u32,
    remaining: u64,
    started: bool,
}

impl SpiralIter {
    /// Spiral over `min ..= max`, starting at the integer center of the box.
    pub fn span(min: Vec2<i32>, max: Vec2<i32>) -> Self {
        let remaining = if min.x > max.x || min.y > max.y {
            0
        } else {
            (max.x - min.x + 1) as u64 * (max.y - min.y + 1) as u64
        };
        Self {
            min,
            max,
            cur: Vec2::new((min.x + max.x) / 2, (min.y + max.y) / 2),
            heading: Heading::Right,
            limit: 1,
            step: 0,
            remaining,
            started: false,
        }
    }

    /// Spiral over the symmetric box `[-range, range]^2` centered at zero.
    pub fn centered(range: u32) -> Self {
        let r = range as i32;
        Self::span(Vec2::new(-r, -r), Vec2::new(r, r))
    }

    fn advance(&mut self) {
        match self.heading {
            Heading::Right => self.cur.x += 1,
            Heading::Down => self.cur.y += 1,
            Heading::Left => self.cur.x -= 1,
            Heading::Up => self.cur.y -= 1,
        }
        self.step += 1;
        if self.step == self.limit {
            self.step = 0;
            self.heading = match self.heading {
                Heading::Right => Heading::Down,
                Heading::Down => {
                    self.limit += 1;
                    Heading::Left
                }
                Heading::Left => Heading::Up,
                Heading::Up => {
                    self.limit += 1;
                    Heading::Right
                }
            };
        }
    }

    fn inside(&self, p: Vec2<i32>) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

impl Iterator for SpiralIter {
    type Item = Vec2<i32>;

    fn next(&mut self) -> Option<Vec2<i32>> {
        if self.remaining == 0 {
            return None;
        }
        if !self.started {
            self.started = true;
            self.remaining -= 1;
            return Some(self.cur);
        }
        loop {
            self.advance();
            if self.inside(self.cur) {
                self.remaining -= 1;
                return Some(self.cur);
            }
        }
    }
}

/// Strided spiral used by the coarse field search: moves in `step`-sized
/// jumps from the origin and stops as soon as the walk would leave the
/// `[-max_shift, max_shift]^2` box.
#[derive(Clone, Debug)]
pub struct StepSpiral {
    cur: Vec2<i32>,
    max_shift: i32,
    step: i32,
    heading: Heading,
    limit: u32,
    run: u32,
    started: bool,
    done: bool,
}

impl StepSpiral {
    pub fn new(max_shift: i32, step: u32) -> Self {
        Self {
            cur: Vec2::splat(0),
            max_shift,
            step: step.max(1) as i32,
            heading: Heading::Right,
            limit: 1,
            run: 0,
            started: false,
            done: max_shift < 0,
        }
    }

    fn advance(&mut self) {
        match self.heading {
            Heading::Right => self.cur.x += self.step,
            Heading::Down => self.cur.y += self.step,
            Heading::Left => self.cur.x -= self.step,
            Heading::Up => self.cur.y -= self.step,
        }
        self.run += 1;
        if self.run == self.limit {
            self.run = 0;
            self.heading = match self.heading {
                Heading::Right => Heading::Down,
                Heading::Down => {
                    self.limit += 1;
                    Heading::Left
                }
                Heading::Left => Heading::Up,
                Heading::Up => {
                    self.limit += 1;
                    Heading::Right
                }
            };
        }
    }
}

impl Iterator for StepSpiral {
    type Item = Vec2<i32>;

    fn next(&mut self) -> Option<Vec2<i32>> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(self.cur);
        }
        self.advance();
        if self.cur.x.abs() > self.max_shift || self.cur.y.abs() > self.max_shift {
            self.done = true;
            return None;
        }
        Some(self.cur)
    }
}
