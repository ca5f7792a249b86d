//! Small 2-D vector arithmetic used throughout detection and correction.

pub mod iter;

pub use iter::{RectIter, SpiralIter, StepSpiral};

use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use num_traits::{Num, ToPrimitive};
use serde::{Deserialize, Serialize};

/// An x/y coordinate pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vec2<T> {
    pub x: T,
    pub y: T,
}

impl<T> Vec2<T> {
    pub const fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl<T: Copy> Vec2<T> {
    /// Both components set to the same value.
    pub const fn splat(v: T) -> Self {
        Self { x: v, y: v }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Vec2<U> {
        Vec2::new(f(self.x), f(self.y))
    }
}

impl<T: Num + Copy> Vec2<T> {
    /// Squared magnitude.
    pub fn qsize(self) -> T {
        self.x * self.x + self.y * self.y
    }
}

impl<T: ToPrimitive + Copy> Vec2<T> {
    pub fn to_f32(self) -> Vec2<f32> {
        Vec2::new(
            self.x.to_f32().unwrap_or_default(),
            self.y.to_f32().unwrap_or_default(),
        )
    }

    pub fn to_f64(self) -> Vec2<f64> {
        Vec2::new(
            self.x.to_f64().unwrap_or_default(),
            self.y.to_f64().unwrap_or_default(),
        )
    }
}

impl Vec2<f32> {
    /// Component-wise rounding to the nearest integer.
    pub fn round_i32(self) -> Vec2<i32> {
        Vec2::new(self.x.round() as i32, self.y.round() as i32)
    }

    /// Polar form of this vector: angle in radians, magnitude in pixels.
    pub fn polar(self) -> Polar {
        Polar {
            angle: self.y.atan2(self.x),
            magnitude: self.qsize().sqrt(),
        }
    }
}

impl Vec2<i32> {
    pub fn to_u32(self) -> Vec2<u32> {
        Vec2::new(self.x.max(0) as u32, self.y.max(0) as u32)
    }
}

impl Vec2<f64> {
    /// Component-wise rounding to the nearest integer.
    pub fn round_i32(self) -> Vec2<i32> {
        Vec2::new(self.x.round() as i32, self.y.round() as i32)
    }
}

impl Vec2<u32> {
    pub fn to_i32(self) -> Vec2<i32> {
        Vec2::new(self.x as i32, self.y as i32)
    }
}

/// Polar coordinates of a planar vector.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Polar {
    pub angle: f32,
    pub magnitude: f32,
}

impl<T: Add<Output = T>> Add for Vec2<T> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl<T: Sub<Output = T>> Sub for Vec2<T> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl<T: Add<Output = T> + Copy> AddAssign for Vec2<T> {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<T: Sub<Output = T> + Copy> SubAssign for Vec2<T> {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<T: Mul<Output = T> + Copy> Mul<T> for Vec2<T> {
    type Output = Self;
    fn mul(self, rhs: T) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl<T: Mul<Output = T> + Copy> MulAssign<T> for Vec2<T> {
    fn mul_assign(&mut self, rhs: T) {
        *self = *self * rhs;
    }
}

impl<T: Div<Output = T> + Copy> Div<T> for Vec2<T> {
    type Output = Self;
    fn div(self, rhs: T) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl<T: Div<Output = T> + Copy> DivAssign<T> for Vec2<T> {
    fn div_assign(&mut self, rhs: T) {
        *self = *self / rhs;
    }
}

impl<T: Neg<Output = T>> Neg for Vec2<T> {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}
