//! Integer point types.
//!
//! All planar geometry is carried in fixed-point micrometres so that repeated
//! offsetting and clipping never accumulates floating-point drift.

use crate::{scale, unscale, Coord, CoordF};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// A 2D point (or vector) with integer coordinates in scaled units.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub x: Coord,
    pub y: Coord,
}

impl Point {
    /// Create a new point from scaled coordinates.
    #[inline]
    pub const fn new(x: Coord, y: Coord) -> Self {
        Self { x, y }
    }

    /// Create a point from millimetre coordinates.
    #[inline]
    pub fn new_scale(x: CoordF, y: CoordF) -> Self {
        Self::new(scale(x), scale(y))
    }

    /// The origin.
    #[inline]
    pub const fn zero() -> Self {
        Self { x: 0, y: 0 }
    }

    /// Dot product, widened so that products of large coordinates never overflow.
    #[inline]
    pub fn dot(&self, other: &Point) -> i128 {
        self.x as i128 * other.x as i128 + self.y as i128 * other.y as i128
    }

    /// Z component of the 3D cross product.
    #[inline]
    pub fn cross(&self, other: &Point) -> i128 {
        self.x as i128 * other.y as i128 - self.y as i128 * other.x as i128
    }

    /// Squared length of this vector.
    #[inline]
    pub fn length_squared(&self) -> i128 {
        self.dot(self)
    }

    /// Length of this vector in scaled units, rounded to the nearest unit.
    #[inline]
    pub fn length(&self) -> Coord {
        (self.length_squared() as CoordF).sqrt().round() as Coord
    }

    /// Length of this vector as a float (scaled units).
    #[inline]
    pub fn length_f(&self) -> CoordF {
        (self.length_squared() as CoordF).sqrt()
    }

    /// Squared distance to another point.
    #[inline]
    pub fn distance_squared(&self, other: &Point) -> i128 {
        (*other - *self).length_squared()
    }

    /// Distance to another point (scaled units, float).
    #[inline]
    pub fn distance(&self, other: &Point) -> CoordF {
        (*other - *self).length_f()
    }

    /// Returns true when the vector is strictly shorter than `len`.
    ///
    /// Uses a cheap per-axis rejection before the exact squared comparison.
    #[inline]
    pub fn is_shorter_than(&self, len: Coord) -> bool {
        if self.x.abs() > len || self.y.abs() > len {
            return false;
        }
        self.length_squared() < len as i128 * len as i128
    }

    /// Rescale this vector so that its length becomes `len`.
    ///
    /// A zero vector stays zero.
    pub fn set_length(&self, len: Coord) -> Point {
        let current = self.length_f();
        if current < 1.0 {
            return *self;
        }
        let factor = len as CoordF / current;
        Point::new(
            (self.x as CoordF * factor).round() as Coord,
            (self.y as CoordF * factor).round() as Coord,
        )
    }

    /// Rotate around the origin by `angle` radians.
    pub fn rotated(&self, angle: CoordF) -> Point {
        let (sin, cos) = angle.sin_cos();
        let x = self.x as CoordF;
        let y = self.y as CoordF;
        Point::new(
            (x * cos - y * sin).round() as Coord,
            (x * sin + y * cos).round() as Coord,
        )
    }

    /// Coordinates in millimetres.
    #[inline]
    pub fn to_mm(&self) -> (CoordF, CoordF) {
        (unscale(self.x), unscale(self.y))
    }
}

impl Add for Point {
    type Output = Point;
    #[inline]
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point {
    #[inline]
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point {
    type Output = Point;
    #[inline]
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Point {
    #[inline]
    fn sub_assign(&mut self, rhs: Point) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Neg for Point {
    type Output = Point;
    #[inline]
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

impl Mul<Coord> for Point {
    type Output = Point;
    #[inline]
    fn mul(self, rhs: Coord) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y) = self.to_mm();
        write!(f, "({:.3}, {:.3})", x, y)
    }
}

/// A 3D point in scaled units, used for tool positions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point3 {
    pub x: Coord,
    pub y: Coord,
    pub z: Coord,
}

impl Point3 {
    #[inline]
    pub const fn new(x: Coord, y: Coord, z: Coord) -> Self {
        Self { x, y, z }
    }

    /// Lift a planar point to the given height.
    #[inline]
    pub const fn from_xy(p: Point, z: Coord) -> Self {
        Self { x: p.x, y: p.y, z }
    }

    /// Drop the Z component.
    #[inline]
    pub const fn xy(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_arithmetic() {
        let a = Point::new(10, 20);
        let b = Point::new(3, 4);
        assert_eq!(a + b, Point::new(13, 24));
        assert_eq!(a - b, Point::new(7, 16));
        assert_eq!(-b, Point::new(-3, -4));
        assert_eq!(b * 2, Point::new(6, 8));
    }

    #[test]
    fn test_dot_cross() {
        let a = Point::new(1, 0);
        let b = Point::new(0, 1);
        assert_eq!(a.dot(&b), 0);
        assert_eq!(a.cross(&b), 1);
        assert_eq!(b.cross(&a), -1);
    }

    #[test]
    fn test_length() {
        let v = Point::new(3, 4);
        assert_eq!(v.length(), 5);
        assert_eq!(v.length_squared(), 25);
        assert!(v.is_shorter_than(6));
        assert!(!v.is_shorter_than(5));
    }

    #[test]
    fn test_large_coordinates_do_not_overflow() {
        let v = Point::new(3_000_000_000, 4_000_000_000);
        assert_eq!(v.length(), 5_000_000_000);
    }

    #[test]
    fn test_set_length() {
        let v = Point::new(300, 400).set_length(1000);
        assert_eq!(v, Point::new(600, 800));
        assert_eq!(Point::zero().set_length(10), Point::zero());
    }

    #[test]
    fn test_scale_roundtrip() {
        let p = Point::new_scale(1.5, -2.25);
        assert_eq!(p, Point::new(1500, -2250));
        let (x, y) = p.to_mm();
        assert!((x - 1.5).abs() < 1e-9);
        assert!((y + 2.25).abs() < 1e-9);
    }

    #[test]
    fn test_rotated() {
        let p = Point::new(1000, 0).rotated(std::f64::consts::FRAC_PI_2);
        assert_eq!(p, Point::new(0, 1000));
    }
}
