//! Segments.
//!
//! Hatch clipping works on single segments; crossings are found with floats
//! along the segment and snapped back to the µm grid.

use super::Point;
use crate::{Coord, CoordF};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Segment from `a` to `b`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Line {
    pub a: Point,
    pub b: Point,
}

impl Line {
    #[inline]
    pub const fn new(a: Point, b: Point) -> Self {
        Self { a, b }
    }

    /// Segment between two points given in mm.
    #[inline]
    pub fn from_coords_scale(ax: CoordF, ay: CoordF, bx: CoordF, by: CoordF) -> Self {
        Self::new(Point::new_scale(ax, ay), Point::new_scale(bx, by))
    }

    #[inline]
    pub fn direction(&self) -> Point {
        self.b - self.a
    }

    #[inline]
    pub fn length(&self) -> CoordF {
        self.a.distance(&self.b)
    }

    /// Point at fraction `t` of the way from `a` to `b`, rounded to the grid.
    #[inline]
    pub fn point_at(&self, t: CoordF) -> Point {
        let d = self.direction();
        Point::new(
            self.a.x + (d.x as CoordF * t).round() as Coord,
            self.a.y + (d.y as CoordF * t).round() as Coord,
        )
    }

    pub fn closest_point(&self, p: &Point) -> Point {
        let d = self.direction();
        let len_sq = d.length_squared();
        if len_sq == 0 {
            return self.a;
        }
        let t = (*p - self.a).dot(&d) as CoordF / len_sq as CoordF;
        self.point_at(t.clamp(0.0, 1.0))
    }

    pub fn distance_to_point(&self, p: &Point) -> CoordF {
        p.distance(&self.closest_point(p))
    }

    /// Touching and collinear overlap count.
    pub fn intersects(&self, other: &Line) -> bool {
        lines_intersect(self.a, self.b, other.a, other.b)
    }

    /// Fraction along `self` where `other` crosses it. Parallel segments
    /// never cross.
    pub fn intersection_param(&self, other: &Line) -> Option<CoordF> {
        let d1 = self.direction();
        let d2 = other.direction();
        let denom = d1.cross(&d2);
        if denom == 0 {
            return None;
        }
        let offset = other.a - self.a;
        let t = offset.cross(&d2) as CoordF / denom as CoordF;
        let u = offset.cross(&d1) as CoordF / denom as CoordF;
        ((0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)).then_some(t)
    }

    pub fn intersection(&self, other: &Line) -> Option<Point> {
        self.intersection_param(other).map(|t| self.point_at(t))
    }
}

/// Exact crossing test on the integer grid.
pub fn lines_intersect(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    let side = |p: Point, q: Point, r: Point| (q - p).cross(&(r - p)).signum();
    let within = |p: Point, q: Point, r: Point| {
        r.x >= p.x.min(q.x) && r.x <= p.x.max(q.x) && r.y >= p.y.min(q.y) && r.y <= p.y.max(q.y)
    };

    let s1 = side(b1, b2, a1);
    let s2 = side(b1, b2, a2);
    let s3 = side(a1, a2, b1);
    let s4 = side(a1, a2, b2);
    if s1 * s2 < 0 && s3 * s4 < 0 {
        return true;
    }
    (s1 == 0 && within(b1, b2, a1))
        || (s2 == 0 && within(b1, b2, a2))
        || (s3 == 0 && within(a1, a2, b1))
        || (s4 == 0 && within(a1, a2, b2))
}

impl fmt::Debug for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}-{:?}", self.a, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_length() {
        let line = Line::new(Point::new(0, 0), Point::new(3000, 4000));
        assert!((line.length() - 5000.0).abs() < 1e-9);
        assert_eq!(line.point_at(0.5), Point::new(1500, 2000));
    }

    #[test]
    fn test_closest_point_clamps() {
        let line = Line::new(Point::new(0, 0), Point::new(1000, 0));
        assert_eq!(line.closest_point(&Point::new(500, 300)), Point::new(500, 0));
        assert_eq!(line.closest_point(&Point::new(-200, 50)), Point::new(0, 0));
        assert_eq!(line.closest_point(&Point::new(1500, 50)), Point::new(1000, 0));
        assert!((line.distance_to_point(&Point::new(500, 300)) - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_crossing_diagonals() {
        let a = Line::new(Point::new(0, 0), Point::new(1000, 1000));
        let b = Line::new(Point::new(0, 1000), Point::new(1000, 0));
        assert_eq!(a.intersection(&b), Some(Point::new(500, 500)));
        assert!(a.intersects(&b));

        let c = Line::new(Point::new(2000, 0), Point::new(3000, 0));
        assert!(a.intersection(&c).is_none());
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_collinear_overlap_intersects() {
        let base = Line::new(Point::new(0, 0), Point::new(100, 0));
        assert!(base.intersects(&Line::new(Point::new(50, 0), Point::new(150, 0))));
        assert!(!base.intersects(&Line::new(Point::new(101, 0), Point::new(150, 0))));
        // Parallel segments have no crossing parameter even when they overlap.
        assert!(base
            .intersection_param(&Line::new(Point::new(50, 0), Point::new(150, 0)))
            .is_none());
    }
}
