//! Axis-aligned bounding box.

use super::Point;
use crate::Coord;
use serde::{Deserialize, Serialize};

/// An axis-aligned 2D bounding box in scaled coordinates.
///
/// An empty box (no points added) reports `defined == false`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
    pub defined: bool,
}

impl BoundingBox {
    /// An empty bounding box.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounding box of a set of points.
    pub fn from_points(points: &[Point]) -> Self {
        let mut bb = Self::new();
        for p in points {
            bb.merge_point(*p);
        }
        bb
    }

    /// Grow the box to include `p`.
    pub fn merge_point(&mut self, p: Point) {
        if !self.defined {
            self.min = p;
            self.max = p;
            self.defined = true;
            return;
        }
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    /// Grow the box to include another box.
    pub fn merge(&mut self, other: &BoundingBox) {
        if other.defined {
            self.merge_point(other.min);
            self.merge_point(other.max);
        }
    }

    /// Expand in all directions by `delta`.
    pub fn offset(&mut self, delta: Coord) {
        if self.defined {
            self.min.x -= delta;
            self.min.y -= delta;
            self.max.x += delta;
            self.max.y += delta;
        }
    }

    #[inline]
    pub fn width(&self) -> Coord {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> Coord {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn center(&self) -> Point {
        Point::new((self.min.x + self.max.x) / 2, (self.min.y + self.max.y) / 2)
    }

    /// Inclusive containment test.
    #[inline]
    pub fn contains(&self, p: &Point) -> bool {
        self.defined && p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// True if the two boxes share any point.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        self.defined
            && other.defined
            && self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }
}
