//! Closed polygon contour.
//!
//! Orientation carries meaning: counter-clockwise contours enclose material,
//! clockwise contours are holes.

use super::{BoundingBox, Line, Point};
use crate::{Coord, CoordF};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Points closer than this (scaled units) to their predecessor are dropped by
/// [`Polygon::optimize`].
pub const MIN_EDGE_LENGTH: Coord = 10;

/// Cosine below which a vertex counts as a straight pass-through.
const STRAIGHT_COS: CoordF = -0.999_999_99;

/// A closed polygon. The closing edge from the last point back to the first is
/// implicit.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Polygon {
    points: Vec<Point>,
}

impl Polygon {
    /// Create an empty polygon.
    #[inline]
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Create a polygon from points.
    #[inline]
    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Axis-aligned rectangle, counter-clockwise.
    pub fn rectangle(min: Point, max: Point) -> Self {
        Self::from_points(vec![
            min,
            Point::new(max.x, min.y),
            max,
            Point::new(min.x, max.y),
        ])
    }

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[inline]
    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    #[inline]
    pub fn push(&mut self, p: Point) {
        self.points.push(p);
    }

    /// A polygon needs at least three vertices to enclose anything.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.points.len() >= 3
    }

    /// Signed area (shoelace) in scaled units squared. Positive for CCW.
    pub fn area(&self) -> CoordF {
        if self.points.len() < 3 {
            return 0.0;
        }
        let mut sum: i128 = 0;
        let n = self.points.len();
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            sum += a.cross(&b);
        }
        sum as CoordF * 0.5
    }

    /// Whether the contour is counter-clockwise (solid).
    #[inline]
    pub fn is_counter_clockwise(&self) -> bool {
        self.area() > 0.0
    }

    /// Reverse the vertex order, flipping orientation.
    #[inline]
    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    /// Force counter-clockwise orientation. Returns true if it was flipped.
    pub fn make_counter_clockwise(&mut self) -> bool {
        if self.area() < 0.0 {
            self.reverse();
            true
        } else {
            false
        }
    }

    /// Force clockwise orientation. Returns true if it was flipped.
    pub fn make_clockwise(&mut self) -> bool {
        if self.area() > 0.0 {
            self.reverse();
            true
        } else {
            false
        }
    }

    /// Perimeter length including the closing edge (scaled units).
    pub fn length(&self) -> CoordF {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| self.points[i].distance(&self.points[(i + 1) % n]))
            .sum()
    }

    /// All edges including the closing one.
    pub fn edges(&self) -> Vec<Line> {
        let n = self.points.len();
        if n < 2 {
            return Vec::new();
        }
        (0..n)
            .map(|i| Line::new(self.points[i], self.points[(i + 1) % n]))
            .collect()
    }

    /// Even-odd point containment by ray casting. Boundary points may land on
    /// either side.
    pub fn contains_point(&self, p: &Point) -> bool {
        let n = self.points.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let pi = self.points[i];
            let pj = self.points[j];
            if (pi.y > p.y) != (pj.y > p.y) {
                // x of the edge at height p.y, compared without division
                let lhs = (p.x - pi.x) as i128 * (pj.y - pi.y) as i128;
                let rhs = (pj.x - pi.x) as i128 * (p.y - pi.y) as i128;
                let crosses = if pj.y > pi.y { lhs < rhs } else { lhs > rhs };
                if crosses {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Index of the vertex nearest to `p`.
    pub fn closest_index(&self, p: Point) -> Option<usize> {
        self.points
            .iter()
            .enumerate()
            .min_by_key(|(_, q)| q.distance_squared(&p))
            .map(|(i, _)| i)
    }

    /// Drop vertices that are too close to their predecessor or that lie on a
    /// straight line between their neighbours.
    ///
    /// The result may have fewer than three points; callers discard those.
    pub fn optimize(&mut self) {
        // Removing the last vertex changes what vertex 0 is judged against.
        while self.optimize_pass() {}
    }

    /// One sweep over the loop. Returns true if any vertex was removed.
    fn optimize_pass(&mut self) -> bool {
        let Some(&last) = self.points.last() else {
            return false;
        };
        let before = self.points.len();
        let mut i = 0;
        let mut p0 = last;
        while i < self.points.len() {
            let p1 = self.points[i];
            if (p1 - p0).is_shorter_than(MIN_EDGE_LENGTH) {
                self.points.remove(i);
                continue;
            }
            let p2 = self.points[(i + 1) % self.points.len()];
            let d0 = p0 - p1;
            let d2 = p2 - p1;
            let len = d0.length_f() * d2.length_f();
            if len > 0.0 && (d0.dot(&d2) as CoordF / len) < STRAIGHT_COS {
                self.points.remove(i);
                continue;
            }
            p0 = p1;
            i += 1;
        }
        self.points.len() < before
    }

    /// Copy rotated around the origin by `angle` radians.
    pub fn rotated(&self, angle: CoordF) -> Self {
        Self::from_points(self.points.iter().map(|p| p.rotated(angle)).collect())
    }

    /// Get the bounding box.
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&self.points)
    }

    /// Rotate the vertex list so that it starts at `index`.
    pub fn rotate_start(&mut self, index: usize) {
        if index < self.points.len() {
            self.points.rotate_left(index);
        }
    }
}

impl fmt::Debug for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Polygon({} points)", self.points.len())
    }
}

impl Deref for Polygon {
    type Target = [Point];

    fn deref(&self) -> &Self::Target {
        &self.points
    }
}

impl DerefMut for Polygon {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.points
    }
}

impl From<Vec<Point>> for Polygon {
    fn from(points: Vec<Point>) -> Self {
        Self::from_points(points)
    }
}

impl FromIterator<Point> for Polygon {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}
