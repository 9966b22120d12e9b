//! Open paths.
//!
//! Hatching, support lines and bridge lines travel through the planner as
//! polylines; wall loops stay [`Polygon`]s until they are split on support.

use super::{Line, Point, Polygon};
use crate::CoordF;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// A path from its first point to its last, never implicitly closed.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<Point>,
}

impl Polyline {
    #[inline]
    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    #[inline]
    pub fn from_line(line: Line) -> Self {
        Self {
            points: vec![line.a, line.b],
        }
    }

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Extend the path to `point`.
    #[inline]
    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Panics when empty; hatching never produces empty paths.
    #[inline]
    pub fn first_point(&self) -> Point {
        self.points[0]
    }

    /// Panics when empty.
    #[inline]
    pub fn last_point(&self) -> Point {
        self.points[self.points.len() - 1]
    }

    pub fn edges(&self) -> Vec<Line> {
        self.points
            .windows(2)
            .map(|pair| Line::new(pair[0], pair[1]))
            .collect()
    }

    /// Path length in scaled units.
    pub fn length(&self) -> CoordF {
        self.points
            .windows(2)
            .map(|pair| pair[0].distance(&pair[1]))
            .sum()
    }
}

impl fmt::Debug for Polyline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Polyline[{}]", self.points.len())
    }
}

impl Deref for Polyline {
    type Target = [Point];

    fn deref(&self) -> &Self::Target {
        &self.points
    }
}

impl From<Polygon> for Polyline {
    /// Walks the whole loop: the first point is repeated at the end.
    fn from(polygon: Polygon) -> Self {
        let mut points = polygon.into_points();
        if let Some(&first) = points.first() {
            points.push(first);
        }
        Self { points }
    }
}
