//! Area type: a flat collection of oriented contours.

use super::{BoundingBox, Line, Point, Polygon};
use crate::clipper::{self, OffsetJoinType};
use crate::{Coord, CoordF};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

/// A planar area described by closed contours.
///
/// Counter-clockwise contours enclose material, clockwise contours are holes.
/// Containment uses the even-odd rule over all contours, so a nested hole
/// punches through its enclosing outline. Sets produced by boolean operations
/// and offsets are normalised: no overlaps, outer contours CCW, holes CW.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolygonSet {
    polygons: Vec<Polygon>,
}

impl PolygonSet {
    /// An empty area.
    #[inline]
    pub fn new() -> Self {
        Self {
            polygons: Vec::new(),
        }
    }

    #[inline]
    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    #[inline]
    pub fn into_polygons(self) -> Vec<Polygon> {
        self.polygons
    }

    #[inline]
    pub fn push(&mut self, polygon: Polygon) {
        self.polygons.push(polygon);
    }

    pub fn extend(&mut self, other: PolygonSet) {
        self.polygons.extend(other.polygons);
    }

    /// Net area in scaled units squared (holes subtract).
    pub fn area(&self) -> CoordF {
        self.polygons.iter().map(|p| p.area()).sum()
    }

    /// Even-odd containment over all contours.
    pub fn contains_point(&self, p: &Point) -> bool {
        self.polygons
            .iter()
            .filter(|poly| poly.contains_point(p))
            .count()
            % 2
            == 1
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut bb = BoundingBox::new();
        for poly in &self.polygons {
            bb.merge(&poly.bounding_box());
        }
        bb
    }

    /// Union with another area.
    pub fn union(&self, other: &PolygonSet) -> PolygonSet {
        clipper::union(self, other)
    }

    /// Merge overlapping contours.
    pub fn union_self(&self) -> PolygonSet {
        clipper::union_self(self)
    }

    pub fn difference(&self, other: &PolygonSet) -> PolygonSet {
        clipper::difference(self, other)
    }

    pub fn intersection(&self, other: &PolygonSet) -> PolygonSet {
        clipper::intersection(self, other)
    }

    /// Offset by `delta` scaled units with mitered corners.
    pub fn offset(&self, delta: Coord) -> PolygonSet {
        clipper::offset(self, delta, OffsetJoinType::Miter)
    }

    /// Connected components, each an outer contour with its holes.
    pub fn split_into_islands(&self) -> Vec<PolygonSet> {
        clipper::split_into_parts(self)
    }

    /// Drop components whose net area is below `min_area` (scaled units squared).
    pub fn remove_small_areas(&self, min_area: CoordF) -> PolygonSet {
        let mut result = PolygonSet::new();
        for part in self.split_into_islands() {
            if part.area() >= min_area {
                result.extend(part);
            }
        }
        result
    }

    /// Optimise every contour and drop the ones left with fewer than three
    /// points.
    pub fn optimize(&mut self) {
        for poly in &mut self.polygons {
            poly.optimize();
        }
        self.polygons.retain(|p| p.is_valid());
    }

    /// Total contour length (scaled units).
    pub fn length(&self) -> CoordF {
        self.polygons.iter().map(|p| p.length()).sum()
    }

    /// Parts of `lines` inside this area.
    pub fn clip_lines(&self, lines: &[Line]) -> Vec<Line> {
        clipper::clip_lines(lines, self)
    }

    /// Parts of `lines` outside this area.
    pub fn clip_lines_outside(&self, lines: &[Line]) -> Vec<Line> {
        clipper::clip_lines_outside(lines, self)
    }

    /// True if the segment `a -> b` crosses any contour.
    pub fn crosses_boundary(&self, a: Point, b: Point) -> bool {
        let segment = Line::new(a, b);
        self.polygons
            .iter()
            .flat_map(|p| p.edges())
            .any(|edge| edge.intersects(&segment))
    }
}

impl Deref for PolygonSet {
    type Target = Vec<Polygon>;

    fn deref(&self) -> &Self::Target {
        &self.polygons
    }
}

impl DerefMut for PolygonSet {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.polygons
    }
}

impl From<Polygon> for PolygonSet {
    fn from(polygon: Polygon) -> Self {
        Self {
            polygons: vec![polygon],
        }
    }
}

impl From<Vec<Polygon>> for PolygonSet {
    fn from(polygons: Vec<Polygon>) -> Self {
        Self { polygons }
    }
}

impl FromIterator<Polygon> for PolygonSet {
    fn from_iter<I: IntoIterator<Item = Polygon>>(iter: I) -> Self {
        Self {
            polygons: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for PolygonSet {
    type Item = Polygon;
    type IntoIter = std::vec::IntoIter<Polygon>;

    fn into_iter(self) -> Self::IntoIter {
        self.polygons.into_iter()
    }
}

impl<'a> IntoIterator for &'a PolygonSet {
    type Item = &'a Polygon;
    type IntoIter = std::slice::Iter<'a, Polygon>;

    fn into_iter(self) -> Self::IntoIter {
        self.polygons.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{scale, SCALING_FACTOR};

    fn make_square_mm(x: f64, y: f64, size: f64) -> PolygonSet {
        PolygonSet::from(Polygon::rectangle(
            Point::new_scale(x, y),
            Point::new_scale(x + size, y + size),
        ))
    }

    #[test]
    fn test_contains_point_with_hole() {
        let ring = make_square_mm(0.0, 0.0, 20.0).difference(&make_square_mm(5.0, 5.0, 10.0));
        assert!(ring.contains_point(&Point::new_scale(2.0, 2.0)));
        assert!(!ring.contains_point(&Point::new_scale(10.0, 10.0)));
        assert!(!ring.contains_point(&Point::new_scale(30.0, 10.0)));
    }

    #[test]
    fn test_remove_small_areas() {
        let mut set = make_square_mm(0.0, 0.0, 10.0);
        set.extend(make_square_mm(20.0, 0.0, 0.5));
        let filtered = set.remove_small_areas(scale(1.0) as f64 * scale(1.0) as f64);
        assert_eq!(filtered.len(), 1);
        assert!((filtered.area() / (SCALING_FACTOR * SCALING_FACTOR) - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_optimize_drops_degenerate() {
        let mut set = make_square_mm(0.0, 0.0, 10.0);
        set.push(Polygon::from_points(vec![Point::new(0, 0), Point::new(3, 0), Point::new(0, 3)]));
        set.optimize();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_crosses_boundary() {
        let square = make_square_mm(0.0, 0.0, 10.0);
        assert!(square.crosses_boundary(Point::new_scale(5.0, 5.0), Point::new_scale(15.0, 5.0)));
        assert!(!square.crosses_boundary(Point::new_scale(2.0, 2.0), Point::new_scale(8.0, 8.0)));
    }

    #[test]
    fn test_offset_is_inside() {
        let square = make_square_mm(0.0, 0.0, 10.0);
        let inner = square.offset(-scale(1.0));
        assert!(inner.difference(&square).is_empty());
        assert!(!inner.is_empty());
    }
}
