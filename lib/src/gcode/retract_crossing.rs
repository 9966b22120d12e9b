//! Retract when crossing the island boundary.
//!
//! While printing an island the planner knows its avoid-crossing boundary:
//! the outline pulled in by one outer wall width. A travel that starts and
//! ends inside that boundary without crossing any of its contours only passes
//! over the island's own interior, so stringing stays hidden and retraction
//! can be skipped.

use crate::geometry::{lines_intersect, BoundingBox, Line, Point, PolygonSet};

/// Result of checking whether retraction is needed for a travel move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetractDecision {
    /// Retraction is needed (travel leaves the boundary).
    Retract,
    /// No retraction needed (travel stays inside).
    NoRetract,
}

impl RetractDecision {
    /// Returns true if retraction should be performed.
    #[inline]
    pub fn should_retract(&self) -> bool {
        matches!(self, RetractDecision::Retract)
    }
}

/// Caches the contour edges of one boundary for repeated travel checks.
#[derive(Debug, Clone, Default)]
pub struct RetractWhenCrossingBoundary {
    boundary: PolygonSet,
    edges: Vec<Line>,
    bbox: BoundingBox,
}

impl RetractWhenCrossingBoundary {
    pub fn new(boundary: PolygonSet) -> Self {
        let edges = boundary.iter().flat_map(|p| p.edges()).collect();
        let bbox = boundary.bounding_box();
        Self {
            boundary,
            edges,
            bbox,
        }
    }

    pub fn boundary(&self) -> &PolygonSet {
        &self.boundary
    }

    /// Decide whether the travel `from -> to` needs a retraction.
    pub fn check_travel(&self, from: Point, to: Point) -> RetractDecision {
        if from == to {
            return RetractDecision::NoRetract;
        }
        if self.edges.is_empty() {
            return RetractDecision::Retract;
        }
        if !self.bbox.contains(&from) || !self.bbox.contains(&to) {
            return RetractDecision::Retract;
        }
        if !self.boundary.contains_point(&from) || !self.boundary.contains_point(&to) {
            return RetractDecision::Retract;
        }
        if self.crosses(from, to) {
            return RetractDecision::Retract;
        }
        RetractDecision::NoRetract
    }

    fn crosses(&self, from: Point, to: Point) -> bool {
        let travel_box = BoundingBox::from_points(&[from, to]);
        self.edges.iter().any(|edge| {
            BoundingBox::from_points(&[edge.a, edge.b]).overlaps(&travel_box)
                && lines_intersect(from, to, edge.a, edge.b)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;
    use crate::scale;

    fn make_square_mm(x: f64, y: f64, size: f64) -> PolygonSet {
        Polygon::rectangle(
            Point::new(scale(x), scale(y)),
            Point::new(scale(x + size), scale(y + size)),
        )
        .into()
    }

    fn pt(x: f64, y: f64) -> Point {
        Point::new(scale(x), scale(y))
    }

    #[test]
    fn test_retract_decision() {
        assert!(RetractDecision::Retract.should_retract());
        assert!(!RetractDecision::NoRetract.should_retract());
    }

    #[test]
    fn test_travel_inside_boundary() {
        let checker = RetractWhenCrossingBoundary::new(make_square_mm(0.0, 0.0, 10.0));
        assert_eq!(
            checker.check_travel(pt(1.0, 1.0), pt(9.0, 9.0)),
            RetractDecision::NoRetract
        );
    }

    #[test]
    fn test_travel_leaving_boundary() {
        let checker = RetractWhenCrossingBoundary::new(make_square_mm(0.0, 0.0, 10.0));
        assert_eq!(
            checker.check_travel(pt(1.0, 1.0), pt(15.0, 5.0)),
            RetractDecision::Retract
        );
    }

    #[test]
    fn test_travel_crossing_hole() {
        let mut area = make_square_mm(0.0, 0.0, 20.0);
        let mut hole = Polygon::rectangle(pt(8.0, 0.5), pt(12.0, 19.5));
        hole.make_clockwise();
        area.push(hole);
        let checker = RetractWhenCrossingBoundary::new(area);
        // Both ends inside, but the straight line passes over the hole.
        assert_eq!(
            checker.check_travel(pt(2.0, 10.0), pt(18.0, 10.0)),
            RetractDecision::Retract
        );
        assert_eq!(
            checker.check_travel(pt(2.0, 10.0), pt(6.0, 2.0)),
            RetractDecision::NoRetract
        );
    }

    #[test]
    fn test_empty_boundary() {
        let checker = RetractWhenCrossingBoundary::default();
        assert!(checker.check_travel(pt(0.0, 0.0), pt(1.0, 0.0)).should_retract());
        assert!(!checker.check_travel(pt(1.0, 0.0), pt(1.0, 0.0)).should_retract());
    }
}
