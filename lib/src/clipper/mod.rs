//! Clipper polygon boolean operations module.
//!
//! Boolean operations (union, intersection, difference) and offsets on
//! [`PolygonSet`] areas, delegated to the geo-clipper library, plus exact
//! line-versus-area clipping used for hatching.
//!
//! The set representation is flat (outer contours counter-clockwise, holes
//! clockwise). Before handing a set to clipper, each hole is nested into the
//! smallest outer contour that contains it.

use crate::geometry::{Line, Point, Polygon, PolygonSet};
use crate::{scale, unscale, Coord, CoordF};
use geo::{Coord as GeoCoord, LineString, MultiPolygon, Polygon as GeoPolygon};
use geo_clipper::{Clipper, EndType, JoinType};

/// Clipper works on mm floats; this factor maps them back onto the µm grid
/// exactly.
const CLIPPER_FACTOR: CoordF = 1000.0;

/// Join type for offset corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetJoinType {
    /// Square corners
    Square,
    /// Round corners
    Round,
    /// Mitered corners
    #[default]
    Miter,
}

impl From<OffsetJoinType> for JoinType {
    fn from(jt: OffsetJoinType) -> Self {
        match jt {
            OffsetJoinType::Square => JoinType::Square,
            OffsetJoinType::Round => JoinType::Round(0.25),
            OffsetJoinType::Miter => JoinType::Miter(2.0),
        }
    }
}

fn ring_to_geo(poly: &Polygon) -> LineString<f64> {
    let mut ring: Vec<GeoCoord<f64>> = poly
        .points()
        .iter()
        .map(|p| GeoCoord {
            x: unscale(p.x),
            y: unscale(p.y),
        })
        .collect();

    // Close the ring if needed
    if let (Some(first), Some(last)) = (ring.first(), ring.last()) {
        if first != last {
            ring.push(*first);
        }
    }
    LineString::new(ring)
}

fn geo_to_ring(ring: &LineString<f64>) -> Polygon {
    let mut points: Vec<Point> = ring
        .coords()
        .map(|c| Point::new(scale(c.x), scale(c.y)))
        .collect();

    // Our Polygon does not store the closing point
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    Polygon::from_points(points)
}

/// Group a flat set into exterior/holes pairs for geo.
///
/// Holes with no enclosing contour are dropped: they subtract from nothing.
fn set_to_geo(set: &PolygonSet) -> MultiPolygon<f64> {
    let mut outers: Vec<(Polygon, CoordF, Vec<Polygon>)> = Vec::new();
    let mut holes: Vec<Polygon> = Vec::new();

    for poly in set.iter().filter(|p| p.is_valid()) {
        let area = poly.area();
        if area > 0.0 {
            outers.push((poly.clone(), area, Vec::new()));
        } else if area < 0.0 {
            holes.push(poly.clone());
        }
    }

    for hole in holes {
        let sample = hole[0];
        let parent = outers
            .iter_mut()
            .filter(|(outer, _, _)| outer.contains_point(&sample))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((_, _, children)) = parent {
            children.push(hole);
        }
    }

    MultiPolygon::new(
        outers
            .iter()
            .map(|(outer, _, children)| {
                GeoPolygon::new(ring_to_geo(outer), children.iter().map(ring_to_geo).collect())
            })
            .collect(),
    )
}

/// One geo polygon as a normalised set: exterior CCW, holes CW, degenerate
/// contours removed.
fn geo_polygon_to_set(geo_poly: &GeoPolygon<f64>) -> PolygonSet {
    let mut result = PolygonSet::new();
    let mut exterior = geo_to_ring(geo_poly.exterior());
    if !exterior.is_valid() {
        return result;
    }
    exterior.make_counter_clockwise();
    result.push(exterior);
    for interior in geo_poly.interiors() {
        let mut hole = geo_to_ring(interior);
        if hole.is_valid() {
            hole.make_clockwise();
            result.push(hole);
        }
    }
    result
}

fn geo_to_set(multi: &MultiPolygon<f64>) -> PolygonSet {
    let mut result = PolygonSet::new();
    for geo_poly in &multi.0 {
        result.extend(geo_polygon_to_set(geo_poly));
    }
    result
}

// ============================================================================
// Boolean Operations
// ============================================================================

/// Union of two areas.
pub fn union(subject: &PolygonSet, clip: &PolygonSet) -> PolygonSet {
    if subject.is_empty() && clip.is_empty() {
        return PolygonSet::new();
    }
    let result = set_to_geo(subject).union(&set_to_geo(clip), CLIPPER_FACTOR);
    geo_to_set(&result)
}

/// Merge overlapping contours of a single set.
pub fn union_self(set: &PolygonSet) -> PolygonSet {
    union(set, &PolygonSet::new())
}

/// Intersection of two areas.
pub fn intersection(subject: &PolygonSet, clip: &PolygonSet) -> PolygonSet {
    if subject.is_empty() || clip.is_empty() {
        return PolygonSet::new();
    }
    let result = set_to_geo(subject).intersection(&set_to_geo(clip), CLIPPER_FACTOR);
    geo_to_set(&result)
}

/// Difference of two areas (subject - clip).
pub fn difference(subject: &PolygonSet, clip: &PolygonSet) -> PolygonSet {
    if subject.is_empty() {
        return PolygonSet::new();
    }
    if clip.is_empty() {
        return union_self(subject);
    }
    let result = set_to_geo(subject).difference(&set_to_geo(clip), CLIPPER_FACTOR);
    geo_to_set(&result)
}

/// Split an area into its connected components, each one outer contour plus
/// the holes inside it.
pub fn split_into_parts(set: &PolygonSet) -> Vec<PolygonSet> {
    if set.is_empty() {
        return Vec::new();
    }
    let normalized = set_to_geo(set).union(&MultiPolygon::new(Vec::new()), CLIPPER_FACTOR);
    normalized
        .0
        .iter()
        .map(geo_polygon_to_set)
        .filter(|part| !part.is_empty())
        .collect()
}

// ============================================================================
// Offset Operations
// ============================================================================

/// Offset an area by `delta` scaled units.
///
/// Positive delta grows the area, negative delta shrinks it. Shrinking past
/// the area's half-width yields an empty set.
pub fn offset(set: &PolygonSet, delta: Coord, join_type: OffsetJoinType) -> PolygonSet {
    if set.is_empty() {
        return PolygonSet::new();
    }
    if delta == 0 {
        return union_self(set);
    }
    let result = set_to_geo(set).offset(
        unscale(delta),
        join_type.into(),
        EndType::ClosedPolygon,
        CLIPPER_FACTOR,
    );
    geo_to_set(&result)
}

// ============================================================================
// Line Clipping
// ============================================================================

/// Clip line segments against an area, keeping the parts inside.
///
/// Every crossing with a contour edge is computed exactly; the pieces between
/// consecutive crossings are classified by their midpoint.
pub fn clip_lines(lines: &[Line], area: &PolygonSet) -> Vec<Line> {
    clip_lines_impl(lines, area, true)
}

/// Clip line segments against an area, keeping the parts outside.
pub fn clip_lines_outside(lines: &[Line], area: &PolygonSet) -> Vec<Line> {
    if area.is_empty() {
        return lines.to_vec();
    }
    clip_lines_impl(lines, area, false)
}

fn clip_lines_impl(lines: &[Line], area: &PolygonSet, keep_inside: bool) -> Vec<Line> {
    if lines.is_empty() || area.is_empty() {
        return Vec::new();
    }

    let edges: Vec<Line> = area.iter().flat_map(|p| p.edges()).collect();
    let bbox = area.bounding_box();
    let mut result = Vec::new();

    for line in lines {
        let line_box = crate::geometry::BoundingBox::from_points(&[line.a, line.b]);
        if !line_box.overlaps(&bbox) {
            if !keep_inside {
                result.push(*line);
            }
            continue;
        }

        let mut params: Vec<CoordF> = vec![0.0, 1.0];
        params.extend(edges.iter().filter_map(|e| line.intersection_param(e)));
        params.sort_by(|a, b| a.total_cmp(b));
        params.dedup_by(|a, b| (*a - *b).abs() < 1e-12);

        let mut current: Option<Line> = None;
        for w in params.windows(2) {
            let a = line.point_at(w[0]);
            let b = line.point_at(w[1]);
            if a == b {
                continue;
            }
            let mid = line.point_at((w[0] + w[1]) * 0.5);
            if area.contains_point(&mid) != keep_inside {
                if let Some(piece) = current.take() {
                    result.push(piece);
                }
                continue;
            }
            current = Some(match current {
                Some(piece) => Line::new(piece.a, b),
                None => Line::new(a, b),
            });
        }
        if let Some(piece) = current {
            result.push(piece);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SCALING_FACTOR;

    fn make_square_mm(x: f64, y: f64, size: f64) -> PolygonSet {
        PolygonSet::from(Polygon::rectangle(
            Point::new_scale(x, y),
            Point::new_scale(x + size, y + size),
        ))
    }

    fn area_mm2(set: &PolygonSet) -> f64 {
        set.area() / (SCALING_FACTOR * SCALING_FACTOR)
    }

    #[test]
    fn test_offset_grow() {
        let square = make_square_mm(10.0, 10.0, 10.0);
        let grown = offset(&square, scale(1.0), OffsetJoinType::Miter);
        assert!((area_mm2(&grown) - 144.0).abs() < 0.01);
    }

    #[test]
    fn test_offset_shrink() {
        let square = make_square_mm(10.0, 10.0, 20.0);
        let shrunk = offset(&square, -scale(2.0), OffsetJoinType::Miter);
        assert!((area_mm2(&shrunk) - 256.0).abs() < 0.01);
    }

    #[test]
    fn test_offset_shrink_to_nothing() {
        let square = make_square_mm(10.0, 10.0, 2.0);
        let shrunk = offset(&square, -scale(2.0), OffsetJoinType::Miter);
        assert!(shrunk.is_empty());
    }

    #[test]
    fn test_union() {
        let a = make_square_mm(0.0, 0.0, 10.0);
        let b = make_square_mm(5.0, 0.0, 10.0);
        let result = union(&a, &b);
        assert_eq!(result.len(), 1);
        assert!((area_mm2(&result) - 150.0).abs() < 0.01);
    }

    #[test]
    fn test_intersection() {
        let a = make_square_mm(0.0, 0.0, 10.0);
        let b = make_square_mm(5.0, 0.0, 10.0);
        let result = intersection(&a, &b);
        assert!((area_mm2(&result) - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_intersection_no_overlap() {
        let a = make_square_mm(0.0, 0.0, 10.0);
        let b = make_square_mm(20.0, 0.0, 10.0);
        assert!(intersection(&a, &b).is_empty());
    }

    #[test]
    fn test_difference_creates_hole() {
        let large = make_square_mm(0.0, 0.0, 20.0);
        let small = make_square_mm(5.0, 5.0, 10.0);
        let result = difference(&large, &small);
        assert_eq!(result.len(), 2);
        assert!((area_mm2(&result) - 300.0).abs() < 0.01);
        assert!(result[0].is_counter_clockwise());
        assert!(!result[1].is_counter_clockwise());
    }

    #[test]
    fn test_hole_survives_round_trip() {
        let large = make_square_mm(0.0, 0.0, 20.0);
        let small = make_square_mm(5.0, 5.0, 10.0);
        let ring = difference(&large, &small);
        let shrunk = offset(&ring, -scale(1.0), OffsetJoinType::Miter);
        // 18x18 outer minus 12x12 hole
        assert!((area_mm2(&shrunk) - (324.0 - 144.0)).abs() < 0.01);
    }

    #[test]
    fn test_split_into_parts() {
        let mut set = make_square_mm(0.0, 0.0, 10.0);
        set.extend(make_square_mm(20.0, 0.0, 10.0));
        let parts = split_into_parts(&set);
        assert_eq!(parts.len(), 2);
        for part in &parts {
            assert!((area_mm2(part) - 100.0).abs() < 0.01);
        }
    }

    #[test]
    fn test_clip_lines_inside() {
        let square = make_square_mm(0.0, 0.0, 10.0);
        let line = Line::from_coords_scale(-5.0, 5.0, 15.0, 5.0);
        let clipped = clip_lines(&[line], &square);
        assert_eq!(clipped.len(), 1);
        assert_eq!(clipped[0].a, Point::new_scale(0.0, 5.0));
        assert_eq!(clipped[0].b, Point::new_scale(10.0, 5.0));
    }

    #[test]
    fn test_clip_lines_with_hole() {
        let ring = difference(&make_square_mm(0.0, 0.0, 20.0), &make_square_mm(5.0, 5.0, 10.0));
        let line = Line::from_coords_scale(-1.0, 10.0, 21.0, 10.0);
        let inside = clip_lines(&[line], &ring);
        assert_eq!(inside.len(), 2);
        let total: f64 = inside.iter().map(|l| l.length()).sum();
        assert!((total - scale(10.0) as f64).abs() < 2.0);

        let outside = clip_lines_outside(&[line], &ring);
        assert_eq!(outside.len(), 3);
    }

    #[test]
    fn test_clip_lines_miss() {
        let square = make_square_mm(0.0, 0.0, 10.0);
        let line = Line::from_coords_scale(-5.0, 15.0, 15.0, 15.0);
        assert!(clip_lines(&[line], &square).is_empty());
        assert_eq!(clip_lines_outside(&[line], &square).len(), 1);
    }
}
