//! Infill pattern generation module.
//!
//! This module provides implementations for the infill patterns:
//! - Lines (parallel lines, rotated 90° on odd layers)
//! - Grid (two crossing line families)
//! - Triangles (three line families 60° apart)
//! - Hexagon (honeycomb, phase-shifted per layer)
//! - Concentric (inward offset loops)
//!
//! # Algorithm
//!
//! 1. Start with the fill area (from the island model)
//! 2. Generate the pattern covering the area's bounding box on a global grid,
//!    so neighbouring islands and layers line up
//! 3. Clip the pattern to the area by exact segment/contour intersection
//!
//! Ordering is left to [`crate::order::PathOrderOptimizer`].

use crate::config::InfillPattern;
use crate::geometry::{BoundingBox, Line, Point, Polygon, PolygonSet, Polyline};
use crate::{Coord, CoordF};

/// A single infill path (either a line or a polygon loop).
#[derive(Debug, Clone, PartialEq)]
pub enum InfillPath {
    /// A linear path (open polyline).
    Line(Polyline),
    /// A closed loop (polygon).
    Loop(Polygon),
}

impl InfillPath {
    /// Get the path as points.
    pub fn points(&self) -> &[Point] {
        match self {
            InfillPath::Line(polyline) => polyline.points(),
            InfillPath::Loop(polygon) => polygon.points(),
        }
    }
}

/// Distance between neighbouring lines for `density_percent` coverage with
/// lines `line_width` wide. `None` when nothing should be printed.
pub fn line_spacing(line_width: Coord, density_percent: CoordF) -> Option<Coord> {
    if density_percent <= 0.0 || line_width <= 0 {
        return None;
    }
    if density_percent >= 100.0 {
        return Some(line_width);
    }
    Some((line_width as CoordF * 100.0 / density_percent).round() as Coord)
}

/// Generate infill for `area`.
///
/// `base_angle` is in degrees. `extend` grows the area before clipping line
/// patterns so their ends overlap the innermost wall.
pub fn generate_infill(
    pattern: InfillPattern,
    area: &PolygonSet,
    line_width: Coord,
    density_percent: CoordF,
    base_angle: CoordF,
    extend: Coord,
    layer_index: usize,
) -> Vec<InfillPath> {
    if area.is_empty() {
        return Vec::new();
    }
    let spacing = match line_spacing(line_width, density_percent) {
        Some(s) => s,
        None => return Vec::new(),
    };
    let angle = base_angle + if layer_index % 2 == 1 { 90.0 } else { 0.0 };

    let lines = |spacing: Coord, angles: &[CoordF]| -> Vec<InfillPath> {
        angles
            .iter()
            .flat_map(|a| generate_line_paths(area, spacing, extend, angle + a))
            .map(InfillPath::Line)
            .collect()
    };

    match pattern {
        InfillPattern::Lines => lines(spacing, &[0.0]),
        // Each family carries its share of the density.
        InfillPattern::Grid => lines(spacing * 2, &[0.0, 90.0]),
        InfillPattern::Triangles => lines(spacing * 3, &[0.0, 60.0, 120.0]),
        InfillPattern::Hexagon => generate_hexagon(area, spacing, extend, base_angle, layer_index),
        InfillPattern::Concentric => generate_concentric(area, line_width, spacing),
    }
}

/// Hatch `area` with parallel lines `line_spacing` apart running at
/// `angle_degrees`, after growing the area by `extend`.
///
/// Lines lie on a grid anchored at the origin and come out ordered across the
/// area, every line pointing the same way.
pub fn generate_line_paths(
    area: &PolygonSet,
    line_spacing: Coord,
    extend: Coord,
    angle_degrees: CoordF,
) -> Vec<Polyline> {
    if area.is_empty() || line_spacing <= 0 {
        return Vec::new();
    }
    let clip_area = if extend != 0 {
        area.offset(extend)
    } else {
        area.clone()
    };
    let bbox = clip_area.bounding_box();
    if !bbox.defined {
        return Vec::new();
    }

    let raw = hatch_lines(&bbox, line_spacing, angle_degrees);
    clip_area
        .clip_lines(&raw)
        .into_iter()
        .filter(|l| l.a != l.b)
        .map(Polyline::from_line)
        .collect()
}

/// Parallel lines covering `bbox`, centred between grid multiples of `spacing`.
fn hatch_lines(bbox: &BoundingBox, spacing: Coord, angle_degrees: CoordF) -> Vec<Line> {
    let (sin, cos) = angle_degrees.to_radians().sin_cos();
    let corners = [
        bbox.min,
        Point::new(bbox.max.x, bbox.min.y),
        bbox.max,
        Point::new(bbox.min.x, bbox.max.y),
    ];

    let mut min_along = CoordF::MAX;
    let mut max_along = CoordF::MIN;
    let mut min_across = CoordF::MAX;
    let mut max_across = CoordF::MIN;
    for p in &corners {
        let (x, y) = (p.x as CoordF, p.y as CoordF);
        let along = x * cos + y * sin;
        let across = -x * sin + y * cos;
        min_along = min_along.min(along);
        max_along = max_along.max(along);
        min_across = min_across.min(across);
        max_across = max_across.max(across);
    }

    let s = spacing as CoordF;
    let first = (min_across / s).floor() as i64 - 1;
    let last = (max_across / s).ceil() as i64;
    let start = min_along - s;
    let end = max_along + s;
    let to_world = |along: CoordF, across: CoordF| {
        Point::new(
            (along * cos - across * sin).round() as Coord,
            (along * sin + across * cos).round() as Coord,
        )
    };

    (first..=last)
        .map(|k| {
            let across = (k as CoordF + 0.5) * s;
            Line::new(to_world(start, across), to_world(end, across))
        })
        .collect()
}

/// Honeycomb infill.
///
/// Hexagons are pointy-topped with side `L = 2·spacing/√3`, which gives the
/// same line length per area as straight lines at `spacing`. Each row is a
/// zigzag joined to the next row by vertical edges; odd layers shift the cells
/// by half a cell.
fn generate_hexagon(
    area: &PolygonSet,
    spacing: Coord,
    extend: Coord,
    angle_degrees: CoordF,
    layer_index: usize,
) -> Vec<InfillPath> {
    let clip_area = if extend != 0 {
        area.offset(extend)
    } else {
        area.clone()
    };
    let angle = angle_degrees.to_radians();

    // Work in a frame rotated by -angle.
    let mut local = BoundingBox::new();
    for poly in clip_area.iter() {
        for p in poly.iter() {
            local.merge_point(p.rotated(-angle));
        }
    }
    if !local.defined {
        return Vec::new();
    }

    let side = 2.0 * spacing as CoordF / 3.0_f64.sqrt();
    let half_width = side * 3.0_f64.sqrt() / 2.0;
    let row_height = 1.5 * side;
    let phase = (layer_index % 2) as i64;

    let first_col = (local.min.x as CoordF / half_width).floor() as i64 - 1;
    let last_col = (local.max.x as CoordF / half_width).ceil() as i64 + 1;
    let first_row = (local.min.y as CoordF / row_height).floor() as i64 - 1;
    let last_row = (local.max.y as CoordF / row_height).ceil() as i64;

    let point = |col: i64, y: CoordF| {
        Point::new((col as CoordF * half_width).round() as Coord, y.round() as Coord)
            .rotated(angle)
    };
    let is_high = |col: i64, row: i64| (col + row + phase).rem_euclid(2) == 1;

    let mut segments = Vec::new();
    for row in first_row..=last_row {
        let base = row as CoordF * row_height;
        let y_of = |col: i64| if is_high(col, row) { base + side / 2.0 } else { base };
        for col in first_col..last_col {
            segments.push(Line::new(point(col, y_of(col)), point(col + 1, y_of(col + 1))));
        }
        for col in first_col..=last_col {
            if is_high(col, row) {
                segments.push(Line::new(
                    point(col, base + side / 2.0),
                    point(col, base + row_height),
                ));
            }
        }
    }

    chain_segments(clip_area.clip_lines(&segments))
        .into_iter()
        .map(InfillPath::Line)
        .collect()
}

/// Join consecutive segments that share an endpoint into polylines.
pub(crate) fn chain_segments(segments: Vec<Line>) -> Vec<Polyline> {
    let mut result: Vec<Polyline> = Vec::new();
    for seg in segments.into_iter().filter(|l| l.a != l.b) {
        match result.last_mut() {
            Some(current) if current.points().last() == Some(&seg.a) => current.push(seg.b),
            _ => result.push(Polyline::from_line(seg)),
        }
    }
    result
}

/// Concentric loops, the first half a line width inside the area, then every
/// `spacing` further in until nothing is left.
fn generate_concentric(area: &PolygonSet, line_width: Coord, spacing: Coord) -> Vec<InfillPath> {
    let mut paths = Vec::new();
    let mut current = area.offset(-line_width / 2);
    current.optimize();

    while !current.is_empty() {
        paths.extend(current.iter().cloned().map(InfillPath::Loop));
        current = current.offset(-spacing);
        current.optimize();
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale;

    fn make_square_mm(x: f64, y: f64, size: f64) -> PolygonSet {
        Polygon::rectangle(
            Point::new(scale(x), scale(y)),
            Point::new(scale(x + size), scale(y + size)),
        )
        .into()
    }

    fn is_horizontal(path: &InfillPath) -> bool {
        let pts = path.points();
        pts.len() == 2 && (pts[0].y - pts[1].y).abs() <= 1
    }

    fn is_vertical(path: &InfillPath) -> bool {
        let pts = path.points();
        pts.len() == 2 && (pts[0].x - pts[1].x).abs() <= 1
    }

    #[test]
    fn test_line_spacing() {
        assert_eq!(line_spacing(scale(0.4), 0.0), None);
        assert_eq!(line_spacing(scale(0.4), 100.0), Some(scale(0.4)));
        assert_eq!(line_spacing(scale(0.4), 20.0), Some(scale(2.0)));
    }

    #[test]
    fn test_zero_density() {
        let area = make_square_mm(0.0, 0.0, 10.0);
        for pattern in [
            InfillPattern::Lines,
            InfillPattern::Grid,
            InfillPattern::Triangles,
            InfillPattern::Hexagon,
            InfillPattern::Concentric,
        ] {
            assert!(generate_infill(pattern, &area, scale(0.4), 0.0, 45.0, 0, 0).is_empty());
        }
    }

    #[test]
    fn test_full_density_lines() {
        let area = make_square_mm(0.0, 0.0, 10.0);
        let paths = generate_infill(InfillPattern::Lines, &area, scale(0.5), 100.0, 0.0, 0, 0);
        // 10mm / 0.5mm spacing
        assert_eq!(paths.len(), 20);
        assert!(paths.iter().all(is_horizontal));

        let mut ys: Vec<Coord> = paths.iter().map(|p| p.points()[0].y).collect();
        ys.sort();
        for pair in ys.windows(2) {
            assert_eq!(pair[1] - pair[0], scale(0.5));
        }
    }

    #[test]
    fn test_lines_rotate_on_odd_layers() {
        let area = make_square_mm(0.0, 0.0, 10.0);
        let even = generate_infill(InfillPattern::Lines, &area, scale(0.4), 20.0, 0.0, 0, 0);
        let odd = generate_infill(InfillPattern::Lines, &area, scale(0.4), 20.0, 0.0, 0, 1);
        assert!(!even.is_empty());
        assert!(even.iter().all(is_horizontal));
        assert!(odd.iter().all(is_vertical));
    }

    #[test]
    fn test_generate_grid() {
        let area = make_square_mm(0.0, 0.0, 20.0);
        let paths = generate_infill(InfillPattern::Grid, &area, scale(0.4), 20.0, 0.0, 0, 0);
        let horizontal = paths.iter().filter(|p| is_horizontal(p)).count();
        let vertical = paths.iter().filter(|p| is_vertical(p)).count();
        assert_eq!(horizontal, vertical);
        // Each family at twice the spacing: 20mm / 4mm
        assert_eq!(horizontal, 5);
    }

    #[test]
    fn test_generate_triangles() {
        let area = make_square_mm(0.0, 0.0, 20.0);
        let paths = generate_infill(InfillPattern::Triangles, &area, scale(0.4), 20.0, 0.0, 0, 0);
        assert!(paths.iter().any(is_horizontal));
        assert!(paths.iter().any(|p| !is_horizontal(p) && !is_vertical(p)));
    }

    #[test]
    fn test_lines_avoid_hole() {
        let mut area = make_square_mm(0.0, 0.0, 20.0);
        let mut hole = Polygon::rectangle(
            Point::new(scale(5.0), scale(5.0)),
            Point::new(scale(15.0), scale(15.0)),
        );
        hole.make_clockwise();
        area.push(hole);

        let paths = generate_line_paths(&area, scale(1.0), 0, 0.0);
        assert!(!paths.is_empty());
        let inside_hole = Point::new(scale(10.0), scale(10.0));
        for path in &paths {
            let line = Line::new(path.first_point(), path.last_point());
            assert!(line.distance_to_point(&inside_hole) > scale(4.0) as f64);
        }
    }

    #[test]
    fn test_extend_into_perimeter() {
        let area = make_square_mm(0.0, 0.0, 10.0);
        let plain = generate_line_paths(&area, scale(1.0), 0, 0.0);
        let extended = generate_line_paths(&area, scale(1.0), scale(0.1), 0.0);
        let min_x = |paths: &[Polyline]| paths.iter().map(|p| p.first_point().x).min();
        assert!((min_x(&plain).unwrap()).abs() <= 1);
        assert!((min_x(&extended).unwrap() + scale(0.1)).abs() <= 1);
    }

    #[test]
    fn test_generate_hexagon() {
        let area = make_square_mm(0.0, 0.0, 20.0);
        let even = generate_infill(InfillPattern::Hexagon, &area, scale(0.4), 20.0, 0.0, 0, 0);
        let odd = generate_infill(InfillPattern::Hexagon, &area, scale(0.4), 20.0, 0.0, 0, 1);
        assert!(!even.is_empty());
        assert_ne!(even, odd);
        for path in even.iter().chain(odd.iter()) {
            for p in path.points() {
                assert!(p.x >= -1 && p.x <= scale(20.0) + 1);
                assert!(p.y >= -1 && p.y <= scale(20.0) + 1);
            }
        }
    }

    #[test]
    fn test_generate_concentric() {
        let area = make_square_mm(0.0, 0.0, 10.0);
        let paths = generate_infill(InfillPattern::Concentric, &area, scale(0.5), 50.0, 0.0, 0, 0);
        assert!(paths.iter().all(|p| matches!(p, InfillPath::Loop(_))));
        // First loop at 0.25mm, then every 1mm while the square lasts.
        assert_eq!(paths.len(), 5);
    }

    #[test]
    fn test_empty_area() {
        let paths = generate_infill(
            InfillPattern::Grid,
            &PolygonSet::new(),
            scale(0.4),
            20.0,
            45.0,
            0,
            0,
        );
        assert!(paths.is_empty());
    }

    #[test]
    fn test_chain_segments() {
        let a = Point::new(0, 0);
        let b = Point::new(10, 5);
        let c = Point::new(20, 0);
        let d = Point::new(40, 0);
        let chained = chain_segments(vec![
            Line::new(a, b),
            Line::new(b, c),
            Line::new(c + Point::new(1, 0), d),
        ]);
        assert_eq!(chained.len(), 2);
        assert_eq!(chained[0].points(), &[a, b, c]);
    }
}
