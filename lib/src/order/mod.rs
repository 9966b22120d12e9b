//! Path ordering and seam placement.
//!
//! Ordering is a greedy nearest-unvisited walk from a reference position: not
//! an optimal tour, but cheap and fully deterministic. Ties are always broken
//! by input index so identical inputs give identical orders.
//!
//! Closed loops start at their seam vertex: the sharpest corner turning more
//! than [`SEAM_CORNER_MIN_DEGREES`], since a seam hides best in a corner.
//! Loops without such a corner start at the vertex closest to the reference.

use crate::geometry::{corner_angle_degrees, Point, Polygon, Polyline};
use crate::CoordF;

/// Minimum direction change (degrees) for a vertex to count as a seam corner.
pub const SEAM_CORNER_MIN_DEGREES: CoordF = 30.0;

/// Direction change at vertex `i`, rounded to 1/100 degree so that equal
/// corners compare equal.
fn turn_degrees(points: &[Point], i: usize) -> i64 {
    let n = points.len();
    let prev = points[(i + n - 1) % n];
    let next = points[(i + 1) % n];
    let interior = corner_angle_degrees(prev, points[i], next);
    ((180.0 - interior) * 100.0).round() as i64
}

/// Seam corners: indices of the sharpest qualifying corners.
fn sharpest_corners(polygon: &Polygon) -> Vec<usize> {
    let points = polygon.points();
    if points.len() < 3 {
        return Vec::new();
    }
    let threshold = (SEAM_CORNER_MIN_DEGREES * 100.0).round() as i64;
    let turns: Vec<i64> = (0..points.len()).map(|i| turn_degrees(points, i)).collect();
    let best = match turns.iter().copied().filter(|&t| t > threshold).max() {
        Some(best) => best,
        None => return Vec::new(),
    };
    (0..points.len()).filter(|&i| turns[i] == best).collect()
}

/// Seam vertex of a loop, independent of any reference position.
///
/// The sharpest qualifying corner, ties to the lowest index. Without a corner
/// the front-most vertex (lowest Y, then lowest X) is used so seams of similar
/// loops line up across layers.
pub fn best_edge_index(polygon: &Polygon) -> usize {
    if let Some(&first) = sharpest_corners(polygon).first() {
        return first;
    }
    polygon
        .points()
        .iter()
        .enumerate()
        .min_by(|(i1, a), (i2, b)| a.y.cmp(&b.y).then(a.x.cmp(&b.x)).then(i1.cmp(i2)))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Index of the vertex closest to `p`, ties to the lowest index.
pub fn closest_index(polygon: &Polygon, p: Point) -> usize {
    polygon.closest_index(p).unwrap_or(0)
}

/// Seam vertex of a loop as seen from `reference`: the sharpest corner, ties
/// broken by distance to `reference` then index; the closest vertex when the
/// loop has no corner.
pub fn seam_index(polygon: &Polygon, reference: Point) -> usize {
    let corners = sharpest_corners(polygon);
    if corners.is_empty() {
        return closest_index(polygon, reference);
    }
    let points = polygon.points();
    corners
        .into_iter()
        .min_by_key(|&i| (points[i].distance_squared(&reference), i))
        .unwrap_or(0)
}

/// Position of one path in a computed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderedPath {
    /// Index into the input slice.
    pub index: usize,
    /// Vertex the path starts at. For open paths either `0` or the last
    /// index, meaning the path is walked backwards.
    pub start: usize,
}

impl OrderedPath {
    /// True when an open path of `len` points is walked last to first.
    pub fn is_reversed(&self, len: usize) -> bool {
        len > 1 && self.start == len - 1
    }
}

/// Greedy nearest-neighbour ordering from a start position.
#[derive(Debug, Clone, Copy)]
pub struct PathOrderOptimizer {
    start_position: Point,
}

impl PathOrderOptimizer {
    pub fn new(start_position: Point) -> Self {
        Self { start_position }
    }

    pub fn start_position(&self) -> Point {
        self.start_position
    }

    /// Visiting order of closed loops with the start vertex of each.
    pub fn order_loops(&self, loops: &[Polygon]) -> Vec<OrderedPath> {
        let mut remaining: Vec<usize> = (0..loops.len())
            .filter(|&i| !loops[i].points().is_empty())
            .collect();
        let mut position = self.start_position;
        let mut order = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let mut best: Option<(i128, usize, usize, usize)> = None;
            for (slot, &i) in remaining.iter().enumerate() {
                let start = seam_index(&loops[i], position);
                let dist = loops[i].points()[start].distance_squared(&position);
                if best.map_or(true, |(d, _, _, _)| dist < d) {
                    best = Some((dist, slot, i, start));
                }
            }
            let Some((_, slot, index, start)) = best else {
                break;
            };
            remaining.remove(slot);
            position = loops[index].points()[start];
            order.push(OrderedPath { index, start });
        }
        order
    }

    /// Visiting order of open paths; each is entered from its nearer end.
    pub fn order_lines(&self, lines: &[Polyline]) -> Vec<OrderedPath> {
        let mut remaining: Vec<usize> = (0..lines.len())
            .filter(|&i| !lines[i].points().is_empty())
            .collect();
        let mut position = self.start_position;
        let mut order = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let mut best: Option<(i128, usize, usize, usize)> = None;
            for (slot, &i) in remaining.iter().enumerate() {
                let points = lines[i].points();
                let last = points.len() - 1;
                for start in [0, last] {
                    let dist = points[start].distance_squared(&position);
                    if best.map_or(true, |(d, _, _, _)| dist < d) {
                        best = Some((dist, slot, i, start));
                    }
                }
            }
            let Some((_, slot, index, start)) = best else {
                break;
            };
            remaining.remove(slot);
            let points = lines[index].points();
            position = if start == 0 {
                points[points.len() - 1]
            } else {
                points[0]
            };
            order.push(OrderedPath { index, start });
        }
        order
    }

    /// Visiting order of single points, e.g. one representative per island.
    pub fn order_points(&self, points: &[Point]) -> Vec<usize> {
        let mut remaining: Vec<usize> = (0..points.len()).collect();
        let mut position = self.start_position;
        let mut order = Vec::with_capacity(points.len());

        while !remaining.is_empty() {
            let slot = remaining
                .iter()
                .enumerate()
                .min_by_key(|(slot, &i)| (points[i].distance_squared(&position), *slot))
                .map(|(slot, _)| slot)
                .unwrap_or(0);
            let index = remaining.remove(slot);
            position = points[index];
            order.push(index);
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale;

    fn make_square(x: f64, y: f64, size: f64) -> Polygon {
        Polygon::rectangle(
            Point::new(scale(x), scale(y)),
            Point::new(scale(x + size), scale(y + size)),
        )
    }

    fn make_circle(cx: f64, cy: f64, r: f64, n: usize) -> Polygon {
        (0..n)
            .map(|i| {
                let a = i as f64 * std::f64::consts::TAU / n as f64;
                Point::new(scale(cx + r * a.cos()), scale(cy + r * a.sin()))
            })
            .collect()
    }

    #[test]
    fn test_best_edge_index_prefers_corner() {
        // Blunt pentagon-ish shape with one sharp spike at index 2.
        let poly = Polygon::from_points(vec![
            Point::new(0, 0),
            Point::new(10_000, 0),
            Point::new(30_000, 5_000),
            Point::new(10_000, 10_000),
            Point::new(0, 10_000),
        ]);
        assert_eq!(best_edge_index(&poly), 2);
    }

    #[test]
    fn test_best_edge_index_no_corner() {
        let circle = make_circle(0.0, 0.0, 10.0, 72);
        let idx = best_edge_index(&circle);
        // Front-most vertex of the circle is at -90°.
        assert_eq!(idx, 54);
    }

    #[test]
    fn test_seam_index_ties_by_distance() {
        let square = make_square(0.0, 0.0, 10.0);
        // All four corners are 90°; pick the one nearest the reference.
        assert_eq!(seam_index(&square, Point::new(scale(11.0), scale(11.0))), 2);
        assert_eq!(seam_index(&square, Point::new(scale(-1.0), scale(-1.0))), 0);
    }

    #[test]
    fn test_seam_index_closest_fallback() {
        let circle = make_circle(0.0, 0.0, 10.0, 72);
        let reference = Point::new(scale(20.0), 0);
        assert_eq!(seam_index(&circle, reference), 0);
        assert_eq!(closest_index(&circle, reference), 0);
    }

    #[test]
    fn test_order_loops_nearest_first() {
        let loops = vec![
            make_square(20.0, 0.0, 5.0),
            make_square(0.0, 0.0, 5.0),
            make_square(10.0, 0.0, 5.0),
        ];
        let order = PathOrderOptimizer::new(Point::zero()).order_loops(&loops);
        let indices: Vec<usize> = order.iter().map(|o| o.index).collect();
        assert_eq!(indices, vec![1, 2, 0]);
        assert_eq!(order[0].start, 0);
    }

    #[test]
    fn test_order_lines_chooses_entry_end() {
        let lines = vec![
            Polyline::from_points(vec![Point::new(0, 1_000), Point::new(10_000, 1_000)]),
            Polyline::from_points(vec![Point::new(0, 0), Point::new(10_000, 0)]),
        ];
        let order = PathOrderOptimizer::new(Point::new(10_500, 0)).order_lines(&lines);
        assert_eq!(order[0], OrderedPath { index: 1, start: 1 });
        assert!(order[0].is_reversed(2));
        // After walking line 1 backwards the head is at x=0.
        assert_eq!(order[1], OrderedPath { index: 0, start: 0 });
    }

    #[test]
    fn test_order_points() {
        let points = vec![Point::new(100, 0), Point::new(10, 0), Point::new(50, 0)];
        let order = PathOrderOptimizer::new(Point::zero()).order_points(&points);
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_order_deterministic() {
        let loops: Vec<Polygon> = (0..8)
            .map(|i| make_circle((i * 7 % 5) as f64 * 12.0, (i % 3) as f64 * 9.0, 4.0, 24))
            .collect();
        let optimizer = PathOrderOptimizer::new(Point::new(scale(3.0), scale(-2.0)));
        let first = optimizer.order_loops(&loops);
        for _ in 0..5 {
            assert_eq!(optimizer.order_loops(&loops), first);
        }
        assert_eq!(first.len(), loops.len());
    }
}
