//! Per-layer path planning.
//!
//! A [`LayerPlanner`] queues the moves of one layer, decides retractions as
//! travels are queued, and only talks to the sink in [`write_queued`], after
//! the minimum layer time correction has looked at the whole layer.
//!
//! [`write_queued`]: LayerPlanner::write_queued

use super::retract_crossing::RetractWhenCrossingBoundary;
use super::{ExtrusionRole, MotionSink, PathStyle};
use crate::config::PrintConfig;
use crate::geometry::{Point, Point3, Polygon, PolygonSet, Polyline};
use crate::infill::InfillPath;
use crate::order::PathOrderOptimizer;
use crate::{scale, unscale, Coord, CoordF, Result};

#[derive(Debug, Clone)]
struct PlannedPath {
    /// `None` for travel.
    style: Option<PathStyle>,
    points: Vec<Point3>,
    retract: bool,
    extruder: usize,
}

/// Queue of moves for one layer.
#[derive(Debug, Clone)]
pub struct LayerPlanner {
    layer_index: usize,
    z: Coord,
    thickness: Coord,
    start_position: Point,
    start_extruder: usize,
    position: Point,
    extruder: usize,
    travel_speed: CoordF,
    min_travel_to_retract: Coord,
    boundary: Option<RetractWhenCrossingBoundary>,
    always_retract: bool,
    force_retract: bool,
    speed_factor: CoordF,
    paths: Vec<PlannedPath>,
}

impl LayerPlanner {
    /// Start planning `layer_index`, whose top is at `z`, with the head at
    /// `start_position` and `extruder` active.
    pub fn new(
        config: &PrintConfig,
        layer_index: usize,
        z: Coord,
        thickness: Coord,
        start_position: Point,
        extruder: usize,
    ) -> Self {
        Self {
            layer_index,
            z,
            thickness,
            start_position,
            start_extruder: extruder,
            position: start_position,
            extruder,
            travel_speed: config.travel_speed,
            min_travel_to_retract: scale(config.min_travel_to_retract),
            boundary: None,
            always_retract: false,
            force_retract: false,
            speed_factor: 1.0,
            paths: Vec::new(),
        }
    }

    pub fn layer_index(&self) -> usize {
        self.layer_index
    }

    pub fn z(&self) -> Coord {
        self.z
    }

    /// Change the height of subsequently queued moves.
    pub fn set_z(&mut self, z: Coord) {
        self.z = z;
    }

    pub fn thickness(&self) -> Coord {
        self.thickness
    }

    pub fn last_position(&self) -> Point {
        self.position
    }

    pub fn extruder(&self) -> usize {
        self.extruder
    }

    /// Switch extruders for subsequent moves. Returns true if it changed.
    pub fn set_extruder(&mut self, extruder: usize) -> bool {
        if extruder == self.extruder {
            return false;
        }
        self.extruder = extruder;
        true
    }

    /// Retract on the next travel no matter how short.
    pub fn force_retract(&mut self) {
        self.force_retract = true;
    }

    /// Retract on every travel longer than the retraction threshold.
    pub fn set_always_retract(&mut self, always: bool) {
        self.always_retract = always;
    }

    /// Travels that stay inside `boundary` skip retraction. `None` goes back
    /// to the always-retract rule.
    pub fn set_avoid_crossing_boundary(&mut self, boundary: Option<&PolygonSet>) {
        self.boundary = boundary.map(|b| RetractWhenCrossingBoundary::new(b.clone()));
    }

    pub fn is_empty(&self) -> bool {
        self.paths.iter().all(|p| p.style.is_none())
    }

    /// Queue a travel to `to`.
    pub fn queue_travel(&mut self, to: Point) {
        let z = self.z;
        self.queue_travel_at(to, z);
    }

    fn queue_travel_at(&mut self, to: Point, z: Coord) {
        let from = self.position;
        let long = from.distance(&to) > self.min_travel_to_retract as CoordF;
        let retract = if self.force_retract {
            self.force_retract = false;
            true
        } else if let Some(boundary) = &self.boundary {
            long && boundary.check_travel(from, to).should_retract()
        } else {
            self.always_retract && long
        };

        let point = Point3::from_xy(to, z);
        match self.paths.last_mut() {
            Some(last) if last.style.is_none() && last.extruder == self.extruder => {
                last.points.push(point);
                last.retract |= retract;
            }
            _ => self.paths.push(PlannedPath {
                style: None,
                points: vec![point],
                retract,
                extruder: self.extruder,
            }),
        }
        self.position = to;
    }

    /// Queue an extrusion from the current position to `to`.
    pub fn queue_extrusion_move(&mut self, to: Point, style: PathStyle) {
        let z = self.z;
        self.queue_extrusion_at(to, z, style);
    }

    fn queue_extrusion_at(&mut self, to: Point, z: Coord, style: PathStyle) {
        let point = Point3::from_xy(to, z);
        match self.paths.last_mut() {
            Some(last) if last.style == Some(style) && last.extruder == self.extruder => {
                last.points.push(point);
            }
            _ => self.paths.push(PlannedPath {
                style: Some(style),
                points: vec![point],
                retract: false,
                extruder: self.extruder,
            }),
        }
        self.position = to;
    }

    /// Print `polygon` starting at vertex `start`. Closed-loop styles return
    /// to the start vertex; spiralized styles climb one layer along the loop.
    pub fn queue_polygon(&mut self, polygon: &Polygon, start: usize, style: PathStyle) {
        let points = polygon.points();
        let n = points.len();
        if n < 2 {
            return;
        }
        let start = start % n;
        let ordered: Vec<Point> = (0..n).map(|i| points[(start + i) % n]).collect();

        if style.spiralize {
            self.queue_spiral(&ordered, style);
            return;
        }

        self.queue_travel(ordered[0]);
        for &p in &ordered[1..] {
            self.queue_extrusion_move(p, style);
        }
        if style.closed_loop {
            self.queue_extrusion_move(ordered[0], style);
        }
    }

    /// Z rises linearly with distance from the previous layer's top to this
    /// layer's top over one closed loop.
    fn queue_spiral(&mut self, ordered: &[Point], style: PathStyle) {
        let total: CoordF = ordered
            .iter()
            .zip(ordered.iter().cycle().skip(1))
            .map(|(a, b)| a.distance(b))
            .sum();
        let base = self.z - self.thickness;
        self.queue_travel_at(ordered[0], base);
        if total <= 0.0 {
            return;
        }

        let mut walked = 0.0;
        let mut prev = ordered[0];
        for &p in ordered[1..].iter().chain(std::iter::once(&ordered[0])) {
            walked += prev.distance(&p);
            let z = base + (self.thickness as CoordF * walked / total).round() as Coord;
            self.queue_extrusion_at(p, z.min(self.z), style);
            prev = p;
        }
    }

    /// Print loops in nearest-neighbour order, each from its seam vertex.
    pub fn queue_polygons_by_optimizer(&mut self, polygons: &[Polygon], style: PathStyle) {
        let order = PathOrderOptimizer::new(self.position).order_loops(polygons);
        for entry in order {
            self.queue_polygon(&polygons[entry.index], entry.start, style);
        }
    }

    /// Print open paths in nearest-neighbour order, each from its nearer end.
    pub fn queue_lines_by_optimizer(&mut self, lines: &[Polyline], style: PathStyle) {
        let order = PathOrderOptimizer::new(self.position).order_lines(lines);
        for entry in order {
            let points = lines[entry.index].points();
            if points.len() < 2 {
                continue;
            }
            let walk: Vec<Point> = if entry.is_reversed(points.len()) {
                points.iter().rev().copied().collect()
            } else {
                points.to_vec()
            };
            self.queue_travel(walk[0]);
            for &p in &walk[1..] {
                self.queue_extrusion_move(p, style);
            }
        }
    }

    /// Print infill: loops first, then lines.
    pub fn queue_infill(&mut self, paths: &[InfillPath], style: PathStyle) {
        let mut loops = Vec::new();
        let mut lines = Vec::new();
        for path in paths {
            match path {
                InfillPath::Loop(polygon) => loops.push(polygon.clone()),
                InfillPath::Line(polyline) => lines.push(polyline.clone()),
            }
        }
        self.queue_polygons_by_optimizer(&loops, style.with_closed_loop(true));
        self.queue_lines_by_optimizer(&lines, style);
    }

    /// If the head sits outside `outer` pulled in by `distance`, travel to
    /// the nearest vertex that is inside.
    pub fn move_inside_the_outer_perimeter(&mut self, outer: &PolygonSet, distance: Coord) {
        if outer.is_empty() {
            return;
        }
        let inner = outer.offset(-distance);
        if inner.is_empty() || inner.contains_point(&self.position) {
            return;
        }
        let position = self.position;
        let target = inner
            .iter()
            .flat_map(|poly| poly.iter().copied())
            .min_by_key(|p| p.distance_squared(&position));
        if let Some(target) = target {
            self.queue_travel(target);
        }
    }

    /// Estimated (travel, extrusion) seconds at the current speed factor.
    pub fn time_estimates(&self) -> (CoordF, CoordF) {
        let mut travel = 0.0;
        let mut extrude = 0.0;
        let mut prev = self.start_position;
        for path in &self.paths {
            let mut length = 0.0;
            for p in &path.points {
                length += unscale(prev.distance(&p.xy()).round() as Coord);
                prev = p.xy();
            }
            match path.style {
                None => travel += length / self.travel_speed,
                Some(style) => extrude += length / (style.speed * self.speed_factor),
            }
        }
        (travel, extrude)
    }

    /// Slow extrusion down so the layer takes at least `min_time` seconds,
    /// never pushing a path below `min_speed`. Returns the applied factor
    /// (1.0 = full speed).
    pub fn force_minimum_layer_time(&mut self, min_time: CoordF, min_speed: CoordF) -> CoordF {
        let (travel, extrude) = self.time_estimates();
        if travel + extrude >= min_time || extrude <= 0.0 {
            return self.speed_factor;
        }
        let min_extrude_time = (min_time - travel).max(1.0);
        let mut factor = extrude / min_extrude_time;
        for style in self.paths.iter().filter_map(|p| p.style) {
            if style.speed * factor < min_speed {
                factor = factor.max(min_speed / style.speed);
            }
        }
        self.speed_factor = factor.clamp(0.0, 1.0);
        self.speed_factor
    }

    pub fn speed_factor(&self) -> CoordF {
        self.speed_factor
    }

    /// Stream the queued moves into `sink`.
    pub fn write_queued<S: MotionSink + ?Sized>(
        &self,
        sink: &mut S,
        fan_percent: u32,
        bridge_fan_percent: u32,
    ) -> Result<()> {
        let mut extruder = self.start_extruder;
        let mut retracted = false;
        let mut fan: Option<u32> = None;
        let mut role: Option<ExtrusionRole> = None;

        for path in &self.paths {
            if path.extruder != extruder {
                sink.set_extruder(path.extruder)?;
                extruder = path.extruder;
            }
            match path.style {
                None => {
                    if path.retract && !retracted {
                        sink.retract()?;
                        retracted = true;
                    }
                    for p in &path.points {
                        sink.set_z(p.z)?;
                        sink.travel(p.xy(), self.travel_speed)?;
                    }
                }
                Some(style) => {
                    let wanted = if style.role == ExtrusionRole::BridgeInfill {
                        bridge_fan_percent
                    } else {
                        fan_percent
                    };
                    if fan != Some(wanted) {
                        sink.set_fan(wanted)?;
                        fan = Some(wanted);
                    }
                    if role != Some(style.role) {
                        sink.comment(&format!("TYPE:{}", style.role.feature_name()))?;
                        role = Some(style.role);
                    }
                    if retracted {
                        sink.unretract()?;
                        retracted = false;
                    }
                    let speed = style.speed * self.speed_factor;
                    for p in &path.points {
                        sink.set_z(p.z)?;
                        sink.extrude(p.xy(), speed, style.line_width, self.thickness)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Fan percent for a layer printed at `speed_factor` of full speed.
///
/// Layers slowed to half speed or less get the maximum fan; between half and
/// full speed the fan falls linearly to the minimum. The fan stays off below
/// `first_layer_to_allow_fan`.
pub fn fan_speed_percent(config: &PrintConfig, layer_index: usize, speed_factor: CoordF) -> u32 {
    if layer_index < config.first_layer_to_allow_fan {
        return 0;
    }
    let factor = (speed_factor * 100.0).round().clamp(0.0, 100.0) as u32;
    if factor <= 50 {
        return config.fan_speed_max;
    }
    let n = factor - 50;
    (config.fan_speed_min * n + config.fan_speed_max * (50 - n)) / 50
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcode::{CommandRecorder, MotionEvent, PathStyles};

    fn config() -> PrintConfig {
        PrintConfig {
            min_travel_to_retract: 1.0,
            ..PrintConfig::default()
        }
    }

    fn square(x: Coord, y: Coord, size: Coord) -> Polygon {
        Polygon::rectangle(Point::new(x, y), Point::new(x + size, y + size))
    }

    fn planner() -> LayerPlanner {
        LayerPlanner::new(&config(), 3, 900, 200, Point::zero(), 0)
    }

    #[test]
    fn test_closed_loop_returns_to_start() {
        let styles = PathStyles::for_layer(&config(), 3);
        let mut planner = planner();
        planner.queue_polygon(&square(0, 0, 10_000), 2, styles.outer_perimeter);
        assert_eq!(planner.last_position(), Point::new(10_000, 10_000));

        let mut rec = CommandRecorder::new();
        planner.write_queued(&mut rec, 0, 0).unwrap();
        assert_eq!(rec.extrusion_count(), 4);
    }

    #[test]
    fn test_open_style_stops_at_last_vertex() {
        let styles = PathStyles::for_layer(&config(), 3);
        let mut planner = planner();
        planner.queue_polygon(&square(0, 0, 10_000), 0, styles.fill);
        assert_eq!(planner.last_position(), Point::new(0, 10_000));
    }

    #[test]
    fn test_retraction_rules() {
        let mut planner = planner();
        planner.set_always_retract(true);
        planner.queue_travel(Point::new(500, 0));
        assert!(!planner.paths[0].retract, "short travel");
        planner.queue_travel(Point::new(5_000, 0));
        assert!(planner.paths[0].retract, "long travel");

        let mut planner = self::planner();
        let boundary: PolygonSet = square(0, 0, 20_000).into();
        planner.set_avoid_crossing_boundary(Some(&boundary));
        planner.queue_travel(Point::new(1_000, 1_000));
        let styles = PathStyles::for_layer(&config(), 3);
        planner.queue_extrusion_move(Point::new(2_000, 1_000), styles.fill);
        planner.queue_travel(Point::new(15_000, 15_000));
        assert!(!planner.paths[2].retract, "stays inside");
        planner.queue_extrusion_move(Point::new(15_000, 16_000), styles.fill);
        planner.queue_travel(Point::new(40_000, 15_000));
        assert!(planner.paths[4].retract, "leaves the island");

        planner.force_retract();
        planner.queue_extrusion_move(Point::new(40_000, 16_000), styles.fill);
        planner.queue_travel(Point::new(40_000, 16_100));
        assert!(planner.paths[6].retract, "forced");
    }

    #[test]
    fn test_spiral_z_rises() {
        let styles = PathStyles::for_layer(&config(), 3);
        let mut planner = planner();
        planner.queue_polygon(&square(0, 0, 10_000), 0, styles.outer_perimeter.spiralized());

        let mut rec = CommandRecorder::new();
        planner.write_queued(&mut rec, 0, 0).unwrap();
        let zs: Vec<Coord> = rec
            .events()
            .iter()
            .filter_map(|e| match e {
                MotionEvent::Extrude { z, .. } => Some(*z),
                _ => None,
            })
            .collect();
        assert_eq!(zs, vec![750, 800, 850, 900]);
    }

    #[test]
    fn test_minimum_layer_time() {
        let cfg = config();
        let styles = PathStyles::for_layer(&cfg, 3);
        let mut planner = planner();
        // 40mm at 50mm/s = 0.8s of extrusion
        planner.queue_polygon(&square(0, 0, 10_000), 0, styles.fill.with_closed_loop(true));
        let factor = planner.force_minimum_layer_time(4.0, 5.0);
        assert!((factor - 0.2).abs() < 0.01, "factor {}", factor);

        // Bounded by the minimum print speed.
        let mut planner = self::planner();
        planner.queue_polygon(&square(0, 0, 10_000), 0, styles.fill.with_closed_loop(true));
        let factor = planner.force_minimum_layer_time(100.0, 25.0);
        assert!((factor - 0.5).abs() < 1e-9);
        let (_, extrude) = planner.time_estimates();
        assert!((extrude - 1.6).abs() < 0.01);
    }

    #[test]
    fn test_fast_layer_untouched() {
        let styles = PathStyles::for_layer(&config(), 3);
        let mut planner = planner();
        planner.queue_polygon(&square(0, 0, 10_000), 0, styles.fill);
        assert_eq!(planner.force_minimum_layer_time(0.1, 5.0), 1.0);
    }

    #[test]
    fn test_fan_speed() {
        let cfg = PrintConfig {
            fan_speed_min: 30,
            fan_speed_max: 100,
            first_layer_to_allow_fan: 2,
            ..PrintConfig::default()
        };
        assert_eq!(fan_speed_percent(&cfg, 1, 0.2), 0);
        assert_eq!(fan_speed_percent(&cfg, 5, 1.0), 30);
        assert_eq!(fan_speed_percent(&cfg, 5, 0.5), 100);
        assert_eq!(fan_speed_percent(&cfg, 5, 0.2), 100);
        assert_eq!(fan_speed_percent(&cfg, 5, 0.75), 65);
    }

    #[test]
    fn test_write_queued_retract_and_types() {
        let styles = PathStyles::for_layer(&config(), 3);
        let mut planner = planner();
        planner.set_always_retract(true);
        planner.queue_polygon(&square(5_000, 5_000, 10_000), 0, styles.outer_perimeter);
        planner.queue_lines_by_optimizer(
            &[Polyline::from_points(vec![
                Point::new(7_000, 7_000),
                Point::new(9_000, 7_000),
            ])],
            styles.bridge,
        );

        let mut rec = CommandRecorder::new();
        planner.write_queued(&mut rec, 40, 90).unwrap();
        let events = rec.events();
        assert_eq!(events[0], MotionEvent::Retract);
        assert!(events.contains(&MotionEvent::Unretract));
        assert!(events.contains(&MotionEvent::Fan(40)));
        assert!(events.contains(&MotionEvent::Fan(90)));
        assert!(events.contains(&MotionEvent::Comment("TYPE:WALL-OUTER".into())));
        assert!(events.contains(&MotionEvent::Comment("TYPE:BRIDGE".into())));
    }

    #[test]
    fn test_move_inside_the_outer_perimeter() {
        let mut planner = planner();
        let outer: PolygonSet = square(0, 0, 10_000).into();
        planner.queue_travel(Point::new(0, 0));
        planner.move_inside_the_outer_perimeter(&outer, 800);
        assert_eq!(planner.last_position(), Point::new(800, 800));

        // Already inside: no move.
        planner.move_inside_the_outer_perimeter(&outer, 800);
        assert_eq!(planner.paths.len(), 1);
    }

    #[test]
    fn test_extruder_switch_written() {
        let styles = PathStyles::for_layer(&config(), 3);
        let mut planner = planner();
        planner.queue_extrusion_move(Point::new(1_000, 0), styles.fill);
        assert!(planner.set_extruder(1));
        assert!(!planner.set_extruder(1));
        planner.queue_extrusion_move(Point::new(2_000, 0), styles.fill);

        let mut rec = CommandRecorder::new();
        planner.write_queued(&mut rec, 0, 0).unwrap();
        assert!(rec.events().contains(&MotionEvent::Extruder(1)));
        assert!(!rec.events().contains(&MotionEvent::Extruder(0)));
    }
}
