//! Wipe tower for multi-extruder prints.
//!
//! A square column next to the model. The incoming extruder primes on it
//! after every switch, and every layer puts down at least one solid pass so
//! the column never has holes to bridge.

use super::{LayerPlanner, PathStyle};
use crate::config::PrintConfig;
use crate::geometry::{BoundingBox, Point, Polygon, PolygonSet};
use crate::infill::generate_line_paths;
use crate::{scale, Coord, CoordF};
use log::debug;

/// Clearance between the model and the tower (scaled units).
const TOWER_GAP: Coord = 3_000;

#[derive(Debug, Clone)]
pub struct WipeTower {
    outline: PolygonSet,
    wipe_point: Point,
    extend: Coord,
    last_primed_layer: Option<usize>,
}

impl WipeTower {
    /// Place a tower beside `model_bounds`. `None` unless the print uses more
    /// than one extruder and a tower size is configured.
    pub fn new(config: &PrintConfig, model_bounds: &BoundingBox, extruder_count: usize) -> Option<Self> {
        if extruder_count < 2 || config.wipe_tower_size <= 0.0 || !model_bounds.defined {
            return None;
        }
        let size = scale(config.wipe_tower_size);
        let max = Point::new(model_bounds.min.x - TOWER_GAP, model_bounds.max.y + TOWER_GAP + size);
        let min = Point::new(max.x - size, max.y - size);
        debug!("Wipe tower at {} - {}", min, max);
        Some(Self {
            outline: Polygon::rectangle(min, max).into(),
            wipe_point: Point::new(min.x + size / 2, min.y + size / 2),
            extend: scale(config.infill_extend_into_perimeter),
            last_primed_layer: None,
        })
    }

    pub fn outline(&self) -> &PolygonSet {
        &self.outline
    }

    /// Where the old extruder is wiped after a switch.
    pub fn wipe_point(&self) -> Point {
        self.wipe_point
    }

    /// Print one solid pass over the tower with the planner's current extruder.
    /// Passes alternate between 45° and 135°.
    pub fn prime(&mut self, planner: &mut LayerPlanner, style: PathStyle) {
        let layer_index = planner.layer_index();
        let angle: CoordF = 45.0 + 90.0 * (layer_index % 2) as CoordF;
        let lines = generate_line_paths(&self.outline, style.line_width, self.extend, angle);
        planner.queue_lines_by_optimizer(&lines, style);
        self.last_primed_layer = Some(layer_index);
    }

    /// Prime once on this layer if no extruder switch did it already.
    pub fn ensure_solid(&mut self, planner: &mut LayerPlanner, style: PathStyle) {
        if self.last_primed_layer != Some(planner.layer_index()) {
            self.prime(planner, style);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcode::{CommandRecorder, PathStyles};

    fn config() -> PrintConfig {
        PrintConfig::default().wipe_tower_size(10.0)
    }

    fn model_bounds() -> BoundingBox {
        BoundingBox::from_points(&[Point::new(0, 0), Point::new(scale(20.0), scale(20.0))])
    }

    #[test]
    fn test_tower_needs_two_extruders() {
        assert!(WipeTower::new(&config(), &model_bounds(), 1).is_none());
        assert!(WipeTower::new(&PrintConfig::default(), &model_bounds(), 2).is_none());
        assert!(WipeTower::new(&config(), &model_bounds(), 2).is_some());
    }

    #[test]
    fn test_tower_clear_of_model() {
        let tower = WipeTower::new(&config(), &model_bounds(), 2).unwrap();
        let bounds = tower.outline().bounding_box();
        assert!(!bounds.overlaps(&model_bounds()));
        assert!(tower.outline().contains_point(&tower.wipe_point()));
    }

    #[test]
    fn test_ensure_solid_once_per_layer() {
        let cfg = config();
        let styles = PathStyles::for_layer(&cfg, 4);
        let mut tower = WipeTower::new(&cfg, &model_bounds(), 2).unwrap();
        let mut planner = LayerPlanner::new(&cfg, 4, scale(1.1), scale(0.2), Point::zero(), 0);

        tower.prime(&mut planner, styles.wipe_tower);
        let mut once = CommandRecorder::new();
        planner.write_queued(&mut once, 0, 0).unwrap();

        tower.ensure_solid(&mut planner, styles.wipe_tower);
        let mut again = CommandRecorder::new();
        planner.write_queued(&mut again, 0, 0).unwrap();

        assert!(once.extrusion_count() > 0);
        assert_eq!(once.extrusion_count(), again.extrusion_count());
    }
}
