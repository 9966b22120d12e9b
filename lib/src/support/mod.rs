//! Support area generation.
//!
//! Support is computed per layer from the model outlines alone:
//!
//! - **overhang(i)**: what layer `i + 1` adds beyond layer `i` grown by the
//!   overhang margin. The margin is `layer_height · tan(angle)`, the
//!   horizontal step a wall may take per layer before it needs support.
//! - **required(i)**: `(required(i + 1) ∪ overhang(i))` minus layer `i` grown
//!   by the XY clearance. Columns run down to the bed or until they land on
//!   the model.
//! - **interface(i)**: the part of `required(i)` directly under model within
//!   the next `interface_layers` layers, printed dense.
//! - **air_gapped_bottom(i)**: the part of `required(i)` resting on layer
//!   `i - 1`, printed one air gap higher.
//! - **normal(i)**: everything else.
//!
//! Results are memoised per layer and never change once computed; the
//! required areas are filled from the top down.

use crate::config::{PrintConfig, SupportKind};
use crate::gcode::{LayerPlanner, PathStyle};
use crate::geometry::PolygonSet;
use crate::infill::generate_line_paths;
use crate::{scale, Coord, CoordF, SCALING_FACTOR};
use log::debug;
use std::cell::OnceCell;

/// Per-layer support masks for the whole print.
#[derive(Debug)]
pub struct SupportAreas {
    /// Union of all extruders' outlines, per layer.
    outlines: Vec<PolygonSet>,
    overhang_margin: Coord,
    xy_distance: Coord,
    xy_expansion: Coord,
    /// Scaled units squared.
    min_area: CoordF,
    interface_layers: usize,
    line_spacing: Coord,
    pattern: SupportKind,
    angle: CoordF,
    required: Vec<OnceCell<PolygonSet>>,
    interface: Vec<OnceCell<PolygonSet>>,
    air_gapped: Vec<OnceCell<PolygonSet>>,
    normal: Vec<OnceCell<PolygonSet>>,
    empty: PolygonSet,
}

impl SupportAreas {
    pub fn new(config: &PrintConfig, outlines: Vec<PolygonSet>) -> Self {
        let n = outlines.len();
        let overhang_margin =
            scale(config.layer_height * config.support_overhang_angle.to_radians().tan());
        debug!(
            "Support over {} layers, overhang margin {}um",
            n, overhang_margin
        );
        Self {
            outlines,
            overhang_margin,
            xy_distance: scale(config.support_xy_distance),
            xy_expansion: scale(config.support_xy_expansion),
            min_area: config.support_min_area * SCALING_FACTOR * SCALING_FACTOR,
            interface_layers: config.support_interface_layers,
            line_spacing: scale(config.support_line_spacing),
            pattern: config.support_pattern,
            angle: config.support_infill_starting_angle,
            required: (0..n).map(|_| OnceCell::new()).collect(),
            interface: (0..n).map(|_| OnceCell::new()).collect(),
            air_gapped: (0..n).map(|_| OnceCell::new()).collect(),
            normal: (0..n).map(|_| OnceCell::new()).collect(),
            empty: PolygonSet::new(),
        }
    }

    pub fn layer_count(&self) -> usize {
        self.outlines.len()
    }

    /// Horizontal step per layer a wall may take unsupported.
    pub fn overhang_margin(&self) -> Coord {
        self.overhang_margin
    }

    fn outline(&self, layer_index: usize) -> &PolygonSet {
        self.outlines.get(layer_index).unwrap_or(&self.empty)
    }

    /// Area of layer `layer_index + 1` that overhangs layer `layer_index`.
    pub fn overhang_areas(&self, layer_index: usize) -> PolygonSet {
        let above = self.outline(layer_index + 1);
        if above.is_empty() {
            return PolygonSet::new();
        }
        let mut overhang = above.difference(&self.outline(layer_index).offset(self.overhang_margin));
        if self.xy_expansion > 0 {
            overhang = overhang.offset(self.xy_expansion);
        }
        overhang.remove_small_areas(self.min_area)
    }

    /// Everything that must be supported on `layer_index`.
    pub fn required_support_areas(&self, layer_index: usize) -> &PolygonSet {
        let n = self.required.len();
        if layer_index >= n {
            return &self.empty;
        }
        for j in (layer_index..n).rev() {
            if self.required[j].get().is_some() {
                continue;
            }
            let above = self
                .required
                .get(j + 1)
                .and_then(OnceCell::get)
                .unwrap_or(&self.empty);
            let area = above
                .union(&self.overhang_areas(j))
                .difference(&self.outline(j).offset(self.xy_distance));
            let _ = self.required[j].set(area);
        }
        self.required[layer_index].get().unwrap_or(&self.empty)
    }

    /// Support resting on the model of the layer below.
    pub fn air_gapped_bottom_areas(&self, layer_index: usize) -> &PolygonSet {
        let Some(cell) = self.air_gapped.get(layer_index) else {
            return &self.empty;
        };
        cell.get_or_init(|| match layer_index.checked_sub(1) {
            Some(below) => self
                .required_support_areas(layer_index)
                .intersection(self.outline(below)),
            None => PolygonSet::new(),
        })
    }

    /// Support directly below the model, printed dense.
    pub fn interface_support_areas(&self, layer_index: usize) -> &PolygonSet {
        let Some(cell) = self.interface.get(layer_index) else {
            return &self.empty;
        };
        cell.get_or_init(|| {
            let required = self.required_support_areas(layer_index);
            if required.is_empty() || self.interface_layers == 0 {
                return PolygonSet::new();
            }
            let mut model_above = PolygonSet::new();
            for i in layer_index + 1..=layer_index + self.interface_layers {
                model_above.extend(self.outline(i).clone());
            }
            required
                .intersection(&model_above.union_self())
                .difference(self.air_gapped_bottom_areas(layer_index))
        })
    }

    /// Remaining support, printed sparse.
    pub fn normal_support_areas(&self, layer_index: usize) -> &PolygonSet {
        let Some(cell) = self.normal.get(layer_index) else {
            return &self.empty;
        };
        cell.get_or_init(|| {
            self.required_support_areas(layer_index)
                .difference(self.interface_support_areas(layer_index))
                .difference(self.air_gapped_bottom_areas(layer_index))
        })
    }

    /// Queue sparse support: one outline loop per region, then hatching.
    pub fn queue_normal_support_layer(&self, planner: &mut LayerPlanner, style: PathStyle) {
        let area = self.normal_support_areas(planner.layer_index());
        if area.is_empty() {
            return;
        }
        let mut outline = area.offset(-style.line_width / 2);
        outline.optimize();
        planner.queue_polygons_by_optimizer(&outline, style.with_closed_loop(true));

        let mut angles = vec![self.angle];
        if self.pattern == SupportKind::Grid {
            angles.push(self.angle + 90.0);
        }
        for angle in angles {
            let lines = generate_line_paths(&outline, self.line_spacing, 0, angle);
            planner.queue_lines_by_optimizer(&lines, style);
        }
    }

    /// Queue dense interface lines, crossing the sparse direction.
    pub fn queue_interface_support_layer(&self, planner: &mut LayerPlanner, style: PathStyle) {
        let area = self.interface_support_areas(planner.layer_index());
        if area.is_empty() {
            return;
        }
        let lines = generate_line_paths(area, style.line_width, 0, self.angle + 90.0);
        planner.queue_lines_by_optimizer(&lines, style);
    }

    /// Queue dense lines over support that sits on the model.
    pub fn queue_air_gapped_bottom_layer(&self, planner: &mut LayerPlanner, style: PathStyle) {
        let area = self.air_gapped_bottom_areas(planner.layer_index());
        if area.is_empty() {
            return;
        }
        let lines = generate_line_paths(area, style.line_width, 0, self.angle);
        planner.queue_lines_by_optimizer(&lines, style);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcode::{CommandRecorder, PathStyles};
    use crate::geometry::{Point, Polygon};

    fn make_rect_mm(x: f64, y: f64, w: f64, h: f64) -> PolygonSet {
        Polygon::rectangle(
            Point::new(scale(x), scale(y)),
            Point::new(scale(x + w), scale(y + h)),
        )
        .into()
    }

    fn area_mm2(set: &PolygonSet) -> f64 {
        set.area() / (SCALING_FACTOR * SCALING_FACTOR)
    }

    /// A 5mm pillar for 10 layers carrying a 20mm wide table for 5 more.
    fn table() -> Vec<PolygonSet> {
        let mut layers = Vec::new();
        for _ in 0..10 {
            layers.push(make_rect_mm(7.5, 0.0, 5.0, 5.0));
        }
        for _ in 0..5 {
            layers.push(make_rect_mm(0.0, 0.0, 20.0, 5.0));
        }
        layers
    }

    fn config() -> PrintConfig {
        PrintConfig {
            support_interface_layers: 2,
            ..PrintConfig::default()
        }
    }

    #[test]
    fn test_overhang_only_under_span() {
        let support = SupportAreas::new(&config(), table());
        let overhang = support.overhang_areas(9);
        assert!(area_mm2(&overhang) > 70.0);
        assert!(!overhang.contains_point(&Point::new(scale(10.0), scale(2.5))));
        assert!(support.overhang_areas(3).is_empty());
        assert!(support.overhang_areas(14).is_empty());
    }

    #[test]
    fn test_required_reaches_bed() {
        let support = SupportAreas::new(&config(), table());
        for i in 0..10 {
            let required = support.required_support_areas(i);
            assert!(required.contains_point(&Point::new(scale(2.0), scale(2.5))), "layer {}", i);
            assert!(required.contains_point(&Point::new(scale(18.0), scale(2.5))), "layer {}", i);
            assert!(!required.contains_point(&Point::new(scale(10.0), scale(2.5))), "layer {}", i);
        }
        for i in 10..15 {
            assert!(support.required_support_areas(i).is_empty());
        }
        assert!(support.required_support_areas(99).is_empty());
    }

    #[test]
    fn test_required_is_memoised() {
        let support = SupportAreas::new(&config(), table());
        let low = support.required_support_areas(2) as *const PolygonSet;
        let high = support.required_support_areas(8).clone();
        assert_eq!(support.required_support_areas(2) as *const PolygonSet, low);
        assert_eq!(support.required_support_areas(8).polygons(), high.polygons());
    }

    #[test]
    fn test_support_disjoint_from_model() {
        let layers = table();
        let support = SupportAreas::new(&config(), layers.clone());
        for (i, outline) in layers.iter().enumerate() {
            let overlap = support.required_support_areas(i).intersection(outline);
            assert!(area_mm2(&overlap) < 0.01, "layer {}", i);
        }
    }

    #[test]
    fn test_interface_and_normal_split() {
        let support = SupportAreas::new(&config(), table());
        // Two layers below the table are interface, lower ones normal.
        assert!(!support.interface_support_areas(9).is_empty());
        assert!(!support.interface_support_areas(8).is_empty());
        assert!(support.interface_support_areas(7).is_empty());
        assert!(area_mm2(support.normal_support_areas(9)) < 0.01);
        let required = area_mm2(support.required_support_areas(5));
        assert!((area_mm2(support.normal_support_areas(5)) - required).abs() < 0.01);
    }

    #[test]
    fn test_air_gapped_bottom() {
        // A ledge at layers 0-2, then an overhang starting at layer 6 above it.
        let mut layers = vec![make_rect_mm(0.0, 0.0, 20.0, 5.0); 3];
        layers.extend(vec![make_rect_mm(0.0, 0.0, 5.0, 5.0); 3]);
        layers.extend(vec![make_rect_mm(0.0, 0.0, 20.0, 5.0); 2]);
        let support = SupportAreas::new(&config(), layers);

        assert!(!support.required_support_areas(3).is_empty());
        assert!(!support.air_gapped_bottom_areas(3).is_empty());
        assert!(support.air_gapped_bottom_areas(4).is_empty());
        // The ledge stops the column.
        assert!(support.required_support_areas(2).is_empty());
        assert!(support.air_gapped_bottom_areas(0).is_empty());
    }

    #[test]
    fn test_queue_support_lines() {
        let cfg = config();
        let support = SupportAreas::new(&cfg, table());
        let styles = PathStyles::for_layer(&cfg, 5);
        let mut planner = LayerPlanner::new(&cfg, 5, cfg.scaled_layer_z(5), scale(0.2), Point::zero(), 0);
        support.queue_normal_support_layer(&mut planner, styles.support);
        support.queue_interface_support_layer(&mut planner, styles.support_interface);

        let mut rec = CommandRecorder::new();
        planner.write_queued(&mut rec, 0, 0).unwrap();
        assert!(rec.extrusion_count() > 0);
        assert!(rec
            .events()
            .contains(&crate::gcode::MotionEvent::Comment("TYPE:SUPPORT".into())));
    }
}
