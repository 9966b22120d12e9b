//! Island/region model.
//!
//! A layer's outline is split into islands: connected areas, each an outer
//! contour plus its holes. Every island is then processed in two stages:
//!
//! 1. [`Island::generate_insets`] - perimeter rings, the fillable boundary
//!    and the avoid-crossing boundary
//! 2. [`LayerStack::generate_top_and_bottoms`] - split the fillable area into
//!    solid top, solid bottom, enclosed solid infill and sparse infill by
//!    comparing with the layers above and below
//!
//! The second stage reads neighbouring layers, so the first stage must have
//! run on the whole stack before it starts.

use crate::geometry::{BoundingBox, Point, PolygonSet};
use crate::{Coord, CoordF};

/// One connected printable area of a layer.
#[derive(Clone, Debug, Default)]
pub struct Island {
    /// Outer contour and holes as sliced.
    pub outline: PolygonSet,
    pub bounding_box: BoundingBox,
    /// Perimeter centrelines, outermost first. Ring `i + 1` lies inside ring `i`.
    pub insets: Vec<PolygonSet>,
    /// Everything inside the innermost ring; the area infill may cover.
    pub infill_boundary: PolygonSet,
    /// Travels that stay inside this area need no retraction.
    pub avoid_crossing_boundary: PolygonSet,
    /// Skin visible from above.
    pub solid_top: PolygonSet,
    /// Skin resting on nothing from the layer below.
    pub solid_bottom: PolygonSet,
    /// Solid fill enclosed between skins.
    pub solid_infill: PolygonSet,
    /// Remaining area for sparse infill.
    pub sparse_infill: PolygonSet,
}

impl Island {
    pub fn new(outline: PolygonSet) -> Self {
        let bounding_box = outline.bounding_box();
        Self {
            outline,
            bounding_box,
            ..Default::default()
        }
    }

    /// Generate `count` perimeter rings.
    ///
    /// The outer wall is `outer_width` wide, all others `width`. Generation
    /// stops early once an offset vanishes.
    pub fn generate_insets(&mut self, width: Coord, outer_width: Coord, count: usize) {
        self.insets.clear();
        self.avoid_crossing_boundary = self.outline.offset(-outer_width);

        let mut last_width = outer_width;
        for i in 0..count {
            let mut ring = match i {
                0 => self.outline.offset(-outer_width / 2),
                1 => self.insets[0].offset(-(outer_width + width) / 2),
                _ => self.insets[i - 1].offset(-width),
            };
            ring.optimize();
            if ring.is_empty() {
                break;
            }
            last_width = if i == 0 { outer_width } else { width };
            self.insets.push(ring);
        }

        self.infill_boundary = match self.insets.last() {
            Some(ring) => ring.offset(-last_width / 2),
            // No walls: keep the fill centrelines half a width inside.
            None => self.outline.offset(-width / 2),
        };
        self.infill_boundary.optimize();

        // Until top/bottom classification runs everything is sparse.
        self.sparse_infill = self.infill_boundary.clone();
        self.solid_top = PolygonSet::new();
        self.solid_bottom = PolygonSet::new();
        self.solid_infill = PolygonSet::new();
    }

    /// First point of the outer wall, or of the outline for wall-less islands.
    pub fn start_point(&self) -> Option<Point> {
        self.insets
            .first()
            .unwrap_or(&self.outline)
            .first()
            .and_then(|poly| poly.first().copied())
    }

    pub fn has_solid_fill(&self) -> bool {
        !self.solid_top.is_empty() || !self.solid_bottom.is_empty() || !self.solid_infill.is_empty()
    }
}

/// One slice of the model.
#[derive(Clone, Debug, Default)]
pub struct Layer {
    pub index: usize,
    /// Top of the layer (scaled units).
    pub z: Coord,
    /// Whole-layer outline, the union of all islands.
    pub outline: PolygonSet,
    pub islands: Vec<Island>,
}

impl Layer {
    /// Build a layer from raw sliced contours. Overlapping contours are merged
    /// before splitting into islands.
    pub fn new(index: usize, z: Coord, outline: &PolygonSet) -> Self {
        let mut merged = outline.union_self();
        merged.optimize();
        let islands = merged
            .split_into_islands()
            .into_iter()
            .filter(|part| !part.is_empty())
            .map(Island::new)
            .collect();
        Self {
            index,
            z,
            outline: merged,
            islands,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.islands.is_empty()
    }

    pub fn generate_insets(&mut self, width: Coord, outer_width: Coord, count: usize) {
        for island in &mut self.islands {
            island.generate_insets(width, outer_width, count);
        }
    }

    /// Union of every island's fillable area.
    pub fn infill_area(&self) -> PolygonSet {
        let mut all = PolygonSet::new();
        for island in &self.islands {
            all.extend(island.infill_boundary.clone());
        }
        all
    }
}

/// All layers of one extruder, bottom first.
#[derive(Clone, Debug, Default)]
pub struct LayerStack {
    pub extruder: usize,
    pub layers: Vec<Layer>,
}

impl LayerStack {
    pub fn new(extruder: usize, layers: Vec<Layer>) -> Self {
        Self { extruder, layers }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Index of the highest layer that still has islands.
    pub fn last_non_empty_layer(&self) -> Option<usize> {
        self.layers.iter().rposition(|l| !l.is_empty())
    }

    /// Fillable area of `layer_index`, or nothing when the layer does not exist.
    fn infill_area_at(&self, layer_index: Option<usize>) -> PolygonSet {
        layer_index
            .and_then(|i| self.layers.get(i))
            .map(Layer::infill_area)
            .unwrap_or_default()
    }

    /// Intersection of the fillable areas of `count` consecutive layers
    /// starting `1` step away from `layer_index` in direction `up`.
    fn covered_area(&self, layer_index: usize, count: usize, up: bool) -> PolygonSet {
        let mut covered: Option<PolygonSet> = None;
        for step in 1..=count {
            let neighbour = if up {
                Some(layer_index + step)
            } else {
                layer_index.checked_sub(step)
            };
            let area = self.infill_area_at(neighbour);
            let next = match covered {
                None => area,
                Some(prev) => prev.intersection(&area),
            };
            if next.is_empty() {
                return next;
            }
            covered = Some(next);
        }
        covered.unwrap_or_default()
    }

    /// Classify the fillable area of every island of `layer_index` into solid
    /// top, solid bottom, enclosed solid infill and sparse infill.
    ///
    /// A region is solid when any of the `top_layers` layers above or
    /// `bottom_layers` layers below does not cover it. Of the solid region,
    /// the part not covered by the very next layer up is top skin and the part
    /// not resting on the very next layer down is bottom skin. Regions smaller
    /// than `width²` are left to sparse infill.
    pub fn generate_top_and_bottoms(
        &mut self,
        layer_index: usize,
        width: Coord,
        outer_width: Coord,
        bottom_layers: usize,
        top_layers: usize,
    ) {
        if layer_index >= self.layers.len() {
            return;
        }
        let min_area = (width as CoordF) * (width as CoordF);

        let above_all = (top_layers > 0).then(|| self.covered_area(layer_index, top_layers, true));
        let below_all =
            (bottom_layers > 0).then(|| self.covered_area(layer_index, bottom_layers, false));
        let above_next = self.infill_area_at(Some(layer_index + 1));
        let below_next = self.infill_area_at(layer_index.checked_sub(1));

        // Neighbours grow slightly so equal outlines compare equal.
        let tolerance = outer_width / 10;

        let layer = &mut self.layers[layer_index];
        for island in &mut layer.islands {
            let fillable = &island.infill_boundary;
            if fillable.is_empty() {
                island.solid_top = PolygonSet::new();
                island.solid_bottom = PolygonSet::new();
                island.solid_infill = PolygonSet::new();
                island.sparse_infill = PolygonSet::new();
                continue;
            }

            let solid_top = match &above_all {
                Some(covered) => fillable.difference(&covered.offset(tolerance)),
                None => PolygonSet::new(),
            };
            let solid_bottom = match &below_all {
                Some(covered) => fillable
                    .difference(&solid_top)
                    .difference(&covered.offset(tolerance)),
                None => PolygonSet::new(),
            };
            let solid = solid_top.union(&solid_bottom);

            let exposed_bottom = if bottom_layers > 0 {
                solid
                    .difference(&below_next.offset(tolerance))
                    .remove_small_areas(min_area)
            } else {
                PolygonSet::new()
            };
            let exposed_top = if top_layers > 0 {
                solid
                    .difference(&above_next.offset(tolerance))
                    .difference(&exposed_bottom)
                    .remove_small_areas(min_area)
            } else {
                PolygonSet::new()
            };
            let enclosed = solid
                .difference(&exposed_top)
                .difference(&exposed_bottom)
                .remove_small_areas(min_area);

            let all_solid = exposed_top.union(&exposed_bottom).union(&enclosed);
            island.sparse_infill = fillable.difference(&all_solid);
            island.solid_top = exposed_top;
            island.solid_bottom = exposed_bottom;
            island.solid_infill = enclosed;
        }
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

    fn make_square_with_hole_mm(size: f64, hole_offset: f64, hole_size: f64) -> PolygonSet {
        let mut set = make_square_mm(0.0, 0.0, size);
        let mut hole = Polygon::rectangle(
            Point::new(scale(hole_offset), scale(hole_offset)),
            Point::new(scale(hole_offset + hole_size), scale(hole_offset + hole_size)),
        );
        hole.make_clockwise();
        set.push(hole);
        set
    }

    fn cube_stack(layers: usize, size: f64) -> LayerStack {
        let outline = make_square_mm(0.0, 0.0, size);
        let w = scale(0.4);
        let layers = (0..layers)
            .map(|i| {
                let mut layer = Layer::new(i, scale(0.2) * (i as Coord + 1), &outline);
                layer.generate_insets(w, w, 2);
                layer
            })
            .collect();
        LayerStack::new(0, layers)
    }

    fn area_mm2(set: &PolygonSet) -> f64 {
        set.area() / 1e6
    }

    #[test]
    fn test_insets_simple_square() {
        let mut island = Island::new(make_square_mm(0.0, 0.0, 20.0));
        island.generate_insets(scale(0.4), scale(0.4), 3);

        assert_eq!(island.insets.len(), 3);
        // 20mm square, ring 0 at 0.2mm in: 19.6mm side
        assert!((area_mm2(&island.insets[0]) - 19.6 * 19.6).abs() < 0.05);
        assert!((area_mm2(&island.insets[1]) - 18.8 * 18.8).abs() < 0.05);
        assert!((area_mm2(&island.insets[2]) - 18.0 * 18.0).abs() < 0.05);
        assert!((area_mm2(&island.infill_boundary) - 17.6 * 17.6).abs() < 0.05);
        assert!((area_mm2(&island.avoid_crossing_boundary) - 19.2 * 19.2).abs() < 0.05);
    }

    #[test]
    fn test_insets_nested() {
        let mut island = Island::new(make_square_with_hole_mm(20.0, 8.0, 4.0));
        island.generate_insets(scale(0.4), scale(0.5), 3);

        for pair in island.insets.windows(2) {
            let outer = &pair[0];
            let inner = &pair[1];
            assert!(inner.difference(outer).area().abs() < 1.0);
            for poly in inner.iter() {
                for p in poly.iter() {
                    assert!(outer.contains_point(p), "{} escapes its parent ring", p);
                }
            }
        }
        // The hole survives in every ring.
        assert!(island.insets.iter().all(|ring| ring.len() == 2));
    }

    #[test]
    fn test_insets_early_stop() {
        // 1.5mm square fits two walls at most
        let mut island = Island::new(make_square_mm(0.0, 0.0, 1.5));
        island.generate_insets(scale(0.4), scale(0.4), 5);
        assert!(island.insets.len() < 5);
        assert!(!island.insets.is_empty());
        assert!(island.insets.iter().all(|ring| ring.iter().all(|p| p.len() >= 3)));
    }

    #[test]
    fn test_insets_zero_count() {
        let mut island = Island::new(make_square_mm(0.0, 0.0, 10.0));
        island.generate_insets(scale(0.4), scale(0.4), 0);
        assert!(island.insets.is_empty());
        assert!((area_mm2(&island.infill_boundary) - 9.6 * 9.6).abs() < 0.05);
        assert_eq!(island.start_point(), Some(Point::new(0, 0)));
    }

    #[test]
    fn test_layer_splits_islands() {
        let mut outline = make_square_mm(0.0, 0.0, 5.0);
        outline.extend(make_square_mm(10.0, 0.0, 5.0));
        let layer = Layer::new(0, scale(0.3), &outline);
        assert_eq!(layer.islands.len(), 2);
        assert!(!layer.is_empty());

        let empty = Layer::new(1, scale(0.5), &PolygonSet::new());
        assert!(empty.is_empty());
    }

    #[test]
    fn test_cube_skins() {
        let mut stack = cube_stack(10, 10.0);
        let w = scale(0.4);
        for i in 0..stack.len() {
            stack.generate_top_and_bottoms(i, w, w, 3, 3);
        }

        for (i, layer) in stack.layers.iter().enumerate() {
            let island = &layer.islands[0];
            let fillable = area_mm2(&island.infill_boundary);
            if i < 3 || i >= 7 {
                assert!(island.sparse_infill.is_empty(), "layer {} should be solid", i);
                let solid = area_mm2(&island.solid_top)
                    + area_mm2(&island.solid_bottom)
                    + area_mm2(&island.solid_infill);
                assert!((solid - fillable).abs() < 0.1, "layer {}", i);
            } else {
                assert!(!island.has_solid_fill(), "layer {} should be sparse", i);
                assert!((area_mm2(&island.sparse_infill) - fillable).abs() < 0.1);
            }
        }

        // Exposed skins only at the extremes.
        assert!(!stack.layers[0].islands[0].solid_bottom.is_empty());
        assert!(stack.layers[1].islands[0].solid_bottom.is_empty());
        assert!(!stack.layers[1].islands[0].solid_infill.is_empty());
        assert!(!stack.layers[9].islands[0].solid_top.is_empty());
        assert!(stack.layers[8].islands[0].solid_top.is_empty());
    }

    #[test]
    fn test_no_solid_layers() {
        let mut stack = cube_stack(4, 10.0);
        let w = scale(0.4);
        for i in 0..stack.len() {
            stack.generate_top_and_bottoms(i, w, w, 0, 0);
        }
        assert!(stack.layers.iter().all(|l| !l.islands[0].has_solid_fill()));
    }

    #[test]
    fn test_last_non_empty_layer() {
        let mut stack = cube_stack(3, 5.0);
        stack.layers.push(Layer::new(3, scale(0.8), &PolygonSet::new()));
        assert_eq!(stack.last_non_empty_layer(), Some(2));
    }
}
