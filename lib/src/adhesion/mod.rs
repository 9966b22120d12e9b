//! Skirt and brim around the first layer.
//!
//! The footprint is the union of everything printed on layer 0: model,
//! support and the wipe tower. A skirt traces the footprint at a distance,
//! touching only outer contours; a brim hugs the part edges.

use crate::geometry::{Polygon, PolygonSet};
use crate::{Coord, CoordF};
use log::debug;

/// Stops runaway loop counts when `min_length` can never be reached.
const MAX_SKIRT_LOOPS: usize = 100;

/// Outer contours only: holes are not traced by a skirt.
fn outer_contours(footprint: &PolygonSet) -> PolygonSet {
    footprint
        .iter()
        .filter(|p| p.is_counter_clockwise())
        .cloned()
        .collect()
}

/// Skirt loops around `footprint`.
///
/// Loop `k` is centred `distance + k·line_width + line_width / 2` outside the
/// footprint. Loops are added beyond `loops` until their total length reaches
/// `min_length` (both scaled). With `distance == 0` holes are followed too.
pub fn generate_skirt(
    footprint: &PolygonSet,
    distance: Coord,
    line_width: Coord,
    loops: usize,
    min_length: Coord,
) -> Vec<Polygon> {
    if footprint.is_empty() || loops == 0 || line_width <= 0 {
        return Vec::new();
    }
    let base = if distance > 0 {
        outer_contours(footprint)
    } else {
        footprint.clone()
    };

    let mut skirt: Vec<Polygon> = Vec::new();
    let mut count = loops;
    let mut k = 0;
    while k < count && k < MAX_SKIRT_LOOPS {
        let offset = distance + k as Coord * line_width + line_width / 2;
        let mut ring = base.offset(offset);
        ring.optimize();
        skirt.extend(ring.into_polygons());

        let length: CoordF = skirt.iter().map(Polygon::length).sum();
        if k + 1 >= count && length > 0.0 && length < min_length as CoordF {
            count += 1;
        }
        k += 1;
    }
    debug!("Skirt: {} loops, {} contours", k, skirt.len());
    skirt
}

/// `loops` brim rings hugging the outside of `footprint`, innermost first.
pub fn generate_brim(footprint: &PolygonSet, line_width: Coord, loops: usize) -> Vec<Polygon> {
    if footprint.is_empty() || line_width <= 0 {
        return Vec::new();
    }
    let outer = outer_contours(footprint);
    let mut brim = Vec::new();
    for k in 0..loops {
        let mut ring = outer.offset(k as Coord * line_width + line_width / 2);
        ring.optimize();
        brim.extend(ring.into_polygons());
    }
    brim
}
