//! Bridge detection.
//!
//! A bottom skin region that does not rest on the layer below can still be
//! printed in the air if its lines start and end on something solid. This
//! module finds the direction that gives the most anchored line length.
//!
//! # Algorithm Overview
//!
//! 1. **Anchors**: grow the region by one line spacing and intersect with the
//!    outline of the layer below. A bridge needs at least two separate anchors.
//! 2. **Candidates**: every 5° over a half turn, plus the direction joining the
//!    two largest anchors.
//! 3. **Coverage**: hatch the region at each candidate angle and sum the length
//!    of lines whose both ends land on an anchor. Among candidates within one
//!    spacing of the best coverage the one with the shortest longest span wins.

use crate::geometry::{Point, PolygonSet};
use crate::infill::generate_line_paths;
use crate::{Coord, CoordF};

/// Angular step of the direction search (degrees).
const ANGLE_RESOLUTION: CoordF = 5.0;

#[derive(Debug, Clone, Copy)]
struct BridgeDirection {
    angle: CoordF,
    coverage: CoordF,
    max_length: CoordF,
}

/// Finds the bridging direction for one region.
#[derive(Debug, Clone)]
pub struct BridgeDetector {
    area: PolygonSet,
    anchors: Vec<PolygonSet>,
    spacing: Coord,
}

impl BridgeDetector {
    /// `area` is the region to bridge, `lower_outline` the whole outline of
    /// the layer below, `spacing` the bridge line spacing.
    pub fn new(area: &PolygonSet, lower_outline: &PolygonSet, spacing: Coord) -> Self {
        let anchors = if area.is_empty() || lower_outline.is_empty() || spacing <= 0 {
            Vec::new()
        } else {
            area.offset(spacing)
                .intersection(lower_outline)
                .split_into_islands()
                .into_iter()
                .filter(|part| !part.is_empty())
                .collect()
        };
        Self {
            area: area.clone(),
            anchors,
            spacing,
        }
    }

    /// Separate regions of the layer below the bridge can rest on.
    pub fn anchors(&self) -> &[PolygonSet] {
        &self.anchors
    }

    /// A bridge needs something to hold on to at both ends.
    pub fn is_anchored(&self) -> bool {
        self.anchors.len() >= 2
    }

    /// Best line direction in degrees, in `[0, 180)`, or `None` when the
    /// region cannot be bridged.
    pub fn detect_angle(&self) -> Option<CoordF> {
        if !self.is_anchored() {
            return None;
        }
        let anchor_area: PolygonSet = self.anchors.iter().flat_map(|a| a.iter().cloned()).collect();

        let mut candidates: Vec<BridgeDirection> = self
            .candidate_angles()
            .into_iter()
            .map(|angle| self.evaluate(angle, &anchor_area))
            .filter(|c| c.coverage > 0.0)
            .collect();
        if candidates.is_empty() {
            return None;
        }

        candidates.sort_by(|a, b| b.coverage.total_cmp(&a.coverage));
        let best_coverage = candidates[0].coverage;
        let best = candidates
            .iter()
            .take_while(|c| best_coverage - c.coverage < self.spacing as CoordF)
            .min_by(|a, b| a.max_length.total_cmp(&b.max_length))?;
        Some(best.angle.rem_euclid(180.0))
    }

    fn candidate_angles(&self) -> Vec<CoordF> {
        let steps = (180.0 / ANGLE_RESOLUTION) as usize;
        let mut angles: Vec<CoordF> = (0..steps).map(|i| i as CoordF * ANGLE_RESOLUTION).collect();

        let mut by_size: Vec<&PolygonSet> = self.anchors.iter().collect();
        by_size.sort_by(|a, b| b.area().total_cmp(&a.area()));
        if let [first, second, ..] = by_size[..] {
            let a = anchor_center(first);
            let b = anchor_center(second);
            let joining = ((b.y - a.y) as CoordF)
                .atan2((b.x - a.x) as CoordF)
                .to_degrees()
                .rem_euclid(180.0);
            angles.push(joining);
        }
        angles
    }

    fn evaluate(&self, angle: CoordF, anchor_area: &PolygonSet) -> BridgeDirection {
        let lines = generate_line_paths(&self.area, self.spacing, self.spacing / 2, angle);
        let mut coverage = 0.0;
        let mut max_length: CoordF = 0.0;
        for line in &lines {
            let anchored = anchor_area.contains_point(&line.first_point())
                && anchor_area.contains_point(&line.last_point());
            if anchored {
                let length = line.length();
                coverage += length;
                max_length = max_length.max(length);
            }
        }
        BridgeDirection {
            angle,
            coverage,
            max_length,
        }
    }
}

fn anchor_center(set: &PolygonSet) -> Point {
    set.bounding_box().center()
}

/// Direction to bridge `area` over the layer below, if it can be bridged.
pub fn bridge_angle(area: &PolygonSet, lower_outline: &PolygonSet, spacing: Coord) -> Option<CoordF> {
    BridgeDetector::new(area, lower_outline, spacing).detect_angle()
}
