//! Extrusion roles and per-layer path styles.
//!
//! A [`PathStyle`] carries everything the planner needs to emit one class of
//! toolpath: line width, speed, whether the path closes on itself and whether
//! Z rises along it. [`PathStyles::for_layer`] builds a fresh, immutable set
//! for every layer, so no style can leak from one layer into the next.

use crate::config::PrintConfig;
use crate::{scale, Coord, CoordF};

/// Type of extrusion for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtrusionRole {
    /// External (outer) perimeter.
    ExternalPerimeter,
    /// Internal perimeter.
    Perimeter,
    /// Sparse infill.
    InternalInfill,
    /// Enclosed solid infill.
    SolidInfill,
    /// Top solid infill (visible surface).
    TopSolidInfill,
    /// Bottom solid infill.
    BottomSolidInfill,
    /// Bridge infill (over gaps).
    BridgeInfill,
    /// Skirt/brim.
    Skirt,
    /// Support material.
    SupportMaterial,
    /// Support interface.
    SupportMaterialInterface,
    /// Model or support printed above the support air gap.
    AirGappedBottom,
    /// Wipe tower.
    WipeTower,
}

impl ExtrusionRole {
    /// Feature name written as a `TYPE:` comment before each path.
    pub fn feature_name(&self) -> &'static str {
        match self {
            ExtrusionRole::ExternalPerimeter => "WALL-OUTER",
            ExtrusionRole::Perimeter => "WALL-INNER",
            ExtrusionRole::InternalInfill => "FILL",
            ExtrusionRole::SolidInfill => "SOLID-FILL",
            ExtrusionRole::TopSolidInfill => "TOP-FILL",
            ExtrusionRole::BottomSolidInfill => "BOTTOM-FILL",
            ExtrusionRole::BridgeInfill => "BRIDGE",
            ExtrusionRole::Skirt => "SKIRT",
            ExtrusionRole::SupportMaterial => "SUPPORT",
            ExtrusionRole::SupportMaterialInterface => "SUPPORT-INTERFACE",
            ExtrusionRole::AirGappedBottom => "AIR-GAPPED-BOTTOM",
            ExtrusionRole::WipeTower => "WIPE-TOWER",
        }
    }
}

/// How one class of toolpath is printed on one layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathStyle {
    pub role: ExtrusionRole,
    /// Print speed (mm/s).
    pub speed: CoordF,
    /// Line width (scaled units).
    pub line_width: Coord,
    /// Polygons return to their first point.
    pub closed_loop: bool,
    /// Z rises by one layer over the length of each loop.
    pub spiralize: bool,
}

impl PathStyle {
    pub fn new(role: ExtrusionRole, speed: CoordF, line_width: Coord) -> Self {
        Self {
            role,
            speed,
            line_width,
            closed_loop: true,
            spiralize: false,
        }
    }

    /// The same style for open paths: polygons stop at their last vertex.
    pub fn open(mut self) -> Self {
        self.closed_loop = false;
        self
    }

    pub fn with_closed_loop(mut self, closed: bool) -> Self {
        self.closed_loop = closed;
        self
    }

    pub fn spiralized(mut self) -> Self {
        self.spiralize = true;
        self
    }
}

/// Every path style used on one layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathStyles {
    pub skirt: PathStyle,
    pub outer_perimeter: PathStyle,
    pub inner_perimeter: PathStyle,
    pub fill: PathStyle,
    pub solid_fill: PathStyle,
    pub top_fill: PathStyle,
    pub bottom_fill: PathStyle,
    pub bridge: PathStyle,
    pub support: PathStyle,
    pub support_interface: PathStyle,
    pub air_gapped_bottom: PathStyle,
    pub wipe_tower: PathStyle,
}

impl PathStyles {
    /// Styles for `layer_index`. The first layer prints everything at the
    /// first-layer speed and width.
    pub fn for_layer(config: &PrintConfig, layer_index: usize) -> Self {
        use ExtrusionRole::*;

        let first = layer_index == 0;
        let pick = |speed: CoordF, width: CoordF| {
            if first {
                (config.first_layer_speed, scale(config.first_layer_extrusion_width))
            } else {
                (speed, scale(width))
            }
        };
        let style = |role: ExtrusionRole, (speed, width): (CoordF, Coord)| {
            PathStyle::new(role, speed, width)
        };
        let width = config.extrusion_width;

        Self {
            skirt: PathStyle::new(
                Skirt,
                config.first_layer_speed,
                scale(config.first_layer_extrusion_width),
            ),
            outer_perimeter: style(
                ExternalPerimeter,
                pick(config.outside_perimeter_speed, config.outside_extrusion_width),
            ),
            inner_perimeter: style(Perimeter, pick(config.inside_perimeters_speed, width)),
            fill: style(InternalInfill, pick(config.infill_speed, width)).open(),
            solid_fill: style(SolidInfill, pick(config.infill_speed, width)).open(),
            top_fill: style(TopSolidInfill, pick(config.top_infill_speed, width)).open(),
            bottom_fill: style(BottomSolidInfill, pick(config.infill_speed, width)).open(),
            bridge: style(BridgeInfill, pick(config.bridge_speed, width)).open(),
            support: style(
                SupportMaterial,
                pick(config.support_speed, config.support_extrusion_width),
            )
            .open(),
            support_interface: style(
                SupportMaterialInterface,
                pick(config.support_speed, config.support_extrusion_width),
            )
            .open(),
            air_gapped_bottom: PathStyle::new(
                AirGappedBottom,
                config.first_layer_speed,
                scale(config.extrusion_width),
            ),
            wipe_tower: style(WipeTower, pick(config.infill_speed, width)),
        }
    }
}
