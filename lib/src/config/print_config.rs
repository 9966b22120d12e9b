//! Print configuration types.
//!
//! Every setting that drives region classification, support generation and
//! path emission lives in [`PrintConfig`]. Lengths are millimetres, speeds
//! mm/s, percentages 0-100, times seconds. Conversions to the µm grid happen
//! through the `scaled_*` accessors.

use crate::{scale, Coord, CoordF};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Main print configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintConfig {
    // === Layers ===
    /// Layer height (mm).
    pub layer_height: CoordF,
    /// First layer height (mm).
    pub first_layer_height: CoordF,

    // === Extrusion ===
    /// Line width of inner walls, infill and skins (mm).
    pub extrusion_width: CoordF,
    /// Line width of the outermost wall (mm).
    pub outside_extrusion_width: CoordF,
    /// Line width used for everything on the first layer (mm).
    pub first_layer_extrusion_width: CoordF,
    /// Line width of support lines (mm).
    pub support_extrusion_width: CoordF,
    /// Filament diameter (mm).
    pub filament_diameter: CoordF,
    /// Flow multiplier.
    pub extrusion_multiplier: CoordF,

    // === Walls and skins ===
    /// Number of perimeters (inset rings).
    pub perimeters: usize,
    /// Number of solid layers at the top of the model.
    pub top_layers: usize,
    /// Number of solid layers at the bottom of the model.
    pub bottom_layers: usize,
    /// Print the outer wall before the inner ones.
    pub outside_perimeters_first: bool,

    // === Infill ===
    /// Sparse infill density (percent).
    pub infill_percent: CoordF,
    /// Sparse infill pattern.
    pub infill_pattern: InfillPattern,
    /// Base hatching angle (degrees).
    pub infill_starting_angle: CoordF,
    /// How far hatching reaches into the innermost wall (mm).
    pub infill_extend_into_perimeter: CoordF,

    // === Speeds (mm/s) ===
    pub first_layer_speed: CoordF,
    pub outside_perimeter_speed: CoordF,
    pub inside_perimeters_speed: CoordF,
    pub infill_speed: CoordF,
    pub top_infill_speed: CoordF,
    pub bridge_speed: CoordF,
    pub support_speed: CoordF,
    pub travel_speed: CoordF,

    // === Retraction ===
    /// Retraction length on travel (mm of filament).
    pub retraction_length: CoordF,
    /// Retraction speed (mm/s).
    pub retraction_speed: CoordF,
    /// Retraction length on extruder switch (mm of filament).
    pub retraction_on_extruder_switch: CoordF,
    /// Travels at least this long retract (mm).
    pub min_travel_to_retract: CoordF,
    /// Z lift while retracted (mm). A non-zero value forces retraction on layer 0.
    pub retraction_z_hop: CoordF,
    /// Retract whenever the head moves to another island.
    pub retract_when_changing_islands: bool,
    /// Skip retraction for travels that stay inside the current island.
    pub avoid_crossing_perimeters: bool,

    // === Cooling ===
    /// Layers faster than this are slowed down (seconds).
    pub minimum_layer_time: CoordF,
    /// Floor for the layer time slowdown (mm/s).
    pub minimum_print_speed: CoordF,
    /// Fan percent when no slowdown was needed.
    pub fan_speed_min: u32,
    /// Fan percent at maximum slowdown.
    pub fan_speed_max: u32,
    /// Fan percent while bridging.
    pub bridge_fan_speed: u32,
    /// The fan stays off below this layer.
    pub first_layer_to_allow_fan: usize,

    // === Skirt / brim ===
    pub skirt_loops: usize,
    /// Gap between model footprint and the first skirt loop (mm).
    pub skirt_distance: CoordF,
    /// Keep adding skirt loops until they add up to this length (mm).
    pub skirt_min_length: CoordF,
    pub brim_loops: usize,

    // === Support ===
    pub generate_support: bool,
    pub support_pattern: SupportKind,
    /// Overhang angle measured from vertical (degrees). Steeper overhangs are supported.
    pub support_overhang_angle: CoordF,
    /// Horizontal clearance between support and model (mm).
    pub support_xy_distance: CoordF,
    /// Overhang regions are grown by this much before use (mm).
    pub support_xy_expansion: CoordF,
    /// Overhang regions smaller than this are ignored (mm²).
    pub support_min_area: CoordF,
    /// Spacing between support lines (mm).
    pub support_line_spacing: CoordF,
    /// Number of dense interface layers below the model.
    pub support_interface_layers: usize,
    /// Vertical gap between support and the model resting on it (mm).
    pub support_air_gap: CoordF,
    pub support_infill_starting_angle: CoordF,
    pub support_extruder: usize,
    pub support_interface_extruder: usize,

    // === Special modes ===
    /// Vase mode: a single outer wall with Z rising continuously.
    pub continuous_spiral_outer_perimeter: bool,
    /// Side length of the wipe tower (mm); 0 disables it.
    pub wipe_tower_size: CoordF,

    // === Scripts ===
    pub start_code: String,
    pub end_code: String,
}

impl PrintConfig {
    /// Create a new PrintConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set layer height.
    pub fn layer_height(mut self, height: CoordF) -> Self {
        self.layer_height = height;
        self
    }

    /// Builder method: set first layer height.
    pub fn first_layer_height(mut self, height: CoordF) -> Self {
        self.first_layer_height = height;
        self
    }

    /// Builder method: set all model line widths at once.
    pub fn extrusion_width(mut self, width: CoordF) -> Self {
        self.extrusion_width = width;
        self.outside_extrusion_width = width;
        self.first_layer_extrusion_width = width;
        self.support_extrusion_width = width;
        self
    }

    /// Builder method: set number of perimeters.
    pub fn perimeters(mut self, count: usize) -> Self {
        self.perimeters = count;
        self
    }

    /// Builder method: set solid top and bottom layer counts.
    pub fn solid_layers(mut self, bottom: usize, top: usize) -> Self {
        self.bottom_layers = bottom;
        self.top_layers = top;
        self
    }

    /// Builder method: set infill density (percent).
    pub fn infill_percent(mut self, percent: CoordF) -> Self {
        self.infill_percent = percent;
        self
    }

    /// Builder method: set infill pattern.
    pub fn infill_pattern(mut self, pattern: InfillPattern) -> Self {
        self.infill_pattern = pattern;
        self
    }

    /// Builder method: enable/disable support.
    pub fn support(mut self, enabled: bool) -> Self {
        self.generate_support = enabled;
        self
    }

    /// Builder method: set the support overhang angle (degrees from vertical).
    pub fn support_overhang_angle(mut self, angle: CoordF) -> Self {
        self.support_overhang_angle = angle;
        self
    }

    /// Builder method: enable/disable vase mode.
    pub fn spiral(mut self, enabled: bool) -> Self {
        self.continuous_spiral_outer_perimeter = enabled;
        self
    }

    /// Builder method: set skirt loop count.
    pub fn skirt_loops(mut self, loops: usize) -> Self {
        self.skirt_loops = loops;
        self
    }

    /// Builder method: set minimum layer time (seconds).
    pub fn minimum_layer_time(mut self, seconds: CoordF) -> Self {
        self.minimum_layer_time = seconds;
        self
    }

    /// Builder method: set wipe tower size (mm).
    pub fn wipe_tower_size(mut self, size: CoordF) -> Self {
        self.wipe_tower_size = size;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.layer_height <= 0.0 {
            return Err("Layer height must be positive".into());
        }
        if self.first_layer_height <= 0.0 {
            return Err("First layer height must be positive".into());
        }
        for (name, width) in [
            ("Extrusion width", self.extrusion_width),
            ("Outside extrusion width", self.outside_extrusion_width),
            ("First layer extrusion width", self.first_layer_extrusion_width),
            ("Support extrusion width", self.support_extrusion_width),
        ] {
            if width <= 0.0 {
                return Err(format!("{} must be positive", name));
            }
        }
        if self.filament_diameter <= 0.0 {
            return Err("Filament diameter must be positive".into());
        }
        if self.extrusion_multiplier <= 0.0 {
            return Err("Extrusion multiplier must be positive".into());
        }
        if !(0.0..=100.0).contains(&self.infill_percent) {
            return Err("Infill percent must be between 0 and 100".into());
        }
        if self.fan_speed_min > 100 || self.fan_speed_max > 100 || self.bridge_fan_speed > 100 {
            return Err("Fan speeds must be between 0 and 100".into());
        }
        if !(0.0..90.0).contains(&self.support_overhang_angle) {
            return Err("Support overhang angle must be in [0, 90)".into());
        }
        if self.support_line_spacing <= 0.0 {
            return Err("Support line spacing must be positive".into());
        }
        if self.minimum_print_speed <= 0.0 {
            return Err("Minimum print speed must be positive".into());
        }
        for (name, speed) in [
            ("First layer speed", self.first_layer_speed),
            ("Outside perimeter speed", self.outside_perimeter_speed),
            ("Inside perimeters speed", self.inside_perimeters_speed),
            ("Infill speed", self.infill_speed),
            ("Top infill speed", self.top_infill_speed),
            ("Bridge speed", self.bridge_speed),
            ("Support speed", self.support_speed),
            ("Travel speed", self.travel_speed),
        ] {
            if speed <= 0.0 {
                return Err(format!("{} must be positive", name));
            }
        }
        Ok(())
    }

    /// Apply the vase mode overrides: no top skins, no sparse infill, no support.
    pub fn apply_spiral_overrides(&mut self) {
        if self.continuous_spiral_outer_perimeter {
            self.top_layers = 0;
            self.infill_percent = 0.0;
            self.generate_support = false;
        }
    }

    #[inline]
    pub fn scaled_layer_height(&self) -> Coord {
        scale(self.layer_height)
    }

    #[inline]
    pub fn scaled_first_layer_height(&self) -> Coord {
        scale(self.first_layer_height)
    }

    #[inline]
    pub fn scaled_extrusion_width(&self) -> Coord {
        scale(self.extrusion_width)
    }

    #[inline]
    pub fn scaled_outside_extrusion_width(&self) -> Coord {
        scale(self.outside_extrusion_width)
    }

    #[inline]
    pub fn scaled_first_layer_extrusion_width(&self) -> Coord {
        scale(self.first_layer_extrusion_width)
    }

    /// Line width of model features on `layer_index`.
    pub fn scaled_width_for_layer(&self, layer_index: usize) -> Coord {
        if layer_index == 0 {
            self.scaled_first_layer_extrusion_width()
        } else {
            self.scaled_extrusion_width()
        }
    }

    /// Layer thickness of `layer_index`.
    pub fn scaled_thickness_for_layer(&self, layer_index: usize) -> Coord {
        if layer_index == 0 {
            self.scaled_first_layer_height()
        } else {
            self.scaled_layer_height()
        }
    }

    /// Top of `layer_index` above the bed.
    pub fn scaled_layer_z(&self, layer_index: usize) -> Coord {
        self.scaled_first_layer_height() + layer_index as Coord * self.scaled_layer_height()
    }
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            layer_height: 0.2,
            first_layer_height: 0.3,

            extrusion_width: 0.4,
            outside_extrusion_width: 0.4,
            first_layer_extrusion_width: 0.4,
            support_extrusion_width: 0.4,
            filament_diameter: 1.75,
            extrusion_multiplier: 1.0,

            perimeters: 2,
            top_layers: 3,
            bottom_layers: 3,
            outside_perimeters_first: false,

            infill_percent: 20.0,
            infill_pattern: InfillPattern::Grid,
            infill_starting_angle: 45.0,
            infill_extend_into_perimeter: 0.06,

            first_layer_speed: 20.0,
            outside_perimeter_speed: 45.0,
            inside_perimeters_speed: 50.0,
            infill_speed: 50.0,
            top_infill_speed: 35.0,
            bridge_speed: 20.0,
            support_speed: 50.0,
            travel_speed: 150.0,

            retraction_length: 1.0,
            retraction_speed: 45.0,
            retraction_on_extruder_switch: 10.0,
            min_travel_to_retract: 10.0,
            retraction_z_hop: 0.0,
            retract_when_changing_islands: true,
            avoid_crossing_perimeters: true,

            minimum_layer_time: 5.0,
            minimum_print_speed: 10.0,
            fan_speed_min: 35,
            fan_speed_max: 100,
            bridge_fan_speed: 100,
            first_layer_to_allow_fan: 2,

            skirt_loops: 1,
            skirt_distance: 6.0,
            skirt_min_length: 0.0,
            brim_loops: 0,

            generate_support: false,
            support_pattern: SupportKind::Lines,
            support_overhang_angle: 45.0,
            support_xy_distance: 0.7,
            support_xy_expansion: 0.0,
            support_min_area: 1.0,
            support_line_spacing: 2.0,
            support_interface_layers: 3,
            support_air_gap: 0.3,
            support_infill_starting_angle: 45.0,
            support_extruder: 0,
            support_interface_extruder: 0,

            continuous_spiral_outer_perimeter: false,
            wipe_tower_size: 0.0,

            start_code: String::new(),
            end_code: String::new(),
        }
    }
}

impl fmt::Display for PrintConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PrintConfig(layer={:.2}mm, width={:.2}mm, perimeters={}, infill={:.0}% {})",
            self.layer_height,
            self.extrusion_width,
            self.perimeters,
            self.infill_percent,
            self.infill_pattern
        )
    }
}

/// Sparse infill pattern.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfillPattern {
    /// Parallel lines at one angle.
    Lines,
    /// Two line sets 90 degrees apart.
    #[default]
    Grid,
    /// Three line sets 60 degrees apart.
    Triangles,
    /// Honeycomb zigzags.
    Hexagon,
    /// Repeated inward offsets.
    Concentric,
}

impl InfillPattern {
    /// Returns the display name for this pattern.
    pub fn name(&self) -> &'static str {
        match self {
            InfillPattern::Lines => "lines",
            InfillPattern::Grid => "grid",
            InfillPattern::Triangles => "triangles",
            InfillPattern::Hexagon => "hexagon",
            InfillPattern::Concentric => "concentric",
        }
    }
}

impl fmt::Display for InfillPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for InfillPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lines" => Ok(InfillPattern::Lines),
            "grid" => Ok(InfillPattern::Grid),
            "triangles" => Ok(InfillPattern::Triangles),
            "hexagon" => Ok(InfillPattern::Hexagon),
            "concentric" => Ok(InfillPattern::Concentric),
            other => Err(format!("unknown infill pattern '{}'", other)),
        }
    }
}

/// Hatching used inside support areas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportKind {
    /// Single direction lines.
    #[default]
    Lines,
    /// Crossed lines.
    Grid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_config_default() {
        let config = PrintConfig::default();
        assert!((config.layer_height - 0.2).abs() < 1e-6);
        assert_eq!(config.scaled_extrusion_width(), 400);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_print_config_builder() {
        let config = PrintConfig::new()
            .layer_height(0.1)
            .perimeters(3)
            .solid_layers(4, 5)
            .infill_pattern(InfillPattern::Triangles)
            .support(true);

        assert_eq!(config.scaled_layer_height(), 100);
        assert_eq!(config.perimeters, 3);
        assert_eq!(config.bottom_layers, 4);
        assert_eq!(config.top_layers, 5);
        assert_eq!(config.infill_pattern, InfillPattern::Triangles);
        assert!(config.generate_support);
    }

    #[test]
    fn test_print_config_validation() {
        let mut config = PrintConfig::default();
        config.layer_height = 0.0;
        assert!(config.validate().is_err());

        let mut config = PrintConfig::default();
        config.infill_percent = 120.0;
        assert!(config.validate().is_err());

        let mut config = PrintConfig::default();
        config.support_overhang_angle = 90.0;
        assert!(config.validate().is_err());

        let mut config = PrintConfig::default();
        config.fan_speed_max = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_spiral_overrides() {
        let mut config = PrintConfig::default().spiral(true).support(true);
        config.apply_spiral_overrides();
        assert_eq!(config.top_layers, 0);
        assert_eq!(config.infill_percent, 0.0);
        assert!(!config.generate_support);
    }

    #[test]
    fn test_layer_z() {
        let config = PrintConfig::default();
        assert_eq!(config.scaled_layer_z(0), 300);
        assert_eq!(config.scaled_layer_z(3), 900);
        assert_eq!(config.scaled_thickness_for_layer(0), 300);
        assert_eq!(config.scaled_thickness_for_layer(1), 200);
    }

    #[test]
    fn test_config_json_partial() {
        let config: PrintConfig =
            serde_json::from_str(r#"{"perimeters": 4, "infill_pattern": "hexagon"}"#).unwrap();
        assert_eq!(config.perimeters, 4);
        assert_eq!(config.infill_pattern, InfillPattern::Hexagon);
        assert!((config.layer_height - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_infill_pattern_from_str() {
        assert_eq!("GRID".parse::<InfillPattern>().unwrap(), InfillPattern::Grid);
        assert!("gyroid".parse::<InfillPattern>().is_err());
        assert_eq!(InfillPattern::Concentric.to_string(), "concentric");
    }
}
