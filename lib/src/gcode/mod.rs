//! Motion command generation.
//!
//! The planner never formats text itself. It drives a [`MotionSink`], which
//! is either the [`GCodeWriter`] reference implementation or an in-memory
//! [`CommandRecorder`] for tests and tooling.

mod path;
mod planner;
mod recorder;
pub mod retract_crossing;
pub mod wipe_tower;
mod writer;

pub use path::{ExtrusionRole, PathStyle, PathStyles};
pub use planner::{fan_speed_percent, LayerPlanner};
pub use recorder::{CommandRecorder, MotionEvent};
pub use retract_crossing::{RetractDecision, RetractWhenCrossingBoundary};
pub use wipe_tower::WipeTower;
pub use writer::GCodeWriter;

use crate::geometry::Point;
use crate::{Coord, CoordF, Result};

/// Receiver of the planned motion stream.
///
/// Coordinates are absolute and in scaled units; speeds are mm/s. A sink is
/// used for exactly one print and must reject commands after [`finish`].
///
/// [`finish`]: MotionSink::finish
pub trait MotionSink {
    /// Height used by the next move.
    fn set_z(&mut self, z: Coord) -> Result<()>;

    /// Move without extruding.
    fn travel(&mut self, to: Point, speed: CoordF) -> Result<()>;

    /// Move while extruding a line `line_width` wide and `layer_thickness` high.
    fn extrude(
        &mut self,
        to: Point,
        speed: CoordF,
        line_width: Coord,
        layer_thickness: Coord,
    ) -> Result<()>;

    fn retract(&mut self) -> Result<()>;

    fn unretract(&mut self) -> Result<()>;

    /// Part-cooling fan, 0-100 percent.
    fn set_fan(&mut self, percent: u32) -> Result<()>;

    fn set_extruder(&mut self, extruder: usize) -> Result<()>;

    /// Verbatim text such as start and end scripts.
    fn write_raw(&mut self, text: &str) -> Result<()>;

    fn comment(&mut self, text: &str) -> Result<()>;

    /// Marker written at the start of every layer.
    fn layer_comment(&mut self, layer_index: usize) -> Result<()> {
        self.comment(&format!("LAYER:{}", layer_index))
    }

    /// Current head position.
    fn position(&self) -> Point;

    fn current_z(&self) -> Coord;

    /// Flush and close the stream.
    fn finish(&mut self) -> Result<()>;
}

/// One G-code word line as emitted by [`GCodeWriter`].
#[derive(Clone, Debug, PartialEq)]
pub enum GCodeCommand {
    /// G0 - Rapid move (travel)
    RapidMove {
        x: Option<f64>,
        y: Option<f64>,
        z: Option<f64>,
        f: Option<f64>,
    },
    /// G1 - Linear move (extrusion)
    LinearMove {
        x: Option<f64>,
        y: Option<f64>,
        z: Option<f64>,
        e: Option<f64>,
        f: Option<f64>,
    },
    /// G90 - Absolute positioning
    AbsolutePositioning,
    /// G92 - Set position
    SetPosition { e: f64 },
    /// M83 - Relative extrusion
    RelativeExtrusion,
    /// M106 - Set fan speed
    SetFanSpeed { s: u32 },
    /// M107 - Fan off
    FanOff,
    /// Tn - Select extruder
    SelectTool { t: usize },
    /// Comment
    Comment(String),
    /// Raw G-code line
    Raw(String),
}

impl GCodeCommand {
    /// One line of G-code, without the trailing newline.
    pub fn to_gcode(&self) -> String {
        match self {
            GCodeCommand::RapidMove { x, y, z, f } => move_line("G0", *f, *x, *y, *z, None),
            GCodeCommand::LinearMove { x, y, z, e, f } => move_line("G1", *f, *x, *y, *z, *e),
            GCodeCommand::AbsolutePositioning => "G90".to_string(),
            GCodeCommand::SetPosition { e } => format!("G92 E{:.5}", e),
            GCodeCommand::RelativeExtrusion => "M83".to_string(),
            GCodeCommand::SetFanSpeed { s } => format!("M106 S{}", s),
            GCodeCommand::FanOff => "M107".to_string(),
            GCodeCommand::SelectTool { t } => format!("T{}", t),
            GCodeCommand::Comment(text) => format!(";{}", text),
            GCodeCommand::Raw(line) => line.clone(),
        }
    }
}

/// Feed rate first, then axes; absent words are left out.
fn move_line(
    code: &str,
    f: Option<f64>,
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    e: Option<f64>,
) -> String {
    let mut line = String::from(code);
    if let Some(v) = f {
        line.push_str(&format!(" F{:.0}", v));
    }
    for (axis, value) in [('X', x), ('Y', y), ('Z', z)] {
        if let Some(v) = value {
            line.push_str(&format!(" {}{:.3}", axis, v));
        }
    }
    if let Some(v) = e {
        line.push_str(&format!(" E{:.5}", v));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rapid_move() {
        let cmd = GCodeCommand::RapidMove {
            x: Some(10.0),
            y: Some(20.0),
            z: None,
            f: Some(3000.0),
        };
        assert_eq!(cmd.to_gcode(), "G0 F3000 X10.000 Y20.000");
    }

    #[test]
    fn test_linear_move() {
        let cmd = GCodeCommand::LinearMove {
            x: Some(10.0),
            y: Some(20.0),
            z: Some(0.3),
            e: Some(1.5),
            f: None,
        };
        assert_eq!(cmd.to_gcode(), "G1 X10.000 Y20.000 Z0.300 E1.50000");
    }

    #[test]
    fn test_fan_and_tool_commands() {
        assert_eq!(GCodeCommand::SetFanSpeed { s: 255 }.to_gcode(), "M106 S255");
        assert_eq!(GCodeCommand::FanOff.to_gcode(), "M107");
        assert_eq!(GCodeCommand::SelectTool { t: 1 }.to_gcode(), "T1");
    }

    #[test]
    fn test_comment() {
        let cmd = GCodeCommand::Comment("LAYER:1".to_string());
        assert_eq!(cmd.to_gcode(), ";LAYER:1");
    }
}
