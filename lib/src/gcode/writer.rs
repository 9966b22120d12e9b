//! Reference G-code sink.

use super::{GCodeCommand, MotionSink};
use crate::config::PrintConfig;
use crate::geometry::Point;
use crate::{unscale, Coord, CoordF, Error, Result};
use log::info;
use std::f64::consts::PI;
use std::io::Write;

/// Writes absolute XYZ moves with relative E.
///
/// Extrusion amounts follow from the line cross-section: width × layer
/// thickness × length, divided by the filament cross-section.
pub struct GCodeWriter<W: Write> {
    out: W,
    filament_area: CoordF,
    extrusion_multiplier: CoordF,
    retraction_length: CoordF,
    retraction_speed: CoordF,
    retraction_on_extruder_switch: CoordF,
    z_hop: Coord,

    position: Point,
    z: Coord,
    emitted_z: Option<Coord>,
    last_feedrate: Option<CoordF>,
    /// Filament currently pulled back (mm).
    retracted: CoordF,
    extruder: usize,
    fan: Option<u32>,
    /// Filament used per extruder (mm).
    filament_used: Vec<CoordF>,
    bytes_written: usize,
    header_written: bool,
    finished: bool,
}

impl<W: Write> GCodeWriter<W> {
    pub fn new(out: W, config: &PrintConfig) -> Self {
        let radius = config.filament_diameter / 2.0;
        Self {
            out,
            filament_area: PI * radius * radius,
            extrusion_multiplier: config.extrusion_multiplier,
            retraction_length: config.retraction_length,
            retraction_speed: config.retraction_speed,
            retraction_on_extruder_switch: config.retraction_on_extruder_switch,
            z_hop: crate::scale(config.retraction_z_hop),
            position: Point::zero(),
            z: 0,
            emitted_z: None,
            last_feedrate: None,
            retracted: 0.0,
            extruder: 0,
            fan: None,
            filament_used: vec![0.0],
            bytes_written: 0,
            header_written: false,
            finished: false,
        }
    }

    /// Total filament pushed per extruder (mm).
    pub fn filament_used(&self) -> &[CoordF] {
        &self.filament_used
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    /// Give back the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, cmd: GCodeCommand) -> Result<()> {
        self.emit_line(&cmd.to_gcode())
    }

    fn emit_line(&mut self, line: &str) -> Result<()> {
        if self.finished {
            return Err(Error::GCode("write after finish".into()));
        }
        if !self.header_written {
            self.header_written = true;
            let header = format!(
                "{}\n{}\n",
                GCodeCommand::AbsolutePositioning.to_gcode(),
                GCodeCommand::RelativeExtrusion.to_gcode()
            );
            self.out.write_all(header.as_bytes())?;
            self.bytes_written += header.len();
        }
        self.out.write_all(line.as_bytes())?;
        self.out.write_all(b"\n")?;
        self.bytes_written += line.len() + 1;
        Ok(())
    }

    /// Feedrate in mm/min, only when it changed.
    fn feedrate(&mut self, speed: CoordF) -> Option<CoordF> {
        let f = speed * 60.0;
        if self.last_feedrate == Some(f) {
            None
        } else {
            self.last_feedrate = Some(f);
            Some(f)
        }
    }

    /// Z to emit with the next move, only when it changed.
    fn pending_z(&mut self) -> Option<CoordF> {
        let z = self.z + if self.retracted > 0.0 { self.z_hop } else { 0 };
        if self.emitted_z == Some(z) {
            None
        } else {
            self.emitted_z = Some(z);
            Some(unscale(z))
        }
    }

    fn retract_by(&mut self, length: CoordF) -> Result<()> {
        if self.retracted > 0.0 || length <= 0.0 {
            return Ok(());
        }
        let f = self.feedrate(self.retraction_speed);
        self.emit(GCodeCommand::LinearMove {
            x: None,
            y: None,
            z: None,
            e: Some(-length),
            f,
        })?;
        self.retracted = length;
        if self.z_hop > 0 {
            let z = self.pending_z();
            self.emit(GCodeCommand::RapidMove {
                x: None,
                y: None,
                z,
                f: None,
            })?;
        }
        Ok(())
    }
}

impl<W: Write> MotionSink for GCodeWriter<W> {
    fn set_z(&mut self, z: Coord) -> Result<()> {
        self.z = z;
        Ok(())
    }

    fn travel(&mut self, to: Point, speed: CoordF) -> Result<()> {
        let f = self.feedrate(speed);
        let z = self.pending_z();
        self.emit(GCodeCommand::RapidMove {
            x: Some(unscale(to.x)),
            y: Some(unscale(to.y)),
            z,
            f,
        })?;
        self.position = to;
        Ok(())
    }

    fn extrude(
        &mut self,
        to: Point,
        speed: CoordF,
        line_width: Coord,
        layer_thickness: Coord,
    ) -> Result<()> {
        if self.retracted > 0.0 {
            self.unretract()?;
        }
        let length = unscale(self.position.distance(&to).round() as Coord);
        let volume = unscale(line_width) * unscale(layer_thickness) * length;
        let e = volume / self.filament_area * self.extrusion_multiplier;
        if let Some(used) = self.filament_used.get_mut(self.extruder) {
            *used += e;
        }
        let f = self.feedrate(speed);
        let z = self.pending_z();
        self.emit(GCodeCommand::LinearMove {
            x: Some(unscale(to.x)),
            y: Some(unscale(to.y)),
            z,
            e: Some(e),
            f,
        })?;
        self.position = to;
        Ok(())
    }

    fn retract(&mut self) -> Result<()> {
        self.retract_by(self.retraction_length)
    }

    fn unretract(&mut self) -> Result<()> {
        if self.retracted <= 0.0 {
            return Ok(());
        }
        let length = self.retracted;
        self.retracted = 0.0;
        let f = self.feedrate(self.retraction_speed);
        let z = self.pending_z();
        if z.is_some() {
            self.emit(GCodeCommand::RapidMove {
                x: None,
                y: None,
                z,
                f: None,
            })?;
        }
        self.emit(GCodeCommand::LinearMove {
            x: None,
            y: None,
            z: None,
            e: Some(length),
            f,
        })
    }

    fn set_fan(&mut self, percent: u32) -> Result<()> {
        let percent = percent.min(100);
        if self.fan == Some(percent) {
            return Ok(());
        }
        self.fan = Some(percent);
        if percent == 0 {
            self.emit(GCodeCommand::FanOff)
        } else {
            self.emit(GCodeCommand::SetFanSpeed {
                s: percent * 255 / 100,
            })
        }
    }

    fn set_extruder(&mut self, extruder: usize) -> Result<()> {
        if extruder == self.extruder {
            return Ok(());
        }
        self.retract_by(self.retraction_on_extruder_switch)?;
        self.emit(GCodeCommand::SelectTool { t: extruder })?;
        self.emit(GCodeCommand::SetPosition { e: 0.0 })?;
        self.extruder = extruder;
        if self.filament_used.len() <= extruder {
            self.filament_used.resize(extruder + 1, 0.0);
        }
        Ok(())
    }

    fn write_raw(&mut self, text: &str) -> Result<()> {
        for line in text.lines() {
            self.emit(GCodeCommand::Raw(line.to_string()))?;
        }
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<()> {
        self.emit(GCodeCommand::Comment(text.to_string()))
    }

    fn position(&self) -> Point {
        self.position
    }

    fn current_z(&self) -> Coord {
        self.z
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        let used: Vec<String> = self
            .filament_used
            .iter()
            .map(|mm| format!("{:.1}mm", mm))
            .collect();
        self.comment(&format!("filament used = {}", used.join(", ")))?;
        self.out.flush()?;
        self.finished = true;
        info!(
            "G-code finished: {} bytes, filament {}",
            self.bytes_written,
            used.join(", ")
        );
        Ok(())
    }
}
