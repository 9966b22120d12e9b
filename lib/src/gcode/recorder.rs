//! In-memory motion sink.

use super::MotionSink;
use crate::geometry::Point;
use crate::{Coord, CoordF, Error, Result};

/// One call received by a [`CommandRecorder`].
#[derive(Debug, Clone, PartialEq)]
pub enum MotionEvent {
    SetZ(Coord),
    Travel {
        to: Point,
        speed: CoordF,
    },
    Extrude {
        to: Point,
        z: Coord,
        speed: CoordF,
        line_width: Coord,
        layer_thickness: Coord,
    },
    Retract,
    Unretract,
    Fan(u32),
    Extruder(usize),
    Raw(String),
    Comment(String),
    Layer(usize),
    Finish,
}

/// Records every motion call; used by tests and by the `info` command.
#[derive(Debug, Clone, Default)]
pub struct CommandRecorder {
    events: Vec<MotionEvent>,
    position: Point,
    z: Coord,
    finished: bool,
}

impl CommandRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[MotionEvent] {
        &self.events
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Indices of the layers that were started, in order.
    pub fn layers(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|e| match e {
                MotionEvent::Layer(i) => Some(*i),
                _ => None,
            })
            .collect()
    }

    /// Events between the marker of `layer_index` and the next marker.
    pub fn layer_events(&self, layer_index: usize) -> &[MotionEvent] {
        let start = self
            .events
            .iter()
            .position(|e| *e == MotionEvent::Layer(layer_index));
        let Some(start) = start else {
            return &[];
        };
        let end = self.events[start + 1..]
            .iter()
            .position(|e| matches!(e, MotionEvent::Layer(_) | MotionEvent::Finish))
            .map(|offset| start + 1 + offset)
            .unwrap_or(self.events.len());
        &self.events[start + 1..end]
    }

    pub fn extrusion_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, MotionEvent::Extrude { .. }))
            .count()
    }

    fn record(&mut self, event: MotionEvent) -> Result<()> {
        if self.finished {
            return Err(Error::GCode("write after finish".into()));
        }
        self.events.push(event);
        Ok(())
    }
}

impl MotionSink for CommandRecorder {
    fn set_z(&mut self, z: Coord) -> Result<()> {
        if z != self.z {
            self.record(MotionEvent::SetZ(z))?;
            self.z = z;
        }
        Ok(())
    }

    fn travel(&mut self, to: Point, speed: CoordF) -> Result<()> {
        self.record(MotionEvent::Travel { to, speed })?;
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
        self.record(MotionEvent::Extrude {
            to,
            z: self.z,
            speed,
            line_width,
            layer_thickness,
        })?;
        self.position = to;
        Ok(())
    }

    fn retract(&mut self) -> Result<()> {
        self.record(MotionEvent::Retract)
    }

    fn unretract(&mut self) -> Result<()> {
        self.record(MotionEvent::Unretract)
    }

    fn set_fan(&mut self, percent: u32) -> Result<()> {
        self.record(MotionEvent::Fan(percent))
    }

    fn set_extruder(&mut self, extruder: usize) -> Result<()> {
        self.record(MotionEvent::Extruder(extruder))
    }

    fn write_raw(&mut self, text: &str) -> Result<()> {
        self.record(MotionEvent::Raw(text.to_string()))
    }

    fn comment(&mut self, text: &str) -> Result<()> {
        self.record(MotionEvent::Comment(text.to_string()))
    }

    fn layer_comment(&mut self, layer_index: usize) -> Result<()> {
        self.record(MotionEvent::Layer(layer_index))
    }

    fn position(&self) -> Point {
        self.position
    }

    fn current_z(&self) -> Coord {
        self.z
    }

    fn finish(&mut self) -> Result<()> {
        if !self.finished {
            self.events.push(MotionEvent::Finish);
            self.finished = true;
        }
        Ok(())
    }
}
