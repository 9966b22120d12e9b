//! # layerpath
//!
//! Layer toolpath generation for fused-filament 3D printing.
//!
//! This library turns per-layer outline polygons (produced by an external
//! plane slicer from a triangle mesh) into ordered extrusion paths and streams
//! them into a motion-command sink:
//! - Island/region model: inset rings, solid top/bottom skins, sparse infill areas
//! - Support area computation with interface and air-gap layers
//! - Infill pattern generation (lines, grid, triangles, hexagon, concentric)
//! - Nearest-neighbour path ordering with seam placement
//! - Per-layer path planning with retraction, cooling and fan policy
//!
//! ## Example
//!
//! ```rust,ignore
//! use layerpath::{CancellationToken, CommandRecorder, PrintConfig, PrintPipeline};
//!
//! let pipeline = PrintPipeline::new(PrintConfig::default())?;
//! let mut sink = CommandRecorder::new();
//! let summary = pipeline.run(outlines, &mut sink, &CancellationToken::new())?;
//! ```

pub mod adhesion;
pub mod bridge;
pub mod cancel;
pub mod clipper;
pub mod config;
pub mod gcode;
pub mod geometry;
pub mod infill;
pub mod island;
pub mod order;
pub mod pipeline;
pub mod slice;
pub mod support;

pub use cancel::CancellationToken;
pub use config::{InfillPattern, PrintConfig, SupportKind};
pub use gcode::{
    CommandRecorder, ExtrusionRole, GCodeCommand, GCodeWriter, LayerPlanner, MotionSink,
    PathStyle, PathStyles,
};
pub use geometry::{BoundingBox, Line, Point, Point3, Polygon, PolygonSet, Polyline};
pub use infill::{generate_infill, generate_line_paths, InfillPath};
pub use island::{Island, Layer, LayerStack};
pub use order::{best_edge_index, closest_index, PathOrderOptimizer};
pub use pipeline::{PrintPipeline, PrintSummary, SlicedModel};
pub use slice::{MeshLoader, PlaneSlicer, SlicedInput, SlicingParams, TriangleMesh};
pub use support::SupportAreas;

/// Planar coordinate in µm. Clipping and containment stay exact on integers.
pub type Coord = i64;

/// Millimetres, speeds and other unscaled quantities.
pub type CoordF = f64;

/// Units per millimetre.
pub const SCALING_FACTOR: f64 = 1_000.0;

/// mm to µm, rounded to the nearest unit.
#[inline]
pub fn scale(v: CoordF) -> Coord {
    (v * SCALING_FACTOR).round() as Coord
}

/// µm to mm.
#[inline]
pub fn unscale(v: Coord) -> CoordF {
    v as CoordF / SCALING_FACTOR
}

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for toolpath operations.
///
/// Degenerate geometry is never an error: operations return empty areas
/// instead, and callers treat those as nothing to do.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mesh error: {0}")]
    Mesh(String),

    #[error("Slicing error: {0}")]
    Slicing(String),

    #[error("G-code error: {0}")]
    GCode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid geometry: {0}")]
    Geometry(String),

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Cancelled")]
    Cancelled,
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaling() {
        // 1mm should scale to 1_000
        assert_eq!(scale(1.0), 1_000);
        assert!((unscale(1_000) - 1.0).abs() < 1e-10);

        // 1 micron is the grid resolution
        assert_eq!(scale(0.001), 1);
        assert_eq!(scale(0.0004), 0);
        assert_eq!(scale(-2.5), -2_500);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(Error::Cancelled.to_string(), "Cancelled");
        assert_eq!(
            Error::Invariant("layer counts differ".into()).to_string(),
            "Invariant violated: layer counts differ"
        );
    }
}
