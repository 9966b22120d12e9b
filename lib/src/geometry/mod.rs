//! Geometry on the µm grid.
//!
//! - [`Point`] / [`Point3`]: integer positions, 1 unit = 1 µm
//! - [`Line`]: one segment
//! - [`Polygon`]: closed contour, counter-clockwise for solids
//! - [`PolygonSet`]: an area; clockwise contours are holes
//! - [`Polyline`]: open path
//! - [`BoundingBox`]
//!
//! Convert with [`crate::scale`] (mm to units) and [`crate::unscale`].

mod bounding_box;
mod line;
mod point;
mod polygon;
mod polygon_set;
mod polyline;

pub use bounding_box::BoundingBox;
pub use line::{lines_intersect, Line};
pub use point::{Point, Point3};
pub use polygon::{Polygon, MIN_EDGE_LENGTH};
pub use polygon_set::PolygonSet;
pub use polyline::Polyline;

use crate::CoordF;

/// Interior angle at `b` formed by `a -> b -> c`, in degrees (0..=180).
///
/// Degenerate inputs report a straight angle.
pub fn corner_angle_degrees(a: Point, b: Point, c: Point) -> CoordF {
    let v1 = a - b;
    let v2 = c - b;
    let len = v1.length_f() * v2.length_f();
    if len <= 0.0 {
        return 180.0;
    }
    let cos = (v1.dot(&v2) as CoordF / len).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}
