//! Slicing interfaces - how per-layer outlines reach the toolpath planner.
//!
//! Mesh loading and mesh/plane intersection are external collaborators. This
//! module defines the seams they plug into:
//! - [`MeshLoader`] - reads one [`TriangleMesh`] per extruder
//! - [`PlaneSlicer`] - cuts a mesh into per-layer outline areas
//! - [`SlicedInput`] - the serialized plane-slicer output the CLI consumes

use crate::geometry::{Point, Polygon, PolygonSet};
use crate::{scale, unscale, Coord, CoordF, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// An indexed triangle mesh in millimetres.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<[CoordF; 3]>,
    pub triangles: Vec<[usize; 3]>,
}

impl TriangleMesh {
    pub fn new(vertices: Vec<[CoordF; 3]>, triangles: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            triangles,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Lowest and highest Z of all vertices, or `None` for an empty mesh.
    pub fn z_range(&self) -> Option<(CoordF, CoordF)> {
        self.vertices.iter().fold(None, |acc, v| match acc {
            None => Some((v[2], v[2])),
            Some((lo, hi)) => Some((lo.min(v[2]), hi.max(v[2]))),
        })
    }

    /// Check that every triangle references existing vertices.
    pub fn validate(&self) -> Result<()> {
        let n = self.vertices.len();
        if let Some(bad) = self.triangles.iter().find(|t| t.iter().any(|&i| i >= n)) {
            return Err(Error::Mesh(format!(
                "triangle {:?} references a vertex outside 0..{}",
                bad, n
            )));
        }
        Ok(())
    }
}

/// Layer stacking parameters handed to a [`PlaneSlicer`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlicingParams {
    /// First layer height (mm).
    pub first_layer_height: CoordF,
    /// Height of every other layer (mm).
    pub layer_height: CoordF,
}

impl SlicingParams {
    pub fn new(first_layer_height: CoordF, layer_height: CoordF) -> Self {
        Self {
            first_layer_height,
            layer_height,
        }
    }

    /// Height at which `layer_index` is cut: the middle of the layer.
    pub fn slice_z(&self, layer_index: usize) -> CoordF {
        if layer_index == 0 {
            self.first_layer_height / 2.0
        } else {
            self.first_layer_height + (layer_index as CoordF - 0.5) * self.layer_height
        }
    }

    /// Number of layers needed to cover a model `height` mm tall.
    pub fn layer_count(&self, height: CoordF) -> usize {
        if height <= 0.0 {
            return 0;
        }
        if height <= self.first_layer_height {
            return 1;
        }
        1 + ((height - self.first_layer_height) / self.layer_height).ceil() as usize
    }
}

/// Reads the meshes to print, one per extruder.
pub trait MeshLoader {
    /// Load meshes from `path`. Failures are reported as [`Error::Mesh`].
    fn load(&self, path: &Path) -> Result<Vec<TriangleMesh>>;
}

/// Cuts a mesh into per-layer outline areas.
pub trait PlaneSlicer {
    /// One area per layer, bottom first. Failures are reported as
    /// [`Error::Slicing`].
    fn slice(&self, mesh: &TriangleMesh, params: &SlicingParams) -> Result<Vec<PolygonSet>>;
}

/// Serialized plane-slicer output: per extruder, per layer, a list of closed
/// contours in millimetres.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SlicedInput {
    #[serde(default)]
    pub first_layer_height: Option<CoordF>,
    #[serde(default)]
    pub layer_height: Option<CoordF>,
    pub extruders: Vec<Vec<Vec<Vec<[CoordF; 2]>>>>,
}

impl SlicedInput {
    /// Read a sliced-input JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Slicing(format!("invalid sliced input: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Slicing(e.to_string()))
    }

    /// Build an input from per-extruder, per-layer areas.
    pub fn from_outlines(outlines: &[Vec<PolygonSet>]) -> Self {
        let extruders = outlines
            .iter()
            .map(|layers| {
                layers
                    .iter()
                    .map(|set| {
                        set.iter()
                            .map(|poly| poly.iter().map(|p| [unscale(p.x), unscale(p.y)]).collect())
                            .collect()
                    })
                    .collect()
            })
            .collect();
        Self {
            first_layer_height: None,
            layer_height: None,
            extruders,
        }
    }

    /// Convert to scaled outline areas, per extruder and layer.
    pub fn into_outlines(self) -> Vec<Vec<PolygonSet>> {
        self.extruders
            .into_iter()
            .map(|layers| {
                layers
                    .into_iter()
                    .map(|contours| {
                        contours
                            .into_iter()
                            .map(|ring| {
                                ring.into_iter()
                                    .map(|[x, y]| Point::new(scale(x), scale(y)))
                                    .collect::<Polygon>()
                            })
                            .collect::<PolygonSet>()
                    })
                    .collect()
            })
            .collect()
    }

    pub fn extruder_count(&self) -> usize {
        self.extruders.len()
    }

    pub fn layer_count(&self) -> usize {
        self.extruders.iter().map(|e| e.len()).max().unwrap_or(0)
    }
}

/// Every extruder must have the same number of layers; empty layers are
/// allowed.
pub fn check_layer_counts(outlines: &[Vec<PolygonSet>]) -> Result<usize> {
    let count = outlines.first().map(|e| e.len()).unwrap_or(0);
    for (extruder, layers) in outlines.iter().enumerate() {
        if layers.len() != count {
            return Err(Error::Invariant(format!(
                "extruder {} has {} layers, extruder 0 has {}",
                extruder,
                layers.len(),
                count
            )));
        }
    }
    Ok(count)
}

/// Slice every mesh with `slicer` and pad the shorter stacks with empty layers
/// so all extruders share one layer count.
pub fn slice_meshes(
    meshes: &[TriangleMesh],
    slicer: &dyn PlaneSlicer,
    params: &SlicingParams,
) -> Result<Vec<Vec<PolygonSet>>> {
    let mut outlines = Vec::with_capacity(meshes.len());
    for mesh in meshes {
        mesh.validate()?;
        outlines.push(slicer.slice(mesh, params)?);
    }
    let count = outlines.iter().map(|l: &Vec<PolygonSet>| l.len()).max().unwrap_or(0);
    for layers in &mut outlines {
        layers.resize_with(count, PolygonSet::new);
    }
    Ok(outlines)
}

/// Z of a slicing plane on the µm grid.
#[inline]
pub fn scaled_slice_z(params: &SlicingParams, layer_index: usize) -> Coord {
    scale(params.slice_z(layer_index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slicing_params() {
        let params = SlicingParams::new(0.3, 0.2);
        assert!((params.slice_z(0) - 0.15).abs() < 1e-9);
        assert!((params.slice_z(1) - 0.4).abs() < 1e-9);
        assert_eq!(params.layer_count(0.3), 1);
        assert_eq!(params.layer_count(10.0), 50);
        assert_eq!(params.layer_count(0.0), 0);
        assert_eq!(scaled_slice_z(&params, 2), 600);
    }

    #[test]
    fn test_sliced_input_json() {
        let json = r#"{"extruders": [[[[[0,0],[10,0],[10,10],[0,10]]], []]]}"#;
        let input = SlicedInput::from_json(json).unwrap();
        assert_eq!(input.extruder_count(), 1);
        assert_eq!(input.layer_count(), 2);
        let outlines = input.into_outlines();
        assert_eq!(outlines[0][0].len(), 1);
        assert_eq!(outlines[0][0][0][2], Point::new(10_000, 10_000));
        assert!(outlines[0][1].is_empty());
    }

    #[test]
    fn test_sliced_input_from_outlines_writes_mm() {
        let square: PolygonSet =
            Polygon::rectangle(Point::new(0, 0), Point::new(2_500, 2_500)).into();
        let input = SlicedInput::from_outlines(&[vec![square.clone(), PolygonSet::new()]]);
        assert_eq!(input.extruders[0][0][0][2], [2.5, 2.5]);

        let json = input.to_json().unwrap();
        let back = SlicedInput::from_json(&json).unwrap().into_outlines();
        assert_eq!(back[0][0], square);
        assert!(back[0][1].is_empty());
    }

    #[test]
    fn test_sliced_input_rejects_garbage() {
        assert!(matches!(SlicedInput::from_json("{"), Err(Error::Slicing(_))));
    }

    #[test]
    fn test_check_layer_counts() {
        let ok = vec![vec![PolygonSet::new(); 3], vec![PolygonSet::new(); 3]];
        assert_eq!(check_layer_counts(&ok).unwrap(), 3);
        let bad = vec![vec![PolygonSet::new(); 3], vec![PolygonSet::new(); 2]];
        assert!(matches!(check_layer_counts(&bad), Err(Error::Invariant(_))));
    }

    #[test]
    fn test_mesh_validate() {
        let mesh = TriangleMesh::new(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]], vec![[0, 1, 2]]);
        assert!(matches!(mesh.validate(), Err(Error::Mesh(_))));
        assert_eq!(mesh.z_range(), Some((0.0, 0.0)));
    }
}
