//! Heterogeneous geometry set: every component is optional.

use std::collections::BTreeMap;

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mesh {
    pub positions: Vec<Point3<f64>>,
    /// Cached vertex normals; `None` when not computed.
    pub vertex_normals: Option<Vec<Vector3<f64>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Curves {
    pub positions: Vec<Point3<f64>>,
    /// Bezier handles, present only for bezier curves.
    pub handle_left: Option<Vec<Point3<f64>>>,
    pub handle_right: Option<Vec<Point3<f64>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Bounds {
    pub fn of(points: &[Point3<f64>]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        Some(rest.iter().fold(
            Self {
                min: *first,
                max: *first,
            },
            |b, p| Self {
                min: b.min.inf(p),
                max: b.max.sup(p),
            },
        ))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointCloud {
    pub positions: Vec<Point3<f64>>,
    /// Cached bounds; kept in sync by translation, dropped by other edits.
    pub bounds: Option<Bounds>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub local_transform: Matrix4<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreasePencil {
    pub layers: Vec<Layer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeGrid {
    pub name: String,
    /// Index space to object space.
    pub transform: Matrix4<f64>,
    pub voxels: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Volume {
    pub grids: Vec<VolumeGrid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Instances {
    pub transforms: Vec<Matrix4<f64>>,
}

/// Deformed positions and per-point deform matrices of original curves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveEditHints {
    pub positions: Option<Vec<Point3<f64>>>,
    pub deform_mats: Option<Vec<Matrix3<f64>>>,
    /// Point count of the original curves.
    pub point_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawingEditHints {
    pub positions: Option<Vec<Point3<f64>>>,
    pub deform_mats: Option<Vec<Matrix3<f64>>>,
    /// Point count of the original drawing.
    pub point_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreasePencilEditHints {
    pub drawing_hints: Option<Vec<DrawingEditHints>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GizmoEditHints {
    pub gizmo_transforms: BTreeMap<String, Matrix4<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometrySet {
    pub mesh: Option<Mesh>,
    pub curves: Option<Curves>,
    pub point_cloud: Option<PointCloud>,
    pub grease_pencil: Option<GreasePencil>,
    pub volume: Option<Volume>,
    pub instances: Option<Instances>,
    pub curve_edit_hints: Option<CurveEditHints>,
    pub grease_pencil_edit_hints: Option<GreasePencilEditHints>,
    pub gizmo_edit_hints: Option<GizmoEditHints>,
}

impl GeometrySet {
    pub fn is_empty(&self) -> bool {
        self.component_count() == 0
    }

    /// Number of present components.
    pub fn component_count(&self) -> usize {
        [
            self.mesh.is_some(),
            self.curves.is_some(),
            self.point_cloud.is_some(),
            self.grease_pencil.is_some(),
            self.volume.is_some(),
            self.instances.is_some(),
            self.curve_edit_hints.is_some(),
            self.grease_pencil_edit_hints.is_some(),
            self.gizmo_edit_hints.is_some(),
        ]
        .into_iter()
        .filter(|&present| present)
        .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_of_points() {
        let bounds = Bounds::of(&[
            Point3::new(1.0, -2.0, 0.0),
            Point3::new(-1.0, 3.0, 0.5),
            Point3::new(0.0, 0.0, -4.0),
        ])
        .unwrap();
        assert_eq!(bounds.min, Point3::new(-1.0, -2.0, -4.0));
        assert_eq!(bounds.max, Point3::new(1.0, 3.0, 0.5));
        assert!(Bounds::of(&[]).is_none());
    }

    #[test]
    fn partial_set_from_json() {
        let set: GeometrySet = serde_json::from_str(
            r#"{ "point_cloud": { "positions": [[0, 0, 0], [1, 2, 3]] } }"#,
        )
        .unwrap();
        assert_eq!(set.component_count(), 1);
        assert_eq!(set.point_cloud.unwrap().positions[1], Point3::new(1.0, 2.0, 3.0));
    }
}
