//! Translate and transform every component of a [`GeometrySet`].
//!
//! Per-element loops run on rayon in fixed-size chunks; elements are
//! independent so no ordering is implied.

use nalgebra::{Matrix3, Matrix4, Point3, UnitQuaternion, Vector3};
use rayon::prelude::*;

use crate::geometry::{
    CurveEditHints, Curves, GeometrySet, GizmoEditHints, GreasePencil, GreasePencilEditHints,
    Instances, Mesh, PointCloud, Volume,
};

const TRANSLATE_CHUNK: usize = 2048;
const TRANSFORM_CHUNK: usize = 1024;

/// Smallest grid determinant a volume can keep its voxels at.
const VOLUME_DETERMINANT_MIN: f64 = 3.0e-15;

/// Problems raised while transforming volumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformErrors {
    /// A grid collapsed below the determinant bound and was cleared.
    pub volume_too_small: bool,
    /// A grid matrix could not be applied and was left unchanged.
    pub bad_volume_transform: bool,
}

// ── Element loops ────────────────────────────────────────

fn translate_positions(positions: &mut [Point3<f64>], translation: &Vector3<f64>) {
    positions.par_chunks_mut(TRANSLATE_CHUNK).for_each(|chunk| {
        for position in chunk {
            *position += translation;
        }
    });
}

fn transform_positions(positions: &mut [Point3<f64>], matrix: &Matrix4<f64>) {
    positions.par_chunks_mut(TRANSFORM_CHUNK).for_each(|chunk| {
        for position in chunk {
            *position = transform_point(matrix, position);
        }
    });
}

/// Affine point transform; the bottom row is ignored.
pub fn transform_point(matrix: &Matrix4<f64>, point: &Point3<f64>) -> Point3<f64> {
    Point3::from(linear_part(matrix) * point.coords + location(matrix))
}

fn linear_part(matrix: &Matrix4<f64>) -> Matrix3<f64> {
    matrix.fixed_view::<3, 3>(0, 0).into_owned()
}

fn location(matrix: &Matrix4<f64>) -> Vector3<f64> {
    matrix.fixed_view::<3, 1>(0, 3).into_owned()
}

fn add_location(matrix: &mut Matrix4<f64>, translation: &Vector3<f64>) {
    let mut column = matrix.fixed_view_mut::<3, 1>(0, 3);
    column += translation;
}

fn premultiply_all(matrices: &mut [Matrix4<f64>], transform: &Matrix4<f64>) {
    matrices.par_chunks_mut(TRANSFORM_CHUNK).for_each(|chunk| {
        for m in chunk {
            *m = transform * *m;
        }
    });
}

fn premultiply_deform(deform_mats: &mut Option<Vec<Matrix3<f64>>>, deform: Matrix3<f64>, point_count: usize) {
    match deform_mats {
        Some(mats) => mats.par_chunks_mut(TRANSFORM_CHUNK).for_each(|chunk| {
            for m in chunk {
                *m = deform * *m;
            }
        }),
        None => *deform_mats = Some(vec![deform; point_count]),
    }
}

// ── Components ───────────────────────────────────────────

fn translate_mesh(mesh: &mut Mesh, translation: &Vector3<f64>) {
    translate_positions(&mut mesh.positions, translation);
}

fn transform_mesh_matrix(mesh: &mut Mesh, matrix: &Matrix4<f64>) {
    transform_positions(&mut mesh.positions, matrix);
    if mesh.vertex_normals.is_none() {
        return;
    }
    match linear_part(matrix).try_inverse() {
        Some(inverse) => {
            let normal_matrix = inverse.transpose();
            if let Some(normals) = mesh.vertex_normals.as_mut() {
                normals.par_chunks_mut(TRANSFORM_CHUNK).for_each(|chunk| {
                    for n in chunk {
                        *n = (normal_matrix * *n).try_normalize(0.0).unwrap_or_else(Vector3::zeros);
                    }
                });
            }
        }
        // Singular transform: the cache can't be carried over.
        None => mesh.vertex_normals = None,
    }
}

fn translate_curves(curves: &mut Curves, translation: &Vector3<f64>) {
    translate_positions(&mut curves.positions, translation);
    for handles in [&mut curves.handle_left, &mut curves.handle_right].into_iter().flatten() {
        translate_positions(handles, translation);
    }
}

fn transform_curves(curves: &mut Curves, matrix: &Matrix4<f64>) {
    transform_positions(&mut curves.positions, matrix);
    for handles in [&mut curves.handle_left, &mut curves.handle_right].into_iter().flatten() {
        transform_positions(handles, matrix);
    }
}

fn translate_point_cloud(point_cloud: &mut PointCloud, translation: &Vector3<f64>) {
    translate_positions(&mut point_cloud.positions, translation);
    if let Some(bounds) = point_cloud.bounds.as_mut() {
        bounds.min += translation;
        bounds.max += translation;
    }
}

fn transform_point_cloud(point_cloud: &mut PointCloud, matrix: &Matrix4<f64>) {
    transform_positions(&mut point_cloud.positions, matrix);
    point_cloud.bounds = None;
}

fn translate_grease_pencil(grease_pencil: &mut GreasePencil, translation: &Vector3<f64>) {
    for layer in &mut grease_pencil.layers {
        add_location(&mut layer.local_transform, translation);
    }
}

fn transform_grease_pencil(grease_pencil: &mut GreasePencil, matrix: &Matrix4<f64>) {
    for layer in &mut grease_pencil.layers {
        layer.local_transform = matrix * layer.local_transform;
    }
}

fn transform_volume(volume: &mut Volume, matrix: &Matrix4<f64>, errors: &mut TransformErrors) {
    for grid in &mut volume.grids {
        let mut grid_matrix = matrix * grid.transform;
        let determinant = grid_matrix.determinant();
        let determinant_valid = determinant.abs() >= VOLUME_DETERMINANT_MIN;
        if !determinant_valid {
            errors.volume_too_small = true;
            grid.voxels.clear();
            let mut basis = grid_matrix.fixed_view_mut::<3, 3>(0, 0);
            if determinant == 0.0 {
                basis.fill_with_identity();
            } else {
                // Keep rotation, reset scale.
                for mut axis in basis.column_iter_mut() {
                    let normalized = axis.try_normalize(0.0).unwrap_or_else(Vector3::zeros);
                    axis.copy_from(&normalized);
                }
            }
            log::debug!("volume grid '{}' too small, cleared", grid.name);
        }
        if is_valid_grid_transform(&grid_matrix) {
            grid.transform = grid_matrix;
        } else {
            log::warn!("volume grid '{}' has a non-affine transform", grid.name);
            errors.bad_volume_transform = true;
        }
    }
}

fn is_valid_grid_transform(matrix: &Matrix4<f64>) -> bool {
    matrix.iter().all(|v| v.is_finite())
        && matrix[(3, 0)] == 0.0
        && matrix[(3, 1)] == 0.0
        && matrix[(3, 2)] == 0.0
        && matrix[(3, 3)] == 1.0
}

fn translate_volume(volume: &mut Volume, translation: &Vector3<f64>) {
    let mut errors = TransformErrors::default();
    transform_volume(volume, &Matrix4::new_translation(translation), &mut errors);
}

fn translate_instances(instances: &mut Instances, translation: &Vector3<f64>) {
    instances.transforms.par_chunks_mut(TRANSFORM_CHUNK).for_each(|chunk| {
        for m in chunk {
            add_location(m, translation);
        }
    });
}

fn transform_instances(instances: &mut Instances, matrix: &Matrix4<f64>) {
    premultiply_all(&mut instances.transforms, matrix);
}

fn translate_curve_edit_hints(hints: &mut CurveEditHints, translation: &Vector3<f64>) {
    if let Some(positions) = hints.positions.as_mut() {
        translate_positions(positions, translation);
    }
}

fn transform_curve_edit_hints(hints: &mut CurveEditHints, matrix: &Matrix4<f64>) {
    if let Some(positions) = hints.positions.as_mut() {
        transform_positions(positions, matrix);
    }
    premultiply_deform(&mut hints.deform_mats, linear_part(matrix), hints.point_count);
}

fn transform_grease_pencil_edit_hints(hints: &mut GreasePencilEditHints, matrix: &Matrix4<f64>) {
    let Some(drawing_hints) = hints.drawing_hints.as_mut() else {
        return;
    };
    for drawing in drawing_hints {
        if let Some(positions) = drawing.positions.as_mut() {
            transform_positions(positions, matrix);
        }
        premultiply_deform(&mut drawing.deform_mats, linear_part(matrix), drawing.point_count);
    }
}

fn translate_gizmo_edit_hints(hints: &mut GizmoEditHints, translation: &Vector3<f64>) {
    for m in hints.gizmo_transforms.values_mut() {
        add_location(m, translation);
    }
}

fn transform_gizmo_edit_hints(hints: &mut GizmoEditHints, matrix: &Matrix4<f64>) {
    for m in hints.gizmo_transforms.values_mut() {
        *m = matrix * *m;
    }
}

// ── Dispatch ─────────────────────────────────────────────

/// Move every component by `translation`. Grease-pencil edit hints are
/// left alone; their positions follow the drawings.
pub fn translate_geometry(geometry: &mut GeometrySet, translation: &Vector3<f64>) {
    if *translation == Vector3::zeros() {
        return;
    }
    if let Some(curves) = geometry.curves.as_mut() {
        translate_curves(curves, translation);
    }
    if let Some(mesh) = geometry.mesh.as_mut() {
        translate_mesh(mesh, translation);
    }
    if let Some(point_cloud) = geometry.point_cloud.as_mut() {
        translate_point_cloud(point_cloud, translation);
    }
    if let Some(grease_pencil) = geometry.grease_pencil.as_mut() {
        translate_grease_pencil(grease_pencil, translation);
    }
    if let Some(volume) = geometry.volume.as_mut() {
        translate_volume(volume, translation);
    }
    if let Some(instances) = geometry.instances.as_mut() {
        translate_instances(instances, translation);
    }
    if let Some(hints) = geometry.curve_edit_hints.as_mut() {
        translate_curve_edit_hints(hints, translation);
    }
    if let Some(hints) = geometry.gizmo_edit_hints.as_mut() {
        translate_gizmo_edit_hints(hints, translation);
    }
}

/// Apply `matrix` to every component.
///
/// Returns `Some` only when a volume grid became too small; the record
/// then also carries any `bad_volume_transform` flag.
pub fn transform_geometry(geometry: &mut GeometrySet, matrix: &Matrix4<f64>) -> Option<TransformErrors> {
    if *matrix == Matrix4::identity() {
        return None;
    }
    let mut errors = TransformErrors::default();
    if let Some(curves) = geometry.curves.as_mut() {
        transform_curves(curves, matrix);
    }
    if let Some(mesh) = geometry.mesh.as_mut() {
        transform_mesh_matrix(mesh, matrix);
    }
    if let Some(point_cloud) = geometry.point_cloud.as_mut() {
        transform_point_cloud(point_cloud, matrix);
    }
    if let Some(grease_pencil) = geometry.grease_pencil.as_mut() {
        transform_grease_pencil(grease_pencil, matrix);
    }
    if let Some(volume) = geometry.volume.as_mut() {
        transform_volume(volume, matrix, &mut errors);
    }
    if let Some(instances) = geometry.instances.as_mut() {
        transform_instances(instances, matrix);
    }
    if let Some(hints) = geometry.curve_edit_hints.as_mut() {
        transform_curve_edit_hints(hints, matrix);
    }
    if let Some(hints) = geometry.grease_pencil_edit_hints.as_mut() {
        transform_grease_pencil_edit_hints(hints, matrix);
    }
    if let Some(hints) = geometry.gizmo_edit_hints.as_mut() {
        transform_gizmo_edit_hints(hints, matrix);
    }
    errors.volume_too_small.then_some(errors)
}

/// Location, rotation, scale applied to a mesh.
pub fn transform_mesh(mesh: &mut Mesh, translation: &Vector3<f64>, rotation: &UnitQuaternion<f64>, scale: &Vector3<f64>) {
    let matrix = Matrix4::new_translation(translation)
        * rotation.to_homogeneous()
        * Matrix4::new_nonuniform_scaling(scale);
    transform_mesh_matrix(mesh, &matrix);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Bounds, DrawingEditHints, Layer, VolumeGrid};
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn grid(transform: Matrix4<f64>) -> VolumeGrid {
        VolumeGrid {
            name: "density".into(),
            transform,
            voxels: vec![1.0; 8],
        }
    }

    #[test]
    fn zero_translation_is_noop() {
        let mut set = GeometrySet {
            mesh: Some(Mesh {
                positions: vec![Point3::new(1.0, 2.0, 3.0)],
                vertex_normals: None,
            }),
            ..GeometrySet::default()
        };
        let before = set.clone();
        translate_geometry(&mut set, &Vector3::zeros());
        assert_eq!(set, before);
    }

    #[test]
    fn translation_moves_every_component() {
        let t = Vector3::new(1.0, -2.0, 0.5);
        let positions: Vec<Point3<f64>> = (0..5000).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        let mut set = GeometrySet {
            point_cloud: Some(PointCloud {
                bounds: Bounds::of(&positions),
                positions: positions.clone(),
            }),
            curves: Some(Curves {
                positions: vec![Point3::origin()],
                handle_left: Some(vec![Point3::new(-1.0, 0.0, 0.0)]),
                handle_right: None,
            }),
            instances: Some(Instances {
                transforms: vec![Matrix4::identity(); 3],
            }),
            grease_pencil: Some(GreasePencil {
                layers: vec![Layer {
                    name: "ink".into(),
                    local_transform: Matrix4::new_scaling(2.0),
                }],
            }),
            ..GeometrySet::default()
        };
        translate_geometry(&mut set, &t);

        let cloud = set.point_cloud.unwrap();
        assert_eq!(cloud.positions[4999], positions[4999] + t);
        let bounds = cloud.bounds.unwrap();
        assert_eq!(bounds.min, Point3::new(1.0, -2.0, 0.5));
        assert_eq!(bounds.max, Point3::new(5000.0, -2.0, 0.5));

        let curves = set.curves.unwrap();
        assert_eq!(curves.handle_left.unwrap()[0], Point3::new(0.0, -2.0, 0.5));
        for m in set.instances.unwrap().transforms {
            assert_eq!(location(&m), t);
        }
        let layer = &set.grease_pencil.unwrap().layers[0];
        assert_eq!(location(&layer.local_transform), t);
        assert_eq!(layer.local_transform[(0, 0)], 2.0);
    }

    #[test]
    fn identity_transform_is_noop() {
        let mut set = GeometrySet {
            volume: Some(Volume {
                grids: vec![grid(Matrix4::identity())],
            }),
            ..GeometrySet::default()
        };
        let before = set.clone();
        assert_eq!(transform_geometry(&mut set, &Matrix4::identity()), None);
        assert_eq!(set, before);
    }

    #[test]
    fn transform_rotates_normals_and_points() {
        let rotation = UnitQuaternion::from_euler_angles(0.0, 0.0, FRAC_PI_2);
        let mut mesh = Mesh {
            positions: vec![Point3::new(1.0, 0.0, 0.0)],
            vertex_normals: Some(vec![Vector3::x()]),
        };
        transform_mesh(&mut mesh, &Vector3::new(0.0, 0.0, 1.0), &rotation, &Vector3::new(2.0, 2.0, 2.0));
        assert_relative_eq!(mesh.positions[0], Point3::new(0.0, 2.0, 1.0), epsilon = 1e-12);
        let normal = mesh.vertex_normals.unwrap()[0];
        assert_relative_eq!(normal, Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn non_uniform_scale_keeps_normals_perpendicular() {
        // Plane x + y = 1 squashed along Y.
        let mut set = GeometrySet {
            mesh: Some(Mesh {
                positions: vec![Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
                vertex_normals: Some(vec![Vector3::new(1.0, 1.0, 0.0).normalize(); 2]),
            }),
            ..GeometrySet::default()
        };
        let m = Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 0.5, 1.0));
        assert_eq!(transform_geometry(&mut set, &m), None);
        let mesh = set.mesh.unwrap();
        let edge = mesh.positions[1] - mesh.positions[0];
        let normal = mesh.vertex_normals.unwrap()[0];
        assert_relative_eq!(normal.dot(&edge), 0.0, epsilon = 1e-12);
        assert_relative_eq!(normal.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn singular_transform_drops_normal_cache() {
        let mut mesh = Mesh {
            positions: vec![Point3::new(1.0, 1.0, 1.0)],
            vertex_normals: Some(vec![Vector3::z()]),
        };
        transform_mesh_matrix(&mut mesh, &Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 1.0, 0.0)));
        assert_eq!(mesh.positions[0], Point3::new(1.0, 1.0, 0.0));
        assert!(mesh.vertex_normals.is_none());
    }

    #[test]
    fn collapsed_volume_is_cleared_and_reset() {
        let mut set = GeometrySet {
            volume: Some(Volume {
                grids: vec![grid(Matrix4::identity()), grid(Matrix4::new_scaling(1e-6))],
            }),
            ..GeometrySet::default()
        };
        let flatten = Matrix4::new_nonuniform_scaling(&Vector3::new(3.0, 3.0, 0.0));
        let errors = transform_geometry(&mut set, &flatten).unwrap();
        assert!(errors.volume_too_small);
        assert!(!errors.bad_volume_transform);
        for g in &set.volume.unwrap().grids {
            assert!(g.voxels.is_empty());
            // Zero determinant: identity basis.
            assert_eq!(linear_part(&g.transform), Matrix3::identity());
        }
    }

    #[test]
    fn tiny_volume_keeps_rotation() {
        let rotation = UnitQuaternion::from_euler_angles(0.0, 0.0, FRAC_PI_2).to_homogeneous();
        let mut set = GeometrySet {
            volume: Some(Volume {
                grids: vec![grid(rotation)],
            }),
            ..GeometrySet::default()
        };
        let errors = transform_geometry(&mut set, &Matrix4::new_scaling(1e-6)).unwrap();
        assert!(errors.volume_too_small);
        let grid = &set.volume.unwrap().grids[0];
        assert!(grid.voxels.is_empty());
        assert_relative_eq!(linear_part(&grid.transform), linear_part(&rotation), epsilon = 1e-12);
    }

    #[test]
    fn non_affine_grid_matrix_is_flagged_not_applied() {
        let mut volume = Volume {
            grids: vec![grid(Matrix4::identity())],
        };
        let mut projective = Matrix4::identity();
        projective[(3, 2)] = 1.0;
        let mut errors = TransformErrors::default();
        transform_volume(&mut volume, &projective, &mut errors);
        assert!(errors.bad_volume_transform);
        assert!(!errors.volume_too_small);
        assert_eq!(volume.grids[0].transform, Matrix4::identity());
        assert_eq!(volume.grids[0].voxels.len(), 8);
    }

    #[test]
    fn deform_matrices_created_or_premultiplied() {
        let m = Matrix4::new_nonuniform_scaling(&Vector3::new(2.0, 1.0, 1.0));
        let mut set = GeometrySet {
            curve_edit_hints: Some(CurveEditHints {
                positions: None,
                deform_mats: None,
                point_count: 4,
            }),
            grease_pencil_edit_hints: Some(GreasePencilEditHints {
                drawing_hints: Some(vec![DrawingEditHints {
                    positions: Some(vec![Point3::new(1.0, 1.0, 1.0)]),
                    deform_mats: Some(vec![Matrix3::from_diagonal_element(3.0)]),
                    point_count: 1,
                }]),
            }),
            ..GeometrySet::default()
        };
        transform_geometry(&mut set, &m);
        let curve_hints = set.curve_edit_hints.unwrap();
        let mats = curve_hints.deform_mats.unwrap();
        assert_eq!(mats.len(), 4);
        assert_eq!(mats[0], linear_part(&m));
        let drawing = &set.grease_pencil_edit_hints.unwrap().drawing_hints.unwrap()[0];
        assert_eq!(drawing.positions.as_ref().unwrap()[0], Point3::new(2.0, 1.0, 1.0));
        assert_eq!(drawing.deform_mats.as_ref().unwrap()[0], Matrix3::from_diagonal(&Vector3::new(6.0, 3.0, 3.0)));
    }

    #[test]
    fn gizmos_follow_both_operations() {
        let mut set = GeometrySet {
            gizmo_edit_hints: Some(GizmoEditHints {
                gizmo_transforms: [("arrow".to_string(), Matrix4::identity())].into_iter().collect(),
            }),
            ..GeometrySet::default()
        };
        translate_geometry(&mut set, &Vector3::new(0.0, 0.0, 1.0));
        transform_geometry(&mut set, &Matrix4::new_scaling(2.0));
        let m = set.gizmo_edit_hints.unwrap().gizmo_transforms["arrow"];
        assert_eq!(location(&m), Vector3::new(0.0, 0.0, 2.0));
        assert_eq!(m[(0, 0)], 2.0);
    }
}
