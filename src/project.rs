//! Window position → world position, per stroke sample.
//!
//! Two strategies, chosen once per stroke:
//! 1. Plane: intersect the view ray with a fixed plane
//! 2. Depth: read the cached depth buffer, optionally pushing the point
//!    off the surface along its normal
//!
//! A miss falls back to the view plane through the last valid depth,
//! so every sample ends up with some world position.

use kurbo::Point;
use nalgebra::{Point3, Vector3};

use crate::depth::DepthSnapshot;
use crate::geom::{ObjectTransform, Plane};
use crate::radius::RadiusResolver;
use crate::stroke::StrokeSample;
use crate::view::View;

/// How samples get their depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectionMode {
    Plane(Plane),
    Depth,
}

/// Projection configuration for one stroke.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionState {
    pub mode: ProjectionMode,
    /// Constant world-space translation added to every hit.
    pub offset: Option<Vector3<f64>>,
    /// Distance to push depth hits along the surface normal.
    pub surface_offset: f64,
    /// Use `surface_offset` as is instead of scaling it by the radius.
    pub use_surface_offset_absolute: bool,
}

impl ProjectionState {
    pub fn uses_depth(&self) -> bool {
        matches!(self.mode, ProjectionMode::Depth)
    }
}

/// A successful projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projected {
    pub location_world: Point3<f64>,
    /// Sampled surface normal, zero when unavailable.
    pub normal_world: Vector3<f64>,
}

/// Everything needed to place samples in the scene.
#[derive(Debug, Clone)]
pub struct Projector {
    pub view: View,
    /// Captured once at stroke start.
    pub depths: Option<DepthSnapshot>,
    pub transform: ObjectTransform,
    pub radius: RadiusResolver,
    pub state: ProjectionState,
}

impl Projector {
    /// Project a window position with the active strategy.
    ///
    /// `radius` scales the surface offset unless the offset is absolute.
    pub fn project(&self, mval: Point, surface_offset: f64, radius: f64) -> Option<Projected> {
        let mut projected = match self.state.mode {
            ProjectionMode::Plane(plane) => Projected {
                location_world: self.view.win_to_3d_on_plane(&plane, mval, true)?,
                normal_world: Vector3::zeros(),
            },
            ProjectionMode::Depth => self.project_depth(mval, surface_offset, radius)?,
        };
        if let Some(offset) = self.state.offset {
            projected.location_world += offset;
        }
        Some(projected)
    }

    fn project_depth(&self, mval: Point, surface_offset: f64, radius: f64) -> Option<Projected> {
        let depths = self.depths.as_ref()?;
        let (x, y) = pixel(mval);
        let depth = depths.valid_depth_at(x, y)?;
        let mut location_world = self.view.depth_unproject(x, y, depth)?;
        let mut normal_world = Vector3::zeros();
        if surface_offset != 0.0 {
            let scale = if self.state.use_surface_offset_absolute {
                1.0
            } else {
                radius
            };
            if let Some(normal) = depths.normal_at(&self.view, x, y) {
                location_world += normal * (scale * surface_offset);
                normal_world = normal;
            }
        }
        Some(Projected {
            location_world,
            normal_world,
        })
    }

    /// Resolve a sample's world/local position and normals from its
    /// window position and pressure.
    ///
    /// Returns whether the active strategy found a position. On a miss
    /// the sample lands on the view plane through `fallback_depth`.
    pub fn project_sample(&self, sample: &mut StrokeSample, fallback_depth: &Point3<f64>) -> bool {
        let radius = self.radius.radius(sample.pressure);
        let found = self.project(sample.mval, self.state.surface_offset, radius);
        let is_depth_found = found.is_some();
        match found {
            Some(projected) => {
                sample.location_world = projected.location_world;
                sample.normal_world = projected.normal_world;
            }
            None => {
                sample.location_world = self.view.win_to_3d(fallback_depth, sample.mval);
                sample.normal_world = Vector3::zeros();
            }
        }
        sample.location_local = self.transform.to_local(&sample.location_world);
        sample.normal_local = self.transform.normal_to_local(&sample.normal_world);
        is_depth_found
    }
}

/// Integer pixel under a window position (truncating).
pub(crate) fn pixel(mval: Point) -> (i64, i64) {
    (mval.x as i64, mval.y as i64)
}
