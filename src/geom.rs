//! Shared geometry utilities.

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::DrawError;

/// Below this squared length a vector is treated as zero.
const ZERO_LEN_SQ: f64 = 1e-24;

/// Plane `normal · p + d = 0` with a unit-length normal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vector3<f64>,
    pub d: f64,
}

impl Plane {
    /// Plane through `point` facing `normal` (normalized here).
    pub fn from_point_normal(point: &Point3<f64>, normal: &Vector3<f64>) -> Self {
        let normal = normalize_or_zero(normal);
        Self {
            normal,
            d: -normal.dot(&point.coords),
        }
    }

    /// Signed distance from the plane.
    pub fn distance(&self, point: &Point3<f64>) -> f64 {
        self.normal.dot(&point.coords) + self.d
    }
}

/// An object's placement in the world, with its cached inverse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectTransform {
    object_to_world: Matrix4<f64>,
    world_to_object: Matrix4<f64>,
}

impl ObjectTransform {
    pub fn new(object_to_world: Matrix4<f64>) -> Result<Self, DrawError> {
        let world_to_object = object_to_world
            .try_inverse()
            .ok_or(DrawError::NonInvertibleTransform)?;
        Ok(Self {
            object_to_world,
            world_to_object,
        })
    }

    pub fn identity() -> Self {
        Self {
            object_to_world: Matrix4::identity(),
            world_to_object: Matrix4::identity(),
        }
    }

    pub fn object_to_world(&self) -> &Matrix4<f64> {
        &self.object_to_world
    }

    pub fn world_to_object(&self) -> &Matrix4<f64> {
        &self.world_to_object
    }

    /// Object origin in world space.
    pub fn location(&self) -> Point3<f64> {
        Point3::from(self.object_to_world.fixed_view::<3, 1>(0, 3).into_owned())
    }

    /// Object Z axis in world space (not normalized).
    pub fn z_axis(&self) -> Vector3<f64> {
        self.object_to_world.fixed_view::<3, 1>(0, 2).into_owned()
    }

    pub fn to_local(&self, world: &Point3<f64>) -> Point3<f64> {
        self.world_to_object.transform_point(world)
    }

    pub fn to_world(&self, local: &Point3<f64>) -> Point3<f64> {
        self.object_to_world.transform_point(local)
    }

    /// Map a world-space normal into object space.
    ///
    /// Uses the transpose of the object→world basis (the inverse-transpose
    /// of world→object). A zero normal stays zero.
    pub fn normal_to_local(&self, normal_world: &Vector3<f64>) -> Vector3<f64> {
        if is_zero(normal_world) {
            return Vector3::zeros();
        }
        let basis: Matrix3<f64> = self.object_to_world.fixed_view::<3, 3>(0, 0).into_owned();
        normalize_or_zero(&(basis.transpose() * normal_world))
    }
}

impl Default for ObjectTransform {
    fn default() -> Self {
        Self::identity()
    }
}

pub fn is_zero(v: &Vector3<f64>) -> bool {
    v.x == 0.0 && v.y == 0.0 && v.z == 0.0
}

/// Normalize, returning the zero vector for degenerate input.
pub fn normalize_or_zero(v: &Vector3<f64>) -> Vector3<f64> {
    let len_sq = v.norm_squared();
    if len_sq > ZERO_LEN_SQ {
        v / len_sq.sqrt()
    } else {
        Vector3::zeros()
    }
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}
