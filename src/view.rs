//! Viewport camera: window ↔ world conversions.
//!
//! Window coordinates are region pixels with the origin at the
//! bottom-left corner and Y pointing up. Depth values are window
//! depths in [0, 1] (0 = near clip, 1 = far clip).

use kurbo::Point;
use nalgebra::{Matrix4, Orthographic3, Perspective3, Point3, Vector3, Vector4};
use serde::{Deserialize, Serialize};

use crate::error::DrawError;
use crate::geom::{normalize_or_zero, Plane};

/// Ray/plane dot products below this count as parallel.
const PARALLEL_EPSILON: f64 = 1e-12;

/// Serializable camera description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewParams {
    pub eye: [f64; 3],
    pub target: [f64; 3],
    pub up: [f64; 3],
    /// Vertical field of view in degrees. Ignored for orthographic views.
    pub fov_y_deg: f64,
    /// Visible height in world units for an orthographic view.
    /// `None` gives a perspective view.
    pub ortho_height: Option<f64>,
    pub width: f64,
    pub height: f64,
    pub clip_start: f64,
    pub clip_end: f64,
}

impl Default for ViewParams {
    fn default() -> Self {
        Self {
            eye: [0.0, -10.0, 0.0],
            target: [0.0, 0.0, 0.0],
            up: [0.0, 0.0, 1.0],
            fov_y_deg: 50.0,
            ortho_height: None,
            width: 800.0,
            height: 600.0,
            clip_start: 0.1,
            clip_end: 1000.0,
        }
    }
}

/// A resolved viewport.
#[derive(Debug, Clone)]
pub struct View {
    width: f64,
    height: f64,
    view_inverse: Matrix4<f64>,
    persmat: Matrix4<f64>,
    persinv: Matrix4<f64>,
    is_persp: bool,
    pivot: Point3<f64>,
}

impl View {
    pub fn from_params(params: &ViewParams) -> Result<Self, DrawError> {
        let eye = Point3::from(params.eye);
        let target = Point3::from(params.target);
        let up = Vector3::from(params.up);
        match params.ortho_height {
            Some(ortho_height) => Self::orthographic(
                eye,
                target,
                up,
                ortho_height,
                params.width,
                params.height,
                params.clip_start,
                params.clip_end,
            ),
            None => Self::perspective(
                eye,
                target,
                up,
                params.fov_y_deg.to_radians(),
                params.width,
                params.height,
                params.clip_start,
                params.clip_end,
            ),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn perspective(
        eye: Point3<f64>,
        target: Point3<f64>,
        up: Vector3<f64>,
        fov_y: f64,
        width: f64,
        height: f64,
        clip_start: f64,
        clip_end: f64,
    ) -> Result<Self, DrawError> {
        check_viewport(width, height, clip_start, clip_end)?;
        if !(fov_y > 0.0 && fov_y < std::f64::consts::PI) {
            return Err(DrawError::InvalidView(format!("field of view {fov_y} rad")));
        }
        let projection =
            Perspective3::new(width / height, fov_y, clip_start, clip_end).to_homogeneous();
        Self::build(eye, target, up, projection, width, height, true)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn orthographic(
        eye: Point3<f64>,
        target: Point3<f64>,
        up: Vector3<f64>,
        ortho_height: f64,
        width: f64,
        height: f64,
        clip_start: f64,
        clip_end: f64,
    ) -> Result<Self, DrawError> {
        check_viewport(width, height, clip_start, clip_end)?;
        if ortho_height <= 0.0 {
            return Err(DrawError::InvalidView(format!("ortho height {ortho_height}")));
        }
        let half_h = ortho_height / 2.0;
        let half_w = half_h * width / height;
        let projection =
            Orthographic3::new(-half_w, half_w, -half_h, half_h, clip_start, clip_end)
                .to_homogeneous();
        Self::build(eye, target, up, projection, width, height, false)
    }

    fn build(
        eye: Point3<f64>,
        target: Point3<f64>,
        up: Vector3<f64>,
        projection: Matrix4<f64>,
        width: f64,
        height: f64,
        is_persp: bool,
    ) -> Result<Self, DrawError> {
        let forward = target - eye;
        if forward.norm_squared() == 0.0 || forward.cross(&up).norm_squared() == 0.0 {
            return Err(DrawError::InvalidView(
                "eye, target and up do not define a camera".into(),
            ));
        }
        let view_matrix = Matrix4::look_at_rh(&eye, &target, &up);
        let view_inverse = view_matrix
            .try_inverse()
            .ok_or_else(|| DrawError::InvalidView("view matrix is singular".into()))?;
        let persmat = projection * view_matrix;
        let persinv = persmat
            .try_inverse()
            .ok_or_else(|| DrawError::InvalidView("projection is singular".into()))?;
        Ok(Self {
            width,
            height,
            view_inverse,
            persmat,
            persinv,
            is_persp,
            pivot: target,
        })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn is_persp(&self) -> bool {
        self.is_persp
    }

    /// Point the view orbits around.
    pub fn pivot(&self) -> Point3<f64> {
        self.pivot
    }

    /// World-space view Z axis, pointing from the scene toward the viewer.
    pub fn view_axis(&self) -> Vector3<f64> {
        normalize_or_zero(&self.view_inverse.fixed_view::<3, 1>(0, 2).into_owned())
    }

    /// Ray through a window position: origin on the near clip plane and
    /// unit direction into the scene.
    pub fn win_to_ray(&self, mval: Point) -> (Point3<f64>, Vector3<f64>) {
        let (x, y) = self.to_ndc(mval);
        let near = self.unproject_ndc(x, y, -1.0).unwrap_or(self.pivot);
        let far = self.unproject_ndc(x, y, 1.0).unwrap_or(self.pivot);
        let direction = normalize_or_zero(&(far - near));
        (near, direction)
    }

    /// Point under `mval` at the depth of `depth_point`
    /// (on the view-aligned plane through it).
    pub fn win_to_3d(&self, depth_point: &Point3<f64>, mval: Point) -> Point3<f64> {
        let plane = Plane::from_point_normal(depth_point, &self.view_axis());
        self.win_to_3d_on_plane(&plane, mval, false)
            .unwrap_or(*depth_point)
    }

    /// Intersect the ray under `mval` with `plane`.
    ///
    /// Fails when the ray is parallel to the plane, or with `clip` in a
    /// perspective view when the hit lies behind the viewer.
    pub fn win_to_3d_on_plane(&self, plane: &Plane, mval: Point, clip: bool) -> Option<Point3<f64>> {
        let (origin, direction) = self.win_to_ray(mval);
        let denom = plane.normal.dot(&direction);
        if denom.abs() < PARALLEL_EPSILON {
            return None;
        }
        let t = -plane.distance(&origin) / denom;
        if clip && self.is_persp && t < 0.0 {
            return None;
        }
        Some(origin + direction * t)
    }

    /// World position of the pixel `(x, y)` at window depth `depth`.
    /// Uses the pixel center.
    pub fn depth_unproject(&self, x: i64, y: i64, depth: f64) -> Option<Point3<f64>> {
        let (nx, ny) = self.to_ndc(Point::new(x as f64 + 0.5, y as f64 + 0.5));
        self.unproject_ndc(nx, ny, depth * 2.0 - 1.0)
    }

    /// Window position and window depth of a world point.
    /// `None` for points behind a perspective camera.
    pub fn project(&self, world: &Point3<f64>) -> Option<(Point, f64)> {
        let clip = self.persmat * Vector4::new(world.x, world.y, world.z, 1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.xyz() / clip.w;
        let mval = Point::new(
            (ndc.x + 1.0) * 0.5 * self.width,
            (ndc.y + 1.0) * 0.5 * self.height,
        );
        Some((mval, (ndc.z + 1.0) * 0.5))
    }

    fn to_ndc(&self, mval: Point) -> (f64, f64) {
        (
            2.0 * mval.x / self.width - 1.0,
            2.0 * mval.y / self.height - 1.0,
        )
    }

    fn unproject_ndc(&self, x: f64, y: f64, z: f64) -> Option<Point3<f64>> {
        let world = self.persinv * Vector4::new(x, y, z, 1.0);
        if world.w.abs() < PARALLEL_EPSILON {
            return None;
        }
        Some(Point3::from(world.xyz() / world.w))
    }
}

fn check_viewport(width: f64, height: f64, clip_start: f64, clip_end: f64) -> Result<(), DrawError> {
    if !(width > 0.0 && height > 0.0) {
        return Err(DrawError::InvalidView(format!("viewport {width}x{height}")));
    }
    if !(clip_start > 0.0 && clip_end > clip_start) {
        return Err(DrawError::InvalidView(format!(
            "clip range {clip_start}..{clip_end}"
        )));
    }
    Ok(())
}
