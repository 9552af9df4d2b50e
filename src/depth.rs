//! Cached depth buffer, captured once per stroke.

use std::path::Path;

use image::{ImageBuffer, Luma};
use nalgebra::{Point3, Vector3};

use crate::error::DrawError;
use crate::geom::normalize_or_zero;
use crate::view::View;

/// Window depths, one `f32` per pixel, stored bottom row first so that
/// pixel `(x, y)` matches window coordinates.
pub type DepthImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Read-only depth snapshot of the viewport.
#[derive(Debug, Clone)]
pub struct DepthSnapshot {
    buffer: DepthImage,
    depth_range: (f64, f64),
}

impl DepthSnapshot {
    /// Depths outside the open interval `depth_range` are treated as
    /// empty (no surface under the pixel).
    pub fn new(buffer: DepthImage, depth_range: (f64, f64)) -> Self {
        Self {
            buffer,
            depth_range,
        }
    }

    /// Build a snapshot from a per-pixel function in window coordinates.
    pub fn from_fn(
        width: u32,
        height: u32,
        depth_range: (f64, f64),
        mut depth: impl FnMut(u32, u32) -> f32,
    ) -> Self {
        let buffer = ImageBuffer::from_fn(width, height, |x, y| Luma([depth(x, y)]));
        Self::new(buffer, depth_range)
    }

    /// Load a grayscale depth map (white = far). The image is flipped so
    /// its top row becomes the top of the viewport.
    pub fn load(path: &Path, depth_range: (f64, f64)) -> Result<Self, DrawError> {
        let image = image::open(path).map_err(|e| DrawError::DepthLoad(e.to_string()))?;
        let buffer = image::imageops::flip_vertical(&image.to_luma32f());
        Ok(Self::new(buffer, depth_range))
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn depth_range(&self) -> (f64, f64) {
        self.depth_range
    }

    /// Raw depth at a pixel, `None` outside the buffer.
    pub fn depth_at(&self, x: i64, y: i64) -> Option<f64> {
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            return None;
        }
        Some(self.buffer.get_pixel(x as u32, y as u32).0[0] as f64)
    }

    /// Depth at a pixel when it lies strictly inside the valid range.
    pub fn valid_depth_at(&self, x: i64, y: i64) -> Option<f64> {
        self.depth_at(x, y)
            .filter(|&depth| depth > self.depth_range.0 && depth < self.depth_range.1)
    }

    /// World-space surface normal reconstructed from neighbouring depths.
    ///
    /// Central differences where both neighbours are valid, one-sided
    /// otherwise. Oriented toward the viewer.
    pub fn normal_at(&self, view: &View, x: i64, y: i64) -> Option<Vector3<f64>> {
        let center = self.world_at(view, x, y)?;
        let du = self.gradient(view, &center, (x - 1, y), (x + 1, y))?;
        let dv = self.gradient(view, &center, (x, y - 1), (x, y + 1))?;
        let mut normal = normalize_or_zero(&du.cross(&dv));
        if normal.norm_squared() == 0.0 {
            return None;
        }
        if normal.dot(&view.view_axis()) < 0.0 {
            normal = -normal;
        }
        Some(normal)
    }

    fn world_at(&self, view: &View, x: i64, y: i64) -> Option<Point3<f64>> {
        let depth = self.valid_depth_at(x, y)?;
        view.depth_unproject(x, y, depth)
    }

    fn gradient(
        &self,
        view: &View,
        center: &Point3<f64>,
        before: (i64, i64),
        after: (i64, i64),
    ) -> Option<Vector3<f64>> {
        match (
            self.world_at(view, before.0, before.1),
            self.world_at(view, after.0, after.1),
        ) {
            (Some(a), Some(b)) => Some(b - a),
            (None, Some(b)) => Some(b - center),
            (Some(a), None) => Some(center - a),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::ViewParams;
    use approx::assert_relative_eq;

    fn ortho_view() -> View {
        View::from_params(&ViewParams {
            ortho_height: Some(6.0),
            width: 80.0,
            height: 60.0,
            ..ViewParams::default()
        })
        .unwrap()
    }

    #[test]
    fn out_of_bounds_is_none() {
        let depths = DepthSnapshot::from_fn(4, 3, (0.0, 1.0), |_, _| 0.5);
        assert_eq!(depths.depth_at(3, 2), Some(0.5));
        assert_eq!(depths.depth_at(4, 0), None);
        assert_eq!(depths.depth_at(-1, 0), None);
    }

    #[test]
    fn range_is_exclusive() {
        let depths = DepthSnapshot::from_fn(2, 1, (0.0, 1.0), |x, _| if x == 0 { 1.0 } else { 0.25 });
        assert_eq!(depths.valid_depth_at(0, 0), None);
        assert_eq!(depths.valid_depth_at(1, 0), Some(0.25));
    }

    #[test]
    fn flat_wall_normal_faces_viewer() {
        let view = ortho_view();
        let depths = DepthSnapshot::from_fn(80, 60, (0.0, 1.0), |_, _| 0.5);
        let normal = depths.normal_at(&view, 40, 30).unwrap();
        assert_relative_eq!(normal, view.view_axis(), epsilon = 1e-9);
    }

    #[test]
    fn isolated_pixel_has_no_normal() {
        let view = ortho_view();
        let depths =
            DepthSnapshot::from_fn(80, 60, (0.0, 1.0), |x, y| if (x, y) == (10, 10) { 0.5 } else { 1.0 });
        assert!(depths.normal_at(&view, 10, 10).is_none());
    }
}
