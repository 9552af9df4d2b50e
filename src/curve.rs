//! Edit-curve data the drawn strokes are added to.

use nalgebra::{Point3, Vector4};
use serde::{Deserialize, Serialize};

/// Bezier handle behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleType {
    /// Handles move independently (corners).
    Free,
    /// Handles stay collinear through the anchor.
    Align,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BezierPoint {
    pub handle_left: Point3<f64>,
    pub anchor: Point3<f64>,
    pub handle_right: Point3<f64>,
    pub radius: f64,
    pub handle_left_type: HandleType,
    pub handle_right_type: HandleType,
    pub select_left: bool,
    pub select_anchor: bool,
    pub select_right: bool,
}

impl BezierPoint {
    pub fn set_handle_types(&mut self, handle_type: HandleType) {
        self.handle_left_type = handle_type;
        self.handle_right_type = handle_type;
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.select_left = selected;
        self.select_anchor = selected;
        self.select_right = selected;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolyPoint {
    /// Homogeneous position, `w = 1`.
    pub position: Vector4<f64>,
    pub radius: f64,
    pub select: bool,
}

impl PolyPoint {
    pub fn new(position: Point3<f64>, radius: f64) -> Self {
        Self {
            position: position.to_homogeneous(),
            radius,
            select: true,
        }
    }

    pub fn xyz(&self) -> Point3<f64> {
        Point3::new(self.position.x, self.position.y, self.position.z)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SplinePoints {
    Bezier(Vec<BezierPoint>),
    Poly(Vec<PolyPoint>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spline {
    pub points: SplinePoints,
    pub cyclic: bool,
}

impl Spline {
    pub fn len(&self) -> usize {
        match &self.points {
            SplinePoints::Bezier(points) => points.len(),
            SplinePoints::Poly(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn deselect_all(&mut self) {
        match &mut self.points {
            SplinePoints::Bezier(points) => points.iter_mut().for_each(|p| p.set_selected(false)),
            SplinePoints::Poly(points) => points.iter_mut().for_each(|p| p.select = false),
        }
    }

    /// Anchor positions in order.
    pub fn anchors(&self) -> Vec<Point3<f64>> {
        match &self.points {
            SplinePoints::Bezier(points) => points.iter().map(|p| p.anchor).collect(),
            SplinePoints::Poly(points) => points.iter().map(PolyPoint::xyz).collect(),
        }
    }
}

/// A curve object in edit mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub splines: Vec<Spline>,
    pub active_spline: Option<usize>,
    pub active_vertex: Option<usize>,
    /// Display scale for point radii.
    pub bevel_radius: f64,
    /// 2D curves live in the object's XY plane.
    pub is_3d: bool,
}

impl Default for Curve {
    fn default() -> Self {
        Self::new(1.0, true)
    }
}

impl Curve {
    pub fn new(bevel_radius: f64, is_3d: bool) -> Self {
        Self {
            splines: Vec::new(),
            active_spline: None,
            active_vertex: None,
            bevel_radius,
            is_3d,
        }
    }

    pub fn deselect_all(&mut self) {
        self.splines.iter_mut().for_each(Spline::deselect_all);
    }

    /// Append a drawn spline as the only selected geometry and make its
    /// last point the active vertex.
    pub fn add_spline(&mut self, spline: Spline) {
        self.deselect_all();
        self.active_vertex = spline.len().checked_sub(1);
        self.splines.push(spline);
        self.active_spline = Some(self.splines.len() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poly(n: usize) -> Spline {
        Spline {
            points: SplinePoints::Poly((0..n).map(|i| PolyPoint::new(Point3::new(i as f64, 0.0, 0.0), 1.0)).collect()),
            cyclic: false,
        }
    }

    #[test]
    fn add_spline_deselects_existing() {
        let mut curve = Curve::default();
        curve.add_spline(poly(3));
        curve.add_spline(poly(5));
        assert_eq!(curve.splines.len(), 2);
        assert_eq!(curve.active_spline, Some(1));
        assert_eq!(curve.active_vertex, Some(4));
        let SplinePoints::Poly(first) = &curve.splines[0].points else {
            panic!("expected poly");
        };
        assert!(first.iter().all(|p| !p.select));
        let SplinePoints::Poly(second) = &curve.splines[1].points else {
            panic!("expected poly");
        };
        assert!(second.iter().all(|p| p.select));
    }

    #[test]
    fn poly_points_are_homogeneous() {
        let p = PolyPoint::new(Point3::new(1.0, 2.0, 3.0), 0.5);
        assert_eq!(p.position.w, 1.0);
        assert_eq!(p.xyz(), Point3::new(1.0, 2.0, 3.0));
    }
}
