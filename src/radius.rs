//! Pressure → radius mapping.

use crate::config::DrawSettings;
use crate::geom::{is_zero, ObjectTransform};
use crate::stroke::StrokeSample;

/// Maps pressure to radius, and keeps surface-offset geometry in step
/// when a sample's pressure changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusResolver {
    pub min: f64,
    pub max: f64,
    pub bevel_radius: f64,
    surface_offset: f64,
    use_surface_offset_absolute: bool,
}

impl RadiusResolver {
    pub fn new(settings: &DrawSettings, bevel_radius: f64) -> Self {
        Self {
            min: settings.radius_min,
            max: settings.radius_max,
            bevel_radius,
            surface_offset: settings.surface_offset,
            use_surface_offset_absolute: settings.use_surface_offset_absolute,
        }
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// World-space radius: `(pressure × range + min) × bevel`.
    pub fn radius(&self, pressure: f64) -> f64 {
        self.curve_radius(pressure) * self.bevel_radius
    }

    /// Radius stored on curve points; the bevel is applied when the
    /// curve is displayed, not here.
    pub fn curve_radius(&self, pressure: f64) -> f64 {
        pressure * self.range() + self.min
    }

    /// Whether the surface offset scales with the radius.
    pub fn offset_follows_radius(&self) -> bool {
        self.surface_offset != 0.0 && !self.use_surface_offset_absolute
    }

    /// Set a sample's pressure. When the surface offset scales with the
    /// radius, the sample is moved along its normal by the radius change.
    pub fn set_pressure(&self, sample: &mut StrokeSample, pressure: f64, transform: &ObjectTransform) {
        if self.offset_follows_radius() && !is_zero(&sample.normal_local) {
            let adjust = self.radius(pressure) - self.radius(sample.pressure);
            sample.location_local += sample.normal_local * adjust;
            sample.location_world = transform.to_world(&sample.location_local);
        }
        sample.pressure = pressure;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kurbo::Point;
    use nalgebra::{Matrix4, Point3, Vector3};

    fn resolver(surface_offset: f64, absolute: bool) -> RadiusResolver {
        let settings = DrawSettings {
            radius_min: 0.5,
            radius_max: 2.5,
            surface_offset,
            use_surface_offset_absolute: absolute,
            ..DrawSettings::default()
        };
        RadiusResolver::new(&settings, 2.0)
    }

    #[test]
    fn radius_scales_by_bevel() {
        let r = resolver(0.0, false);
        assert_relative_eq!(r.radius(0.5), (0.5 * 2.0 + 0.5) * 2.0);
        assert_relative_eq!(r.curve_radius(0.5), 1.5);
        assert_relative_eq!(r.radius(0.0), 1.0);
    }

    #[test]
    fn pressure_edit_moves_offset_sample() {
        let r = resolver(1.0, false);
        let transform =
            ObjectTransform::new(Matrix4::new_translation(&Vector3::new(0.0, 0.0, 10.0))).unwrap();
        let mut sample = StrokeSample::new(Point::ZERO, 1.0);
        sample.location_local = Point3::new(1.0, 1.0, 1.0);
        sample.location_world = transform.to_world(&sample.location_local);
        sample.normal_local = Vector3::z();
        r.set_pressure(&mut sample, 0.5, &transform);
        // radius 5.0 → 3.0, so the point sinks by 2 along the normal.
        assert_relative_eq!(sample.location_local, Point3::new(1.0, 1.0, -1.0));
        assert_relative_eq!(sample.location_world, Point3::new(1.0, 1.0, 9.0));
        assert_eq!(sample.pressure, 0.5);
    }

    #[test]
    fn absolute_offset_leaves_position() {
        let r = resolver(1.0, true);
        let mut sample = StrokeSample::new(Point::ZERO, 1.0);
        sample.normal_local = Vector3::z();
        r.set_pressure(&mut sample, 0.2, &ObjectTransform::identity());
        assert_eq!(sample.location_local, Point3::origin());
        assert_eq!(sample.pressure, 0.2);
    }

    #[test]
    fn missing_normal_leaves_position() {
        let r = resolver(1.0, false);
        let mut sample = StrokeSample::new(Point::ZERO, 1.0);
        r.set_pressure(&mut sample, 0.2, &ObjectTransform::identity());
        assert_eq!(sample.location_local, Point3::origin());
    }
}
