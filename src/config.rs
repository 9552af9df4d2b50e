use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Minimum screen distance between two recorded samples, in pixels.
pub const STROKE_SAMPLE_DIST_MIN_PX: f64 = 1.0;
/// Maximum screen distance between two samples before substeps are inserted.
pub const STROKE_SAMPLE_DIST_MAX_PX: f64 = 3.0;
/// Start/end screen distance under which a stroke is considered closed.
pub const STROKE_CYCLIC_DIST_PX: f64 = 8.0;

/// All drawing-tool parameters in one struct.
/// Resolved once when a session starts and serializable for presets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawSettings {
    // -- Output --
    /// Spline type produced on release.
    pub curve_type: CurveType,
    /// Fitting strategy for bezier output.
    pub fit_method: FitMethod,
    /// Fit error threshold in screen pixels.
    /// Converted to object units along the stroke at release.
    pub error_threshold_px: f64,

    // -- Corner detection --
    /// Detect sharp corners and give them free handles.
    pub detect_corners: bool,
    /// Turning angle above which a point is a corner (radians).
    pub corner_angle: f64,

    // -- Radius --
    /// Radius at zero pressure.
    pub radius_min: f64,
    /// Radius at full pressure.
    pub radius_max: f64,
    /// Map tablet pressure to point radius.
    pub use_pressure_radius: bool,
    /// Fraction of the stroke length tapered at the start. 0 = off.
    pub radius_taper_start: f64,
    /// Fraction of the stroke length tapered at the end. 0 = off.
    pub radius_taper_end: f64,

    // -- Projection --
    /// Where new points are placed in depth.
    pub depth_mode: DepthMode,
    /// Plane orientation used once the first sample locks the depth.
    pub surface_plane: SurfacePlane,
    /// Lock the stroke onto a plane through the first surface hit.
    pub depth_stroke_endpoints: bool,
    /// Distance to offset points from the surface.
    pub surface_offset: f64,
    /// Use the surface offset as an absolute distance instead of
    /// scaling it by the point radius.
    pub use_surface_offset_absolute: bool,

    // -- UI --
    /// Interface scale factor applied to pixel thresholds.
    pub ui_scale: f64,
}

/// Output spline type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveType {
    Bezier,
    Poly,
}

/// Bezier fitting strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitMethod {
    /// Detect corners first, then recursively split and fit.
    Split,
    /// Fit every sample, then iteratively remove knots under the error bound.
    Refit,
}

/// How stroke samples get their depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepthMode {
    /// View plane through the 3D cursor.
    Cursor,
    /// Surface under the cursor, read from the depth buffer.
    Surface,
}

/// Plane orientation for the first-sample plane lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfacePlane {
    /// Surface normal made perpendicular to the view axis.
    NormalView,
    /// Surface normal.
    NormalSurface,
    /// View axis.
    View,
}

impl Default for DrawSettings {
    fn default() -> Self {
        Self {
            curve_type: CurveType::Bezier,
            fit_method: FitMethod::Refit,
            error_threshold_px: 8.0,
            detect_corners: true,
            corner_angle: 70f64.to_radians(),
            radius_min: 0.0,
            radius_max: 1.0,
            use_pressure_radius: false,
            radius_taper_start: 0.0,
            radius_taper_end: 0.0,
            depth_mode: DepthMode::Cursor,
            surface_plane: SurfacePlane::NormalView,
            depth_stroke_endpoints: false,
            surface_offset: 0.0,
            use_surface_offset_absolute: false,
            ui_scale: 1.0,
        }
    }
}

impl DrawSettings {
    /// Whether any radius taper is active.
    pub fn has_taper(&self) -> bool {
        self.radius_taper_start != 0.0 || self.radius_taper_end != 0.0
    }

    /// Whether the pressure channel contributes to the output radius.
    pub fn uses_pressure_radius(&self) -> bool {
        self.use_pressure_radius || self.has_taper()
    }

    /// Corner angle passed to the fitter. PI disables corner detection.
    pub fn effective_corner_angle(&self) -> f64 {
        if self.detect_corners {
            self.corner_angle
        } else {
            PI
        }
    }
}

/// Per-invocation fit options. `None` means "not set": interactive
/// sessions compute these from the stroke on release, replays fall
/// back to [`FitOptions::resolve_defaults`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    pub fit_method: Option<FitMethod>,
    /// Error distance threshold in object units.
    pub error_threshold: Option<f64>,
    pub corner_angle: Option<f64>,
    pub use_cyclic: Option<bool>,
}

/// Fit options with every value decided.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFitOptions {
    pub fit_method: FitMethod,
    pub error_threshold: f64,
    pub corner_angle: f64,
    pub use_cyclic: bool,
}

impl FitOptions {
    /// Fill unset values with the operator defaults.
    pub fn resolve_defaults(&self) -> ResolvedFitOptions {
        ResolvedFitOptions {
            fit_method: self.fit_method.unwrap_or(FitMethod::Refit),
            error_threshold: self.error_threshold.unwrap_or(0.0),
            corner_angle: self.corner_angle.unwrap_or(70f64.to_radians()),
            use_cyclic: self.use_cyclic.unwrap_or(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taper_enables_pressure_radius() {
        let mut settings = DrawSettings::default();
        assert!(!settings.uses_pressure_radius());
        settings.radius_taper_end = 0.2;
        assert!(settings.uses_pressure_radius());
    }

    #[test]
    fn corner_angle_is_pi_without_detection() {
        let settings = DrawSettings {
            detect_corners: false,
            ..DrawSettings::default()
        };
        assert_eq!(settings.effective_corner_angle(), PI);
    }

    #[test]
    fn partial_preset_keeps_defaults() {
        let settings: DrawSettings =
            serde_json::from_str(r#"{ "curve_type": "Poly", "radius_max": 0.25 }"#).unwrap();
        assert_eq!(settings.curve_type, CurveType::Poly);
        assert_eq!(settings.radius_max, 0.25);
        assert_eq!(settings.fit_method, FitMethod::Refit);
        assert_eq!(settings.error_threshold_px, 8.0);
    }
}
