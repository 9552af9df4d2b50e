//! Finished stroke → spline.
//!
//! Bezier curves go through the fitter:
//! 1. Flatten local positions (plus pressure, when it drives the radius)
//! 2. Drop consecutive duplicates
//! 3. Detect corners (split fitting only)
//! 4. Fit, then tag handles: aligned, free at interior corners
//!
//! Poly curves take every sample as is.

use std::f64::consts::PI;

use nalgebra::Point3;

use crate::config::{CurveType, DrawSettings, FitMethod, ResolvedFitOptions};
use crate::curve::{BezierPoint, HandleType, PolyPoint, Spline, SplinePoints};
use crate::error::DrawError;
use crate::fit::corners::{self, CornerRadii};
use crate::fit::{CubicSpline, CurveFitter, FitFlags, FitInput};
use crate::radius::RadiusResolver;
use crate::stroke::StrokeSequence;

/// Corner sampling radii relative to the error threshold.
const CORNER_RADIUS_MIN_FACTOR: f64 = 1.0 / 8.0;
const CORNER_RADIUS_MAX_FACTOR: f64 = 2.0;
const CORNER_SAMPLES_MAX: usize = 16;

/// Convert a stroke into a spline of the configured curve type.
pub fn build_spline(
    stroke: &StrokeSequence,
    settings: &DrawSettings,
    options: &ResolvedFitOptions,
    radius: &RadiusResolver,
    is_3d: bool,
    fitter: &dyn CurveFitter,
) -> Result<Spline, DrawError> {
    if stroke.is_empty() {
        return Err(DrawError::EmptyStroke);
    }
    match settings.curve_type {
        CurveType::Bezier => bezier_spline(stroke, settings, options, radius, fitter),
        CurveType::Poly => Ok(poly_spline(stroke, settings, radius, is_3d)),
    }
}

/// Flat `[x, y, z(, pressure)]` vectors with consecutive bit-identical
/// vectors collapsed. Returns the data and the vector size.
pub fn flatten_stroke(stroke: &StrokeSequence, use_pressure: bool) -> (Vec<f64>, usize) {
    let dims = if use_pressure { 4 } else { 3 };
    let mut coords: Vec<f64> = Vec::with_capacity(stroke.len() * dims);
    for sample in stroke.samples() {
        let p = &sample.location_local;
        let co = [p.x, p.y, p.z, sample.pressure];
        let co = &co[..dims];
        let start = coords.len();
        if start >= dims && same_bits(&coords[start - dims..], co) {
            continue;
        }
        coords.extend_from_slice(co);
    }
    (coords, dims)
}

fn same_bits(a: &[f64], b: &[f64]) -> bool {
    a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

fn bezier_spline(
    stroke: &StrokeSequence,
    settings: &DrawSettings,
    options: &ResolvedFitOptions,
    radius: &RadiusResolver,
    fitter: &dyn CurveFitter,
) -> Result<Spline, DrawError> {
    let use_pressure = settings.uses_pressure_radius();
    let (coords, dims) = flatten_stroke(stroke, use_pressure);
    let len = coords.len() / dims;
    let cyclic = len > 2 && options.use_cyclic;

    let corners = (options.fit_method == FitMethod::Split && options.corner_angle < PI).then(|| {
        corners::detect(
            &coords,
            dims,
            CornerRadii {
                min: options.error_threshold * CORNER_RADIUS_MIN_FACTOR,
                max: options.error_threshold * CORNER_RADIUS_MAX_FACTOR,
                samples: CORNER_SAMPLES_MAX,
            },
            options.corner_angle,
            cyclic,
        )
    });

    let input = FitInput {
        points: &coords,
        dims,
        error_threshold: options.error_threshold,
        corner_angle: options.corner_angle,
        flags: FitFlags {
            cyclic,
            high_quality: true,
        },
        corners: corners.as_deref(),
    };
    log::debug!(
        "fitting {} points ({} dims) with {:?}, error {:.4}, cyclic {}",
        len,
        dims,
        options.fit_method,
        options.error_threshold,
        cyclic
    );
    let fitted = fitter.fit(options.fit_method, &input).map_err(|failure| {
        log::warn!("{failure}, no spline added");
        DrawError::FitFailed {
            status: failure.status,
        }
    })?;

    let points = bezier_points(&fitted, use_pressure, settings.radius_max, radius, cyclic);
    Ok(Spline {
        points: SplinePoints::Bezier(points),
        cyclic,
    })
}

fn bezier_points(
    fitted: &CubicSpline,
    use_pressure: bool,
    radius_max: f64,
    radius: &RadiusResolver,
    cyclic: bool,
) -> Vec<BezierPoint> {
    let xyz = |v: &[f64]| Point3::new(v[0], v[1], v[2]);
    let mut points: Vec<BezierPoint> = (0..fitted.len())
        .map(|k| {
            let anchor = fitted.anchor(k);
            BezierPoint {
                handle_left: xyz(fitted.handle_l(k)),
                anchor: xyz(anchor),
                handle_right: xyz(fitted.handle_r(k)),
                radius: if use_pressure {
                    radius.curve_radius(anchor[3])
                } else {
                    radius_max
                },
                handle_left_type: HandleType::Align,
                handle_right_type: HandleType::Align,
                select_left: true,
                select_anchor: true,
                select_right: true,
            }
        })
        .collect();

    for &k in interior_corners(&fitted.corner_index, cyclic) {
        if let Some(point) = points.get_mut(k) {
            point.set_handle_types(HandleType::Free);
        }
    }
    points
}

/// Corner indices that get free handles: open fits skip their first and
/// last entry (the curve ends) when there are at least two.
pub fn interior_corners(corner_index: &[usize], cyclic: bool) -> &[usize] {
    if !cyclic && corner_index.len() >= 2 {
        &corner_index[1..corner_index.len() - 1]
    } else {
        corner_index
    }
}

fn poly_spline(stroke: &StrokeSequence, settings: &DrawSettings, radius: &RadiusResolver, is_3d: bool) -> Spline {
    let use_pressure = settings.uses_pressure_radius();
    let points = stroke
        .samples()
        .iter()
        .map(|sample| {
            let mut position = sample.location_local;
            if !is_3d {
                position.z = 0.0;
            }
            let r = if use_pressure {
                radius.curve_radius(sample.pressure)
            } else {
                settings.radius_max
            };
            PolyPoint::new(position, r)
        })
        .collect();
    Spline {
        points: SplinePoints::Poly(points),
        cyclic: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FitOptions;
    use crate::fit::{FitFailure, NdCubicFitter};
    use crate::stroke::StrokeSample;
    use approx::assert_relative_eq;
    use kurbo::Point;

    struct FailingFitter;

    impl CurveFitter for FailingFitter {
        fn fit(&self, _: FitMethod, _: &FitInput<'_>) -> Result<CubicSpline, FitFailure> {
            Err(FitFailure { status: 3 })
        }
    }

    fn stroke(points: &[(f64, f64, f64, f64)]) -> StrokeSequence {
        let mut stroke = StrokeSequence::new(Point3::origin());
        for &(x, y, z, pressure) in points {
            let mut sample = StrokeSample::new(Point::new(x, y), pressure);
            sample.location_local = Point3::new(x, y, z);
            sample.location_world = sample.location_local;
            stroke.push(sample);
        }
        stroke
    }

    fn options(method: FitMethod, error: f64, cyclic: bool) -> ResolvedFitOptions {
        FitOptions {
            fit_method: Some(method),
            error_threshold: Some(error),
            use_cyclic: Some(cyclic),
            ..FitOptions::default()
        }
        .resolve_defaults()
    }

    fn resolver(settings: &DrawSettings) -> RadiusResolver {
        RadiusResolver::new(settings, 1.0)
    }

    #[test]
    fn duplicates_are_collapsed() {
        let s = stroke(&[
            (0.0, 0.0, 0.0, 1.0),
            (0.0, 0.0, 0.0, 1.0),
            (1.0, 0.0, 0.0, 1.0),
            (1.0, 0.0, 0.0, 0.5),
            (1.0, 0.0, 0.0, 0.5),
        ]);
        let (coords, dims) = flatten_stroke(&s, false);
        assert_eq!(dims, 3);
        assert_eq!(coords.len(), 2 * 3);
        let (coords, dims) = flatten_stroke(&s, true);
        assert_eq!(dims, 4);
        assert_eq!(coords.len(), 3 * 4);
    }

    #[test]
    fn interior_corner_rule() {
        assert_eq!(interior_corners(&[0, 3, 7], false), &[3]);
        assert_eq!(interior_corners(&[0, 7], false), &[] as &[usize]);
        assert_eq!(interior_corners(&[4], false), &[4]);
        assert_eq!(interior_corners(&[0, 3, 7], true), &[0, 3, 7]);
    }

    #[test]
    fn right_angle_gets_free_handles() {
        let mut points: Vec<(f64, f64, f64, f64)> = (0..=20).map(|i| (i as f64 * 0.5, 0.0, 0.0, 1.0)).collect();
        points.extend((1..=20).map(|i| (10.0, i as f64 * 0.5, 0.0, 1.0)));
        let settings = DrawSettings::default();
        for method in [FitMethod::Split, FitMethod::Refit] {
            let spline = build_spline(
                &stroke(&points),
                &settings,
                &options(method, 0.5, false),
                &resolver(&settings),
                true,
                &NdCubicFitter,
            )
            .unwrap();
            let SplinePoints::Bezier(bezier) = &spline.points else {
                panic!("expected bezier");
            };
            let free: Vec<Point3<f64>> = bezier
                .iter()
                .filter(|p| p.handle_left_type == HandleType::Free)
                .map(|p| p.anchor)
                .collect();
            assert_eq!(free, vec![Point3::new(10.0, 0.0, 0.0)], "{method:?}");
            assert_eq!(bezier[0].handle_left_type, HandleType::Align);
            assert!(bezier.iter().all(|p| p.select_anchor && p.radius == settings.radius_max));
        }
    }

    #[test]
    fn closed_square_frees_every_corner() {
        let side = |i: usize| i as f64 * 0.5;
        let mut points: Vec<(f64, f64, f64, f64)> = (0..20).map(|i| (side(i), 0.0, 0.0, 1.0)).collect();
        points.extend((0..20).map(|i| (10.0, side(i), 0.0, 1.0)));
        points.extend((0..20).map(|i| (10.0 - side(i), 10.0, 0.0, 1.0)));
        points.extend((0..20).map(|i| (0.0, 10.0 - side(i), 0.0, 1.0)));
        let settings = DrawSettings::default();
        let corners = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(10.0, 10.0, 0.0),
            Point3::new(0.0, 10.0, 0.0),
        ];
        for method in [FitMethod::Split, FitMethod::Refit] {
            let spline = build_spline(
                &stroke(&points),
                &settings,
                &options(method, 0.5, true),
                &resolver(&settings),
                true,
                &NdCubicFitter,
            )
            .unwrap();
            assert!(spline.cyclic, "{method:?}");
            let SplinePoints::Bezier(bezier) = &spline.points else {
                panic!("expected bezier");
            };
            let free: Vec<Point3<f64>> = bezier
                .iter()
                .filter(|p| p.handle_left_type == HandleType::Free && p.handle_right_type == HandleType::Free)
                .map(|p| p.anchor)
                .collect();
            assert_eq!(free.len(), 4, "{method:?}: {free:?}");
            for corner in &corners {
                assert!(free.contains(corner), "{method:?}: {corner:?} not free in {free:?}");
            }
        }
    }

    #[test]
    fn pressure_channel_sets_radius() {
        let settings = DrawSettings {
            use_pressure_radius: true,
            radius_min: 0.5,
            radius_max: 1.5,
            ..DrawSettings::default()
        };
        let s = stroke(&[(0.0, 0.0, 0.0, 0.0), (1.0, 0.0, 0.0, 0.5), (2.0, 0.0, 0.0, 1.0)]);
        let spline = build_spline(
            &s,
            &settings,
            &options(FitMethod::Split, 0.01, false),
            &resolver(&settings),
            true,
            &NdCubicFitter,
        )
        .unwrap();
        let SplinePoints::Bezier(bezier) = &spline.points else {
            panic!("expected bezier");
        };
        assert_relative_eq!(bezier[0].radius, 0.5);
        assert_relative_eq!(bezier[bezier.len() - 1].radius, 1.5);
    }

    #[test]
    fn poly_keeps_every_sample_and_flattens_2d() {
        let settings = DrawSettings {
            curve_type: CurveType::Poly,
            ..DrawSettings::default()
        };
        let s = stroke(&[(0.0, 0.0, 2.0, 1.0), (0.0, 0.0, 2.0, 1.0), (1.0, 0.0, 3.0, 1.0)]);
        let spline = build_spline(
            &s,
            &settings,
            &options(FitMethod::Refit, 0.1, false),
            &resolver(&settings),
            false,
            &FailingFitter,
        )
        .unwrap();
        assert_eq!(spline.len(), 3);
        assert!(spline.anchors().iter().all(|p| p.z == 0.0));
    }

    #[test]
    fn empty_stroke_is_rejected() {
        let settings = DrawSettings::default();
        let result = build_spline(
            &stroke(&[]),
            &settings,
            &options(FitMethod::Refit, 0.1, false),
            &resolver(&settings),
            true,
            &NdCubicFitter,
        );
        assert!(matches!(result, Err(DrawError::EmptyStroke)));
    }

    #[test]
    fn fit_failure_reports_status() {
        let settings = DrawSettings::default();
        let result = build_spline(
            &stroke(&[(0.0, 0.0, 0.0, 1.0), (1.0, 1.0, 0.0, 1.0)]),
            &settings,
            &options(FitMethod::Split, 0.1, false),
            &resolver(&settings),
            true,
            &FailingFitter,
        );
        assert!(matches!(result, Err(DrawError::FitFailed { status: 3 })));
    }
}
