//! Cubic curve fitting for N-dimensional point sequences.
//!
//! The fitter is reached through the [`CurveFitter`] trait so callers can
//! swap in another implementation. [`NdCubicFitter`] is the built-in one,
//! with two strategies:
//! - **Split**: fit, then split at the worst sample until within error
//! - **Refit**: start from every point and remove knots while within error

pub mod corners;
pub mod cubic;
mod refit;
mod split;

use thiserror::Error;

use crate::config::FitMethod;

pub use corners::CornerRadii;

/// Input validation failed.
pub const STATUS_INVALID_INPUT: i32 = 1;
/// A coordinate was NaN or infinite.
pub const STATUS_NON_FINITE: i32 = 2;

/// Non-zero status from a fitter: no usable curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("curve fit failed with status {status}")]
pub struct FitFailure {
    pub status: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FitFlags {
    /// Treat the input as a closed loop.
    pub cyclic: bool,
    /// Spend more parameter-refinement iterations per span.
    pub high_quality: bool,
}

/// Points to fit: `points.len() / dims` vectors of `dims` values each.
#[derive(Debug, Clone, Copy)]
pub struct FitInput<'a> {
    pub points: &'a [f64],
    pub dims: usize,
    /// Largest allowed distance between an input point and the curve.
    pub error_threshold: f64,
    /// Turning angle above which the refit strategy pins a corner.
    pub corner_angle: f64,
    pub flags: FitFlags,
    /// Point indices that must become knots with independent handles.
    pub corners: Option<&'a [usize]>,
}

impl FitInput<'_> {
    pub fn len(&self) -> usize {
        if self.dims == 0 {
            0
        } else {
            self.points.len() / self.dims
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn validate(&self) -> Result<(), FitFailure> {
        if self.dims == 0 || self.points.is_empty() || self.points.len() % self.dims != 0 {
            return Err(FitFailure {
                status: STATUS_INVALID_INPUT,
            });
        }
        if !self.error_threshold.is_finite() || self.error_threshold < 0.0 {
            return Err(FitFailure {
                status: STATUS_INVALID_INPUT,
            });
        }
        if self.points.iter().any(|v| !v.is_finite()) {
            return Err(FitFailure {
                status: STATUS_NON_FINITE,
            });
        }
        Ok(())
    }

    fn iterations(&self) -> usize {
        if self.flags.high_quality {
            32
        } else {
            4
        }
    }
}

/// A fitted cubic spline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CubicSpline {
    pub dims: usize,
    /// `[handle_l, anchor, handle_r]` per knot, `dims` values each.
    pub knots: Vec<f64>,
    /// Input point index of each knot.
    pub orig_index: Vec<usize>,
    /// Knot indices with independent handles. Open splines list their
    /// first and last knot too.
    pub corner_index: Vec<usize>,
    pub cyclic: bool,
}

impl CubicSpline {
    pub fn new(dims: usize, cyclic: bool) -> Self {
        Self {
            dims,
            cyclic,
            ..Self::default()
        }
    }

    /// One knot with both handles on the anchor.
    fn single(point: &[f64]) -> Self {
        let mut spline = Self::new(point.len(), false);
        spline.push_knot(point, point, point, 0);
        spline.corner_index.push(0);
        spline
    }

    pub fn len(&self) -> usize {
        self.orig_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orig_index.is_empty()
    }

    fn value(&self, knot: usize, slot: usize) -> &[f64] {
        let start = (knot * 3 + slot) * self.dims;
        &self.knots[start..start + self.dims]
    }

    pub fn handle_l(&self, knot: usize) -> &[f64] {
        self.value(knot, 0)
    }

    pub fn anchor(&self, knot: usize) -> &[f64] {
        self.value(knot, 1)
    }

    pub fn handle_r(&self, knot: usize) -> &[f64] {
        self.value(knot, 2)
    }

    pub fn push_knot(&mut self, handle_l: &[f64], anchor: &[f64], handle_r: &[f64], orig_index: usize) {
        self.knots.extend_from_slice(handle_l);
        self.knots.extend_from_slice(anchor);
        self.knots.extend_from_slice(handle_r);
        self.orig_index.push(orig_index);
    }

    /// Make knot `first` the start of a closed spline.
    pub fn rotate(&mut self, first: usize) {
        let len = self.len();
        if first == 0 || first >= len {
            return;
        }
        self.knots.rotate_left(first * 3 * self.dims);
        self.orig_index.rotate_left(first);
        for c in &mut self.corner_index {
            *c = (*c + len - first) % len;
        }
        self.corner_index.sort_unstable();
    }
}

/// A curve fitting backend.
pub trait CurveFitter {
    fn fit(&self, method: FitMethod, input: &FitInput<'_>) -> Result<CubicSpline, FitFailure>;
}

/// Built-in least-squares fitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct NdCubicFitter;

impl CurveFitter for NdCubicFitter {
    fn fit(&self, method: FitMethod, input: &FitInput<'_>) -> Result<CubicSpline, FitFailure> {
        input.validate()?;
        match method {
            FitMethod::Split => split::fit(input),
            FitMethod::Refit => refit::fit(input),
        }
    }
}

/// Drop a trailing point equal to the first one on closed input.
fn trim_closing_duplicate(points: &[f64], dims: usize, cyclic: bool) -> &[f64] {
    let n = points.len() / dims;
    if cyclic && n >= 2 && points[..dims] == points[(n - 1) * dims..] {
        &points[..(n - 1) * dims]
    } else {
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(points: &[f64], dims: usize) -> FitInput<'_> {
        FitInput {
            points,
            dims,
            error_threshold: 0.1,
            corner_angle: std::f64::consts::PI,
            flags: FitFlags::default(),
            corners: None,
        }
    }

    #[test]
    fn invalid_input_fails() {
        let fitter = NdCubicFitter;
        let err = fitter.fit(FitMethod::Split, &input(&[], 3)).unwrap_err();
        assert_eq!(err.status, STATUS_INVALID_INPUT);
        let err = fitter.fit(FitMethod::Refit, &input(&[1.0, 2.0], 3)).unwrap_err();
        assert_eq!(err.status, STATUS_INVALID_INPUT);
        let err = fitter.fit(FitMethod::Split, &input(&[1.0, f64::NAN, 0.0], 3)).unwrap_err();
        assert_eq!(err.status, STATUS_NON_FINITE);
    }

    #[test]
    fn both_methods_keep_endpoints() {
        let points: Vec<f64> = (0..30)
            .flat_map(|i| {
                let x = i as f64 * 0.3;
                [x, x.sin(), 0.0, 0.5]
            })
            .collect();
        for method in [FitMethod::Split, FitMethod::Refit] {
            let spline = NdCubicFitter.fit(method, &input(&points, 4)).unwrap();
            assert_eq!(spline.dims, 4);
            assert_eq!(spline.anchor(0), &points[..4]);
            assert_eq!(spline.anchor(spline.len() - 1), &points[29 * 4..]);
            assert_eq!(spline.knots.len(), spline.len() * 3 * 4);
        }
    }

    #[test]
    fn rotate_remaps_corners() {
        let mut spline = CubicSpline::new(1, true);
        for i in 0..4 {
            let v = [i as f64];
            spline.push_knot(&v, &v, &v, i + 10);
        }
        spline.corner_index = vec![0, 3];
        spline.rotate(3);
        assert_eq!(spline.orig_index, vec![13, 10, 11, 12]);
        assert_eq!(spline.anchor(0), &[3.0]);
        assert_eq!(spline.corner_index, vec![0, 1]);
    }

    #[test]
    fn closing_duplicate_trimmed_only_when_cyclic() {
        let points = [0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        assert_eq!(trim_closing_duplicate(&points, 2, true).len(), 4);
        assert_eq!(trim_closing_duplicate(&points, 2, false).len(), 6);
    }

    /// Smallest distance from `point` to the fitted curve, sampled densely.
    fn distance_to_curve(spline: &CubicSpline, point: &[f64]) -> f64 {
        let n = spline.len();
        let spans = if spline.cyclic { n } else { n - 1 };
        let mut best = f64::INFINITY;
        for k in 0..spans {
            let next = (k + 1) % n;
            let span = cubic::Cubic {
                p0: spline.anchor(k).to_vec(),
                p1: spline.handle_r(k).to_vec(),
                p2: spline.handle_l(next).to_vec(),
                p3: spline.anchor(next).to_vec(),
            };
            for i in 0..=256 {
                let d = cubic::dist_sq(&span.eval(i as f64 / 256.0), point);
                best = best.min(d);
            }
        }
        best.sqrt()
    }

    #[test]
    fn noisy_loop_stays_within_error() {
        // Wobbly 3D loop with deterministic jitter.
        let points: Vec<f64> = (0..300)
            .flat_map(|i| {
                let t = i as f64 / 300.0 * std::f64::consts::TAU;
                let jitter = 0.02 * (i as f64 * 12.9898).sin();
                [
                    (2.0 + jitter) * t.cos(),
                    (2.0 - jitter) * t.sin(),
                    0.5 * (3.0 * t).sin() + jitter,
                ]
            })
            .collect();
        for method in [FitMethod::Split, FitMethod::Refit] {
            for cyclic in [false, true] {
                for error in [0.01, 0.05, 0.2] {
                    let fit_input = FitInput {
                        error_threshold: error,
                        flags: FitFlags {
                            cyclic,
                            high_quality: true,
                        },
                        ..input(&points, 3)
                    };
                    let spline = NdCubicFitter.fit(method, &fit_input).unwrap();
                    let worst = points
                        .chunks(3)
                        .map(|p| distance_to_curve(&spline, p))
                        .fold(0.0, f64::max);
                    assert!(
                        worst <= error * 1.01,
                        "{method:?} cyclic={cyclic} error={error}: worst {worst}"
                    );
                }
            }
        }
    }
}

