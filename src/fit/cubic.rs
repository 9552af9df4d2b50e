//! Single-span cubic fitting with fixed end tangents, in any dimension.
//!
//! Points are flat `f64` slices, `dims` values per point. A span is
//! fitted by least squares on the two handle lengths, then the sample
//! parameters are refined with Newton steps; the best attempt wins.

use nalgebra::{DVectorView, DVectorViewMut};

/// Neighbours averaged into a tangent estimate.
const TANGENT_WINDOW: usize = 3;
/// Handle lengths below this fraction of the chord are rejected.
const HANDLE_EPSILON: f64 = 1e-6;

// ── Vector helpers ───────────────────────────────────────

fn view(a: &[f64]) -> DVectorView<'_, f64> {
    DVectorView::from_slice(a, a.len())
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    view(a).dot(&view(b))
}

pub fn len_sq(a: &[f64]) -> f64 {
    view(a).norm_squared()
}

pub fn dist_sq(a: &[f64], b: &[f64]) -> f64 {
    (&view(a) - &view(b)).norm_squared()
}

pub fn sub(a: &[f64], b: &[f64]) -> Vec<f64> {
    (&view(a) - &view(b)).as_slice().to_vec()
}

/// `a + b × s`
pub fn madd(a: &[f64], b: &[f64], s: f64) -> Vec<f64> {
    view(a).zip_map(&view(b), |x, y| x + y * s).as_slice().to_vec()
}

/// Normalize in place; returns false (leaving zeros) for a zero vector.
pub fn normalize(v: &mut [f64]) -> bool {
    let n = v.len();
    let mut v = DVectorViewMut::from_slice(v, n);
    let len = v.norm();
    if len > 0.0 && len.is_finite() {
        v.unscale_mut(len);
        true
    } else {
        v.fill(0.0);
        false
    }
}

pub fn negate(v: &[f64]) -> Vec<f64> {
    view(v).map(|x| -x).as_slice().to_vec()
}

/// Unsigned angle between two vectors, in radians [0, pi].
/// Zero when either vector is degenerate.
pub fn angle_between(a: &[f64], b: &[f64]) -> f64 {
    view(a).angle(&view(b))
}

// ── Point access ─────────────────────────────────────────

/// Read-only view over flat point data, optionally closed.
#[derive(Debug, Clone, Copy)]
pub struct Points<'a> {
    data: &'a [f64],
    dims: usize,
    cyclic: bool,
}

impl<'a> Points<'a> {
    pub fn new(data: &'a [f64], dims: usize, cyclic: bool) -> Self {
        Self { data, dims, cyclic }
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dims
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn is_cyclic(&self) -> bool {
        self.cyclic
    }

    pub fn get(&self, i: usize) -> &'a [f64] {
        &self.data[i * self.dims..(i + 1) * self.dims]
    }

    /// Resolve `i + offset`, wrapping when closed.
    pub fn offset(&self, i: usize, offset: isize) -> Option<usize> {
        let n = self.len() as isize;
        let j = i as isize + offset;
        if self.cyclic {
            Some(j.rem_euclid(n) as usize)
        } else if (0..n).contains(&j) {
            Some(j as usize)
        } else {
            None
        }
    }

    /// Direction leaving point `i` toward `step` (+1 forward, -1 back),
    /// averaged over at most `limit` neighbours.
    pub fn end_tangent(&self, i: usize, step: isize, limit: usize) -> Vec<f64> {
        let origin = self.get(i);
        let mut tangent = vec![0.0; self.dims];
        for k in 1..=limit.min(TANGENT_WINDOW) {
            let Some(j) = self.offset(i, step * k as isize) else {
                break;
            };
            if j == i {
                break;
            }
            let mut d = sub(self.get(j), origin);
            if normalize(&mut d) {
                tangent.iter_mut().zip(&d).for_each(|(t, x)| *t += x);
            }
        }
        normalize(&mut tangent);
        tangent
    }

    /// Smooth forward tangent through point `i`.
    /// Falls back to a one-sided estimate at open ends.
    pub fn center_tangent(&self, i: usize) -> Vec<f64> {
        let mut tangent = vec![0.0; self.dims];
        for k in 1..=TANGENT_WINDOW as isize {
            let (Some(prev), Some(next)) = (self.offset(i, -k), self.offset(i, k)) else {
                break;
            };
            if prev == next {
                break;
            }
            let mut d = sub(self.get(next), self.get(prev));
            if normalize(&mut d) {
                tangent.iter_mut().zip(&d).for_each(|(t, x)| *t += x);
            }
        }
        if normalize(&mut tangent) {
            return tangent;
        }
        let forward = self.end_tangent(i, 1, TANGENT_WINDOW);
        if len_sq(&forward) > 0.0 {
            return forward;
        }
        negate(&self.end_tangent(i, -1, TANGENT_WINDOW))
    }
}

// ── Cubic evaluation ─────────────────────────────────────

/// A cubic bezier segment in `dims` dimensions.
#[derive(Debug, Clone)]
pub struct Cubic {
    pub p0: Vec<f64>,
    pub p1: Vec<f64>,
    pub p2: Vec<f64>,
    pub p3: Vec<f64>,
}

impl Cubic {
    pub fn eval(&self, t: f64) -> Vec<f64> {
        let mt = 1.0 - t;
        let (b0, b1, b2, b3) = (mt * mt * mt, 3.0 * mt * mt * t, 3.0 * mt * t * t, t * t * t);
        (0..self.p0.len())
            .map(|k| b0 * self.p0[k] + b1 * self.p1[k] + b2 * self.p2[k] + b3 * self.p3[k])
            .collect()
    }

    fn derivative(&self, t: f64) -> Vec<f64> {
        let mt = 1.0 - t;
        (0..self.p0.len())
            .map(|k| {
                3.0 * mt * mt * (self.p1[k] - self.p0[k])
                    + 6.0 * mt * t * (self.p2[k] - self.p1[k])
                    + 3.0 * t * t * (self.p3[k] - self.p2[k])
            })
            .collect()
    }

    fn second_derivative(&self, t: f64) -> Vec<f64> {
        let mt = 1.0 - t;
        (0..self.p0.len())
            .map(|k| {
                6.0 * mt * (self.p2[k] - 2.0 * self.p1[k] + self.p0[k])
                    + 6.0 * t * (self.p3[k] - 2.0 * self.p2[k] + self.p1[k])
            })
            .collect()
    }
}

// ── Span fitting ─────────────────────────────────────────

/// Result of fitting one span.
#[derive(Debug, Clone)]
pub struct SpanFit {
    /// Handle leaving the first point.
    pub handle_r: Vec<f64>,
    /// Handle entering the last point.
    pub handle_l: Vec<f64>,
    /// Largest squared distance from a sample to the curve.
    pub error_sq: f64,
    /// Span-local index of that sample (interior, when there is one).
    pub error_index: usize,
}

/// Fit one cubic through a contiguous run of at least two points.
///
/// `tan_l` is the unit direction leaving the first point, `tan_r` the
/// unit direction leaving the last point backwards along the span.
pub fn fit_span(
    span: Points<'_>,
    tan_l: &[f64],
    tan_r: &[f64],
    error_sq_max: f64,
    iterations: usize,
) -> SpanFit {
    let m = span.len();
    let p0 = span.get(0);
    let p3 = span.get(m - 1);
    let chord = dist_sq(p0, p3).sqrt();

    if m == 2 {
        let a = chord / 3.0;
        return SpanFit {
            handle_r: madd(p0, tan_l, a),
            handle_l: madd(p3, tan_r, a),
            error_sq: 0.0,
            error_index: 0,
        };
    }

    let mut params = chord_length_params(span);
    let mut best: Option<SpanFit> = None;
    for iteration in 0..=iterations {
        let cubic = solve_handles(span, &params, tan_l, tan_r, chord);
        let (error_sq, error_index) = max_error(span, &params, &cubic);
        let improved = best.as_ref().map_or(true, |b| error_sq < b.error_sq);
        if improved {
            best = Some(SpanFit {
                handle_r: cubic.p1.clone(),
                handle_l: cubic.p2.clone(),
                error_sq,
                error_index,
            });
        }
        if error_sq <= error_sq_max || iteration == iterations {
            break;
        }
        reparameterize(span, &mut params, &cubic);
    }
    // At least one iteration always runs.
    best.unwrap_or_else(|| SpanFit {
        handle_r: p0.to_vec(),
        handle_l: p3.to_vec(),
        error_sq: f64::INFINITY,
        error_index: m / 2,
    })
}

/// Normalized cumulative chord length per point.
fn chord_length_params(span: Points<'_>) -> Vec<f64> {
    let m = span.len();
    let mut params = Vec::with_capacity(m);
    let mut total = 0.0;
    params.push(0.0);
    for i in 1..m {
        total += dist_sq(span.get(i), span.get(i - 1)).sqrt();
        params.push(total);
    }
    if total > 0.0 {
        params.iter_mut().for_each(|u| *u /= total);
    } else {
        let last = (m - 1) as f64;
        params.iter_mut().enumerate().for_each(|(i, u)| *u = i as f64 / last);
    }
    params
}

/// Least-squares handle lengths along fixed tangents.
fn solve_handles(span: Points<'_>, params: &[f64], tan_l: &[f64], tan_r: &[f64], chord: f64) -> Cubic {
    let m = span.len();
    let p0 = span.get(0);
    let p3 = span.get(m - 1);
    let tt = dot(tan_l, tan_r);
    let (mut c00, mut c01, mut c11, mut x0, mut x1) = (0.0, 0.0, 0.0, 0.0, 0.0);

    for (i, &u) in params.iter().enumerate() {
        let mu = 1.0 - u;
        let b0 = mu * mu * mu;
        let b1 = 3.0 * mu * mu * u;
        let b2 = 3.0 * mu * u * u;
        let b3 = u * u * u;
        c00 += b1 * b1;
        c01 += b1 * b2 * tt;
        c11 += b2 * b2;
        let point = span.get(i);
        let mut rx0 = 0.0;
        let mut rx1 = 0.0;
        for k in 0..span.dims() {
            let residual = point[k] - (p0[k] * (b0 + b1) + p3[k] * (b2 + b3));
            rx0 += tan_l[k] * residual;
            rx1 += tan_r[k] * residual;
        }
        x0 += b1 * rx0;
        x1 += b2 * rx1;
    }

    let det = c00 * c11 - c01 * c01;
    let fallback = chord / 3.0;
    let (mut a1, mut a2) = if det.abs() > 1e-12 {
        ((x0 * c11 - x1 * c01) / det, (c00 * x1 - c01 * x0) / det)
    } else {
        (fallback, fallback)
    };
    let epsilon = HANDLE_EPSILON * chord;
    if !(a1 > epsilon && a2 > epsilon) || !a1.is_finite() || !a2.is_finite() {
        a1 = fallback;
        a2 = fallback;
    }

    Cubic {
        p0: p0.to_vec(),
        p1: madd(p0, tan_l, a1),
        p2: madd(p3, tan_r, a2),
        p3: p3.to_vec(),
    }
}

/// Largest squared deviation over interior samples.
fn max_error(span: Points<'_>, params: &[f64], cubic: &Cubic) -> (f64, usize) {
    let m = span.len();
    let mut worst = (0.0, m / 2);
    for i in 1..m - 1 {
        let error_sq = dist_sq(&cubic.eval(params[i]), span.get(i));
        if error_sq > worst.0 {
            worst = (error_sq, i);
        }
    }
    worst
}

/// One Newton-Raphson step per interior parameter.
fn reparameterize(span: Points<'_>, params: &mut [f64], cubic: &Cubic) {
    let m = span.len();
    for i in 1..m - 1 {
        let u = params[i];
        let diff = sub(&cubic.eval(u), span.get(i));
        let d1 = cubic.derivative(u);
        let d2 = cubic.second_derivative(u);
        let numerator = dot(&diff, &d1);
        let denominator = len_sq(&d1) + dot(&diff, &d2);
        if denominator.abs() > 1e-12 {
            params[i] = (u - numerator / denominator).clamp(0.0, 1.0);
        }
    }
}
