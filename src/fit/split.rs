//! Recursive split fitting.
//!
//! 1. Cut the polyline at its corners (closed inputs without corners are
//!    cut at the point farthest from the start)
//! 2. Fit one cubic per piece with fixed end tangents
//! 3. While a piece exceeds the error threshold, split it at its worst
//!    sample with a smooth tangent and fit both halves again

use std::collections::BTreeMap;

use super::cubic::{dist_sq, fit_span, negate, Points};
use super::{trim_closing_duplicate, CubicSpline, FitFailure, FitInput};

#[derive(Debug, Default)]
struct Knot {
    handle_l: Option<Vec<f64>>,
    handle_r: Option<Vec<f64>>,
    is_corner: bool,
}

pub(super) fn fit(input: &FitInput<'_>) -> Result<CubicSpline, FitFailure> {
    let dims = input.dims;
    let data = trim_closing_duplicate(input.points, dims, input.flags.cyclic);
    let n = data.len() / dims;
    if n == 1 {
        return Ok(CubicSpline::single(data));
    }
    let cyclic = input.flags.cyclic && n >= 3;
    let pts = Points::new(data, dims, cyclic);

    let mut corners: Vec<usize> = input
        .corners
        .map(|c| c.iter().copied().filter(|&i| i < n).collect())
        .unwrap_or_default();
    corners.sort_unstable();
    corners.dedup();

    // Boundaries in unrolled indices: u maps to point (u + start) % n.
    let (start, boundaries): (usize, Vec<(usize, bool)>) = if !cyclic {
        corners.push(0);
        corners.push(n - 1);
        corners.sort_unstable();
        corners.dedup();
        (0, corners.iter().map(|&c| (c, true)).collect())
    } else if let Some(&first) = corners.first() {
        let mut b: Vec<(usize, bool)> = corners.iter().map(|&c| (c - first, true)).collect();
        b.push((n, true));
        (first, b)
    } else {
        let mid = farthest_from(pts, 0);
        (0, vec![(0, false), (mid, false), (n, false)])
    };

    let unrolled: Vec<f64> = if cyclic {
        (0..=n).flat_map(|u| pts.get((u + start) % n).iter().copied()).collect()
    } else {
        data.to_vec()
    };
    let line = Points::new(&unrolled, dims, false);
    let orig = |u: usize| (u + start) % n;
    let smooth = |u: usize| pts.center_tangent(orig(u));

    let error_sq = input.error_threshold * input.error_threshold;
    let iterations = input.iterations();
    let mut knots: BTreeMap<usize, Knot> = BTreeMap::new();

    for pair in boundaries.windows(2) {
        let (a, a_corner) = pair[0];
        let (b, b_corner) = pair[1];
        let tan_a = if a_corner {
            line.end_tangent(a, 1, b - a)
        } else {
            smooth(a)
        };
        let tan_b = if b_corner {
            line.end_tangent(b, -1, b - a)
        } else {
            negate(&smooth(b))
        };
        knots.entry(a).or_default().is_corner = a_corner;
        knots.entry(b).or_default().is_corner = b_corner;

        let mut stack = vec![(a, b, tan_a, tan_b)];
        while let Some((a, b, tan_a, tan_b)) = stack.pop() {
            let span = Points::new(&unrolled[a * dims..(b + 1) * dims], dims, false);
            let fit = fit_span(span, &tan_a, &tan_b, error_sq, iterations);
            if fit.error_sq <= error_sq || b - a < 2 {
                knots.entry(a).or_default().handle_r = Some(fit.handle_r);
                knots.entry(b).or_default().handle_l = Some(fit.handle_l);
            } else {
                let s = a + fit.error_index.clamp(1, b - a - 1);
                let tangent = smooth(s);
                knots.entry(s).or_default();
                stack.push((s, b, tangent.clone(), tan_b));
                stack.push((a, s, tan_a, negate(&tangent)));
            }
        }
    }

    let mut knots: Vec<(usize, Knot)> = knots.into_iter().collect();
    if cyclic {
        // The closing boundary is the first knot again.
        if let Some((_, closing)) = knots.pop() {
            knots[0].1.handle_l = closing.handle_l;
        }
    }

    let mut spline = CubicSpline::new(dims, cyclic);
    for (u, knot) in &knots {
        let anchor = line.get(*u);
        let handle_r = knot
            .handle_r
            .clone()
            .or_else(|| knot.handle_l.as_deref().map(|h| mirror(anchor, h)))
            .unwrap_or_else(|| anchor.to_vec());
        let handle_l = knot
            .handle_l
            .clone()
            .unwrap_or_else(|| mirror(anchor, &handle_r));
        if knot.is_corner {
            spline.corner_index.push(spline.len());
        }
        spline.push_knot(&handle_l, anchor, &handle_r, orig(*u));
    }
    if cyclic {
        let first = spline
            .orig_index
            .iter()
            .enumerate()
            .min_by_key(|&(_, &i)| i)
            .map_or(0, |(k, _)| k);
        spline.rotate(first);
    }
    Ok(spline)
}

/// Reflect `handle` through `anchor`.
pub(super) fn mirror(anchor: &[f64], handle: &[f64]) -> Vec<f64> {
    anchor.iter().zip(handle).map(|(a, h)| 2.0 * a - h).collect()
}

fn farthest_from(pts: Points<'_>, i: usize) -> usize {
    let origin = pts.get(i);
    (0..pts.len())
        .map(|j| (j, dist_sq(pts.get(j), origin)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(0, |(j, _)| j)
}

#[cfg(test)]
mod tests {
    use super::super::{FitFlags, FitInput};
    use super::*;
    use std::f64::consts::TAU;

    fn input<'a>(points: &'a [f64], error: f64, cyclic: bool, corners: Option<&'a [usize]>) -> FitInput<'a> {
        FitInput {
            points,
            dims: 2,
            error_threshold: error,
            corner_angle: std::f64::consts::PI,
            flags: FitFlags {
                cyclic,
                high_quality: false,
            },
            corners,
        }
    }

    fn circle(n: usize, r: f64) -> Vec<f64> {
        (0..n)
            .flat_map(|i| {
                let a = i as f64 / n as f64 * TAU;
                [r * a.cos(), r * a.sin()]
            })
            .collect()
    }

    #[test]
    fn straight_line_is_one_segment() {
        let points: Vec<f64> = (0..10).flat_map(|i| [i as f64, 0.0]).collect();
        let spline = fit(&input(&points, 0.1, false, None)).unwrap();
        assert_eq!(spline.len(), 2);
        assert_eq!(spline.anchor(0), &[0.0, 0.0]);
        assert_eq!(spline.anchor(1), &[9.0, 0.0]);
        assert_eq!(spline.orig_index, vec![0, 9]);
        assert_eq!(spline.corner_index, vec![0, 1]);
    }

    #[test]
    fn corners_become_knots() {
        let mut points: Vec<f64> = (0..=10).flat_map(|i| [i as f64, 0.0]).collect();
        points.extend((1..=10).flat_map(|i| [10.0, i as f64]));
        let corners = [0, 10, 20];
        let spline = fit(&input(&points, 0.01, false, Some(&corners))).unwrap();
        assert_eq!(spline.orig_index, vec![0, 10, 20]);
        assert_eq!(spline.corner_index, vec![0, 1, 2]);
        // Handles at the corner follow each leg.
        assert!(spline.handle_l(1)[1].abs() < 1e-9 && spline.handle_l(1)[0] < 10.0);
        assert!(spline.handle_r(1)[0] == 10.0 && spline.handle_r(1)[1] > 0.0);
    }

    #[test]
    fn closed_circle_is_smooth_and_within_error() {
        let points = circle(64, 10.0);
        let spline = fit(&input(&points, 0.05, true, None)).unwrap();
        assert!(spline.cyclic);
        assert!(spline.len() >= 2);
        assert!(spline.corner_index.is_empty());
        assert_eq!(spline.orig_index[0], 0);
        for k in 0..spline.len() {
            let a = spline.anchor(k);
            let l = spline.handle_l(k);
            let r = spline.handle_r(k);
            let cross = (l[0] - a[0]) * (r[1] - a[1]) - (l[1] - a[1]) * (r[0] - a[0]);
            assert!(cross.abs() < 1e-6, "knot {k} is not aligned");
        }
    }

    #[test]
    fn closing_duplicate_is_ignored() {
        let mut points = circle(32, 5.0);
        points.extend_from_slice(&[5.0, 0.0]);
        let spline = fit(&input(&points, 0.05, true, None)).unwrap();
        assert!(spline.orig_index.iter().all(|&i| i < 32));
    }

    #[test]
    fn zero_error_splits_zigzag() {
        let points = [0.0, 0.0, 1.0, 1.0, 2.0, 0.0, 3.0, 1.0];
        let spline = fit(&input(&points, 0.0, false, None)).unwrap();
        assert!(spline.len() > 2);
        assert_eq!(spline.orig_index.first(), Some(&0));
        assert_eq!(spline.orig_index.last(), Some(&3));
        assert!(spline.orig_index.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn single_point() {
        let spline = fit(&input(&[1.0, 2.0], 1.0, false, None)).unwrap();
        assert_eq!(spline.len(), 1);
        assert_eq!(spline.handle_l(0), &[1.0, 2.0]);
        assert_eq!(spline.handle_r(0), &[1.0, 2.0]);
    }
}
