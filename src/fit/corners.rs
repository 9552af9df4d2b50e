//! Corner detection on flat N-dimensional polylines.
//!
//! At each point, the turning angle is measured between the points where
//! the polyline leaves a sphere of radius `r` around it, for several radii
//! in `[radius_min, radius_max]`. The point's score is the smallest of
//! those angles, so only turns that stay sharp at every scale count.
//! Adjacent candidates are reduced to the sharpest one.

use std::f64::consts::PI;

use super::cubic::{angle_between, dist_sq, sub, Points};

/// Sampling radii for the turning-angle measure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerRadii {
    pub min: f64,
    pub max: f64,
    pub samples: usize,
}

impl CornerRadii {
    fn radii(&self) -> Vec<f64> {
        let (min, max) = if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        };
        match self.samples {
            0 => Vec::new(),
            1 => vec![min],
            n => (0..n)
                .map(|k| min + (max - min) * k as f64 / (n - 1) as f64)
                .filter(|r| *r > 0.0)
                .collect(),
        }
    }
}

/// Indices of corner points, ascending.
///
/// Open polylines always report their first and last index; closed
/// ones report only points whose turning angle exceeds `angle_threshold`.
pub fn detect(
    points: &[f64],
    dims: usize,
    radii: CornerRadii,
    angle_threshold: f64,
    cyclic: bool,
) -> Vec<usize> {
    if dims == 0 {
        return Vec::new();
    }
    let pts = Points::new(points, dims, cyclic);
    let n = pts.len();
    let mut corners = Vec::new();
    if n == 0 {
        return corners;
    }
    if !cyclic {
        corners.push(0);
    }

    if n >= 3 && angle_threshold < PI {
        let radii = radii.radii();
        let range = if cyclic { 0..n } else { 1..n - 1 };
        let candidates: Vec<(usize, f64)> = range
            .filter_map(|i| turning_score(pts, i, &radii).map(|score| (i, score)))
            .filter(|&(_, score)| score > angle_threshold)
            .collect();
        corners.extend(suppress_non_max(&candidates, n, cyclic));
    }

    if !cyclic && n > 1 {
        corners.push(n - 1);
    }
    corners.sort_unstable();
    corners.dedup();
    corners
}

/// Smallest turning angle over the reachable radii, if any is reachable.
fn turning_score(pts: Points<'_>, i: usize, radii: &[f64]) -> Option<f64> {
    let center = pts.get(i);
    let mut score: Option<f64> = None;
    for &r in radii {
        let (Some(before), Some(after)) = (
            point_at_distance(pts, i, r, -1),
            point_at_distance(pts, i, r, 1),
        ) else {
            // Larger radii reach no further.
            break;
        };
        let angle = angle_between(&sub(center, &before), &sub(&after, center));
        score = Some(score.map_or(angle, |s: f64| s.min(angle)));
    }
    score
}

/// Where the polyline first leaves the sphere of `radius` around point
/// `i`, walking in direction `step`.
fn point_at_distance(pts: Points<'_>, i: usize, radius: f64, step: isize) -> Option<Vec<f64>> {
    let center = pts.get(i);
    let r_sq = radius * radius;
    let mut prev = i;
    for _ in 1..pts.len() {
        let next = pts.offset(prev, step)?;
        if next == i {
            return None;
        }
        if dist_sq(pts.get(next), center) >= r_sq {
            return Some(sphere_exit(pts.get(prev), pts.get(next), center, radius));
        }
        prev = next;
    }
    None
}

/// Point on segment `a`→`b` at `radius` from `center`, with `a` inside.
fn sphere_exit(a: &[f64], b: &[f64], center: &[f64], radius: f64) -> Vec<f64> {
    let ab = sub(b, a);
    let ac = sub(a, center);
    let qa: f64 = ab.iter().map(|x| x * x).sum();
    if qa == 0.0 {
        return b.to_vec();
    }
    let qb: f64 = 2.0 * ab.iter().zip(&ac).map(|(x, y)| x * y).sum::<f64>();
    let qc: f64 = ac.iter().map(|x| x * x).sum::<f64>() - radius * radius;
    let disc = (qb * qb - 4.0 * qa * qc).max(0.0);
    let t = ((-qb + disc.sqrt()) / (2.0 * qa)).clamp(0.0, 1.0);
    a.iter().zip(&ab).map(|(p, d)| p + d * t).collect()
}

/// Keep the sharpest index of every run of adjacent candidates.
fn suppress_non_max(candidates: &[(usize, f64)], n: usize, cyclic: bool) -> Vec<usize> {
    let mut runs: Vec<Vec<(usize, f64)>> = Vec::new();
    for &(i, score) in candidates {
        match runs.last_mut() {
            Some(run) if run.last().is_some_and(|&(j, _)| j + 1 == i) => run.push((i, score)),
            _ => runs.push(vec![(i, score)]),
        }
    }
    // A run through the seam of a closed polyline is one run.
    if cyclic && runs.len() > 1 {
        let wraps = runs[0][0].0 == 0 && runs.last().is_some_and(|r| r.last().is_some_and(|&(j, _)| j == n - 1));
        if wraps {
            if let Some(tail) = runs.pop() {
                runs[0].extend(tail);
            }
        }
    }
    runs.iter()
        .filter_map(|run| {
            run.iter()
                .copied()
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(i, _)| i)
        })
        .collect()
}
