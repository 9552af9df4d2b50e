//! Iterative knot removal.
//!
//! Every input point starts as a knot. The knot whose removal costs the
//! least (the max error of refitting its two neighbouring segments as a
//! single cubic) is dropped first, as long as that cost stays within the
//! threshold. Costs of the neighbours are recomputed after each removal;
//! stale heap entries are skipped by version.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f64::consts::PI;

use super::corners::{self, CornerRadii};
use super::cubic::{dist_sq, fit_span, madd, negate, Points};
use super::split::mirror;
use super::{trim_closing_duplicate, CubicSpline, FitFailure, FitInput};

#[derive(Debug, Clone)]
struct Knot {
    prev: Option<usize>,
    next: Option<usize>,
    /// Direction of the incoming handle, away from the anchor.
    tan_l: Vec<f64>,
    /// Direction of the outgoing handle.
    tan_r: Vec<f64>,
    handle_l: Vec<f64>,
    handle_r: Vec<f64>,
    is_corner: bool,
    removed: bool,
    version: u32,
}

/// A pending removal, ordered so the cheapest pops first.
#[derive(Debug)]
struct Removal {
    cost: f64,
    knot: usize,
    version: u32,
    handle_r: Vec<f64>,
    handle_l: Vec<f64>,
}

impl PartialEq for Removal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Removal {}

impl PartialOrd for Removal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Removal {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.knot.cmp(&self.knot))
    }
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
    let error_sq = input.error_threshold * input.error_threshold;
    let iterations = input.iterations();

    let is_corner = corner_flags(input, data, n, cyclic);
    let mut knots = initial_knots(pts, &is_corner);

    let removable = |k: usize, knots: &[Knot]| {
        !knots[k].is_corner && knots[k].prev.is_some() && knots[k].next.is_some()
    };
    let mut heap = BinaryHeap::new();
    for k in 0..n {
        if removable(k, &knots) {
            heap.extend(removal_cost(pts, &knots, k, error_sq, iterations));
        }
    }

    let min_knots = if cyclic { 3 } else { 2 };
    let mut alive = n;
    while let Some(removal) = heap.pop() {
        if alive <= min_knots {
            break;
        }
        let k = removal.knot;
        if knots[k].removed || knots[k].version != removal.version {
            continue;
        }
        let (Some(prev), Some(next)) = (knots[k].prev, knots[k].next) else {
            continue;
        };
        knots[k].removed = true;
        knots[prev].next = Some(next);
        knots[next].prev = Some(prev);
        knots[prev].handle_r = removal.handle_r;
        knots[next].handle_l = removal.handle_l;
        alive -= 1;

        for neighbour in [prev, next] {
            knots[neighbour].version += 1;
            if removable(neighbour, &knots) {
                heap.extend(removal_cost(pts, &knots, neighbour, error_sq, iterations));
            }
        }
    }
    log::trace!("refit kept {} of {} knots", alive, n);

    Ok(assemble(pts, &knots))
}

/// Per-point corner flags, from the caller or detected.
fn corner_flags(input: &FitInput<'_>, data: &[f64], n: usize, cyclic: bool) -> Vec<bool> {
    let mut flags = vec![false; n];
    let detected;
    let corners: &[usize] = match input.corners {
        Some(corners) => corners,
        None if input.corner_angle < PI => {
            detected = corners::detect(
                data,
                input.dims,
                CornerRadii {
                    min: input.error_threshold / 8.0,
                    max: input.error_threshold * 2.0,
                    samples: 16,
                },
                input.corner_angle,
                cyclic,
            );
            &detected
        }
        None => &[],
    };
    for &c in corners.iter().filter(|&&c| c < n) {
        flags[c] = true;
    }
    flags
}

fn initial_knots(pts: Points<'_>, is_corner: &[bool]) -> Vec<Knot> {
    let n = pts.len();
    let mut knots: Vec<Knot> = (0..n)
        .map(|i| {
            let (tan_l, tan_r) = if is_corner[i] || pts.offset(i, -1).is_none() || pts.offset(i, 1).is_none() {
                let forward = pts.end_tangent(i, 1, n);
                let backward = pts.end_tangent(i, -1, n);
                match (pts.offset(i, -1), pts.offset(i, 1)) {
                    (None, _) => (negate(&forward), forward),
                    (_, None) => (backward.clone(), negate(&backward)),
                    _ => (backward, forward),
                }
            } else {
                let t = pts.center_tangent(i);
                (negate(&t), t)
            };
            let anchor = pts.get(i);
            Knot {
                prev: pts.offset(i, -1),
                next: pts.offset(i, 1),
                handle_l: anchor.to_vec(),
                handle_r: anchor.to_vec(),
                tan_l,
                tan_r,
                is_corner: is_corner[i],
                removed: false,
                version: 0,
            }
        })
        .collect();

    // Straight segments between neighbours, a third of the chord.
    for i in 0..n {
        let Some(j) = knots[i].next else {
            continue;
        };
        let third = dist_sq(pts.get(i), pts.get(j)).sqrt() / 3.0;
        knots[i].handle_r = madd(pts.get(i), &knots[i].tan_r, third);
        knots[j].handle_l = madd(pts.get(j), &knots[j].tan_l, third);
    }
    knots
}

/// Cost of replacing the two segments around `k` with one.
fn removal_cost(pts: Points<'_>, knots: &[Knot], k: usize, error_sq: f64, iterations: usize) -> Option<Removal> {
    let prev = knots[k].prev?;
    let next = knots[k].next?;
    let span = gather(pts, prev, next);
    let fit = fit_span(
        Points::new(&span, pts.dims(), false),
        &knots[prev].tan_r,
        &knots[next].tan_l,
        error_sq,
        iterations,
    );
    (fit.error_sq <= error_sq).then(|| Removal {
        cost: fit.error_sq,
        knot: k,
        version: knots[k].version,
        handle_r: fit.handle_r,
        handle_l: fit.handle_l,
    })
}

/// Points from `from` to `to` inclusive, walking forward.
fn gather(pts: Points<'_>, from: usize, to: usize) -> Vec<f64> {
    let mut span = pts.get(from).to_vec();
    let mut i = from;
    while i != to {
        let Some(next) = pts.offset(i, 1) else {
            break;
        };
        span.extend_from_slice(pts.get(next));
        i = next;
    }
    span
}

fn assemble(pts: Points<'_>, knots: &[Knot]) -> CubicSpline {
    let mut spline = CubicSpline::new(pts.dims(), pts.is_cyclic());
    let Some(first) = knots.iter().position(|k| !k.removed) else {
        return spline;
    };
    let mut k = first;
    loop {
        let knot = &knots[k];
        let anchor = pts.get(k);
        let handle_l = if knot.prev.is_none() {
            mirror(anchor, &knot.handle_r)
        } else {
            knot.handle_l.clone()
        };
        let handle_r = if knot.next.is_none() {
            mirror(anchor, &knot.handle_l)
        } else {
            knot.handle_r.clone()
        };
        if knot.is_corner {
            spline.corner_index.push(spline.len());
        }
        spline.push_knot(&handle_l, anchor, &handle_r, k);
        match knot.next {
            Some(next) if next != first => k = next,
            _ => break,
        }
    }
    if !pts.is_cyclic() {
        spline.corner_index.insert(0, 0);
        spline.corner_index.push(spline.len() - 1);
        spline.corner_index.dedup();
    }
    spline
}
