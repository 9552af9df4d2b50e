//! Radius taper along the stroke's 3D arc length.

use crate::geom::ObjectTransform;
use crate::radius::RadiusResolver;
use crate::stroke::StrokeSequence;

/// Scale pressure down toward the stroke ends.
///
/// `start` and `end` are fractions of the total object-space length
/// (0 = off). Lengths are measured once, before either pass. Edits go
/// through the radius resolver so surface offsets follow.
pub fn apply(
    stroke: &mut StrokeSequence,
    start: f64,
    end: f64,
    radius: &RadiusResolver,
    transform: &ObjectTransform,
) {
    if stroke.is_empty() || (start == 0.0 && end == 0.0) {
        return;
    }
    let lengths = stroke.cumulative_lengths();
    let total = lengths.last().copied().unwrap_or(0.0);
    let samples = stroke.samples_mut();
    let n = samples.len();

    if start != 0.0 {
        let len_taper_max = start * total;
        let mut i = 0;
        while i < n && lengths[i] < len_taper_max {
            let pressure = samples[i].pressure * (lengths[i] / len_taper_max);
            radius.set_pressure(&mut samples[i], pressure, transform);
            i += 1;
        }
    }

    if end != 0.0 {
        let len_taper_max = end * total;
        let len_taper_min = total - len_taper_max;
        let mut i = n - 1;
        while i > 0 && lengths[i] > len_taper_min {
            let pressure = samples[i].pressure * ((total - lengths[i]) / len_taper_max);
            radius.set_pressure(&mut samples[i], pressure, transform);
            i -= 1;
        }
    }
}
