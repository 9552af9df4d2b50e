//! Adaptive substep sampling.
//!
//! Fast cursor motion leaves gaps between input events. When a new
//! event lands farther than the maximum spacing from the previous
//! sample, intermediate samples are interpolated in window space and
//! each one is projected on its own, so depth follows the surface
//! instead of cutting straight through it.

use kurbo::Point;

use crate::project::Projector;
use crate::stroke::{StrokeSample, StrokeSequence};

/// Number of equal divisions between two samples `len_sq` apart
/// (squared window distance). At least 1; only the gaps at or above
/// `max_spacing` are divided.
pub fn substep_divisions(len_sq: f64, max_spacing: f64) -> usize {
    if len_sq < max_spacing * max_spacing {
        return 1;
    }
    // Rounded up so no division is longer than `max_spacing`.
    let divisions = (len_sq.sqrt().ceil() / max_spacing).ceil() as usize;
    divisions.max(1)
}

/// Record one input event, inserting substeps when enabled.
///
/// Returns the number of samples appended.
pub fn add_sample(
    projector: &Projector,
    stroke: &mut StrokeSequence,
    mval: Point,
    pressure: f64,
    use_substeps: bool,
    max_spacing: f64,
) -> usize {
    let mut sample = StrokeSample::new(mval, pressure);
    let fallback = stroke.prev.location_world_valid;
    let is_depth_found = projector.project_sample(&mut sample, &fallback);
    if is_depth_found {
        stroke.prev.location_world_valid = sample.location_world;
    }
    stroke.prev.location_world = sample.location_world;

    let len_sq = stroke.prev.mval.distance_squared(sample.mval);
    stroke.prev.mval = sample.mval;

    let mut added = 0;
    if use_substeps {
        if let Some(prev) = stroke.prev_sample().copied() {
            let divisions = substep_divisions(len_sq, max_spacing);
            for i in 1..divisions {
                let t = i as f64 / divisions as f64;
                let mut substep = StrokeSample::interpolate(&prev, &sample, t);
                let fallback = stroke.prev.location_world_valid;
                let is_depth_found_substep = projector.project_sample(&mut substep, &fallback);
                // Only refresh the fallback when the event itself missed.
                if !is_depth_found && is_depth_found_substep {
                    stroke.prev.location_world_valid = substep.location_world;
                }
                stroke.push(substep);
                added += 1;
            }
            if added > 0 {
                log::trace!("inserted {} substeps over {:.1}px", added, len_sq.sqrt());
            }
        }
    }

    stroke.prev.sample = Some(stroke.push(sample));
    added + 1
}
