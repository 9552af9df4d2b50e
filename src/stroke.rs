//! Recorded stroke samples.

use kurbo::Point;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::geom::{lerp, ObjectTransform};

/// One input point along a drawn stroke.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeSample {
    /// Window position.
    pub mval: Point,
    pub location_world: Point3<f64>,
    pub location_local: Point3<f64>,
    /// Surface normal, zero when unknown.
    pub normal_world: Vector3<f64>,
    pub normal_local: Vector3<f64>,
    /// Normalized pressure in [0, 1].
    pub pressure: f64,
}

impl StrokeSample {
    /// A sample with only its window position and pressure set.
    /// Positions are resolved by the projector.
    pub fn new(mval: Point, pressure: f64) -> Self {
        Self {
            mval,
            location_world: Point3::origin(),
            location_local: Point3::origin(),
            normal_world: Vector3::zeros(),
            normal_local: Vector3::zeros(),
            pressure,
        }
    }

    /// Linear blend of window position, positions and pressure.
    /// Normals are left zero; re-projection fills them in.
    pub fn interpolate(a: &StrokeSample, b: &StrokeSample, t: f64) -> Self {
        Self {
            mval: a.mval.lerp(b.mval, t),
            location_world: a.location_world + (b.location_world - a.location_world) * t,
            location_local: a.location_local + (b.location_local - a.location_local) * t,
            normal_world: Vector3::zeros(),
            normal_local: Vector3::zeros(),
            pressure: lerp(a.pressure, b.pressure, t),
        }
    }
}

/// Back-references to the previous input, used for spacing and depth fallback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrevCache {
    pub mval: Point,
    /// Last resolved world position, whether or not depth was found.
    pub location_world: Point3<f64>,
    /// Last world position that came from a genuine projection hit.
    pub location_world_valid: Point3<f64>,
    /// Index of the last committed sample.
    pub sample: Option<usize>,
}

/// Ordered, append-only list of samples for one stroke.
#[derive(Debug, Clone)]
pub struct StrokeSequence {
    samples: Vec<StrokeSample>,
    pub prev: PrevCache,
}

impl StrokeSequence {
    /// Start an empty stroke with `fallback` as the initial depth reference.
    pub fn new(fallback: Point3<f64>) -> Self {
        Self {
            samples: Vec::with_capacity(512),
            prev: PrevCache {
                mval: Point::ZERO,
                location_world: fallback,
                location_world_valid: fallback,
                sample: None,
            },
        }
    }

    pub fn push(&mut self, sample: StrokeSample) -> usize {
        self.samples.push(sample);
        self.samples.len() - 1
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[StrokeSample] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [StrokeSample] {
        &mut self.samples
    }

    /// The previous committed sample, if any.
    pub fn prev_sample(&self) -> Option<&StrokeSample> {
        self.prev.sample.and_then(|i| self.samples.get(i))
    }

    /// Total window-space length.
    pub fn length_2d(&self) -> f64 {
        self.samples
            .windows(2)
            .map(|w| w[0].mval.distance(w[1].mval))
            .sum()
    }

    /// Total object-space length.
    pub fn length_3d(&self) -> f64 {
        self.samples
            .windows(2)
            .map(|w| (w[1].location_local - w[0].location_local).norm())
            .sum()
    }

    /// Cumulative object-space length at each sample (first is 0).
    pub fn cumulative_lengths(&self) -> Vec<f64> {
        let mut lengths = Vec::with_capacity(self.samples.len());
        let mut total = 0.0;
        for (i, sample) in self.samples.iter().enumerate() {
            if i > 0 {
                total += (sample.location_local - self.samples[i - 1].location_local).norm();
            }
            lengths.push(total);
        }
        lengths
    }

    /// Export the stroke for replay.
    pub fn to_records(&self) -> Vec<StrokeRecord> {
        self.samples
            .iter()
            .map(|s| StrokeRecord {
                mouse: [s.mval.x, s.mval.y],
                location: [s.location_world.x, s.location_world.y, s.location_world.z],
                pressure: s.pressure,
            })
            .collect()
    }

    /// Rebuild a stroke from records. Local positions are recomputed
    /// from the stored world positions; normals are unknown.
    pub fn from_records(records: &[StrokeRecord], transform: &ObjectTransform) -> Self {
        let mut stroke = Self::new(Point3::origin());
        for record in records {
            let mut sample = StrokeSample::new(Point::new(record.mouse[0], record.mouse[1]), record.pressure);
            sample.location_world = Point3::from(record.location);
            sample.location_local = transform.to_local(&sample.location_world);
            let index = stroke.push(sample);
            stroke.prev.sample = Some(index);
        }
        stroke
    }
}

/// A stored stroke element: window position, world location, pressure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeRecord {
    pub mouse: [f64; 2],
    pub location: [f64; 3],
    pub pressure: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix4, Vector3};

    fn sample_at(x: f64, local: [f64; 3]) -> StrokeSample {
        let mut sample = StrokeSample::new(Point::new(x, 0.0), 1.0);
        sample.location_local = Point3::from(local);
        sample.location_world = sample.location_local;
        sample
    }

    #[test]
    fn interpolation_blends_pressure_and_position() {
        let mut a = StrokeSample::new(Point::new(0.0, 0.0), 0.0);
        a.normal_world = Vector3::z();
        let b = StrokeSample::new(Point::new(10.0, 4.0), 1.0);
        let mid = StrokeSample::interpolate(&a, &b, 0.25);
        assert_eq!(mid.mval, Point::new(2.5, 1.0));
        assert_relative_eq!(mid.pressure, 0.25);
        assert_eq!(mid.normal_world, Vector3::zeros());
    }

    #[test]
    fn cumulative_lengths_accumulate() {
        let mut stroke = StrokeSequence::new(Point3::origin());
        stroke.push(sample_at(0.0, [0.0, 0.0, 0.0]));
        stroke.push(sample_at(1.0, [3.0, 4.0, 0.0]));
        stroke.push(sample_at(2.0, [3.0, 4.0, 2.0]));
        assert_eq!(stroke.cumulative_lengths(), vec![0.0, 5.0, 7.0]);
        assert_relative_eq!(stroke.length_3d(), 7.0);
        assert_relative_eq!(stroke.length_2d(), 2.0);
    }

    #[test]
    fn records_recompute_local_positions() {
        let transform =
            ObjectTransform::new(Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0))).unwrap();
        let records = [StrokeRecord {
            mouse: [5.0, 6.0],
            location: [1.0, 2.0, 4.0],
            pressure: 0.5,
        }];
        let stroke = StrokeSequence::from_records(&records, &transform);
        assert_eq!(stroke.len(), 1);
        assert_relative_eq!(stroke.samples()[0].location_local, Point3::new(0.0, 0.0, 1.0));
        assert_eq!(stroke.to_records(), records.to_vec());
    }
}
