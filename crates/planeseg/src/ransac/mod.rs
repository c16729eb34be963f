//! Region detection: partition a point set into planar sub-regions.
//!
//! The extractor talks to this module only through [`RegionDetector`]; the
//! default implementation is [`RansacPlaneDetector`]. Randomness is seeded per
//! call, so a partition is a pure function of the points, the parameters and
//! the seed.

mod cluster;
mod detector;

use nalgebra::Vector3;

pub use detector::RansacPlaneDetector;

/// A world-frame point with its locally estimated unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointWithNormal {
    pub point: Vector3<f64>,
    pub normal: Vector3<f64>,
}

impl PointWithNormal {
    pub fn new(point: Vector3<f64>, normal: Vector3<f64>) -> Self {
        Self { point, normal }
    }
}

/// One detected plane.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedPlane {
    /// Indices into the input point list, ascending.
    pub indices: Vec<usize>,
    /// Unit normal of the fitted plane (`normal . p = offset`).
    pub normal: Vector3<f64>,
    pub offset: f64,
}

/// Result of a detection: planes in detection order plus leftover points.
///
/// Every input index appears exactly once, either in one plane or in
/// `unassigned`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionDetection {
    pub planes: Vec<DetectedPlane>,
    pub unassigned: Vec<usize>,
}

/// Randomized plane detection over a point set.
pub trait RegionDetector {
    /// Partition `points` into planes. Identical inputs and seed must give an
    /// identical partition.
    fn detect(&self, points: &[PointWithNormal], seed: u64) -> RegionDetection;
}

/// Seed for refining region `label`, mixing `base_seed` with the label
/// (SplitMix64 finalizer).
pub fn region_seed(base_seed: u64, label: u32) -> u64 {
    let mut z = base_seed.wrapping_add((label as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
