//! Sequential RANSAC plane detector.
//!
//! Detects one plane at a time: sample three remaining points, score the
//! plane by its connected support (distance, normal agreement and spatial
//! connectivity), keep the best candidate, refit it by least squares and
//! remove its points. Stops when the best candidate has fewer than
//! `min_points` supporting points.

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::cluster::largest_cluster;
use super::{DetectedPlane, PointWithNormal, RegionDetection, RegionDetector};
use crate::config::RansacParams;
use crate::fit::PointAccumulator;

/// Default [`RegionDetector`] built from [`RansacParams`].
#[derive(Debug, Clone, Default)]
pub struct RansacPlaneDetector {
    params: RansacParams,
}

struct Candidate {
    normal: Vector3<f64>,
    offset: f64,
    support: Vec<usize>,
}

impl RansacPlaneDetector {
    pub fn new(params: RansacParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RansacParams {
        &self.params
    }

    /// Indices of `remaining` within `epsilon` of the plane whose normals agree
    /// with the plane normal up to sign.
    fn inliers(
        &self,
        points: &[PointWithNormal],
        remaining: &[usize],
        normal: &Vector3<f64>,
        offset: f64,
        cos_threshold: f64,
    ) -> Vec<usize> {
        remaining
            .iter()
            .copied()
            .filter(|&i| {
                let p = &points[i];
                (normal.dot(&p.point) - offset).abs() < self.params.epsilon
                    && normal.dot(&p.normal).abs() >= cos_threshold
            })
            .collect()
    }

    fn best_candidate(
        &self,
        points: &[PointWithNormal],
        remaining: &[usize],
        rng: &mut StdRng,
    ) -> Option<Candidate> {
        let n = remaining.len();
        if n < 3 {
            return None;
        }
        let cos_threshold = self.params.normal_threshold_degrees.to_radians().cos();
        let mut best: Option<Candidate> = None;
        let mut required = self.params.max_iterations;
        let mut trial = 0usize;

        while trial < required {
            trial += 1;
            let [a, b, c] = sample_three(rng, n);
            let Some((normal, offset)) = plane_through(
                &points[remaining[a]].point,
                &points[remaining[b]].point,
                &points[remaining[c]].point,
            ) else {
                continue;
            };

            let best_len = best.as_ref().map_or(0, |cand| cand.support.len());
            let inliers = self.inliers(points, remaining, &normal, offset, cos_threshold);
            if inliers.len() <= best_len {
                continue;
            }
            let support = largest_cluster(points, &inliers, self.params.cluster_epsilon);
            if support.len() <= best_len {
                continue;
            }

            let inlier_ratio = support.len() as f64 / n as f64;
            required = required_trials(self.params.probability, inlier_ratio)
                .min(self.params.max_iterations);
            tracing::trace!(
                "ransac trial {}: support {} of {}, {} trials required",
                trial,
                support.len(),
                n,
                required
            );
            best = Some(Candidate {
                normal,
                offset,
                support,
            });
        }
        best
    }
}

impl RegionDetector for RansacPlaneDetector {
    fn detect(&self, points: &[PointWithNormal], seed: u64) -> RegionDetection {
        let min_points = self.params.min_points.max(3);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut remaining: Vec<usize> = (0..points.len()).collect();
        let mut taken = vec![false; points.len()];
        let mut planes = Vec::new();

        while remaining.len() >= min_points {
            let Some(candidate) = self.best_candidate(points, &remaining, &mut rng) else {
                break;
            };
            if candidate.support.len() < min_points {
                break;
            }
            let plane = refit(points, candidate);
            for &i in &plane.indices {
                taken[i] = true;
            }
            remaining.retain(|&i| !taken[i]);
            planes.push(plane);
        }

        tracing::debug!(
            "ransac detected {} planes, {} of {} points unassigned",
            planes.len(),
            remaining.len(),
            points.len()
        );
        RegionDetection {
            planes,
            unassigned: remaining,
        }
    }
}

/// Least-squares plane over the candidate's support; keeps the sampled plane
/// if the support is degenerate.
fn refit(points: &[PointWithNormal], candidate: Candidate) -> DetectedPlane {
    let acc: PointAccumulator = candidate.support.iter().map(|&i| &points[i].point).collect();
    let fit = acc.fit();
    let (normal, offset) = match acc.mean() {
        Some(mean) if fit.is_defined() => (fit.normal, fit.normal.dot(&mean)),
        _ => (candidate.normal, candidate.offset),
    };
    DetectedPlane {
        indices: candidate.support,
        normal,
        offset,
    }
}

/// Plane through three points with upward unit normal, `None` if collinear.
fn plane_through(
    a: &Vector3<f64>,
    b: &Vector3<f64>,
    c: &Vector3<f64>,
) -> Option<(Vector3<f64>, f64)> {
    let mut normal = (b - a).cross(&(c - a));
    let norm = normal.norm();
    if norm < 1e-12 {
        return None;
    }
    normal /= norm;
    if normal.z < 0.0 {
        normal = -normal;
    }
    Some((normal, normal.dot(a)))
}

/// Trials needed to draw an all-inlier triple with failure probability
/// `probability` when a fraction `inlier_ratio` of points are inliers.
fn required_trials(probability: f64, inlier_ratio: f64) -> usize {
    let all_inliers = inlier_ratio.powi(3);
    if all_inliers >= 1.0 {
        return 1;
    }
    if all_inliers <= 0.0 {
        return usize::MAX;
    }
    let trials = probability.ln() / (1.0 - all_inliers).ln();
    if trials.is_finite() {
        trials.ceil().max(1.0) as usize
    } else {
        usize::MAX
    }
}

/// Three distinct indices from `0..n` (`n >= 3`).
fn sample_three(rng: &mut impl Rng, n: usize) -> [usize; 3] {
    debug_assert!(n >= 3);
    let a = rng.gen_range(0..n);
    let mut b = rng.gen_range(0..n - 1);
    if b >= a {
        b += 1;
    }
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    let mut c = rng.gen_range(0..n - 2);
    if c >= lo {
        c += 1;
    }
    if c >= hi {
        c += 1;
    }
    [a, b, c]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Roof with a ridge at y = 1.0: z = -slope * |y - 1|. Ridge points carry
    /// the left-side normal.
    fn roof_points(slope: f64) -> (Vec<PointWithNormal>, Vector3<f64>, Vector3<f64>) {
        let left_n = Vector3::new(0.0, -slope, 1.0).normalize();
        let right_n = Vector3::new(0.0, slope, 1.0).normalize();
        let mut points = Vec::new();
        for i in 0..20 {
            for j in 0..40 {
                let x = i as f64 * 0.05;
                let y = j as f64 * 0.05;
                let z = -slope * (y - 1.0).abs();
                let n = if j <= 20 { left_n } else { right_n };
                points.push(PointWithNormal::new(Vector3::new(x, y, z), n));
            }
        }
        (points, left_n, right_n)
    }

    fn assert_is_partition(detection: &RegionDetection, n: usize) {
        let mut seen = vec![0usize; n];
        for plane in &detection.planes {
            for &i in &plane.indices {
                seen[i] += 1;
            }
        }
        for &i in &detection.unassigned {
            seen[i] += 1;
        }
        assert!(seen.iter().all(|&c| c == 1), "every index exactly once");
    }

    #[test]
    fn single_plane_takes_all_points() {
        let mut points = Vec::new();
        for i in 0..15 {
            for j in 0..15 {
                let (x, y) = (i as f64 * 0.05, j as f64 * 0.05);
                points.push(PointWithNormal::new(
                    Vector3::new(x, y, 0.2 * x + 0.5),
                    Vector3::new(-0.2, 0.0, 1.0).normalize(),
                ));
            }
        }
        let detector = RansacPlaneDetector::default();
        let detection = detector.detect(&points, 7);
        assert_eq!(detection.planes.len(), 1);
        assert_eq!(detection.planes[0].indices.len(), points.len());
        assert!(detection.unassigned.is_empty());
        assert_abs_diff_eq!(
            detection.planes[0].normal,
            Vector3::new(-0.2, 0.0, 1.0).normalize(),
            epsilon = 1e-8
        );
    }

    #[test]
    fn roof_splits_into_two_planes() {
        let (points, left_n, right_n) = roof_points(0.3);
        let detector = RansacPlaneDetector::default();
        let detection = detector.detect(&points, crate::ransac::region_seed(0, 1));
        assert_is_partition(&detection, points.len());
        assert_eq!(detection.planes.len(), 2);
        assert!(detection.unassigned.is_empty());

        for plane in &detection.planes {
            let is_left = (plane.normal - left_n).norm() < 1e-6;
            let is_right = (plane.normal - right_n).norm() < 1e-6;
            assert!(is_left ^ is_right, "unexpected normal {:?}", plane.normal);
            let expected = if is_left { 20 * 21 } else { 20 * 19 };
            assert_eq!(plane.indices.len(), expected);
            assert!(plane.indices.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn same_seed_same_partition() {
        let (points, _, _) = roof_points(0.3);
        let detector = RansacPlaneDetector::default();
        let a = detector.detect(&points, 11);
        let b = detector.detect(&points, 11);
        assert_eq!(a, b);
    }

    #[test]
    fn scattered_outliers_stay_unassigned() {
        let (mut points, _, _) = roof_points(0.3);
        let n_inliers = points.len();
        for k in 0..10 {
            points.push(PointWithNormal::new(
                Vector3::new(k as f64, -3.0, 5.0),
                Vector3::x(),
            ));
        }
        let detection = RansacPlaneDetector::default().detect(&points, 3);
        assert_is_partition(&detection, points.len());
        let outliers: Vec<usize> = (n_inliers..points.len()).collect();
        assert_eq!(detection.unassigned, outliers);
    }

    #[test]
    fn too_few_points_are_all_unassigned() {
        let points: Vec<PointWithNormal> = (0..3)
            .map(|i| PointWithNormal::new(Vector3::new(i as f64, 0.0, 0.0), Vector3::z()))
            .collect();
        let detection = RansacPlaneDetector::default().detect(&points, 0);
        assert!(detection.planes.is_empty());
        assert_eq!(detection.unassigned, vec![0, 1, 2]);
    }

    #[test]
    fn sample_three_is_distinct() {
        let mut rng = StdRng::seed_from_u64(1);
        for n in 3..12 {
            for _ in 0..200 {
                let [a, b, c] = sample_three(&mut rng, n);
                assert!(a < n && b < n && c < n);
                assert!(a != b && b != c && a != c);
            }
        }
    }

    #[test]
    fn required_trials_shrinks_with_inlier_ratio() {
        assert_eq!(required_trials(0.01, 1.0), 1);
        assert_eq!(required_trials(0.01, 0.0), usize::MAX);
        let few = required_trials(0.01, 0.3);
        let many = required_trials(0.01, 0.8);
        assert!(many < few);
        // ln(0.01) / ln(1 - 0.512) = 6.42
        assert_eq!(many, 7);
    }

    #[test]
    fn collinear_triples_have_no_plane() {
        let a = Vector3::new(0.0, 0.0, 0.0);
        let b = Vector3::new(1.0, 1.0, 1.0);
        let c = Vector3::new(2.0, 2.0, 2.0);
        assert!(plane_through(&a, &b, &c).is_none());
        let (n, d) = plane_through(&a, &Vector3::x(), &Vector3::y()).unwrap();
        assert_eq!(n, Vector3::z());
        assert_eq!(d, 0.0);
    }
}
