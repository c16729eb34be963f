//! Least-squares plane fitting from first and second moments.
//!
//! Points are accumulated as a running sum and sum of outer products; the
//! normal is the eigenvector of the smallest covariance eigenvalue and the
//! RMS residual is the square root of that eigenvalue.

use nalgebra::{Matrix3, SymmetricEigen, Vector3};

/// Error reported when a fit is undefined (too few or rank-deficient points).
pub const UNDEFINED_FIT_ERROR: f64 = 1e30;

/// Second-smallest eigenvalue at or below this marks a degenerate neighbourhood.
const DEGENERATE_EIGENVALUE: f64 = 1e-8;

/// Unit normal and RMS residual of a plane fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalFit {
    /// Unit normal with non-negative z component.
    pub normal: Vector3<f64>,
    /// RMS point-to-plane distance.
    pub rms_error: f64,
}

impl NormalFit {
    /// Sentinel for fits that cannot be computed: vertical normal, huge error.
    pub fn undefined() -> Self {
        Self {
            normal: Vector3::z(),
            rms_error: UNDEFINED_FIT_ERROR,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.rms_error < UNDEFINED_FIT_ERROR
    }
}

/// Plane fit from point count, mean and sum of outer products.
///
/// Returns [`NormalFit::undefined`] when the second-smallest eigenvalue of the
/// covariance is not positive, i.e. the points are collinear or coincident.
pub fn normal_and_error_from_covariance(
    num_points: usize,
    mean: &Vector3<f64>,
    sum_squared: &Matrix3<f64>,
) -> NormalFit {
    if num_points == 0 {
        return NormalFit::undefined();
    }
    let covariance = sum_squared / num_points as f64 - mean * mean.transpose();
    let eig = SymmetricEigen::new(covariance);

    // nalgebra does not sort eigenvalues.
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]));
    let [smallest, second, _] = order;

    let second_value = eig.eigenvalues[second];
    if !(second_value > DEGENERATE_EIGENVALUE) {
        return NormalFit::undefined();
    }

    let mut normal: Vector3<f64> = eig.eigenvectors.column(smallest).into_owned();
    normal.normalize_mut();
    if normal.z < 0.0 {
        normal = -normal;
    }
    // Slightly negative values are floating-point noise.
    let smallest_value = eig.eigenvalues[smallest];
    let rms_error = if smallest_value > 0.0 {
        smallest_value.sqrt()
    } else {
        0.0
    };
    NormalFit { normal, rms_error }
}

/// Angle in degrees between two unit vectors.
#[inline]
pub fn angle_between_unit_vectors_deg(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    a.dot(b).clamp(-1.0, 1.0).acos().to_degrees().abs()
}

/// Angle in degrees between a unit normal and the vertical.
#[inline]
pub fn inclination_deg(normal: &Vector3<f64>) -> f64 {
    angle_between_unit_vectors_deg(normal, &Vector3::z())
}

/// Running first and second moments of a 3-D point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PointAccumulator {
    count: usize,
    sum: Vector3<f64>,
    sum_squared: Matrix3<f64>,
}

impl Default for PointAccumulator {
    fn default() -> Self {
        Self {
            count: 0,
            sum: Vector3::zeros(),
            sum_squared: Matrix3::zeros(),
        }
    }
}

impl PointAccumulator {
    #[inline]
    pub(crate) fn add(&mut self, point: &Vector3<f64>) {
        self.count += 1;
        self.sum += point;
        self.sum_squared += point * point.transpose();
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    /// Centroid, `None` when empty.
    pub(crate) fn mean(&self) -> Option<Vector3<f64>> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    /// Plane fit over the accumulated points; undefined below three points.
    pub(crate) fn fit(&self) -> NormalFit {
        match self.mean() {
            Some(mean) if self.count >= 3 => {
                normal_and_error_from_covariance(self.count, &mean, &self.sum_squared)
            }
            _ => NormalFit::undefined(),
        }
    }
}

impl<'a> FromIterator<&'a Vector3<f64>> for PointAccumulator {
    fn from_iter<T: IntoIterator<Item = &'a Vector3<f64>>>(iter: T) -> Self {
        let mut acc = Self::default();
        for p in iter {
            acc.add(p);
        }
        acc
    }
}
