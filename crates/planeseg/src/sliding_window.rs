//! Per-cell local normals and the planarity mask.
//!
//! A square window of `kernel_size` cells is centered on every interior cell
//! (cells whose full window lies inside the grid). Border cells are never
//! visited and stay non-planar.

use image::{GrayImage, Luma};
use nalgebra::Vector3;

use crate::config::ExtractorParams;
use crate::fit::{inclination_deg, NormalFit, PointAccumulator};
use crate::grid::HeightGrid;

/// Mask value of a locally planar cell.
pub(crate) const PLANAR: u8 = 255;

/// Fit a plane to one `kernel_size x kernel_size` window of heights (row-major).
///
/// Horizontal coordinates are window-local; only the covariance matters.
/// Non-finite heights are skipped; fewer than three finite samples give
/// [`NormalFit::undefined`].
pub fn normal_from_window(window: &[f32], kernel_size: usize, resolution: f64) -> NormalFit {
    debug_assert_eq!(window.len(), kernel_size * kernel_size);
    let mut acc = PointAccumulator::default();
    for (i, &height) in window.iter().enumerate() {
        if !height.is_finite() {
            continue;
        }
        let kr = (i / kernel_size) as f64;
        let kc = (i % kernel_size) as f64;
        acc.add(&Vector3::new(
            -kr * resolution,
            -kc * resolution,
            height as f64,
        ));
    }
    acc.fit()
}

/// Local planarity test: small residual and small inclination.
pub fn is_locally_planar(fit: &NormalFit, params: &ExtractorParams) -> bool {
    fit.rms_error < params.plane_patch_error_threshold
        && inclination_deg(&fit.normal) < params.plane_inclination_threshold_degrees
}

/// Per-cell normals of the most recent extraction.
///
/// Storage grows to the largest grid seen and is never shrunk; validity is
/// tracked separately and cleared on every reset, so stale normals from a
/// previous grid are never reported.
#[derive(Debug, Clone, Default)]
pub struct NormalField {
    normals: Vec<Vector3<f64>>,
    valid: Vec<bool>,
}

impl NormalField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare for a grid of `len` cells.
    pub(crate) fn reset(&mut self, len: usize) {
        if self.normals.len() < len {
            self.normals.resize(len, Vector3::z());
        }
        self.valid.clear();
        self.valid.resize(len, false);
    }

    #[inline]
    pub(crate) fn set(&mut self, index: usize, normal: Vector3<f64>) {
        self.normals[index] = normal;
        self.valid[index] = true;
    }

    /// Normal of cell `index` if it was estimated in the current extraction.
    #[inline]
    pub fn get(&self, index: usize) -> Option<Vector3<f64>> {
        match self.valid.get(index) {
            Some(true) => Some(self.normals[index]),
            _ => None,
        }
    }

    /// Number of cells of the current grid.
    pub fn len(&self) -> usize {
        self.valid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }

    /// Allocated cells, at least [`Self::len`].
    pub fn capacity(&self) -> usize {
        self.normals.len()
    }
}

/// Run the local estimator over all interior cells.
///
/// Stores each estimated normal in `normals` and returns the (uneroded)
/// planarity mask, `width = cols`, `height = rows`.
pub(crate) fn build_planarity_mask(
    grid: &HeightGrid,
    heights: &[f32],
    params: &ExtractorParams,
    normals: &mut NormalField,
) -> GrayImage {
    let (rows, cols) = (grid.rows(), grid.cols());
    let mut mask = GrayImage::new(cols as u32, rows as u32);
    let k = params.kernel_size;
    let half = params.kernel_half_width();
    if rows < k || cols < k {
        return mask;
    }

    let resolution = grid.resolution();
    let mut window = vec![0.0f32; k * k];
    for row in half..rows - half {
        for col in half..cols - half {
            let index = grid.linear_index(row, col);
            if !heights[index].is_finite() {
                continue;
            }
            for kr in 0..k {
                let start = grid.linear_index(row - half + kr, col - half);
                window[kr * k..(kr + 1) * k].copy_from_slice(&heights[start..start + k]);
            }
            let fit = normal_from_window(&window, k, resolution);
            normals.set(index, fit.normal);
            if is_locally_planar(&fit, params) {
                mask.put_pixel(col as u32, row as u32, Luma([PLANAR]));
            }
        }
    }
    mask
}
