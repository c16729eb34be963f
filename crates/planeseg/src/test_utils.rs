//! Synthetic elevation grids for unit tests.

use nalgebra::Vector3;

use crate::grid::HeightGrid;

/// Layer name used by all synthetic grids.
pub(crate) const LAYER: &str = "elevation";

/// Build a grid whose `elevation` layer is `height(x, y)` at every cell center.
pub(crate) fn grid_from_fn(
    rows: usize,
    cols: usize,
    resolution: f64,
    origin: [f64; 2],
    height: impl Fn(f64, f64) -> f32,
) -> HeightGrid {
    let mut grid = HeightGrid::new(rows, cols, resolution, origin).expect("valid grid");
    let mut data = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            let p = grid.position_of(row, col);
            data.push(height(p.x, p.y));
        }
    }
    grid.add_layer(LAYER, data).expect("layer size");
    grid
}

/// Plane `z = a x + b y + c`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SyntheticPlane {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl SyntheticPlane {
    pub(crate) fn height(&self, x: f64, y: f64) -> f64 {
        self.a * x + self.b * y + self.c
    }

    /// Upward unit normal.
    pub(crate) fn normal(&self) -> Vector3<f64> {
        Vector3::new(-self.a, -self.b, 1.0).normalize()
    }
}

/// Two tilted patches on a 24 x 30 grid, split by a band of missing cells in
/// columns 14..16. Columns 0..14 follow `left`, columns 16..30 follow `right`.
pub(crate) fn two_patch_grid(left: SyntheticPlane, right: SyntheticPlane) -> HeightGrid {
    let resolution = 0.05;
    let origin = [1.0, 2.0];
    let mut grid = HeightGrid::new(24, 30, resolution, origin).expect("valid grid");
    let mut data = Vec::with_capacity(grid.len());
    for row in 0..grid.rows() {
        for col in 0..grid.cols() {
            let p = grid.position_of(row, col);
            let h = match col {
                0..=13 => left.height(p.x, p.y) as f32,
                14..=15 => f32::NAN,
                _ => right.height(p.x, p.y) as f32,
            };
            data.push(h);
        }
    }
    grid.add_layer(LAYER, data).expect("layer size");
    grid
}

/// Roof with a ridge along the middle column: height falls off with `slope`
/// on both sides. Locally planar almost everywhere, globally not planar.
pub(crate) fn ridge_grid(rows: usize, cols: usize, resolution: f64, slope: f64) -> HeightGrid {
    let ridge_col = (cols / 2) as f64;
    let origin = [0.0, 0.0];
    grid_from_fn(rows, cols, resolution, origin, |_, y| {
        // y = -col * resolution
        let col = -y / resolution;
        (-slope * (col - ridge_col).abs() * resolution) as f32
    })
}

/// Mean world position of the cells in `rows x cols` ranges evaluated on `plane`.
pub(crate) fn expected_centroid(
    grid: &HeightGrid,
    rows: std::ops::Range<usize>,
    cols: std::ops::Range<usize>,
    plane: SyntheticPlane,
) -> Vector3<f64> {
    let mut sum = Vector3::zeros();
    let mut n = 0usize;
    for row in rows {
        for col in cols.clone() {
            let p = grid.position_of(row, col);
            sum += Vector3::new(p.x, p.y, plane.height(p.x, p.y) as f32 as f64);
            n += 1;
        }
    }
    sum / n as f64
}
