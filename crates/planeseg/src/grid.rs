//! Elevation grid consumed by the plane extractor.
//!
//! Cells are addressed as `(row, col)` and stored row-major. World positions
//! follow the elevation-map convention where `origin` is the position of cell
//! `(0, 0)` and indices grow towards negative x (rows) and negative y (cols):
//!
//! ```text
//! x = origin.x - row * resolution
//! y = origin.y - col * resolution
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors raised while building or querying a [`HeightGrid`].
#[derive(Debug, Clone, PartialEq)]
pub enum GridError {
    /// Grid has zero rows or zero columns.
    EmptyGrid {
        /// Requested number of rows.
        rows: usize,
        /// Requested number of columns.
        cols: usize,
    },
    /// Cell size must be finite and strictly positive.
    InvalidResolution(f64),
    /// Layer data length does not match `rows * cols`.
    LayerSizeMismatch {
        /// Layer name.
        layer: String,
        /// Expected number of cells.
        expected: usize,
        /// Provided number of cells.
        got: usize,
    },
    /// Requested layer is not present in the grid.
    MissingLayer(String),
}

impl std::fmt::Display for GridError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyGrid { rows, cols } => {
                write!(f, "grid must be non-empty, got {}x{}", rows, cols)
            }
            Self::InvalidResolution(r) => write!(f, "invalid grid resolution {}", r),
            Self::LayerSizeMismatch {
                layer,
                expected,
                got,
            } => write!(
                f,
                "layer '{}' has {} cells, expected {}",
                layer, got, expected
            ),
            Self::MissingLayer(name) => write!(f, "layer '{}' not found", name),
        }
    }
}

impl std::error::Error for GridError {}

// ── Grid ───────────────────────────────────────────────────────────────────

/// Regular 2-D raster of height layers.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightGrid {
    rows: usize,
    cols: usize,
    resolution: f64,
    origin: Vector2<f64>,
    layers: BTreeMap<String, Vec<f32>>,
}

impl HeightGrid {
    /// Create a grid without layers.
    pub fn new(
        rows: usize,
        cols: usize,
        resolution: f64,
        origin: [f64; 2],
    ) -> Result<Self, GridError> {
        if rows == 0 || cols == 0 {
            return Err(GridError::EmptyGrid { rows, cols });
        }
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(GridError::InvalidResolution(resolution));
        }
        Ok(Self {
            rows,
            cols,
            resolution,
            origin: Vector2::new(origin[0], origin[1]),
            layers: BTreeMap::new(),
        })
    }

    /// Create a grid holding a single layer.
    pub fn from_layer(
        rows: usize,
        cols: usize,
        resolution: f64,
        origin: [f64; 2],
        layer: impl Into<String>,
        data: Vec<f32>,
    ) -> Result<Self, GridError> {
        let mut grid = Self::new(rows, cols, resolution, origin)?;
        grid.add_layer(layer, data)?;
        Ok(grid)
    }

    /// Insert or replace a layer. `data` is row-major, `NaN` marks missing cells.
    pub fn add_layer(&mut self, name: impl Into<String>, data: Vec<f32>) -> Result<(), GridError> {
        let name = name.into();
        let expected = self.rows * self.cols;
        if data.len() != expected {
            return Err(GridError::LayerSizeMismatch {
                layer: name,
                expected,
                got: data.len(),
            });
        }
        self.layers.insert(name, data);
        Ok(())
    }

    /// Load a grid from a JSON file in the [`HeightGridFile`] format.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        let file: HeightGridFile = serde_json::from_str(&data)?;
        Ok(Self::try_from(file)?)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of cells (`rows * cols`).
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// Always `false`; construction rejects empty grids.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cell edge length in world units.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// World position of cell `(0, 0)`.
    pub fn origin(&self) -> Vector2<f64> {
        self.origin
    }

    /// Names of all layers, sorted.
    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    /// Row-major data of layer `name`.
    pub fn layer(&self, name: &str) -> Result<&[f32], GridError> {
        self.layers
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| GridError::MissingLayer(name.to_string()))
    }

    /// Height of one cell, `None` when the layer is missing or the cell is out of range.
    pub fn height(&self, layer: &str, row: usize, col: usize) -> Option<f32> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.layers
            .get(layer)
            .map(|data| data[self.linear_index(row, col)])
    }

    #[inline]
    pub fn linear_index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// World (x, y) of the center of cell `(row, col)`.
    #[inline]
    pub fn position_of(&self, row: usize, col: usize) -> Vector2<f64> {
        Vector2::new(
            self.origin.x - row as f64 * self.resolution,
            self.origin.y - col as f64 * self.resolution,
        )
    }

    /// Cell containing world position `position`, the exact inverse of
    /// [`Self::position_of`] at cell centers.
    pub fn index_of(&self, position: Vector2<f64>) -> Option<(usize, usize)> {
        let row = ((self.origin.x - position.x) / self.resolution).round();
        let col = ((self.origin.y - position.y) / self.resolution).round();
        // NaN fails both comparisons.
        if !(row >= 0.0 && col >= 0.0) || row >= self.rows as f64 || col >= self.cols as f64 {
            return None;
        }
        Some((row as usize, col as usize))
    }
}

// ── JSON interchange ───────────────────────────────────────────────────────

/// On-disk representation of a [`HeightGrid`]; `null` marks missing cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightGridFile {
    pub rows: usize,
    pub cols: usize,
    pub resolution: f64,
    /// World position `[x, y]` of cell `(0, 0)`.
    pub origin: [f64; 2],
    pub layers: BTreeMap<String, Vec<Option<f32>>>,
}

impl TryFrom<HeightGridFile> for HeightGrid {
    type Error = GridError;

    fn try_from(file: HeightGridFile) -> Result<Self, Self::Error> {
        let mut grid = HeightGrid::new(file.rows, file.cols, file.resolution, file.origin)?;
        for (name, cells) in file.layers {
            let data = cells.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect();
            grid.add_layer(name, data)?;
        }
        Ok(grid)
    }
}

impl From<&HeightGrid> for HeightGridFile {
    fn from(grid: &HeightGrid) -> Self {
        let layers = grid
            .layers
            .iter()
            .map(|(name, data)| {
                let cells = data
                    .iter()
                    .map(|&v| if v.is_finite() { Some(v) } else { None })
                    .collect();
                (name.clone(), cells)
            })
            .collect();
        Self {
            rows: grid.rows,
            cols: grid.cols,
            resolution: grid.resolution,
            origin: [grid.origin.x, grid.origin.y],
            layers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_index_roundtrip_every_cell() {
        let grid = HeightGrid::new(7, 11, 0.04, [1.3, -2.7]).unwrap();
        for row in 0..grid.rows() {
            for col in 0..grid.cols() {
                let p = grid.position_of(row, col);
                assert_eq!(grid.index_of(p), Some((row, col)), "cell ({row}, {col})");
            }
        }
    }

    #[test]
    fn index_of_tolerates_sub_cell_offsets() {
        let grid = HeightGrid::new(5, 5, 0.1, [0.0, 0.0]).unwrap();
        let p = grid.position_of(2, 3) + Vector2::new(0.049, -0.049);
        assert_eq!(grid.index_of(p), Some((2, 3)));
    }

    #[test]
    fn index_of_outside_grid_is_none() {
        let grid = HeightGrid::new(4, 4, 0.5, [0.0, 0.0]).unwrap();
        assert_eq!(grid.index_of(Vector2::new(1.0, 0.0)), None);
        assert_eq!(grid.index_of(Vector2::new(-2.0, 0.0)), None);
        assert_eq!(grid.index_of(Vector2::new(0.0, -1.75)), None);
        assert_eq!(grid.index_of(Vector2::new(f64::NAN, 0.0)), None);
    }

    #[test]
    fn rejects_malformed_grids() {
        assert_eq!(
            HeightGrid::new(0, 3, 0.1, [0.0, 0.0]),
            Err(GridError::EmptyGrid { rows: 0, cols: 3 })
        );
        assert!(matches!(
            HeightGrid::new(3, 3, 0.0, [0.0, 0.0]),
            Err(GridError::InvalidResolution(_))
        ));
        let err = HeightGrid::from_layer(2, 2, 0.1, [0.0, 0.0], "elevation", vec![0.0; 3])
            .unwrap_err();
        assert_eq!(
            err,
            GridError::LayerSizeMismatch {
                layer: "elevation".into(),
                expected: 4,
                got: 3
            }
        );
    }

    #[test]
    fn missing_layer_is_reported() {
        let grid = HeightGrid::from_layer(2, 2, 0.1, [0.0, 0.0], "elevation", vec![0.0; 4])
            .unwrap();
        assert_eq!(
            grid.layer("height"),
            Err(GridError::MissingLayer("height".into()))
        );
        assert_eq!(grid.height("elevation", 1, 1), Some(0.0));
        assert_eq!(grid.height("elevation", 2, 0), None);
    }

    #[test]
    fn json_nulls_become_missing_cells() {
        let json = r#"{
            "rows": 2, "cols": 2, "resolution": 0.1, "origin": [0.0, 0.0],
            "layers": { "elevation": [0.5, null, 1.0, 2.0] }
        }"#;
        let file: HeightGridFile = serde_json::from_str(json).unwrap();
        let grid = HeightGrid::try_from(file).unwrap();
        let data = grid.layer("elevation").unwrap();
        assert_eq!(data[0], 0.5);
        assert!(data[1].is_nan());

        let back = HeightGridFile::from(&grid);
        assert_eq!(back.layers["elevation"][1], None);
        assert_eq!(back.layers["elevation"][3], Some(2.0));
    }
}
