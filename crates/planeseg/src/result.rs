use image::{ImageBuffer, Luma};
use nalgebra::{Rotation3, Vector2, Vector3};

use crate::orientation::orientation_world_to_terrain;

/// Region id per cell, `width = cols`, `height = rows`. 0 is background.
pub type LabelImage = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Support point and orientation of an accepted plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneParameters {
    /// Centroid of the plane's cells in world frame.
    pub position_in_world: Vector3<f64>,
    /// Rotation from world frame into the plane's terrain frame.
    pub orientation_world_to_terrain: Rotation3<f64>,
}

impl PlaneParameters {
    /// Build from a support point and a unit normal.
    pub fn from_support_and_normal(support: Vector3<f64>, normal: &Vector3<f64>) -> Self {
        Self {
            position_in_world: support,
            orientation_world_to_terrain: orientation_world_to_terrain(normal),
        }
    }

    /// Plane normal in world frame (terrain z-axis).
    pub fn surface_normal_in_world(&self) -> Vector3<f64> {
        self.orientation_world_to_terrain
            .matrix()
            .row(2)
            .transpose()
    }
}

/// Output of one extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentedPlanesMap {
    /// Cell size of the source grid.
    pub resolution: f64,
    /// World position of cell `(0, 0)`.
    pub map_origin: Vector2<f64>,
    pub labeled_image: LabelImage,
    /// Largest label id in use, including ids minted during refinement.
    pub highest_label: u32,
    /// Accepted planes in emission order; each label appears at most once.
    pub label_plane_parameters: Vec<(u32, PlaneParameters)>,
}

impl Default for SegmentedPlanesMap {
    fn default() -> Self {
        Self {
            resolution: 0.0,
            map_origin: Vector2::zeros(),
            labeled_image: LabelImage::new(0, 0),
            highest_label: 0,
            label_plane_parameters: Vec::new(),
        }
    }
}

impl SegmentedPlanesMap {
    /// Label of cell `(row, col)`, `None` out of range.
    pub fn label_at(&self, row: usize, col: usize) -> Option<u32> {
        let (w, h) = self.labeled_image.dimensions();
        if row >= h as usize || col >= w as usize {
            return None;
        }
        Some(self.labeled_image.get_pixel(col as u32, row as u32)[0])
    }

    /// Parameters of the plane with id `label`, if it was accepted.
    pub fn plane(&self, label: u32) -> Option<&PlaneParameters> {
        self.label_plane_parameters
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, p)| p)
    }

    /// Number of cells carrying `label`.
    pub fn cell_count(&self, label: u32) -> usize {
        self.labeled_image.pixels().filter(|p| p[0] == label).count()
    }

    pub(crate) fn set_label(&mut self, row: usize, col: usize, label: u32) {
        self.labeled_image
            .put_pixel(col as u32, row as u32, Luma([label]));
    }
}
