//! Sliding-window plane extraction.
//!
//! Stages, in call order:
//! 1. local normals over a sliding window -> planarity mask (`sliding_window`)
//! 2. cross-shaped erosion of the mask (`segmentation`)
//! 3. connected-component labelling (`segmentation`)
//! 4. per-label global plane fit and planarity test (`global_fit`)
//! 5. RANSAC split and relabelling of labels that fail the test (`refine`)
//!
//! The extractor owns its working buffers and reuses them across calls; each
//! call re-derives validity for the current grid only.

mod global_fit;
mod refine;

use image::GrayImage;

use crate::config::{ConfigError, PlaneExtractionConfig};
use crate::grid::{GridError, HeightGrid};
use crate::ransac::{PointWithNormal, RansacPlaneDetector, RegionDetector};
use crate::result::SegmentedPlanesMap;
use crate::segmentation::{erode_cross, label_regions};
use crate::sliding_window::{build_planarity_mask, NormalField};

/// Extracts planar regions from an elevation grid.
///
/// Create once, run on many grids. Not shareable between concurrent calls;
/// separate instances are independent.
pub struct SlidingWindowPlaneExtractor {
    config: PlaneExtractionConfig,
    detector: Box<dyn RegionDetector>,
    surface_normals: NormalField,
    binary_mask: GrayImage,
    segmented_planes_map: SegmentedPlanesMap,
    /// Work vector reused between labels.
    points_with_normal: Vec<PointWithNormal>,
}

impl SlidingWindowPlaneExtractor {
    /// Create an extractor refining with [`RansacPlaneDetector`].
    pub fn new(config: PlaneExtractionConfig) -> Result<Self, ConfigError> {
        let detector = RansacPlaneDetector::new(config.ransac.clone());
        Self::with_detector(config, Box::new(detector))
    }

    /// Create an extractor with a custom region detector.
    pub fn with_detector(
        config: PlaneExtractionConfig,
        detector: Box<dyn RegionDetector>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            detector,
            surface_normals: NormalField::new(),
            binary_mask: GrayImage::new(0, 0),
            segmented_planes_map: SegmentedPlanesMap::default(),
            points_with_normal: Vec::new(),
        })
    }

    pub fn config(&self) -> &PlaneExtractionConfig {
        &self.config
    }

    /// Run the full pipeline on layer `layer` of `grid`.
    ///
    /// The only error is a missing layer; numerically degenerate cells and
    /// regions are filtered out rather than reported.
    pub fn run_extraction(
        &mut self,
        grid: &HeightGrid,
        layer: &str,
    ) -> Result<&SegmentedPlanesMap, GridError> {
        let heights = grid.layer(layer)?;
        let params = &self.config.extractor;

        self.surface_normals.reset(grid.len());
        self.binary_mask =
            build_planarity_mask(grid, heights, params, &mut self.surface_normals);
        if params.planarity_erosion > 0 {
            self.binary_mask = erode_cross(&self.binary_mask, params.planarity_erosion);
        }

        let (labeled_image, highest_label) = label_regions(&self.binary_mask, params.connectivity);
        tracing::debug!(
            "{} candidate regions on {}x{} grid",
            highest_label,
            grid.rows(),
            grid.cols()
        );
        self.segmented_planes_map = SegmentedPlanesMap {
            resolution: grid.resolution(),
            map_origin: grid.origin(),
            labeled_image,
            highest_label,
            label_plane_parameters: Vec::new(),
        };

        self.extract_plane_parameters_from_labeled_image(grid, heights);

        tracing::info!(
            "{} planes extracted from {} regions (highest label {})",
            self.segmented_planes_map.label_plane_parameters.len(),
            highest_label,
            self.segmented_planes_map.highest_label
        );
        Ok(&self.segmented_planes_map)
    }

    /// Result of the most recent extraction.
    pub fn segmented_planes_map(&self) -> &SegmentedPlanesMap {
        &self.segmented_planes_map
    }

    /// Planarity mask of the most recent extraction, after erosion.
    pub fn binary_mask(&self) -> &GrayImage {
        &self.binary_mask
    }

    /// Local normals of the most recent extraction.
    pub fn surface_normals(&self) -> &NormalField {
        &self.surface_normals
    }
}
