//! planeseg: planar region extraction from elevation grids.
//!
//! Finds locally flat, walkable patches in a 2.5-D height map and describes
//! each one by a support point and an orientation. The pipeline stages are:
//!
//! 1. **Local normals** – least-squares plane over a sliding window per cell,
//!    thresholded on residual and inclination into a planarity mask.
//! 2. **Cleanup** – cross-shaped erosion of the mask.
//! 3. **Labelling** – 4- or 8-connected components of the mask.
//! 4. **Global fit** – one plane per region, tested against every member
//!    cell's position and local normal.
//! 5. **Refinement** – regions failing the global test are split by a seeded
//!    RANSAC detector and relabelled.
//!
//! # Public API
//! - [`SlidingWindowPlaneExtractor`] as the entry point
//! - [`HeightGrid`] for input, [`SegmentedPlanesMap`] for output
//! - [`PlaneExtractionConfig`] for tuning
//! - [`RegionDetector`] to plug in a different refinement strategy

mod config;
mod extractor;
mod fit;
mod grid;
mod orientation;
mod ransac;
mod result;
mod segmentation;
mod sliding_window;
#[cfg(test)]
mod test_utils;

pub use config::{ConfigError, Connectivity, ExtractorParams, PlaneExtractionConfig, RansacParams};
pub use extractor::SlidingWindowPlaneExtractor;
pub use fit::{
    angle_between_unit_vectors_deg, inclination_deg, normal_and_error_from_covariance, NormalFit,
    UNDEFINED_FIT_ERROR,
};
pub use grid::{GridError, HeightGrid, HeightGridFile};
pub use orientation::orientation_world_to_terrain;
pub use ransac::{
    region_seed, DetectedPlane, PointWithNormal, RansacPlaneDetector, RegionDetection,
    RegionDetector,
};
pub use result::{LabelImage, PlaneParameters, SegmentedPlanesMap};
pub use sliding_window::{is_locally_planar, normal_from_window, NormalField};
