//! Extraction parameters.
//!
//! All structs deserialize with `#[serde(default)]`, so a JSON file only needs
//! the fields it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

// ── Error type ─────────────────────────────────────────────────────────────

/// Invalid parameter combination.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Kernel size must be odd and at least 3.
    InvalidKernelSize(usize),
    /// Erosion radius does not fit the structuring element.
    ErosionTooLarge(usize),
    /// A threshold that must be finite and strictly positive is not.
    NonPositive {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },
    /// RANSAC failure probability must lie in (0, 1).
    InvalidProbability(f64),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKernelSize(k) => {
                write!(f, "kernel size must be odd and >= 3, got {}", k)
            }
            Self::ErosionTooLarge(r) => write!(
                f,
                "planarity erosion {} exceeds maximum {}",
                r,
                ExtractorParams::MAX_EROSION
            ),
            Self::NonPositive { name, value } => {
                write!(f, "{} must be finite and > 0, got {}", name, value)
            }
            Self::InvalidProbability(p) => {
                write!(f, "RANSAC probability must be in (0, 1), got {}", p)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

fn require_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}

// ── Connectivity ───────────────────────────────────────────────────────────

/// Neighbourhood used for connected-component labelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// Edge neighbours only.
    #[default]
    Four,
    /// Edge and corner neighbours.
    Eight,
}

impl From<Connectivity> for imageproc::region_labelling::Connectivity {
    fn from(value: Connectivity) -> Self {
        match value {
            Connectivity::Four => Self::Four,
            Connectivity::Eight => Self::Eight,
        }
    }
}

// ── Sliding-window extractor ───────────────────────────────────────────────

/// Parameters of the sliding-window plane extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorParams {
    /// Side length (cells) of the square window used for local normals. Odd, >= 3.
    pub kernel_size: usize,
    /// Radius of the cross-shaped erosion applied to the planarity mask. 0 disables it.
    pub planarity_erosion: usize,
    /// Maximum angle (degrees) between a plane normal and the vertical.
    pub plane_inclination_threshold_degrees: f64,
    /// Maximum RMS residual of a local window fit.
    pub plane_patch_error_threshold: f64,
    /// Minimum number of cells for a region to produce a plane.
    pub min_number_points_per_label: usize,
    /// Connectivity of the region labelling.
    pub connectivity: Connectivity,
    /// Split regions that fail the global planarity test with RANSAC.
    pub include_ransac_refinement: bool,
    /// Maximum point-to-plane distance in the global planarity test.
    pub global_plane_fit_distance_error_threshold: f64,
    /// Maximum angle (degrees) between a cell normal and the region normal
    /// in the global planarity test.
    pub global_plane_fit_angle_error_threshold_degrees: f64,
}

impl Default for ExtractorParams {
    fn default() -> Self {
        Self {
            kernel_size: 3,
            planarity_erosion: 0,
            plane_inclination_threshold_degrees: 30.0,
            plane_patch_error_threshold: 0.02,
            min_number_points_per_label: 4,
            connectivity: Connectivity::Four,
            include_ransac_refinement: true,
            global_plane_fit_distance_error_threshold: 0.025,
            global_plane_fit_angle_error_threshold_degrees: 25.0,
        }
    }
}

impl ExtractorParams {
    /// Largest erosion radius whose structuring element fits an 8-bit center offset.
    pub const MAX_EROSION: usize = 255;

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kernel_size < 3 || self.kernel_size % 2 == 0 {
            return Err(ConfigError::InvalidKernelSize(self.kernel_size));
        }
        if self.planarity_erosion > Self::MAX_EROSION {
            return Err(ConfigError::ErosionTooLarge(self.planarity_erosion));
        }
        require_positive(
            "plane_inclination_threshold_degrees",
            self.plane_inclination_threshold_degrees,
        )?;
        require_positive("plane_patch_error_threshold", self.plane_patch_error_threshold)?;
        require_positive(
            "global_plane_fit_distance_error_threshold",
            self.global_plane_fit_distance_error_threshold,
        )?;
        require_positive(
            "global_plane_fit_angle_error_threshold_degrees",
            self.global_plane_fit_angle_error_threshold_degrees,
        )
    }

    /// Half-width of the sliding window.
    #[inline]
    pub fn kernel_half_width(&self) -> usize {
        (self.kernel_size - 1) / 2
    }
}

// ── RANSAC refinement ──────────────────────────────────────────────────────

/// Parameters of the RANSAC region detector used for refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Accepted probability of missing the largest remaining plane; drives the
    /// number of trials per detected plane.
    pub probability: f64,
    /// Minimum number of points supporting a detected plane.
    pub min_points: usize,
    /// Maximum point-to-plane distance of a supporting point.
    pub epsilon: f64,
    /// Maximum distance between neighbouring points of one connected plane.
    pub cluster_epsilon: f64,
    /// Maximum angle (degrees) between a point normal and the plane normal.
    pub normal_threshold_degrees: f64,
    /// Hard cap on trials per detected plane.
    pub max_iterations: usize,
    /// Base seed; combined with the region label for each refinement.
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            probability: 0.01,
            min_points: 4,
            epsilon: 0.025,
            cluster_epsilon: 0.08,
            normal_threshold_degrees: 25.0,
            max_iterations: 1000,
            seed: 0,
        }
    }
}

impl RansacParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.probability > 0.0 && self.probability < 1.0) {
            return Err(ConfigError::InvalidProbability(self.probability));
        }
        require_positive("epsilon", self.epsilon)?;
        require_positive("cluster_epsilon", self.cluster_epsilon)?;
        require_positive("normal_threshold_degrees", self.normal_threshold_degrees)
    }
}

// ── Top level ──────────────────────────────────────────────────────────────

/// Complete configuration of one extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaneExtractionConfig {
    pub extractor: ExtractorParams,
    pub ransac: RansacParams,
}

impl PlaneExtractionConfig {
    /// Load a configuration from JSON and validate it.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.extractor.validate()?;
        self.ransac.validate()
    }
}
