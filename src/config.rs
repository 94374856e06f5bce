//! Tunable parameters for every pipeline stage.
//!
//! Everything here has a default, so a TOML file only needs to name the
//! values it overrides.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::LaneDetectionResult;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub thresholds: ThresholdConfig,
    pub roi: RoiConfig,
    pub extraction: ExtractionConfig,
    pub heading: HeadingConfig,
    pub calibration: CalibrationConfig,
}

impl DetectorConfig {
    /// Reads a TOML file. Missing sections and keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> LaneDetectionResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> LaneDetectionResult<Self> {
        Ok(toml::from_str(contents)?)
    }
}

/// Color bounds for the yellow and white candidate masks.
///
/// Yellow bounds are HSV in OpenCV ranges (H 0..180, S and V 0..255).
/// Grayscale bounds are plain intensities. Both ranges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    yellow_min: [u8; 3],
    yellow_max: [u8; 3],
    grayscale_min: u8,
    grayscale_max: u8,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            yellow_min: [20, 100, 100],
            yellow_max: [30, 255, 255],
            grayscale_min: 200,
            grayscale_max: 255,
        }
    }
}

impl ThresholdConfig {
    pub fn yellow_min(&self) -> [u8; 3] {
        self.yellow_min
    }

    pub fn set_yellow_min(&mut self, value: [u8; 3]) {
        self.yellow_min = value;
    }

    pub fn yellow_max(&self) -> [u8; 3] {
        self.yellow_max
    }

    pub fn set_yellow_max(&mut self, value: [u8; 3]) {
        self.yellow_max = value;
    }

    pub fn grayscale_min(&self) -> u8 {
        self.grayscale_min
    }

    pub fn set_grayscale_min(&mut self, value: u8) {
        self.grayscale_min = value;
    }

    pub fn grayscale_max(&self) -> u8 {
        self.grayscale_max
    }

    pub fn set_grayscale_max(&mut self, value: u8) {
        self.grayscale_max = value;
    }
}

/// Trapezoid vertices as `[x, y]` fractions of frame width and height,
/// in the order bottom-left, top-left, top-right, bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RoiConfig {
    pub bottom_left: [f64; 2],
    pub top_left: [f64; 2],
    pub top_right: [f64; 2],
    pub bottom_right: [f64; 2],
}

impl Default for RoiConfig {
    fn default() -> Self {
        Self {
            bottom_left: [0.10, 1.0],
            top_left: [0.42, 0.62],
            top_right: [0.58, 0.62],
            bottom_right: [0.90, 1.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Pixels a side needs before a fit is attempted.
    pub min_lane_pixels: usize,
    /// Smallest |dy/dx| of the line fit kept as a boundary. Stop lines,
    /// crosswalk bars and shadow edges fall below it.
    pub min_lane_slope: f64,
    /// Rows sampled between the bottom edge and the ROI horizon.
    pub reference_samples: usize,
    /// Line RMS residual (px) above which a quadratic is considered.
    pub curve_residual_px: f64,
    /// The quadratic wins only if its RMS is at most this share of the line's.
    pub curve_improvement_ratio: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_lane_pixels: 100,
            min_lane_slope: 0.3,
            reference_samples: 20,
            curve_residual_px: 2.0,
            curve_improvement_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct HeadingConfig {
    /// Row (fraction of height) where the lanes are evaluated.
    pub reference_row: f64,
    /// Assumed distance between the boundaries, as a fraction of width.
    pub nominal_lane_width: f64,
    /// Degrees produced by a full half-frame offset.
    pub gain_deg: f64,
    pub max_heading_deg: f64,
}

impl Default for HeadingConfig {
    fn default() -> Self {
        Self {
            reference_row: 0.95,
            nominal_lane_width: 0.55,
            gain_deg: 40.0,
            max_heading_deg: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub enabled: bool,
    /// 3x3 intrinsic matrix, row-major.
    pub camera_matrix: [[f64; 3]; 3],
    /// k1, k2, p1, p2, k3
    pub distortion: [f64; 5],
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            camera_matrix: [
                [1.15422732e+03, 0.0, 6.71627794e+02],
                [0.0, 1.14818221e+03, 3.86046312e+02],
                [0.0, 0.0, 1.0],
            ],
            distortion: [
                -2.42565104e-01,
                -4.77893070e-02,
                -1.31388084e-03,
                -8.79107779e-05,
                2.20573263e-02,
            ],
        }
    }
}
