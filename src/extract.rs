//! Splits candidate pixels into left/right groups and fits one boundary
//! per side.

use opencv::{
    core::{self, Mat},
    prelude::*,
};
use tracing::debug;

use crate::config::ExtractionConfig;
use crate::error::{LaneDetectionResult, LaneError};
use crate::lane::{Lane, MarkingColor};
use crate::polyfit::{fit_line, fit_quadratic, PolyFit};
use crate::roi::RegionOfInterest;

/// Fitting mode requested by the caller for one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMode {
    /// Lines only.
    #[default]
    Straight,
    /// Lines, upgraded to a quadratic when the line explains the pixels poorly.
    Curved,
}

impl FitMode {
    /// Integer curve flag: `0` is straight, anything else allows curves.
    pub fn from_flag(flag: i32) -> Self {
        if flag == 0 {
            FitMode::Straight
        } else {
            FitMode::Curved
        }
    }
}

/// Candidate pixels for one side of the frame.
#[derive(Default)]
struct SidePixels {
    xs: Vec<f64>,
    ys: Vec<f64>,
    yellow: usize,
}

pub struct LaneExtractor {
    config: ExtractionConfig,
    roi: RegionOfInterest,
}

impl LaneExtractor {
    /// # Arguments
    /// * `config` - pixel count, slope and curve thresholds
    /// * `roi` - region whose top row bounds the reference samples
    pub fn new(config: ExtractionConfig, roi: RegionOfInterest) -> Self {
        Self { config, roi }
    }

    /// Fits the left and right boundaries from ROI-restricted masks.
    ///
    /// A side without enough pixels, or whose fit is degenerate, comes back
    /// as an invalid [`Lane`]; that is not an error. Errors are reserved for
    /// masks that cannot be read at all.
    pub fn extract(&self, yellow: &Mat, white: &Mat, mode: FitMode) -> LaneDetectionResult<(Lane, Lane)> {
        let size = yellow.size()?;
        let other = white.size()?;
        if size != other {
            return Err(LaneError::MaskSizeMismatch {
                left_w: size.width,
                left_h: size.height,
                right_w: other.width,
                right_h: other.height,
            });
        }
        if yellow.empty() || size.width == 0 || size.height == 0 {
            return Err(LaneError::EmptyFrame);
        }

        let mut combined = Mat::default();
        core::bitwise_or(yellow, white, &mut combined, &Mat::default())?;

        let combined_rows = nonzero_points_by_row(&combined)?;
        let yellow_rows = nonzero_points_by_row(yellow)?;

        let midline = size.width / 2;
        let mut left = SidePixels::default();
        let mut right = SidePixels::default();

        for (y, row) in combined_rows.iter().enumerate() {
            let yellow_row = &yellow_rows[y];
            for &x in row {
                let side = if x < midline { &mut left } else { &mut right };
                side.xs.push(x as f64);
                side.ys.push(y as f64);
                if yellow_row.binary_search(&x).is_ok() {
                    side.yellow += 1;
                }
            }
        }

        let rows = self.reference_rows(size.height);
        let left_lane = self.fit_side("left", &left, mode, &rows);
        let right_lane = self.fit_side("right", &right, mode, &rows);
        Ok((left_lane, right_lane))
    }

    /// Evenly spaced rows from the bottom edge up to the ROI horizon.
    fn reference_rows(&self, height: i32) -> Vec<f64> {
        let bottom = (height - 1) as f64;
        let top = self.roi.horizon_row(height);
        let n = self.config.reference_samples.max(2);
        let step = (bottom - top) / (n - 1) as f64;
        (0..n).map(|i| bottom - step * i as f64).collect()
    }

    /// Fits one side. Too few pixels, a degenerate or near-horizontal line,
    /// or a fit that never reaches the reference rows all give
    /// [`Lane::invalid`].
    fn fit_side(&self, name: &str, side: &SidePixels, mode: FitMode, rows: &[f64]) -> Lane {
        let count = side.xs.len();
        if count < self.config.min_lane_pixels.max(2) {
            debug!(side = name, pixels = count, "too few lane pixels");
            return Lane::invalid();
        }

        let Some(line) = fit_line(&side.xs, &side.ys) else {
            debug!(side = name, pixels = count, "degenerate line fit");
            return Lane::invalid();
        };
        let slope = line.coefficients[0];
        if slope.abs() < self.config.min_lane_slope {
            debug!(side = name, pixels = count, slope, "near-horizontal marking rejected");
            return Lane::invalid();
        }

        let lane = match mode {
            FitMode::Straight => straight_lane(&line),
            FitMode::Curved => match self.curve_upgrade(side, &line) {
                Some(quad) => {
                    let mean_x = side.xs.iter().sum::<f64>() / count as f64;
                    let c = &quad.coefficients;
                    Lane::curved(c[0], c[1], c[2], mean_x)
                }
                None => straight_lane(&line),
            },
        };

        let color = if side.yellow * 2 > count {
            MarkingColor::Yellow
        } else {
            MarkingColor::White
        };

        let lane = lane
            .with_reference_rows(rows.iter().copied())
            .with_color(color)
            .with_pixel_count(count);

        debug!(
            side = name,
            pixels = count,
            class = ?lane.classification(),
            coefficients = ?lane.coefficients(),
            "fitted lane"
        );
        lane
    }

    /// The quadratic replaces the line only when the line misses by more
    /// than `curve_residual_px` and the quadratic cuts the residual by the
    /// configured ratio.
    fn curve_upgrade(&self, side: &SidePixels, line: &PolyFit) -> Option<PolyFit> {
        if line.rms <= self.config.curve_residual_px {
            return None;
        }
        let quad = fit_quadratic(&side.xs, &side.ys)?;
        (quad.rms <= line.rms * self.config.curve_improvement_ratio).then_some(quad)
    }
}

fn straight_lane(line: &PolyFit) -> Lane {
    Lane::straight(line.coefficients[0], line.coefficients[1])
}

/// Column indices of nonzero pixels, grouped by row and sorted within a row.
fn nonzero_points_by_row(mask: &Mat) -> LaneDetectionResult<Vec<Vec<i32>>> {
    if mask.channels() != 1 {
        return Err(LaneError::NotSingleChannel(mask.channels()));
    }

    // data_bytes() needs one contiguous buffer
    let owned;
    let mask = if mask.is_continuous() {
        mask
    } else {
        owned = mask.try_clone()?;
        &owned
    };

    let rows = mask.rows() as usize;
    let cols = mask.cols() as usize;
    let step = mask.step1(0)? as usize;
    let data = mask.data_bytes()?;

    let mut result = Vec::with_capacity(rows);
    for y in 0..rows {
        let row_start = y * step;
        let row_end = (row_start + cols).min(data.len());
        let row = &data[row_start..row_end];
        result.push(
            row.iter()
                .enumerate()
                .filter(|&(_, &v)| v != 0)
                .map(|(x, _)| x as i32)
                .collect(),
        );
    }

    Ok(result)
}
