use opencv::{
    core::{self, Mat, Scalar},
    imgproc,
    prelude::*,
};
use opencv::core::AlgorithmHint::ALGO_HINT_DEFAULT;

use crate::config::ThresholdConfig;
use crate::error::{LaneDetectionResult, LaneError};

/// Yellow and white candidate masks for one frame (`CV_8UC1`, 0 or 255).
pub struct LaneMasks {
    pub yellow: Mat,
    pub white: Mat,
}

/// Builds both candidate masks from a BGR frame.
pub fn threshold_frame(frame: &Mat, thresholds: &ThresholdConfig) -> LaneDetectionResult<LaneMasks> {
    Ok(LaneMasks {
        yellow: threshold_yellow(frame, thresholds)?,
        white: threshold_white(frame, thresholds)?,
    })
}

/// HSV range check against the yellow bounds.
pub fn threshold_yellow(frame: &Mat, thresholds: &ThresholdConfig) -> LaneDetectionResult<Mat> {
    ensure_not_empty(frame)?;

    let mut hsv = Mat::default();
    imgproc::cvt_color(frame, &mut hsv, imgproc::COLOR_BGR2HSV, 0, ALGO_HINT_DEFAULT)?;

    let mut mask = Mat::default();
    core::in_range(
        &hsv,
        &bound3(thresholds.yellow_min()),
        &bound3(thresholds.yellow_max()),
        &mut mask,
    )?;
    Ok(mask)
}

/// Grayscale range check against the intensity bounds.
pub fn threshold_white(frame: &Mat, thresholds: &ThresholdConfig) -> LaneDetectionResult<Mat> {
    ensure_not_empty(frame)?;

    let mut gray = Mat::default();
    imgproc::cvt_color(frame, &mut gray, imgproc::COLOR_BGR2GRAY, 0, ALGO_HINT_DEFAULT)?;

    let mut mask = Mat::default();
    core::in_range(
        &gray,
        &Scalar::all(thresholds.grayscale_min() as f64),
        &Scalar::all(thresholds.grayscale_max() as f64),
        &mut mask,
    )?;
    Ok(mask)
}

fn bound3(v: [u8; 3]) -> Scalar {
    Scalar::new(v[0] as f64, v[1] as f64, v[2] as f64, 0.0)
}

pub(crate) fn ensure_not_empty(img: &Mat) -> LaneDetectionResult<()> {
    if img.empty() || img.rows() == 0 || img.cols() == 0 {
        return Err(LaneError::EmptyFrame);
    }
    Ok(())
}
