use opencv::{calib3d, core::Mat, prelude::*};

use crate::config::CalibrationConfig;
use crate::error::{LaneDetectionResult, LaneError};
use crate::threshold::ensure_not_empty;

/// Removes lens distortion using a precomputed calibration.
pub struct FrameRectifier {
    calibration: Option<(Mat, Mat)>,
}

impl FrameRectifier {
    pub fn new(config: &CalibrationConfig) -> LaneDetectionResult<Self> {
        if !config.enabled {
            return Ok(Self { calibration: None });
        }

        let finite = config.camera_matrix.iter().flatten().chain(config.distortion.iter()).all(|v| v.is_finite());
        if !finite {
            return Err(LaneError::Calibration("non-finite coefficient".into()));
        }
        let k = &config.camera_matrix;
        if k[0][0] <= 0.0 || k[1][1] <= 0.0 {
            return Err(LaneError::Calibration("focal lengths must be positive".into()));
        }

        let camera_matrix = Mat::from_slice_2d(&config.camera_matrix)?;
        let distortion = Mat::from_slice(config.distortion.as_slice())?.try_clone()?;
        Ok(Self {
            calibration: Some((camera_matrix, distortion)),
        })
    }

    /// Rectifier that returns frames unchanged.
    pub fn passthrough() -> Self {
        Self { calibration: None }
    }

    /// Undistorted copy of `frame`, or a plain copy when calibration is off.
    pub fn rectify(&self, frame: &Mat) -> LaneDetectionResult<Mat> {
        ensure_not_empty(frame)?;

        let Some((camera_matrix, distortion)) = &self.calibration else {
            return Ok(frame.try_clone()?);
        };

        let mut undistorted = Mat::default();
        calib3d::undistort(frame, &mut undistorted, camera_matrix, distortion, &Mat::default())?;
        Ok(undistorted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{self, Scalar, CV_8UC3};

    fn frame() -> Mat {
        Mat::new_rows_cols_with_default(72, 128, CV_8UC3, Scalar::new(10.0, 200.0, 90.0, 0.0)).unwrap()
    }

    #[test]
    fn undistort_keeps_frame_geometry() {
        let rectifier = FrameRectifier::new(&CalibrationConfig::default()).unwrap();
        let out = rectifier.rectify(&frame()).unwrap();
        assert_eq!(out.size().unwrap(), frame().size().unwrap());
        assert_eq!(out.typ(), CV_8UC3);
    }

    #[test]
    fn disabled_calibration_passes_through() {
        let config = CalibrationConfig {
            enabled: false,
            ..CalibrationConfig::default()
        };
        let rectifier = FrameRectifier::new(&config).unwrap();
        let input = frame();
        let out = rectifier.rectify(&input).unwrap();

        let mut diff = Mat::default();
        core::absdiff(&input, &out, &mut diff).unwrap();
        let diff = diff.reshape(1, 0).unwrap().try_clone().unwrap();
        assert_eq!(core::count_non_zero(&diff).unwrap(), 0);
    }

    #[test]
    fn empty_frame_is_rejected() {
        let rectifier = FrameRectifier::passthrough();
        assert!(matches!(rectifier.rectify(&Mat::default()), Err(LaneError::EmptyFrame)));
    }

    #[test]
    fn bad_calibration_is_rejected() {
        let mut config = CalibrationConfig::default();
        config.camera_matrix[0][0] = 0.0;
        assert!(matches!(FrameRectifier::new(&config), Err(LaneError::Calibration(_))));

        let mut config = CalibrationConfig::default();
        config.distortion[1] = f64::NAN;
        assert!(FrameRectifier::new(&config).is_err());
    }
}
