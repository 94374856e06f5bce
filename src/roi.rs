use opencv::{
    core::{self, Mat, Point, Scalar, Size, Vector},
    imgproc,
    prelude::*,
};

use crate::config::RoiConfig;
use crate::error::LaneDetectionResult;
use crate::threshold::ensure_not_empty;

/// Trapezoidal road region ahead of the vehicle, resolution independent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionOfInterest {
    config: RoiConfig,
}

impl RegionOfInterest {
    pub fn new(config: RoiConfig) -> Self {
        Self { config }
    }

    /// Pixel vertices for a frame of `size` (bottom-left, top-left,
    /// top-right, bottom-right).
    pub fn polygon(&self, size: Size) -> Vec<Point> {
        let (w, h) = (size.width as f64, size.height as f64);
        let px = |[fx, fy]: [f64; 2]| {
            // keep the bottom edge on the last row
            let x = (fx * w).round().clamp(0.0, (w - 1.0).max(0.0));
            let y = (fy * h).round().clamp(0.0, (h - 1.0).max(0.0));
            Point::new(x as i32, y as i32)
        };
        vec![
            px(self.config.bottom_left),
            px(self.config.top_left),
            px(self.config.top_right),
            px(self.config.bottom_right),
        ]
    }

    /// Topmost row of the trapezoid.
    pub fn horizon_row(&self, height: i32) -> f64 {
        let top = self.config.top_left[1].min(self.config.top_right[1]);
        (top * height as f64).clamp(0.0, (height - 1).max(0) as f64)
    }

    /// Zeroes everything outside the trapezoid; pixels inside are untouched.
    pub fn apply(&self, img: &Mat) -> LaneDetectionResult<Mat> {
        ensure_not_empty(img)?;

        let mut mask = Mat::zeros(img.rows(), img.cols(), img.typ())?.to_mat()?;
        let mut contours: Vector<Vector<Point>> = Vector::new();
        contours.push(Vector::from_iter(self.polygon(img.size()?)));
        imgproc::fill_poly(
            &mut mask,
            &contours,
            Scalar::all(255.0),
            imgproc::LINE_8,
            0,
            Point::new(0, 0),
        )?;

        let mut masked = Mat::default();
        core::bitwise_and(img, &mask, &mut masked, &Mat::default())?;
        Ok(masked)
    }
}

impl Default for RegionOfInterest {
    fn default() -> Self {
        Self::new(RoiConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LaneError;
    use opencv::core::{self, CV_8UC1, CV_8UC3};

    fn filled(rows: i32, cols: i32, typ: i32) -> Mat {
        Mat::new_rows_cols_with_default(rows, cols, typ, Scalar::all(255.0)).unwrap()
    }

    fn same(a: &Mat, b: &Mat) -> bool {
        let mut diff = Mat::default();
        core::absdiff(a, b, &mut diff).unwrap();
        let diff = diff.reshape(1, 0).unwrap().try_clone().unwrap();
        core::count_non_zero(&diff).unwrap() == 0
    }

    #[test]
    fn keeps_size_and_type() {
        let roi = RegionOfInterest::default();
        for typ in [CV_8UC1, CV_8UC3] {
            let img = filled(120, 160, typ);
            let out = roi.apply(&img).unwrap();
            assert_eq!(out.size().unwrap(), img.size().unwrap());
            assert_eq!(out.typ(), img.typ());
        }
    }

    #[test]
    fn outside_is_zero_inside_is_kept() {
        let roi = RegionOfInterest::default();
        let img = filled(100, 200, CV_8UC1);
        let out = roi.apply(&img).unwrap();

        // sky, top corners and bottom corners
        assert_eq!(*out.at_2d::<u8>(5, 100).unwrap(), 0);
        assert_eq!(*out.at_2d::<u8>(0, 0).unwrap(), 0);
        assert_eq!(*out.at_2d::<u8>(99, 2).unwrap(), 0);
        assert_eq!(*out.at_2d::<u8>(99, 197).unwrap(), 0);
        // road directly ahead
        assert_eq!(*out.at_2d::<u8>(95, 100).unwrap(), 255);
        assert_eq!(*out.at_2d::<u8>(70, 100).unwrap(), 255);
    }

    #[test]
    fn applying_twice_changes_nothing() {
        let roi = RegionOfInterest::default();
        let img = filled(90, 160, CV_8UC3);
        let once = roi.apply(&img).unwrap();
        let twice = roi.apply(&once).unwrap();
        assert!(same(&once, &twice));
    }

    #[test]
    fn polygon_scales_with_frame() {
        let roi = RegionOfInterest::default();
        let small = roi.polygon(Size::new(640, 360));
        let large = roi.polygon(Size::new(1280, 720));
        for (s, l) in small.iter().zip(large.iter()) {
            assert!((s.x * 2 - l.x).abs() <= 2);
            assert!((s.y * 2 - l.y).abs() <= 2);
        }
        assert_eq!(small[0].y, 359);
        assert_eq!(large[3].y, 719);
    }

    #[test]
    fn horizon_is_top_of_trapezoid() {
        let roi = RegionOfInterest::default();
        assert!((roi.horizon_row(100) - 62.0).abs() < 1e-9);
    }

    #[test]
    fn empty_input_is_rejected() {
        let roi = RegionOfInterest::default();
        assert!(matches!(roi.apply(&Mat::default()), Err(LaneError::EmptyFrame)));
    }
}
