use std::time::Instant;

use opencv::{core::Mat, prelude::*};
use tracing::{debug, error, info, warn};

use crate::config::{DetectorConfig, ThresholdConfig};
use crate::display::{FrameSink, StopSignal};
use crate::error::LaneDetectionResult;
use crate::extract::{FitMode, LaneExtractor};
use crate::heading::HeadingEstimator;
use crate::lane::Lane;
use crate::rectify::FrameRectifier;
use crate::render::OutputRenderer;
use crate::roi::RegionOfInterest;
use crate::threshold::threshold_frame;
use crate::video::{FrameSource, VideoSource};

/// Everything produced for one frame.
pub struct FrameReport {
    pub left: Lane,
    pub right: Lane,
    /// Degrees, positive steers right.
    pub heading: f64,
    pub rendered: Mat,
}

/// Runs the per-frame pipeline and owns the frame loop.
///
/// Stages, in order: undistort, yellow/white thresholding, region of
/// interest, boundary extraction, heading, rendering. The only state kept
/// across frames is the configuration and the stop signal.
pub struct LaneDetector {
    config: DetectorConfig,
    rectifier: FrameRectifier,
    roi: RegionOfInterest,
    extractor: LaneExtractor,
    estimator: HeadingEstimator,
    renderer: OutputRenderer,
    stop: StopSignal,
}

impl LaneDetector {
    pub fn new(config: DetectorConfig) -> LaneDetectionResult<Self> {
        let rectifier = FrameRectifier::new(&config.calibration)?;
        let roi = RegionOfInterest::new(config.roi);
        let extractor = LaneExtractor::new(config.extraction, roi);
        let estimator = HeadingEstimator::new(config.heading);

        Ok(Self {
            config,
            rectifier,
            roi,
            extractor,
            estimator,
            renderer: OutputRenderer,
            stop: StopSignal::new(),
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.config.thresholds
    }

    /// Thresholds may only change between frames; `&mut self` guarantees it.
    pub fn thresholds_mut(&mut self) -> &mut ThresholdConfig {
        &mut self.config.thresholds
    }

    pub fn yellow_min(&self) -> [u8; 3] {
        self.config.thresholds.yellow_min()
    }

    pub fn set_yellow_min(&mut self, value: [u8; 3]) {
        self.config.thresholds.set_yellow_min(value);
    }

    pub fn yellow_max(&self) -> [u8; 3] {
        self.config.thresholds.yellow_max()
    }

    pub fn set_yellow_max(&mut self, value: [u8; 3]) {
        self.config.thresholds.set_yellow_max(value);
    }

    pub fn grayscale_min(&self) -> u8 {
        self.config.thresholds.grayscale_min()
    }

    pub fn set_grayscale_min(&mut self, value: u8) {
        self.config.thresholds.set_grayscale_min(value);
    }

    pub fn grayscale_max(&self) -> u8 {
        self.config.thresholds.grayscale_max()
    }

    pub fn set_grayscale_max(&mut self, value: u8) {
        self.config.thresholds.set_grayscale_max(value);
    }

    /// Handle that stops [`LaneDetector::run`] at the next frame boundary.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Runs one BGR frame through every stage.
    ///
    /// # Arguments
    /// * `frame` - BGR frame from the source
    /// * `mode` - whether the extractor may fit quadratics
    ///
    /// # Returns
    /// * both lanes, the heading in degrees and the annotated frame
    pub fn process_frame(&self, frame: &Mat, mode: FitMode) -> LaneDetectionResult<FrameReport> {
        let start = Instant::now();

        let rectified = self.rectifier.rectify(frame)?;
        let masks = threshold_frame(&rectified, &self.config.thresholds)?;
        let yellow = self.roi.apply(&masks.yellow)?;
        let white = self.roi.apply(&masks.white)?;

        let (left, right) = self.extractor.extract(&yellow, &white, mode)?;
        let heading = self.estimator.estimate(&left, &right, rectified.size()?);

        let elapsed = start.elapsed().as_secs_f64();
        let fps = (elapsed > 0.0).then(|| 1.0 / elapsed);
        let rendered = self.renderer.render(&rectified, &left, &right, heading, fps)?;

        debug!(
            left = left.is_valid(),
            right = right.is_valid(),
            heading,
            fps = fps.unwrap_or_default(),
            "frame processed"
        );

        Ok(FrameReport {
            left,
            right,
            heading,
            rendered,
        })
    }

    /// Opens `video_name` and processes it to the end.
    ///
    /// Returns `false` without touching any frame if the source cannot be
    /// opened; otherwise returns what [`LaneDetector::run`] returns.
    pub fn detect_lane(&mut self, video_name: &str, mode: FitMode, sink: &mut dyn FrameSink) -> bool {
        let mut source = match VideoSource::open(video_name) {
            Ok(source) => source,
            Err(e) => {
                error!("{e}");
                return false;
            }
        };
        self.run(&mut source, mode, sink)
    }

    /// Frame loop.
    ///
    /// A frame that fails to process is logged and skipped. A failing source
    /// or sink ends the run with `false`. End of stream or a stop request
    /// ends it with `true`.
    pub fn run(&mut self, source: &mut dyn FrameSource, mode: FitMode, sink: &mut dyn FrameSink) -> bool {
        let mut processed = 0usize;
        let mut skipped = 0usize;

        loop {
            if self.stop.is_requested() {
                info!("stop requested");
                break;
            }

            let frame = match source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    error!("{e}");
                    return false;
                }
            };

            let report = match self.process_frame(&frame, mode) {
                Ok(report) => report,
                Err(e) => {
                    warn!(frame = processed + skipped, "skipping frame: {e}");
                    skipped += 1;
                    continue;
                }
            };
            processed += 1;

            if let Err(e) = sink.present(&report.rendered, &self.stop) {
                error!("display failed: {e}");
                return false;
            }
        }

        info!(processed, skipped, "finished");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CalibrationConfig;
    use opencv::core::{Point, Scalar, CV_8UC3};
    use opencv::imgproc;

    fn detector() -> LaneDetector {
        let config = DetectorConfig {
            calibration: CalibrationConfig {
                enabled: false,
                ..CalibrationConfig::default()
            },
            ..DetectorConfig::default()
        };
        LaneDetector::new(config).unwrap()
    }

    /// Dark road with a yellow left line and a white right line, symmetric
    /// about the frame center.
    fn road_frame() -> Mat {
        let mut frame = Mat::new_rows_cols_with_default(480, 640, CV_8UC3, Scalar::all(40.0)).unwrap();
        imgproc::line(
            &mut frame,
            Point::new(120, 479),
            Point::new(290, 320),
            Scalar::new(0.0, 255.0, 255.0, 0.0),
            6,
            imgproc::LINE_8,
            0,
        )
        .unwrap();
        imgproc::line(
            &mut frame,
            Point::new(520, 479),
            Point::new(350, 320),
            Scalar::new(255.0, 255.0, 255.0, 0.0),
            6,
            imgproc::LINE_8,
            0,
        )
        .unwrap();
        frame
    }

    #[test]
    fn road_frame_yields_two_lanes_and_small_heading() {
        let report = detector().process_frame(&road_frame(), FitMode::Straight).unwrap();

        assert!(report.left.is_valid());
        assert!(report.right.is_valid());
        assert!(report.left.coefficients()[0] < 0.0);
        assert!(report.right.coefficients()[0] > 0.0);
        assert!(report.heading.abs() < 1.0, "heading {}", report.heading);
        assert_eq!(report.rendered.size().unwrap(), road_frame().size().unwrap());
    }

    #[test]
    fn blank_road_is_neutral() {
        let frame = Mat::new_rows_cols_with_default(480, 640, CV_8UC3, Scalar::all(40.0)).unwrap();
        let report = detector().process_frame(&frame, FitMode::Curved).unwrap();
        assert!(!report.left.is_valid());
        assert!(!report.right.is_valid());
        assert_eq!(report.heading, 0.0);
    }

    #[test]
    fn threshold_accessors_delegate() {
        let mut d = detector();
        d.set_grayscale_min(190);
        d.set_grayscale_max(250);
        d.set_yellow_min([15, 80, 80]);
        d.set_yellow_max([35, 255, 255]);
        assert_eq!(d.grayscale_min(), 190);
        assert_eq!(d.grayscale_max(), 250);
        assert_eq!(d.yellow_min(), [15, 80, 80]);
        assert_eq!(d.yellow_max(), [35, 255, 255]);
        assert_eq!(d.thresholds().grayscale_min(), 190);
    }

    #[test]
    fn raised_white_floor_hides_the_white_line() {
        let mut d = detector();
        // an empty intensity range turns the white mask off
        d.thresholds_mut().set_grayscale_min(255);
        d.thresholds_mut().set_grayscale_max(254);
        let report = d.process_frame(&road_frame(), FitMode::Straight).unwrap();
        assert!(report.left.is_valid());
        assert!(!report.right.is_valid());
    }
}
