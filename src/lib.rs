//! Lane boundary extraction and steering heading for a forward-facing camera.
//!
//! Per frame: undistort, threshold yellow and white paint, keep the road
//! trapezoid, fit the left and right boundaries and turn them into a heading.

pub mod config;
pub mod display;
pub mod error;
pub mod extract;
pub mod heading;
pub mod lane;
pub mod lane_detection;
pub mod polyfit;
pub mod rectify;
pub mod render;
pub mod roi;
pub mod threshold;
pub mod video;

pub use config::{DetectorConfig, ThresholdConfig};
pub use display::{FrameSink, NullSink, StopSignal, WindowSink};
pub use error::{LaneDetectionResult, LaneError};
pub use extract::{FitMode, LaneExtractor};
pub use heading::HeadingEstimator;
pub use lane::{Lane, LaneClass, MarkingColor};
pub use lane_detection::{FrameReport, LaneDetector};
pub use video::{FrameSource, VideoSource};
