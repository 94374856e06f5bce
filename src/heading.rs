use opencv::core::Size;
use tracing::trace;

use crate::config::HeadingConfig;
use crate::lane::Lane;

/// Turns a pair of boundaries into a steering correction in degrees.
///
/// Positive values steer right: the lane center sits to the right of the
/// frame center. Missing data never produces an error:
///
/// * both lanes valid: their midpoint at the reference row is used;
/// * one lane valid: the other is assumed `nominal_lane_width * width`
///   pixels away on its own side;
/// * no lane valid: the heading is `0.0`, so no turn is invented.
///
/// A lane that crosses the reference row off-frame, or on the wrong side
/// of the frame center, counts as missing.
///
/// The result is clamped to `±max_heading_deg` and is always finite.
pub struct HeadingEstimator {
    config: HeadingConfig,
}

impl HeadingEstimator {
    pub fn new(config: HeadingConfig) -> Self {
        Self { config }
    }

    /// # Arguments
    /// * `left`, `right` - boundaries from the extractor, valid or not
    /// * `frame` - size of the frame the lanes were fitted on
    ///
    /// # Returns
    /// * heading in degrees, within `±max_heading_deg`
    pub fn estimate(&self, left: &Lane, right: &Lane, frame: Size) -> f64 {
        if frame.width <= 0 || frame.height <= 0 {
            return 0.0;
        }

        let width = frame.width as f64;
        let row = (self.config.reference_row * frame.height as f64).clamp(0.0, (frame.height - 1) as f64);
        let lane_width = self.config.nominal_lane_width * width;

        let center = width / 2.0;
        let left_x = lane_x(left, row).filter(|x| (0.0..center).contains(x));
        let right_x = lane_x(right, row).filter(|x| (center..width).contains(x));

        let midpoint = match (left_x, right_x) {
            (Some(l), Some(r)) => (l + r) / 2.0,
            (Some(l), None) => l + lane_width / 2.0,
            (None, Some(r)) => r - lane_width / 2.0,
            (None, None) => return 0.0,
        };

        let offset = (midpoint - center) / center;
        let heading = (offset * self.config.gain_deg).clamp(-self.config.max_heading_deg, self.config.max_heading_deg);

        trace!(?left_x, ?right_x, midpoint, heading, "heading");

        if heading.is_finite() {
            heading
        } else {
            0.0
        }
    }
}

fn lane_x(lane: &Lane, row: f64) -> Option<f64> {
    if !lane.is_valid() {
        return None;
    }
    lane.x_at(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const FRAME: Size = Size { width: 640, height: 480 };

    fn estimator() -> HeadingEstimator {
        HeadingEstimator::new(HeadingConfig::default())
    }

    fn reference_row() -> f64 {
        HeadingConfig::default().reference_row * FRAME.height as f64
    }

    /// Straight lane crossing `x` at the reference row with the given slope.
    fn lane_through(x: f64, slope: f64) -> Lane {
        Lane::straight(slope, reference_row() - slope * x)
    }

    #[test]
    fn symmetric_lanes_give_zero() {
        let left = lane_through(170.0, -1.2);
        let right = lane_through(470.0, 1.2);
        assert_abs_diff_eq!(estimator().estimate(&left, &right, FRAME), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn offset_center_steers_toward_it() {
        // lane center at x = 400, right of the frame center
        let left = lane_through(250.0, -1.0);
        let right = lane_through(550.0, 1.0);
        let cfg = HeadingConfig::default();
        let expected = (400.0 - 320.0) / 320.0 * cfg.gain_deg;
        assert_abs_diff_eq!(estimator().estimate(&left, &right, FRAME), expected, epsilon = 1e-9);

        let left = lane_through(50.0, -1.0);
        let right = lane_through(350.0, 1.0);
        assert!(estimator().estimate(&left, &right, FRAME) < 0.0);
    }

    #[test]
    fn missing_right_lane_uses_nominal_width() {
        let cfg = HeadingConfig::default();
        let left = lane_through(100.0, -1.0);
        let assumed_right = 100.0 + cfg.nominal_lane_width * 640.0;
        let expected = ((100.0 + assumed_right) / 2.0 - 320.0) / 320.0 * cfg.gain_deg;

        let heading = estimator().estimate(&left, &Lane::invalid(), FRAME);
        assert!(heading.is_finite());
        assert_abs_diff_eq!(heading, expected.clamp(-cfg.max_heading_deg, cfg.max_heading_deg), epsilon = 1e-9);
    }

    #[test]
    fn missing_left_lane_uses_nominal_width() {
        let cfg = HeadingConfig::default();
        let right = lane_through(520.0, 1.0);
        let assumed_left = 520.0 - cfg.nominal_lane_width * 640.0;
        let expected = ((assumed_left + 520.0) / 2.0 - 320.0) / 320.0 * cfg.gain_deg;

        let heading = estimator().estimate(&Lane::invalid(), &right, FRAME);
        assert_abs_diff_eq!(heading, expected, epsilon = 1e-9);
    }

    #[test]
    fn no_lanes_is_neutral() {
        let heading = estimator().estimate(&Lane::invalid(), &Lane::invalid(), FRAME);
        assert_eq!(heading, 0.0);
    }

    #[test]
    fn heading_is_clamped() {
        let cfg = HeadingConfig::default();
        // assumed right boundary lands at 486, which is past the 20 degree limit
        let left = lane_through(310.0, -1.0);
        assert_abs_diff_eq!(estimator().estimate(&left, &Lane::invalid(), FRAME), cfg.max_heading_deg);

        let mut steep = HeadingConfig::default();
        steep.gain_deg = 200.0;
        let left = lane_through(250.0, -1.0);
        let right = lane_through(550.0, 1.0);
        assert_abs_diff_eq!(HeadingEstimator::new(steep).estimate(&left, &right, FRAME), steep.max_heading_deg);
    }

    #[test]
    fn flat_left_lane_does_not_override_the_right() {
        // y = 400 + 0.02x crosses the reference row far right of the frame
        let flat = Lane::straight(0.02, 400.0);
        assert!(flat.x_at(reference_row()).unwrap() > 640.0);

        let right = lane_through(500.0, 1.0);
        let only_right = estimator().estimate(&Lane::invalid(), &right, FRAME);
        let both = estimator().estimate(&flat, &right, FRAME);
        assert_abs_diff_eq!(both, only_right, epsilon = 1e-9);
        assert!(both.abs() < HeadingConfig::default().max_heading_deg);

        assert_eq!(estimator().estimate(&flat, &Lane::invalid(), FRAME), 0.0);
    }

    #[test]
    fn lane_on_the_wrong_side_counts_as_missing() {
        let left = lane_through(170.0, -1.0);
        // a "right" boundary crossing left of center
        let stray = lane_through(250.0, 1.0);
        let both = estimator().estimate(&left, &stray, FRAME);
        let only_left = estimator().estimate(&left, &Lane::invalid(), FRAME);
        assert_abs_diff_eq!(both, only_left, epsilon = 1e-9);
    }

    #[test]
    fn zero_sized_frame_is_neutral() {
        let left = lane_through(170.0, -1.2);
        assert_eq!(estimator().estimate(&left, &Lane::invalid(), Size::new(0, 0)), 0.0);
    }

    #[test]
    fn unreachable_row_falls_back() {
        // parabola opening upward whose vertex sits below the reference row
        let curved = Lane::curved(0.01, -4.0, 900.0, 200.0);
        let right = lane_through(500.0, 1.0);
        let both = estimator().estimate(&curved, &right, FRAME);
        let only_right = estimator().estimate(&Lane::invalid(), &right, FRAME);
        assert_abs_diff_eq!(both, only_right, epsilon = 1e-9);
    }
}
