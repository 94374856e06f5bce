use opencv::core::Point2d;

/// Shape chosen for a boundary fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneClass {
    Straight,
    Curved,
    Unknown,
}

/// Mask that contributed most of a boundary's pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkingColor {
    Yellow,
    White,
    Unknown,
}

/// One fitted lane boundary for the current frame.
///
/// Coefficients are highest power first and describe `y` as a function of
/// `x`: `[m, b]` for a straight lane, `[a, b, c]` for a curved one. An
/// invalid lane is always [`LaneClass::Unknown`] and carries no coefficients
/// or reference points.
#[derive(Debug, Clone, PartialEq)]
pub struct Lane {
    classification: LaneClass,
    coefficients: Vec<f64>,
    reference_points: Vec<Point2d>,
    x_hint: f64,
    color: MarkingColor,
    pixel_count: usize,
}

impl Lane {
    /// Placeholder for a side where no boundary was found.
    pub fn invalid() -> Self {
        Self {
            classification: LaneClass::Unknown,
            coefficients: Vec::new(),
            reference_points: Vec::new(),
            x_hint: 0.0,
            color: MarkingColor::Unknown,
            pixel_count: 0,
        }
    }

    /// `y = slope * x + intercept`. Non-finite or flat lines come back invalid.
    pub fn straight(slope: f64, intercept: f64) -> Self {
        if !slope.is_finite() || !intercept.is_finite() || slope.abs() < MIN_SLOPE {
            return Self::invalid();
        }
        Self {
            classification: LaneClass::Straight,
            coefficients: vec![slope, intercept],
            ..Self::invalid()
        }
    }

    /// `y = a*x² + b*x + c`.
    ///
    /// # Arguments
    /// * `a`, `b`, `c` - coefficients, highest power first
    /// * `x_hint` - column near the observed pixels; [`Lane::x_at`] returns
    ///   the root closest to it
    ///
    /// # Returns
    /// * a curved lane, or an invalid one if any input is not finite
    pub fn curved(a: f64, b: f64, c: f64, x_hint: f64) -> Self {
        if ![a, b, c, x_hint].iter().all(|v| v.is_finite()) {
            return Self::invalid();
        }
        Self {
            classification: LaneClass::Curved,
            coefficients: vec![a, b, c],
            x_hint,
            ..Self::invalid()
        }
    }

    /// Sets the marking color. No effect on an invalid lane.
    pub fn with_color(mut self, color: MarkingColor) -> Self {
        if self.is_valid() {
            self.color = color;
        }
        self
    }

    /// Number of mask pixels the fit was made from.
    pub fn with_pixel_count(mut self, count: usize) -> Self {
        if self.is_valid() {
            self.pixel_count = count;
        }
        self
    }

    /// Samples the boundary at `rows`.
    ///
    /// # Arguments
    /// * `rows` - image rows, usually from the bottom edge up to the horizon
    ///
    /// # Returns
    /// * the lane with one reference point per reachable row. Rows without
    ///   a real solution are dropped; a lane with no surviving sample is
    ///   invalid.
    pub fn with_reference_rows(mut self, rows: impl IntoIterator<Item = f64>) -> Self {
        if !self.is_valid() {
            return self;
        }
        self.reference_points = rows
            .into_iter()
            .filter_map(|y| self.x_at(y).map(|x| Point2d::new(x, y)))
            .collect();
        if self.reference_points.is_empty() {
            return Self::invalid();
        }
        self
    }

    pub fn is_valid(&self) -> bool {
        self.classification != LaneClass::Unknown
    }

    pub fn classification(&self) -> LaneClass {
        self.classification
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn reference_points(&self) -> &[Point2d] {
        &self.reference_points
    }

    pub fn color(&self) -> MarkingColor {
        self.color
    }

    pub fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    /// Fitted `y` at column `x`.
    pub fn y_at(&self, x: f64) -> Option<f64> {
        let y = match self.coefficients[..] {
            [m, b] => m * x + b,
            [a, b, c] => (a * x + b) * x + c,
            _ => return None,
        };
        y.is_finite().then_some(y)
    }

    /// Column where the boundary crosses row `y`.
    pub fn x_at(&self, y: f64) -> Option<f64> {
        let x = match self.coefficients[..] {
            [m, b] => (y - b) / m,
            [a, b, c] if a.abs() < MIN_CURVATURE => {
                if b.abs() < MIN_SLOPE {
                    return None;
                }
                (y - c) / b
            }
            [a, b, c] => {
                let disc = b * b - 4.0 * a * (c - y);
                if disc < 0.0 {
                    return None;
                }
                let sq = disc.sqrt();
                let r1 = (-b + sq) / (2.0 * a);
                let r2 = (-b - sq) / (2.0 * a);
                if (r1 - self.x_hint).abs() <= (r2 - self.x_hint).abs() {
                    r1
                } else {
                    r2
                }
            }
            _ => return None,
        };
        x.is_finite().then_some(x)
    }

    /// x of the lowest reference point, where the lane meets the bottom rows.
    pub fn base_x(&self) -> Option<f64> {
        self.reference_points
            .iter()
            .max_by(|a, b| a.y.total_cmp(&b.y))
            .map(|p| p.x)
    }
}

const MIN_SLOPE: f64 = 1e-6;
const MIN_CURVATURE: f64 = 1e-12;
