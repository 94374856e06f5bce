use thiserror::Error;

/// Errors surfaced by the lane pipeline.
///
/// Too few lane pixels or a degenerate fit are not errors: they produce an
/// invalid [`crate::Lane`] instead.
#[derive(Debug, Error)]
pub enum LaneError {
    #[error("opencv: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("empty frame")]
    EmptyFrame,

    #[error("expected a single-channel mask, got {0} channels")]
    NotSingleChannel(i32),

    #[error("mask sizes differ: {left_w}x{left_h} vs {right_w}x{right_h}")]
    MaskSizeMismatch {
        left_w: i32,
        left_h: i32,
        right_w: i32,
        right_h: i32,
    },

    #[error("cannot open video source `{0}`")]
    SourceUnavailable(String),

    #[error("failed to read frame: {0}")]
    SourceRead(String),

    #[error("invalid calibration: {0}")]
    Calibration(String),

    #[error("config io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// `Result` alias used by every pipeline stage.
pub type LaneDetectionResult<T> = Result<T, LaneError>;
