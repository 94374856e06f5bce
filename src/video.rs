use opencv::{core::Mat, prelude::*, videoio};
use tracing::info;

use crate::error::{LaneDetectionResult, LaneError};

/// Supplies frames to the detector, one at a time.
pub trait FrameSource {
    /// `Ok(None)` marks the end of the stream. An `Err` means the source
    /// itself failed and no further frames can be expected.
    fn read_frame(&mut self) -> LaneDetectionResult<Option<Mat>>;
}

/// File or camera opened through `videoio`.
pub struct VideoSource {
    cap: videoio::VideoCapture,
}

impl VideoSource {
    /// An all-digit name opens that camera index; anything else is a path.
    pub fn open(name: &str) -> LaneDetectionResult<Self> {
        let unavailable = || LaneError::SourceUnavailable(name.to_string());

        let cap = match name.parse::<i32>() {
            Ok(index) if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) => {
                videoio::VideoCapture::new(index, videoio::CAP_ANY)
            }
            _ => videoio::VideoCapture::from_file(name, videoio::CAP_ANY),
        }
        .map_err(|_| unavailable())?;

        if !cap.is_opened().unwrap_or(false) {
            return Err(unavailable());
        }

        info!(source = name, "opened video source");
        Ok(Self { cap })
    }
}

impl FrameSource for VideoSource {
    fn read_frame(&mut self) -> LaneDetectionResult<Option<Mat>> {
        let mut frame = Mat::default();
        let read = self
            .cap
            .read(&mut frame)
            .map_err(|e| LaneError::SourceRead(e.to_string()))?;
        if !read || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_unavailable() {
        let err = VideoSource::open("/definitely/not/here/road.mp4");
        assert!(matches!(err, Err(LaneError::SourceUnavailable(_))));
    }
}
