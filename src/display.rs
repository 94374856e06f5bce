use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use opencv::{core::Mat, highgui};

use crate::error::LaneDetectionResult;

/// Cooperative stop request, checked by the detector between frames.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Receives each rendered frame.
pub trait FrameSink {
    fn present(&mut self, frame: &Mat, stop: &StopSignal) -> LaneDetectionResult<()>;
}

/// Discards frames; used for headless runs.
#[derive(Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _frame: &Mat, _stop: &StopSignal) -> LaneDetectionResult<()> {
        Ok(())
    }
}

/// Shows frames in a highgui window; `q` or Esc requests a stop.
pub struct WindowSink {
    name: String,
}

impl WindowSink {
    pub fn new(name: &str) -> LaneDetectionResult<Self> {
        highgui::named_window(name, highgui::WINDOW_AUTOSIZE)?;
        Ok(Self { name: name.to_string() })
    }
}

impl FrameSink for WindowSink {
    fn present(&mut self, frame: &Mat, stop: &StopSignal) -> LaneDetectionResult<()> {
        highgui::imshow(&self.name, frame)?;
        let key = highgui::wait_key(1)?;
        if key == 'q' as i32 || key == 27 {
            stop.request_stop();
        }
        Ok(())
    }
}

impl Drop for WindowSink {
    fn drop(&mut self) {
        let _ = highgui::destroy_window(&self.name);
    }
}
