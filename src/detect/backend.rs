use anyhow::Result;

use crate::detect::result::ObjectBox;
use crate::frame::Frame;

/// Object detector capability.
///
/// Implementations are external and model-backed; the engine only sees
/// this trait and treats the handle as optional. A backend must be safely
/// callable repeatedly on different frames. Failures surface as errors
/// that the pipeline catches and logs; a failing pass never aborts the
/// engine.
pub trait ObjectDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run object detection on a frame, returning boxes in pixel
    /// coordinates of that frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<ObjectBox>>;

    /// Optional warm-up hook, invoked once when the backend is attached.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
