//! Capture device abstraction.
//!
//! `FrameSource` drives whatever device the configuration names:
//! - `stub://<name>` paths select the synthetic device (tests, demos)
//! - anything else is treated as a local device node and requires the
//!   `capture-v4l2` feature

use anyhow::Result;

use super::synthetic::SyntheticDevice;

/// Configuration for one camera.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g. "/dev/video0") or a `stub://` name.
    pub device: String,
    /// Target frame rate. The synthetic device paces itself to this;
    /// real devices treat it as a request.
    pub target_fps: u32,
    /// Requested frame width. Kept small to bound capture latency.
    pub width: u32,
    /// Requested frame height.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "stub://camera0".to_string(),
            target_fps: 30,
            width: 640,
            height: 480,
        }
    }
}

/// A blocking capture device owned by the capture thread.
///
/// Implementations must return tightly packed RGB8 from `read_frame` and
/// must bound each read by their own device timeout; the capture loop
/// polls its running flag between reads.
pub trait CaptureDevice: Send {
    /// Resolution actually negotiated with the device.
    fn resolution(&self) -> (u32, u32);

    /// Block until the next frame is available.
    fn read_frame(&mut self) -> Result<Vec<u8>>;
}

/// Open the device named by the configuration.
pub(crate) fn open(config: &CameraConfig) -> Result<Box<dyn CaptureDevice>> {
    if config.device.starts_with("stub://") {
        return Ok(Box::new(SyntheticDevice::new(config.clone())));
    }

    #[cfg(feature = "capture-v4l2")]
    {
        let device = super::v4l2::V4l2Device::open(config)?;
        Ok(Box::new(device))
    }
    #[cfg(not(feature = "capture-v4l2"))]
    {
        anyhow::bail!(
            "capture device '{}' requires the capture-v4l2 feature",
            config.device
        )
    }
}
