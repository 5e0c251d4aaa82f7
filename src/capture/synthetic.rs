//! Synthetic capture device (`stub://` paths).
//!
//! Produces a deterministic moving pattern at the configured frame rate.
//! Used by tests and by deployments that have no camera attached yet.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;

use super::device::{CameraConfig, CaptureDevice};

pub(crate) struct SyntheticDevice {
    config: CameraConfig,
    frame_count: u64,
    /// Simulated "scene" state so consecutive frames differ occasionally.
    scene_state: u8,
    last_frame_at: Option<Instant>,
}

impl SyntheticDevice {
    pub(crate) fn new(config: CameraConfig) -> Self {
        log::info!("capture: opened {} (synthetic)", config.device);
        Self {
            config,
            frame_count: 0,
            scene_state: 0,
            last_frame_at: None,
        }
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.config.width * self.config.height * 3) as usize;

        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl CaptureDevice for SyntheticDevice {
    fn resolution(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn read_frame(&mut self) -> Result<Vec<u8>> {
        if self.config.target_fps > 0 {
            let interval = Duration::from_secs(1) / self.config.target_fps;
            if let Some(last) = self.last_frame_at {
                let elapsed = last.elapsed();
                if elapsed < interval {
                    thread::sleep(interval - elapsed);
                }
            }
        }
        self.last_frame_at = Some(Instant::now());
        self.frame_count += 1;
        Ok(self.generate_pixels())
    }
}
