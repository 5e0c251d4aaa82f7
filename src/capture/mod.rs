//! Threaded frame acquisition.
//!
//! `FrameSource` owns one capture device and runs a dedicated acquisition
//! loop. It publishes only the single newest frame; unread frames are
//! overwritten, which is expected under load.
//!
//! The source is responsible for:
//! - Opening the device inside the capture thread
//! - Mirroring every frame horizontally before publishing
//! - Keeping the status/fps record live for telemetry
//!
//! The source MUST NOT:
//! - Queue frames (only the latest slot exists)
//! - Block readers beyond a short critical section

mod device;
mod synthetic;
#[cfg(feature = "capture-v4l2")]
mod v4l2;

pub use device::{CameraConfig, CaptureDevice};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::frame::{epoch_ms, Frame};
use crate::{lock_unpoisoned, CaptureStatus, EngineStatus};

/// How long `stop()` waits for the capture thread before giving up.
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Pause between retries after a failed device read.
const READ_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Threaded frame source for one camera.
pub struct FrameSource {
    config: CameraConfig,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    /// Cooperative cancellation flag, polled each loop iteration.
    running: AtomicBool,
    /// Single lock guarding the frame slot and the status record; held
    /// only long enough to swap a reference and a few scalars.
    state: Mutex<CaptureState>,
}

struct CaptureState {
    latest: Option<Arc<Frame>>,
    status: CaptureStatus,
    fps: u32,
    width: u32,
    height: u32,
    frame_count: u64,
}

impl FrameSource {
    pub fn new(config: CameraConfig) -> Self {
        let state = CaptureState {
            latest: None,
            status: CaptureStatus::Stopped,
            fps: 0,
            width: config.width,
            height: config.height,
            frame_count: 0,
        };
        Self {
            config,
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                state: Mutex::new(state),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Start the capture loop. Idempotent; a no-op while already running.
    pub fn start(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.state().status = CaptureStatus::Starting;

        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        let spawned = thread::Builder::new()
            .name("sentinel-capture".to_string())
            .spawn(move || capture_loop(config, shared));
        match spawned {
            Ok(handle) => {
                *lock_unpoisoned(&self.worker) = Some(handle);
                log::info!("capture: thread started for {}", self.config.device);
            }
            Err(err) => {
                log::error!("capture: failed to spawn thread: {}", err);
                self.shared.running.store(false, Ordering::SeqCst);
                self.state().status = CaptureStatus::Error;
            }
        }
    }

    /// Signal the loop to exit and wait up to [`JOIN_TIMEOUT`] for the
    /// thread to end. Status becomes `Stopped` even if the thread is
    /// leaked; the leak is logged, not fatal. The device handle is
    /// released when the loop exits (RAII).
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);

        let worker = lock_unpoisoned(&self.worker).take();
        if let Some(handle) = worker {
            let deadline = Instant::now() + JOIN_TIMEOUT;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                if handle.join().is_err() {
                    log::warn!("capture: thread panicked before shutdown");
                }
            } else {
                log::warn!(
                    "capture: thread did not exit within {:?}; leaking handle",
                    JOIN_TIMEOUT
                );
            }
        }

        self.state().status = CaptureStatus::Stopped;
        log::info!("capture: stopped {}", self.config.device);
    }

    /// Latest published frame, or `None` before the first capture.
    ///
    /// Never blocks beyond the time to clone a reference out of the slot.
    pub fn get_frame(&self) -> Option<Arc<Frame>> {
        self.state().latest.clone()
    }

    /// Current capture health snapshot.
    pub fn status(&self) -> EngineStatus {
        let state = self.state();
        EngineStatus {
            capture: state.status,
            fps: state.fps,
            width: state.width,
            height: state.height,
        }
    }

    /// Total frames published since construction.
    pub fn frame_count(&self) -> u64 {
        self.state().frame_count
    }

    fn state(&self) -> MutexGuard<'_, CaptureState> {
        lock_unpoisoned(&self.shared.state)
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        if self.shared.running.load(Ordering::SeqCst) {
            self.stop();
        }
    }
}

fn capture_loop(config: CameraConfig, shared: Arc<Shared>) {
    let mut device = match device::open(&config) {
        Ok(device) => device,
        Err(err) => {
            log::error!("capture: failed to open {}: {:#}", config.device, err);
            lock_unpoisoned(&shared.state).status = CaptureStatus::Error;
            shared.running.store(false, Ordering::SeqCst);
            return;
        }
    };

    let (width, height) = device.resolution();
    {
        let mut state = lock_unpoisoned(&shared.state);
        state.width = width;
        state.height = height;
        state.status = CaptureStatus::Active;
    }
    log::info!("capture: {} ready at {}x{}", config.device, width, height);

    let mut window_start = Instant::now();
    let mut window_frames = 0u32;

    while shared.running.load(Ordering::SeqCst) {
        match device.read_frame() {
            Ok(mut pixels) => {
                mirror_horizontal(&mut pixels, width as usize);
                {
                    // Sequence numbers continue across restarts.
                    let mut state = lock_unpoisoned(&shared.state);
                    let seq = state.frame_count + 1;
                    state.latest =
                        Some(Arc::new(Frame::new(pixels, width, height, seq, epoch_ms())));
                    state.frame_count = seq;
                }
                window_frames += 1;
                if window_start.elapsed() >= Duration::from_secs(1) {
                    lock_unpoisoned(&shared.state).fps = window_frames;
                    window_frames = 0;
                    window_start = Instant::now();
                }
            }
            Err(err) => {
                log::debug!("capture: frame read failed: {:#}", err);
                thread::sleep(READ_RETRY_DELAY);
            }
        }
    }
}

/// Mirror tightly packed RGB8 rows in place.
fn mirror_horizontal(pixels: &mut [u8], width: usize) {
    let row_bytes = width * 3;
    if row_bytes == 0 {
        return;
    }
    for row in pixels.chunks_exact_mut(row_bytes) {
        let mut left = 0;
        let mut right = width - 1;
        while left < right {
            for channel in 0..3 {
                row.swap(left * 3 + channel, right * 3 + channel);
            }
            left += 1;
            right -= 1;
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
