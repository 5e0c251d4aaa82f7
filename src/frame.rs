//! Published frames.
//!
//! A `Frame` is immutable once published: the capture thread builds it,
//! wraps it in an `Arc`, and swaps it into the latest-frame slot. Readers
//! hold their own reference, so an overwrite by the capture thread can
//! never mutate pixels a reader is still looking at.

use std::time::{SystemTime, UNIX_EPOCH};

/// One captured image, published read-only.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Tightly packed RGB8, row-major, already mirrored.
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonic capture sequence number, strictly increasing per source.
    pub seq: u64,
    /// Capture wall-clock time, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, seq: u64, timestamp_ms: u64) -> Self {
        Self {
            pixels,
            width,
            height,
            seq,
            timestamp_ms,
        }
    }

    /// Raw pixel data for capability backends. Read-only by construction.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub(crate) fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
