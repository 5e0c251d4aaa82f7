//! Sentinel vision engine.
//!
//! This crate implements the real-time analytics front-end for a
//! surveillance pipeline: continuous camera acquisition, cadenced
//! inference, identity correlation, and threat classification.
//!
//! # Architecture
//!
//! Frames flow through a fixed pipeline:
//!
//! 1. [`FrameSource`] acquires frames on a dedicated thread and publishes
//!    only the newest one.
//! 2. [`VisionEngine`] runs object detection and face embedding on a
//!    throttled cadence (1-in-N frames).
//! 3. [`correlate`](correlate::correlate) associates face matches with
//!    person boxes by centroid containment.
//! 4. [`ThreatPolicy`](threat::ThreatPolicy) assigns one of three threat
//!    levels per box.
//!
//! The detector and embedder themselves are external, model-backed
//! capabilities injected through the [`ObjectDetector`] and
//! [`FaceEmbedder`] traits. Persistence, alerting policy, and transport
//! are downstream concerns; the engine only emits [`DetectionEvent`]
//! batches.
//!
//! # Module Structure
//!
//! - `capture`: threaded frame acquisition (`FrameSource`, capture devices)
//! - `detect`: object detector capability and box types
//! - `face`: face embedder capability and the identity gallery
//! - `correlate` / `threat`: per-pass reduction of raw results
//! - `engine`: cadence, lifecycle, and event assembly
//! - `config`: daemon configuration (JSON file + env overrides)

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

pub mod capture;
pub mod config;
pub mod correlate;
pub mod detect;
pub mod engine;
pub mod face;
pub mod frame;
pub mod threat;

pub use capture::{CameraConfig, CaptureDevice, FrameSource};
pub use config::SentineldConfig;
pub use correlate::{CorrelatedBox, FaceMatch};
pub use detect::{BBox, ObjectBox, ObjectDetector, StubObjectDetector, PERSON_LABEL};
pub use engine::{Analysis, EngineConfig, VisionEngine};
pub use face::{
    FaceEmbedder, FaceObservation, GalleryEntry, IdentityGallery, IdentityMatch, StubFaceEmbedder,
};
pub use frame::Frame;
pub use threat::{Classification, ThreatLevel, ThreatPolicy, DEFAULT_WEAPON_CLASSES};

// -------------------- Capture health --------------------

/// Lifecycle state of the capture thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureStatus {
    Stopped,
    Starting,
    Active,
    Error,
}

/// Liveness snapshot published by [`FrameSource`] and attached to every
/// analysis result, cadence or not.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub capture: CaptureStatus,
    /// Frames produced in the last full wall-clock second.
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

// -------------------- Detection events --------------------

/// Integer pixel rectangle as reported to collaborators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// One classified detection, emitted per box per inference pass.
///
/// Events are handed to external collaborators (storage, alerting) and
/// are not retained by the engine beyond the cadence cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    /// Stable within a pass: `det_<frame_seq>_<box_index>`.
    pub id: String,
    /// Final label; identity matches rewrite this (e.g. `SUSPECT: Jane Doe`).
    pub label: String,
    pub confidence: f32,
    pub bbox: PixelBox,
    /// `[x, y, width, height]`, each normalized to `0..=1`.
    pub bbox_normalized: [f32; 4],
    pub threat_level: ThreatLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityMatch>,
    pub frame_seq: u64,
    /// Capture timestamp of the analyzed frame, milliseconds since epoch.
    pub timestamp_ms: u64,
}

/// Lock a mutex, recovering the guard if a holder panicked. The guarded
/// pipeline state is plain data and stays coherent across a poisoned lock.
pub(crate) fn lock_unpoisoned<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
