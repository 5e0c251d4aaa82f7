//! Pipeline orchestration.
//!
//! `VisionEngine` drives the inference cadence: 1-in-N `analyze()` calls
//! runs the detector/embedder capabilities on the newest frame; the other
//! N-1 calls return the cached event batch with a fresh status snapshot,
//! which keeps telemetry live while bounding inference cost.
//!
//! Capability failures during a pass are logged and the previous cached
//! batch is returned unchanged; a missing capability degrades the engine
//! to an empty event stream with live status.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::capture::{CameraConfig, FrameSource};
use crate::correlate::{correlate, FaceMatch};
use crate::detect::{ObjectBox, ObjectDetector};
use crate::face::{FaceEmbedder, IdentityGallery};
use crate::frame::Frame;
use crate::threat::ThreatPolicy;
use crate::{lock_unpoisoned, DetectionEvent, EngineStatus, PixelBox};

const DEFAULT_CADENCE: u64 = 5;
const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;
const DEFAULT_MATCH_THRESHOLD: f32 = 0.5;

/// Engine tuning knobs.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub camera: CameraConfig,
    /// Run inference on every Nth `analyze()` call. Clamped to >= 1.
    pub cadence: u64,
    /// Detector boxes below this confidence are dropped.
    pub min_confidence: f32,
    /// Gallery similarity threshold for identity matches.
    pub match_threshold: f32,
    pub policy: ThreatPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            cadence: DEFAULT_CADENCE,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            policy: ThreatPolicy::default(),
        }
    }
}

/// Result of one `analyze()` call: best known event batch plus a fresh
/// capture health snapshot. Callers must treat the batch as "best known
/// state", never as a guaranteed fresh computation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Analysis {
    pub events: Vec<DetectionEvent>,
    pub status: EngineStatus,
}

struct PipelineState {
    frame_counter: u64,
    cached: Vec<DetectionEvent>,
}

/// The vision pipeline orchestrator.
pub struct VisionEngine {
    camera: FrameSource,
    detector: Mutex<Option<Box<dyn ObjectDetector>>>,
    embedder: Mutex<Option<Box<dyn FaceEmbedder>>>,
    gallery: IdentityGallery,
    policy: ThreatPolicy,
    cadence: u64,
    min_confidence: f32,
    match_threshold: f32,
    pipeline: Mutex<PipelineState>,
}

impl VisionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            camera: FrameSource::new(config.camera),
            detector: Mutex::new(None),
            embedder: Mutex::new(None),
            gallery: IdentityGallery::new(),
            policy: config.policy,
            cadence: config.cadence.max(1),
            min_confidence: config.min_confidence,
            match_threshold: config.match_threshold,
            pipeline: Mutex::new(PipelineState {
                frame_counter: 0,
                cached: Vec::new(),
            }),
        }
    }

    /// Attach (or replace) the object detector capability.
    pub fn attach_detector(&self, mut detector: Box<dyn ObjectDetector>) {
        if let Err(err) = detector.warm_up() {
            log::warn!("detector '{}' warm-up failed: {:#}", detector.name(), err);
        }
        log::info!("detector '{}' attached", detector.name());
        *lock_unpoisoned(&self.detector) = Some(detector);
    }

    /// Attach (or replace) the face embedder capability.
    pub fn attach_embedder(&self, embedder: Box<dyn FaceEmbedder>) {
        log::info!("face embedder '{}' attached", embedder.name());
        *lock_unpoisoned(&self.embedder) = Some(embedder);
    }

    /// Start frame acquisition. Idempotent.
    pub fn start(&self) {
        self.camera.start();
    }

    /// Stop frame acquisition.
    pub fn stop(&self) {
        self.camera.stop();
    }

    /// Current capture health snapshot.
    pub fn status(&self) -> EngineStatus {
        self.camera.status()
    }

    pub fn gallery(&self) -> &IdentityGallery {
        &self.gallery
    }

    /// Administrative call: refresh known identities from a directory of
    /// enrollment images. Requires an attached embedder.
    pub fn reload_gallery(&self, dir: &Path) -> Result<usize> {
        let mut embedder = lock_unpoisoned(&self.embedder);
        let embedder = embedder
            .as_deref_mut()
            .ok_or_else(|| anyhow!("no face embedder attached; cannot reload gallery"))?;
        self.gallery.reload(dir, embedder)
    }

    /// The single polling entry point. Safe to call at any rate; actual
    /// inference is throttled to one in `cadence` calls.
    pub fn analyze(&self) -> Analysis {
        let status = self.camera.status();
        let mut pipeline = lock_unpoisoned(&self.pipeline);
        pipeline.frame_counter += 1;

        if pipeline.frame_counter % self.cadence != 0 {
            return Analysis {
                events: pipeline.cached.clone(),
                status,
            };
        }

        // Cadence frame: run a full inference pass if we can.
        let Some(frame) = self.camera.get_frame() else {
            pipeline.cached.clear();
            return Analysis {
                events: Vec::new(),
                status,
            };
        };

        let boxes = {
            let mut detector = lock_unpoisoned(&self.detector);
            let Some(detector) = detector.as_deref_mut() else {
                pipeline.cached.clear();
                return Analysis {
                    events: Vec::new(),
                    status,
                };
            };
            match detector.detect(&frame) {
                Ok(boxes) => boxes,
                Err(err) => {
                    log::warn!("object detection failed on frame {}: {:#}", frame.seq, err);
                    return Analysis {
                        events: pipeline.cached.clone(),
                        status,
                    };
                }
            }
        };
        let boxes: Vec<ObjectBox> = boxes
            .into_iter()
            .filter(|b| b.confidence >= self.min_confidence)
            .collect();

        let faces = match self.face_matches(&frame) {
            Ok(faces) => faces,
            Err(err) => {
                log::warn!("face embedding failed on frame {}: {:#}", frame.seq, err);
                return Analysis {
                    events: pipeline.cached.clone(),
                    status,
                };
            }
        };

        let events = self.build_events(&frame, boxes, &faces);
        pipeline.cached = events.clone();
        Analysis { events, status }
    }

    /// Run the embedder and resolve each observation against the gallery.
    /// Skipped entirely while the gallery is inactive or no embedder is
    /// attached.
    fn face_matches(&self, frame: &Frame) -> Result<Vec<FaceMatch>> {
        if !self.gallery.is_active() {
            return Ok(Vec::new());
        }
        let mut embedder = lock_unpoisoned(&self.embedder);
        let Some(embedder) = embedder.as_deref_mut() else {
            return Ok(Vec::new());
        };

        let observations = embedder.detect_faces(frame)?;
        Ok(observations
            .into_iter()
            .filter_map(|obs| {
                self.gallery
                    .identify(&obs.embedding, self.match_threshold)
                    .map(|identity| FaceMatch {
                        centroid: obs.bbox.centroid(),
                        identity,
                    })
            })
            .collect())
    }

    fn build_events(
        &self,
        frame: &Frame,
        boxes: Vec<ObjectBox>,
        faces: &[FaceMatch],
    ) -> Vec<DetectionEvent> {
        let width = (frame.width as f32).max(1.0);
        let height = (frame.height as f32).max(1.0);

        correlate(boxes, faces)
            .into_iter()
            .enumerate()
            .map(|(index, candidate)| {
                let classification = self.policy.classify(&candidate);
                let bbox = candidate.object.bbox;
                DetectionEvent {
                    id: format!("det_{}_{}", frame.seq, index),
                    label: classification.label,
                    confidence: candidate.object.confidence,
                    bbox: PixelBox {
                        x: bbox.x1 as i32,
                        y: bbox.y1 as i32,
                        width: bbox.width() as i32,
                        height: bbox.height() as i32,
                    },
                    bbox_normalized: [
                        bbox.x1 / width,
                        bbox.y1 / height,
                        bbox.width() / width,
                        bbox.height() / height,
                    ],
                    threat_level: classification.level,
                    identity: candidate.identity,
                    frame_seq: frame.seq,
                    timestamp_ms: frame.timestamp_ms,
                }
            })
            .collect()
    }
}
