//! End-to-end pipeline tests against the synthetic camera.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use sentinel_vision::{
    Analysis, BBox, CameraConfig, CaptureStatus, EngineConfig, FaceEmbedder, FaceObservation,
    Frame, GalleryEntry, ObjectBox, ObjectDetector, PixelBox, ThreatLevel, VisionEngine,
    PERSON_LABEL,
};

const WAIT: Duration = Duration::from_secs(5);

fn fast_camera() -> CameraConfig {
    CameraConfig {
        device: "stub://pipeline-test".to_string(),
        target_fps: 120,
        width: 160,
        height: 120,
    }
}

fn engine_config(cadence: u64) -> EngineConfig {
    EngineConfig {
        camera: fast_camera(),
        cadence,
        ..EngineConfig::default()
    }
}

fn person_box() -> ObjectBox {
    ObjectBox {
        label: PERSON_LABEL.to_string(),
        confidence: 0.82,
        bbox: BBox::new(10.0, 10.0, 110.0, 110.0),
    }
}

/// Poll `analyze()` until it returns a non-empty batch; that call was an
/// inference pass, so the cadence counter is aligned afterwards.
fn analyze_until_events(engine: &VisionEngine) -> Analysis {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        let analysis = engine.analyze();
        if !analysis.events.is_empty() {
            return analysis;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("pipeline never produced events");
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

struct CountingDetector {
    calls: Arc<AtomicUsize>,
    boxes: Vec<ObjectBox>,
}

impl ObjectDetector for CountingDetector {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<ObjectBox>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.boxes.clone())
    }
}

/// Plays back a fixed per-pass script, then keeps returning nothing.
struct ScriptedDetector {
    script: VecDeque<Result<Vec<ObjectBox>>>,
}

impl ObjectDetector for ScriptedDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<ObjectBox>> {
        self.script.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

struct FixedFaceEmbedder {
    faces: Vec<FaceObservation>,
}

impl FaceEmbedder for FixedFaceEmbedder {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn detect_faces(&mut self, _frame: &Frame) -> Result<Vec<FaceObservation>> {
        Ok(self.faces.clone())
    }
}

fn jane_doe_gallery(engine: &VisionEngine) {
    engine.gallery().install_entries(vec![GalleryEntry {
        label: "Jane Doe".to_string(),
        embedding: vec![1.0, 0.0],
        source: "jane_doe.png".into(),
    }]);
}

/// Embedding whose cosine similarity against Jane Doe's entry is 0.8.
fn jane_like_embedding() -> Vec<f32> {
    vec![0.8, 0.6]
}

#[test]
fn cadence_runs_one_inference_in_n_calls() {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = VisionEngine::new(engine_config(5));
    engine.attach_detector(Box::new(CountingDetector {
        calls: Arc::clone(&calls),
        boxes: vec![person_box()],
    }));
    engine.start();

    let baseline = analyze_until_events(&engine);
    let count_at_baseline = calls.load(Ordering::SeqCst);

    // The next N-1 calls reuse the cached batch, byte for byte.
    for _ in 0..4 {
        let analysis = engine.analyze();
        assert_eq!(analysis.events, baseline.events);
    }
    assert_eq!(calls.load(Ordering::SeqCst), count_at_baseline);

    // The Nth call runs inference again.
    let fresh = engine.analyze();
    assert_eq!(calls.load(Ordering::SeqCst), count_at_baseline + 1);
    assert!(!fresh.events.is_empty());

    engine.stop();
}

#[test]
fn cadence_of_one_runs_inference_every_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = VisionEngine::new(engine_config(1));
    engine.attach_detector(Box::new(CountingDetector {
        calls: Arc::clone(&calls),
        boxes: vec![person_box()],
    }));
    engine.start();

    analyze_until_events(&engine);
    let before = calls.load(Ordering::SeqCst);
    for _ in 0..5 {
        engine.analyze();
    }
    assert_eq!(calls.load(Ordering::SeqCst), before + 5);

    engine.stop();
}

#[test]
fn detector_error_retains_previous_batch() {
    let engine = VisionEngine::new(engine_config(1));
    engine.attach_detector(Box::new(ScriptedDetector {
        script: VecDeque::from([
            Ok(vec![person_box()]),
            Err(anyhow!("inference backend fell over")),
            Ok(Vec::new()),
        ]),
    }));
    engine.start();

    // Pass 1 computes a batch.
    let first = analyze_until_events(&engine);

    // Pass 2 errors: the previous batch comes back unchanged.
    let errored = engine.analyze();
    assert_eq!(errored.events, first.events);

    // Pass 3 succeeds with zero boxes: the cache is replaced.
    let recovered = engine.analyze();
    assert!(recovered.events.is_empty());

    engine.stop();
}

#[test]
fn missing_detector_degrades_to_empty_batches() {
    let engine = VisionEngine::new(engine_config(1));
    engine.start();
    assert!(wait_until(|| engine.status().capture == CaptureStatus::Active));

    for _ in 0..10 {
        let analysis = engine.analyze();
        assert!(analysis.events.is_empty());
    }
    // Status telemetry stays live in the degraded mode.
    assert_eq!(engine.status().capture, CaptureStatus::Active);

    engine.stop();
}

#[test]
fn identified_person_event_is_critical_with_identity() {
    let engine = VisionEngine::new(engine_config(1));
    jane_doe_gallery(&engine);
    engine.attach_detector(Box::new(CountingDetector {
        calls: Arc::new(AtomicUsize::new(0)),
        boxes: vec![person_box()],
    }));
    // Face centroid (50, 50), strictly inside the person box.
    engine.attach_embedder(Box::new(FixedFaceEmbedder {
        faces: vec![FaceObservation {
            bbox: BBox::new(40.0, 40.0, 60.0, 60.0),
            embedding: jane_like_embedding(),
        }],
    }));
    engine.start();

    let analysis = analyze_until_events(&engine);
    assert_eq!(analysis.events.len(), 1);
    let event = &analysis.events[0];

    assert_eq!(event.threat_level, ThreatLevel::Critical);
    assert_eq!(event.label, "SUSPECT: Jane Doe");
    assert_eq!(
        event.bbox,
        PixelBox {
            x: 10,
            y: 10,
            width: 100,
            height: 100
        }
    );
    let identity = event.identity.as_ref().expect("identity attached");
    assert_eq!(identity.label, "Jane Doe");
    assert!((identity.score - 0.8).abs() < 1e-4);
    assert!(event.id.starts_with("det_"));
    assert!(event.frame_seq > 0);

    engine.stop();
}

#[test]
fn face_outside_person_box_leaves_person_suspicious() {
    let engine = VisionEngine::new(engine_config(1));
    jane_doe_gallery(&engine);
    engine.attach_detector(Box::new(CountingDetector {
        calls: Arc::new(AtomicUsize::new(0)),
        boxes: vec![person_box()],
    }));
    // Face centroid (200, 200), outside the person box.
    engine.attach_embedder(Box::new(FixedFaceEmbedder {
        faces: vec![FaceObservation {
            bbox: BBox::new(190.0, 190.0, 210.0, 210.0),
            embedding: jane_like_embedding(),
        }],
    }));
    engine.start();

    let analysis = analyze_until_events(&engine);
    let event = &analysis.events[0];
    assert_eq!(event.threat_level, ThreatLevel::Suspicious);
    assert_eq!(event.label, PERSON_LABEL);
    assert!(event.identity.is_none());

    engine.stop();
}

#[test]
fn embedder_error_retains_previous_batch() {
    struct FailingEmbedder;
    impl FaceEmbedder for FailingEmbedder {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn detect_faces(&mut self, _frame: &Frame) -> Result<Vec<FaceObservation>> {
            Err(anyhow!("embedder unavailable"))
        }
    }

    let engine = VisionEngine::new(engine_config(1));
    engine.attach_detector(Box::new(CountingDetector {
        calls: Arc::new(AtomicUsize::new(0)),
        boxes: vec![person_box()],
    }));
    engine.start();

    // Gallery inactive: embedder is skipped, so a batch gets computed.
    let first = analyze_until_events(&engine);

    // Activate the gallery and attach the failing embedder: every later
    // pass errors and returns the old batch.
    jane_doe_gallery(&engine);
    engine.attach_embedder(Box::new(FailingEmbedder));
    let errored = engine.analyze();
    assert_eq!(errored.events, first.events);

    engine.stop();
}

#[test]
fn boxes_below_confidence_floor_are_dropped() {
    let engine = VisionEngine::new(EngineConfig {
        min_confidence: 0.5,
        ..engine_config(1)
    });
    let mut faint = person_box();
    faint.confidence = 0.2;
    engine.attach_detector(Box::new(CountingDetector {
        calls: Arc::new(AtomicUsize::new(0)),
        boxes: vec![faint, person_box()],
    }));
    engine.start();

    let analysis = analyze_until_events(&engine);
    assert_eq!(analysis.events.len(), 1);
    assert!((analysis.events[0].confidence - 0.82).abs() < 1e-6);

    engine.stop();
}

#[test]
fn reload_gallery_requires_an_embedder() {
    let engine = VisionEngine::new(engine_config(1));
    let err = engine
        .reload_gallery(Path::new("/nonexistent"))
        .expect_err("no embedder attached");
    assert!(err.to_string().contains("no face embedder"));
}
