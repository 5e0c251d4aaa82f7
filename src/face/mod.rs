//! Face identity capability and gallery.
//!
//! The embedder itself is an external, model-backed capability; this
//! module defines the trait the engine consumes plus the gallery of
//! enrolled identities it matches against.

mod gallery;

pub use gallery::{GalleryEntry, IdentityGallery};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::detect::BBox;
use crate::frame::Frame;

/// One face found by the embedder in a single frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceObservation {
    pub bbox: BBox,
    /// Fixed-length vector, cosine-comparable across calls of the same
    /// backend.
    pub embedding: Vec<f32>,
}

/// Result of a gallery lookup that cleared the similarity threshold.
/// Lookups below the threshold return `None` instead ("Unknown").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdentityMatch {
    pub label: String,
    /// Cosine similarity of the winning entry, in `0..=1`.
    pub score: f32,
}

/// Face embedder capability.
///
/// Embedding vectors from different calls must be comparable via cosine
/// similarity. Failures surface as errors the pipeline catches and logs.
pub trait FaceEmbedder: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Find faces in a frame and embed each one.
    fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<FaceObservation>>;
}

/// Deterministic embedder for tests and the demo daemon.
///
/// Reports a single face over the frame center whose embedding is the
/// mean intensity of each color channel. Solid-color enrollment images
/// therefore embed to distinguishable, reproducible vectors.
#[derive(Default)]
pub struct StubFaceEmbedder;

impl StubFaceEmbedder {
    pub fn new() -> Self {
        Self
    }
}

impl FaceEmbedder for StubFaceEmbedder {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<FaceObservation>> {
        let pixels = frame.pixels();
        if pixels.len() < 3 {
            return Ok(Vec::new());
        }

        let mut sums = [0u64; 3];
        for px in pixels.chunks_exact(3) {
            sums[0] += px[0] as u64;
            sums[1] += px[1] as u64;
            sums[2] += px[2] as u64;
        }
        let count = (pixels.len() / 3) as f32;
        let embedding = sums
            .iter()
            .map(|&sum| sum as f32 / count / 255.0)
            .collect::<Vec<f32>>();

        let (w, h) = (frame.width as f32, frame.height as f32);
        let bbox = BBox::new(w * 0.25, h * 0.25, w * 0.75, h * 0.75);
        Ok(vec![FaceObservation { bbox, embedding }])
    }
}
