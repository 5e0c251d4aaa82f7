//! Identity gallery.
//!
//! The gallery holds the enrolled (label, embedding) pairs used for
//! identity matching. Reload rebuilds a complete snapshot off-lock and
//! publishes it atomically, so `identify` callers on other threads never
//! observe a partially loaded gallery.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{anyhow, Context, Result};

use super::{FaceEmbedder, IdentityMatch};
use crate::frame::Frame;

const GALLERY_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// One enrolled identity. Immutable between reloads.
#[derive(Clone, Debug)]
pub struct GalleryEntry {
    pub label: String,
    pub embedding: Vec<f32>,
    /// Enrollment image the embedding came from.
    pub source: PathBuf,
}

#[derive(Default)]
struct GallerySnapshot {
    entries: Vec<GalleryEntry>,
}

/// Thread-safe set of known identities with nearest-match lookup.
#[derive(Default)]
pub struct IdentityGallery {
    snapshot: RwLock<Arc<GallerySnapshot>>,
}

impl IdentityGallery {
    /// Empty, inactive gallery.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gallery is active once at least one identity is enrolled.
    pub fn is_active(&self) -> bool {
        !self.current().entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.current().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current().entries.is_empty()
    }

    /// Enrolled labels in gallery order.
    pub fn labels(&self) -> Vec<String> {
        self.current()
            .entries
            .iter()
            .map(|entry| entry.label.clone())
            .collect()
    }

    /// Publish a pre-computed set of entries, replacing the current
    /// gallery. Used by tests and by callers that cache embeddings.
    pub fn install_entries(&self, entries: Vec<GalleryEntry>) {
        self.publish(GallerySnapshot { entries });
    }

    /// Clear and repopulate the gallery from a directory of one-face
    /// enrollment images (`*.jpg`, `*.jpeg`, `*.png`), scanned in sorted
    /// filename order. The label comes from the filename: stem,
    /// underscores to spaces, title-cased.
    ///
    /// Files that fail to decode or contain no face are skipped with a
    /// warning; the reload continues with the remaining files. Returns
    /// the number of identities enrolled.
    pub fn reload(&self, dir: &Path, embedder: &mut dyn FaceEmbedder) -> Result<usize> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("read gallery directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| has_gallery_extension(path))
            .collect();
        paths.sort();

        let mut entries = Vec::new();
        for path in paths {
            match enroll_file(&path, embedder) {
                Ok(entry) => {
                    log::info!("gallery: enrolled '{}' from {}", entry.label, path.display());
                    entries.push(entry);
                }
                Err(err) => {
                    log::warn!("gallery: skipping {}: {:#}", path.display(), err);
                }
            }
        }

        let count = entries.len();
        self.publish(GallerySnapshot { entries });
        if count == 0 {
            log::warn!(
                "gallery: no identities loaded from {}; matching inactive",
                dir.display()
            );
        } else {
            log::info!("gallery: {} identities active", count);
        }
        Ok(count)
    }

    /// Nearest-match lookup by cosine similarity.
    ///
    /// Returns the entry with the maximum similarity if it is strictly
    /// above `threshold`, otherwise `None`. Ties at the maximum go to the
    /// first entry in gallery order.
    pub fn identify(&self, embedding: &[f32], threshold: f32) -> Option<IdentityMatch> {
        let snapshot = self.current();

        let mut best: Option<(&GalleryEntry, f32)> = None;
        for entry in &snapshot.entries {
            let score = cosine_similarity(embedding, &entry.embedding);
            // Strictly greater keeps the first entry on ties.
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((entry, score));
            }
        }

        best.filter(|&(_, score)| score > threshold)
            .map(|(entry, score)| IdentityMatch {
                label: entry.label.clone(),
                score,
            })
    }

    fn current(&self) -> Arc<GallerySnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, snapshot: GallerySnapshot) {
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
    }
}

fn has_gallery_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            GALLERY_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

fn enroll_file(path: &Path, embedder: &mut dyn FaceEmbedder) -> Result<GalleryEntry> {
    let image = image::open(path)
        .with_context(|| format!("decode enrollment image {}", path.display()))?
        .to_rgb8();
    let (width, height) = image.dimensions();
    let frame = Frame::new(image.into_raw(), width, height, 0, 0);

    let faces = embedder.detect_faces(&frame)?;
    let face = faces
        .into_iter()
        .max_by(|a, b| a.bbox.area().total_cmp(&b.bbox.area()))
        .ok_or_else(|| anyhow!("no face found"))?;

    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| anyhow!("unusable file name"))?;

    Ok(GalleryEntry {
        label: label_from_stem(stem),
        embedding: face.embedding,
        source: path.to_path_buf(),
    })
}

/// "jane_doe" -> "Jane Doe"
fn label_from_stem(stem: &str) -> String {
    stem.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
