//! Gallery enrollment from a directory of one-face images.

use std::fs;
use std::path::Path;

use anyhow::Result;
use image::{Rgb, RgbImage};
use tempfile::tempdir;

use sentinel_vision::{
    CameraConfig, EngineConfig, FaceEmbedder, FaceObservation, Frame, IdentityGallery,
    StubFaceEmbedder, VisionEngine,
};

fn write_solid(path: &Path, color: [u8; 3]) {
    let image = RgbImage::from_pixel(32, 32, Rgb(color));
    image.save(path).expect("write test image");
}

/// Like the stub embedder, but reports no face in near-black images, so
/// the skip path is exercisable.
struct BrightOnlyEmbedder {
    inner: StubFaceEmbedder,
}

impl FaceEmbedder for BrightOnlyEmbedder {
    fn name(&self) -> &'static str {
        "bright-only"
    }

    fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<FaceObservation>> {
        let pixels = frame.pixels();
        if pixels.is_empty() {
            return Ok(Vec::new());
        }
        let mean = pixels.iter().map(|&p| p as u64).sum::<u64>() / pixels.len() as u64;
        if mean < 10 {
            return Ok(Vec::new());
        }
        self.inner.detect_faces(frame)
    }
}

#[test]
fn reload_enrolls_images_in_sorted_order() {
    let dir = tempdir().expect("tempdir");
    write_solid(&dir.path().join("jane_doe.png"), [255, 0, 0]);
    write_solid(&dir.path().join("john_roe.jpg"), [0, 0, 255]);
    fs::write(dir.path().join("notes.txt"), "not an image").expect("write notes");

    let gallery = IdentityGallery::new();
    let mut embedder = StubFaceEmbedder::new();
    let count = gallery.reload(dir.path(), &mut embedder).expect("reload");

    assert_eq!(count, 2);
    assert!(gallery.is_active());
    assert_eq!(gallery.labels(), vec!["Jane Doe", "John Roe"]);

    // A pure red query embedding lands on Jane Doe.
    let matched = gallery.identify(&[1.0, 0.0, 0.0], 0.5).expect("match");
    assert_eq!(matched.label, "Jane Doe");
    assert!(matched.score > 0.9);

    // A pure blue query lands on John Roe even though his enrollment
    // went through JPEG compression.
    let matched = gallery.identify(&[0.0, 0.0, 1.0], 0.5).expect("match");
    assert_eq!(matched.label, "John Roe");
}

#[test]
fn reload_skips_images_without_a_face() {
    let dir = tempdir().expect("tempdir");
    write_solid(&dir.path().join("dark_hallway.png"), [0, 0, 0]);
    write_solid(&dir.path().join("jane_doe.png"), [255, 0, 0]);

    let gallery = IdentityGallery::new();
    let mut embedder = BrightOnlyEmbedder {
        inner: StubFaceEmbedder::new(),
    };
    let count = gallery.reload(dir.path(), &mut embedder).expect("reload");

    assert_eq!(count, 1);
    assert_eq!(gallery.labels(), vec!["Jane Doe"]);
}

#[test]
fn reload_skips_undecodable_files() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("corrupt.png"), b"not a png").expect("write corrupt");
    write_solid(&dir.path().join("jane_doe.png"), [255, 0, 0]);

    let gallery = IdentityGallery::new();
    let mut embedder = StubFaceEmbedder::new();
    let count = gallery.reload(dir.path(), &mut embedder).expect("reload");

    assert_eq!(count, 1);
    assert_eq!(gallery.labels(), vec!["Jane Doe"]);
}

#[test]
fn reload_of_empty_directory_leaves_gallery_inactive() {
    let dir = tempdir().expect("tempdir");

    let gallery = IdentityGallery::new();
    let mut embedder = StubFaceEmbedder::new();
    let count = gallery.reload(dir.path(), &mut embedder).expect("reload");

    assert_eq!(count, 0);
    assert!(!gallery.is_active());
}

#[test]
fn reload_replaces_previous_entries() {
    let first = tempdir().expect("tempdir");
    write_solid(&first.path().join("jane_doe.png"), [255, 0, 0]);
    let second = tempdir().expect("tempdir");
    write_solid(&second.path().join("john_roe.png"), [0, 0, 255]);

    let gallery = IdentityGallery::new();
    let mut embedder = StubFaceEmbedder::new();
    gallery.reload(first.path(), &mut embedder).expect("reload");
    gallery.reload(second.path(), &mut embedder).expect("reload");

    assert_eq!(gallery.labels(), vec!["John Roe"]);
    assert!(gallery.identify(&[1.0, 0.0, 0.0], 0.5).is_none());
}

#[test]
fn reload_of_missing_directory_fails() {
    let gallery = IdentityGallery::new();
    let mut embedder = StubFaceEmbedder::new();
    assert!(gallery
        .reload(Path::new("/nonexistent-sentinel-gallery"), &mut embedder)
        .is_err());
}

#[test]
fn engine_reload_uses_the_attached_embedder() {
    let dir = tempdir().expect("tempdir");
    write_solid(&dir.path().join("jane_doe.png"), [255, 0, 0]);

    let engine = VisionEngine::new(EngineConfig {
        camera: CameraConfig {
            device: "stub://gallery-test".to_string(),
            ..CameraConfig::default()
        },
        ..EngineConfig::default()
    });
    engine.attach_embedder(Box::new(StubFaceEmbedder::new()));

    let count = engine.reload_gallery(dir.path()).expect("reload");
    assert_eq!(count, 1);
    assert!(engine.gallery().is_active());
}
