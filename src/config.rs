use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::capture::CameraConfig;
use crate::engine::EngineConfig;
use crate::threat::ThreatPolicy;

const DEFAULT_CAMERA_DEVICE: &str = "stub://camera0";
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_CADENCE: u64 = 5;
const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;
const DEFAULT_MATCH_THRESHOLD: f32 = 0.5;
const DEFAULT_GALLERY_DIR: &str = "assets/known_faces";
const DEFAULT_POLL_INTERVAL_MS: u64 = 33;

#[derive(Debug, Deserialize, Default)]
struct SentineldConfigFile {
    camera: Option<CameraConfigFile>,
    pipeline: Option<PipelineConfigFile>,
    threat: Option<ThreatConfigFile>,
    gallery: Option<GalleryConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    cadence: Option<u64>,
    min_confidence: Option<f32>,
    match_threshold: Option<f32>,
    poll_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ThreatConfigFile {
    weapon_classes: Option<Vec<String>>,
    flag_unidentified_persons: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct GalleryConfigFile {
    dir: Option<PathBuf>,
}

/// Daemon configuration: JSON file (pointed to by `SENTINEL_CONFIG` or
/// `--config`) with per-field environment overrides.
#[derive(Debug, Clone)]
pub struct SentineldConfig {
    pub camera: CameraConfig,
    pub cadence: u64,
    pub min_confidence: f32,
    pub match_threshold: f32,
    pub weapon_classes: Vec<String>,
    pub flag_unidentified_persons: bool,
    pub gallery_dir: PathBuf,
    pub poll_interval: Duration,
}

impl SentineldConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SENTINEL_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SentineldConfigFile) -> Self {
        let camera = CameraConfig {
            device: file
                .camera
                .as_ref()
                .and_then(|camera| camera.device.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
            target_fps: file
                .camera
                .as_ref()
                .and_then(|camera| camera.target_fps)
                .unwrap_or(DEFAULT_CAMERA_FPS),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: file
                .camera
                .as_ref()
                .and_then(|camera| camera.height)
                .unwrap_or(DEFAULT_CAMERA_HEIGHT),
        };
        let default_policy = ThreatPolicy::default();
        Self {
            camera,
            cadence: file
                .pipeline
                .as_ref()
                .and_then(|pipeline| pipeline.cadence)
                .unwrap_or(DEFAULT_CADENCE),
            min_confidence: file
                .pipeline
                .as_ref()
                .and_then(|pipeline| pipeline.min_confidence)
                .unwrap_or(DEFAULT_MIN_CONFIDENCE),
            match_threshold: file
                .pipeline
                .as_ref()
                .and_then(|pipeline| pipeline.match_threshold)
                .unwrap_or(DEFAULT_MATCH_THRESHOLD),
            weapon_classes: file
                .threat
                .as_ref()
                .and_then(|threat| threat.weapon_classes.clone())
                .unwrap_or(default_policy.weapon_classes),
            flag_unidentified_persons: file
                .threat
                .as_ref()
                .and_then(|threat| threat.flag_unidentified_persons)
                .unwrap_or(default_policy.flag_unidentified_persons),
            gallery_dir: file
                .gallery
                .and_then(|gallery| gallery.dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_GALLERY_DIR)),
            poll_interval: Duration::from_millis(
                file.pipeline
                    .and_then(|pipeline| pipeline.poll_interval_ms)
                    .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("SENTINEL_CAMERA_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(cadence) = std::env::var("SENTINEL_CADENCE") {
            self.cadence = cadence
                .parse()
                .map_err(|_| anyhow!("SENTINEL_CADENCE must be an integer frame count"))?;
        }
        if let Ok(threshold) = std::env::var("SENTINEL_MATCH_THRESHOLD") {
            self.match_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("SENTINEL_MATCH_THRESHOLD must be a number"))?;
        }
        if let Ok(dir) = std::env::var("SENTINEL_GALLERY_DIR") {
            if !dir.trim().is_empty() {
                self.gallery_dir = PathBuf::from(dir);
            }
        }
        if let Ok(classes) = std::env::var("SENTINEL_WEAPON_CLASSES") {
            let parsed = split_csv(&classes);
            if !parsed.is_empty() {
                self.weapon_classes = parsed;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.cadence == 0 {
            return Err(anyhow!("pipeline cadence must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(anyhow!("min_confidence must be within 0..=1"));
        }
        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(anyhow!("match_threshold must be within 0..=1"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera resolution must be non-zero"));
        }
        if self.poll_interval.is_zero() {
            return Err(anyhow!("poll interval must be greater than zero"));
        }
        Ok(())
    }

    /// Engine view of this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            camera: self.camera.clone(),
            cadence: self.cadence,
            min_confidence: self.min_confidence,
            match_threshold: self.match_threshold,
            policy: ThreatPolicy {
                weapon_classes: self.weapon_classes.clone(),
                flag_unidentified_persons: self.flag_unidentified_persons,
            },
        }
    }
}

fn read_config_file(path: &Path) -> Result<SentineldConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
