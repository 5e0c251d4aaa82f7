//! sentineld - Sentinel vision engine daemon
//!
//! This daemon:
//! 1. Acquires frames from the configured camera on a capture thread
//! 2. Polls the engine at the configured interval; inference runs on the
//!    pipeline cadence
//! 3. Prints each fresh event batch as a JSON line for downstream
//!    collectors
//!
//! The bundled stub capabilities stand in for the model-backed detector
//! and embedder until real backends are wired in.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;

use sentinel_vision::{
    BBox, ObjectBox, SentineldConfig, StubFaceEmbedder, StubObjectDetector, VisionEngine,
    PERSON_LABEL,
};

#[derive(Parser, Debug)]
#[command(name = "sentineld", about = "Sentinel vision engine daemon")]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(long, env = "SENTINEL_CONFIG")]
    config: Option<PathBuf>,

    /// Override the gallery directory.
    #[arg(long)]
    gallery: Option<PathBuf>,

    /// Override the poll interval in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = SentineldConfig::load_from(args.config.as_deref())?;
    if let Some(dir) = args.gallery {
        cfg.gallery_dir = dir;
    }
    if let Some(ms) = args.interval_ms {
        cfg.poll_interval = Duration::from_millis(ms.max(1));
    }

    let engine = VisionEngine::new(cfg.engine_config());

    // Stand-in capabilities: a motion-gated person box and the mean-color
    // embedder. Swap for model-backed implementations in deployment.
    let demo_person = ObjectBox {
        label: PERSON_LABEL.to_string(),
        confidence: 0.9,
        bbox: BBox::new(
            cfg.camera.width as f32 * 0.25,
            cfg.camera.height as f32 * 0.1,
            cfg.camera.width as f32 * 0.75,
            cfg.camera.height as f32 * 0.9,
        ),
    };
    engine.attach_detector(Box::new(StubObjectDetector::motion_gated(vec![demo_person])));
    engine.attach_embedder(Box::new(StubFaceEmbedder::new()));

    if cfg.gallery_dir.is_dir() {
        match engine.reload_gallery(&cfg.gallery_dir) {
            Ok(count) => log::info!("gallery: {} identities enrolled", count),
            Err(err) => log::warn!("gallery reload failed: {:#}", err),
        }
    } else {
        log::info!(
            "gallery directory {} missing; identity matching inactive",
            cfg.gallery_dir.display()
        );
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("install ctrl-c handler")?;
    }

    engine.start();
    log::info!(
        "sentineld running on {} (cadence {}, poll {:?})",
        cfg.camera.device,
        cfg.cadence,
        cfg.poll_interval
    );

    let stdout = std::io::stdout();
    let mut last_health_log = Instant::now();
    while running.load(Ordering::SeqCst) {
        let analysis = engine.analyze();
        if !analysis.events.is_empty() {
            let line = serde_json::to_string(&analysis)?;
            writeln!(stdout.lock(), "{line}")?;
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let status = analysis.status;
            log::info!(
                "capture health={:?} fps={} res={}x{}",
                status.capture,
                status.fps,
                status.width,
                status.height
            );
            last_health_log = Instant::now();
        }

        std::thread::sleep(cfg.poll_interval);
    }

    log::info!("shutting down");
    engine.stop();
    Ok(())
}
