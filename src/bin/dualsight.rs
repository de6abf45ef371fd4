//! dualsight - live object detection + face identification
//!
//! This binary:
//! 1. Loads configuration and the combined class catalog
//! 2. Opens the camera (stub:// or V4L2)
//! 3. Starts the background identification worker
//! 4. Runs the dual-cadence detection loop on the main thread
//! 5. Shuts down on `q`, Ctrl-C/SIGTERM, or camera failure
//!
//! Keys (type then Enter): q quit, o object detection, f face
//! identification, c switch camera.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossbeam_channel::{unbounded, Sender};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dualsight::{
    AppConfig, CameraSource, ClassCatalog, ControlEvent, Detector, DetectorToggles, FrameSource,
    LogSink, Session, SessionOptions, StubFaceIdentifier, StubObjectDetector,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Fuse object detection and face identification on a live camera")]
struct Args {
    /// JSON or TOML configuration file.
    #[arg(long, env = "DUALSIGHT_CONFIG")]
    config: Option<PathBuf>,

    /// Camera device (overrides config), e.g. /dev/video0 or stub://camera0.
    #[arg(long)]
    camera: Option<String>,

    /// Alternate camera used by the `c` key.
    #[arg(long)]
    alt_camera: Option<String>,

    /// Start with object detection disabled.
    #[arg(long)]
    no_object: bool,

    /// Start with face identification disabled.
    #[arg(long)]
    no_face: bool,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// How often the annotation log may print, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    log_interval_ms: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = AppConfig::load_from(args.config.as_deref())?;
    if let Some(camera) = args.camera.clone() {
        cfg.camera.device = camera;
    }
    if let Some(alt) = args.alt_camera.clone() {
        cfg.camera.alternate_device = Some(alt);
    }
    if args.no_object {
        cfg.detection.object_enabled = false;
    }
    if args.no_face {
        cfg.detection.face_enabled = false;
    }
    cfg.validate()?;

    let catalog = ClassCatalog::load(&cfg.catalog.classes_file, &cfg.catalog.faces_dir)?;
    let object_detector = build_object_detector(&cfg, &catalog)?;
    let face_identifier: Box<dyn Detector> = Box::new(
        StubFaceIdentifier::new(catalog.identity_count())
            .with_input_size(cfg.face.process_width, cfg.face.process_height),
    );
    log::warn!("no face identification backend compiled in; using the stub identifier");

    let mut source = CameraSource::new(cfg.camera.clone())?;
    source
        .connect()
        .with_context(|| format!("failed to open camera {}", cfg.camera.device))?;

    let (event_tx, event_rx) = unbounded();
    let signal_tx = event_tx.clone();
    ctrlc::set_handler(move || {
        let _ = signal_tx.send(ControlEvent::Terminate);
    })
    .context("error setting Ctrl-C handler")?;
    spawn_key_reader(event_tx)?;

    let toggles = Arc::new(DetectorToggles::new(
        cfg.detection.object_enabled,
        cfg.detection.face_enabled,
    ));
    let options = SessionOptions {
        cadence: cfg.detection.cadence(),
        worker_poll: cfg.detection.worker_poll,
        join_timeout: cfg.detection.join_timeout,
        max_frames: args.max_frames,
    };
    let session = start_or_release(&mut source, || {
        Session::start(object_detector, face_identifier, &catalog, toggles, options)
    })?;
    let mut sink = LogSink::new(catalog, Duration::from_millis(args.log_interval_ms));

    log::info!("controls: [q]uit [c]amera [f]ace [o]bject");
    let summary = session.run(&mut source, &mut sink, &event_rx)?;
    log::info!(
        "stopped after {} frames ({}); object runs={}, face results={}",
        summary.frames,
        summary.reason,
        summary.orchestrator.object_runs,
        summary.orchestrator.face_results
    );
    Ok(())
}

fn build_object_detector(cfg: &AppConfig, catalog: &ClassCatalog) -> Result<Box<dyn Detector>> {
    let model = &cfg.object_model;
    match &model.path {
        None => {
            log::warn!("no object model configured; using the stub object detector");
            Ok(Box::new(
                StubObjectDetector::new(catalog.object_count())
                    .with_input_size(model.input_width, model.input_height),
            ))
        }
        #[cfg(feature = "backend-tract")]
        Some(path) => {
            let detector = dualsight::TractObjectDetector::new(
                path,
                dualsight::TractObjectConfig {
                    input_width: model.input_width,
                    input_height: model.input_height,
                    confidence_threshold: model.confidence_threshold,
                    nms_threshold: model.nms_threshold,
                },
            )?;
            log::info!("object model loaded from {}", path.display());
            Ok(Box::new(detector))
        }
        #[cfg(not(feature = "backend-tract"))]
        Some(path) => Err(anyhow!(
            "object model {} requires the backend-tract feature",
            path.display()
        )),
    }
}

/// Start the session on an already-open source, releasing the source if the
/// session cannot start.
fn start_or_release(
    source: &mut dyn FrameSource,
    start: impl FnOnce() -> Result<Session>,
) -> Result<Session> {
    start().map_err(|err| {
        source.release();
        err
    })
}

/// Forward single-letter commands from stdin. EOF ends the reader, not the run.
fn spawn_key_reader(events: Sender<ControlEvent>) -> Result<()> {
    std::thread::Builder::new()
        .name("key-reader".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                for event in line.chars().filter_map(ControlEvent::from_key) {
                    if events.send(event).is_err() {
                        return;
                    }
                }
            }
        })
        .map_err(|e| anyhow!("failed to spawn key reader: {}", e))?;
    Ok(())
}
