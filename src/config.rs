use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::CameraConfig;
use crate::orchestrator::Cadence;

const DEFAULT_CAMERA_DEVICE: &str = "stub://camera0";
const DEFAULT_TARGET_FPS: u32 = 30;
const DEFAULT_CAPTURE_WIDTH: u32 = 1280;
const DEFAULT_CAPTURE_HEIGHT: u32 = 720;
const DEFAULT_MAX_WIDTH: u32 = 1280;
const DEFAULT_MAX_HEIGHT: u32 = 720;
const DEFAULT_OBJECT_INTERVAL_MS: u64 = 1_000;
const DEFAULT_FACE_INTERVAL_MS: u64 = 2_000;
const DEFAULT_WORKER_POLL_MS: u64 = 100;
const DEFAULT_JOIN_TIMEOUT_MS: u64 = 1_000;
const DEFAULT_CLASSES_FILE: &str = "data/object_classes.txt";
const DEFAULT_FACES_DIR: &str = "training_data/faces";
const DEFAULT_OBJECT_INPUT: u32 = 416;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DEFAULT_NMS_THRESHOLD: f32 = 0.4;
const DEFAULT_FACE_PROCESS_WIDTH: u32 = 320;
const DEFAULT_FACE_PROCESS_HEIGHT: u32 = 240;

#[derive(Debug, Deserialize, Default)]
struct AppConfigFile {
    camera: Option<CameraConfigFile>,
    detection: Option<DetectionConfigFile>,
    catalog: Option<CatalogConfigFile>,
    object_model: Option<ObjectModelConfigFile>,
    face: Option<FaceConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    alternate_device: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    max_width: Option<u32>,
    max_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    object_interval_ms: Option<u64>,
    face_interval_ms: Option<u64>,
    worker_poll_ms: Option<u64>,
    join_timeout_ms: Option<u64>,
    object_enabled: Option<bool>,
    face_enabled: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct CatalogConfigFile {
    classes_file: Option<PathBuf>,
    faces_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct ObjectModelConfigFile {
    path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    confidence_threshold: Option<f32>,
    nms_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct FaceConfigFile {
    process_width: Option<u32>,
    process_height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub detection: DetectionSettings,
    pub catalog: CatalogSettings,
    pub object_model: ObjectModelSettings,
    pub face: FaceSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionSettings {
    pub object_interval: Duration,
    pub face_interval: Duration,
    pub worker_poll: Duration,
    pub join_timeout: Duration,
    pub object_enabled: bool,
    pub face_enabled: bool,
}

impl DetectionSettings {
    pub fn cadence(&self) -> Cadence {
        Cadence {
            object_interval: self.object_interval,
            face_interval: self.face_interval,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSettings {
    pub classes_file: PathBuf,
    pub faces_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectModelSettings {
    /// ONNX model; without one the stub object detector is used.
    pub path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceSettings {
    pub process_width: u32,
    pub process_height: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        // All-default file sections always validate.
        Self::from_file(AppConfigFile::default())
    }
}

impl AppConfig {
    /// Load from `DUALSIGHT_CONFIG` (JSON, or TOML for `.toml` files), then
    /// apply environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = non_empty_env("DUALSIGHT_CONFIG").map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Like `load`, with an explicit config file instead of `DUALSIGHT_CONFIG`.
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

    fn from_file(file: AppConfigFile) -> Self {
        let camera = file.camera.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let catalog = file.catalog.unwrap_or_default();
        let object_model = file.object_model.unwrap_or_default();
        let face = file.face.unwrap_or_default();

        Self {
            camera: CameraConfig {
                device: camera
                    .device
                    .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
                alternate_device: camera.alternate_device,
                target_fps: camera.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
                width: camera.width.unwrap_or(DEFAULT_CAPTURE_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_CAPTURE_HEIGHT),
                max_width: camera.max_width.unwrap_or(DEFAULT_MAX_WIDTH),
                max_height: camera.max_height.unwrap_or(DEFAULT_MAX_HEIGHT),
            },
            detection: DetectionSettings {
                object_interval: Duration::from_millis(
                    detection
                        .object_interval_ms
                        .unwrap_or(DEFAULT_OBJECT_INTERVAL_MS),
                ),
                face_interval: Duration::from_millis(
                    detection.face_interval_ms.unwrap_or(DEFAULT_FACE_INTERVAL_MS),
                ),
                worker_poll: Duration::from_millis(
                    detection.worker_poll_ms.unwrap_or(DEFAULT_WORKER_POLL_MS),
                ),
                join_timeout: Duration::from_millis(
                    detection.join_timeout_ms.unwrap_or(DEFAULT_JOIN_TIMEOUT_MS),
                ),
                object_enabled: detection.object_enabled.unwrap_or(true),
                face_enabled: detection.face_enabled.unwrap_or(true),
            },
            catalog: CatalogSettings {
                classes_file: catalog
                    .classes_file
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CLASSES_FILE)),
                faces_dir: catalog
                    .faces_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_FACES_DIR)),
            },
            object_model: ObjectModelSettings {
                path: object_model.path,
                input_width: object_model.input_width.unwrap_or(DEFAULT_OBJECT_INPUT),
                input_height: object_model.input_height.unwrap_or(DEFAULT_OBJECT_INPUT),
                confidence_threshold: object_model
                    .confidence_threshold
                    .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
                nms_threshold: object_model.nms_threshold.unwrap_or(DEFAULT_NMS_THRESHOLD),
            },
            face: FaceSettings {
                process_width: face.process_width.unwrap_or(DEFAULT_FACE_PROCESS_WIDTH),
                process_height: face.process_height.unwrap_or(DEFAULT_FACE_PROCESS_HEIGHT),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(device) = non_empty_env("DUALSIGHT_CAMERA") {
            self.camera.device = device;
        }
        if let Some(device) = non_empty_env("DUALSIGHT_ALT_CAMERA") {
            self.camera.alternate_device = Some(device);
        }
        if let Some(ms) = non_empty_env("DUALSIGHT_OBJECT_INTERVAL_MS") {
            self.detection.object_interval = parse_millis("DUALSIGHT_OBJECT_INTERVAL_MS", &ms)?;
        }
        if let Some(ms) = non_empty_env("DUALSIGHT_FACE_INTERVAL_MS") {
            self.detection.face_interval = parse_millis("DUALSIGHT_FACE_INTERVAL_MS", &ms)?;
        }
        if let Some(path) = non_empty_env("DUALSIGHT_CLASSES_FILE") {
            self.catalog.classes_file = PathBuf::from(path);
        }
        if let Some(path) = non_empty_env("DUALSIGHT_FACES_DIR") {
            self.catalog.faces_dir = PathBuf::from(path);
        }
        if let Some(path) = non_empty_env("DUALSIGHT_OBJECT_MODEL") {
            self.object_model.path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be >= 1"));
        }
        non_zero_dims("camera capture size", self.camera.width, self.camera.height)?;
        non_zero_dims(
            "camera max size",
            self.camera.max_width,
            self.camera.max_height,
        )?;
        non_zero_dims(
            "object model input",
            self.object_model.input_width,
            self.object_model.input_height,
        )?;
        non_zero_dims(
            "face processing size",
            self.face.process_width,
            self.face.process_height,
        )?;
        for (name, value) in [
            ("object_interval_ms", self.detection.object_interval),
            ("face_interval_ms", self.detection.face_interval),
            ("worker_poll_ms", self.detection.worker_poll),
            ("join_timeout_ms", self.detection.join_timeout),
        ] {
            if value.is_zero() {
                return Err(anyhow!("{} must be greater than zero", name));
            }
        }
        for (name, value) in [
            ("confidence_threshold", self.object_model.confidence_threshold),
            ("nms_threshold", self.object_model.nms_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within 0..=1, got {}", name, value));
            }
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_millis(key: &str, value: &str) -> Result<Duration> {
    let ms: u64 = value
        .trim()
        .parse()
        .map_err(|_| anyhow!("{} must be an integer number of milliseconds", key))?;
    Ok(Duration::from_millis(ms))
}

fn non_zero_dims(what: &str, width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(anyhow!("{} must be non-zero, got {}x{}", what, width, height));
    }
    Ok(())
}
