use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use dualsight::config::AppConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "DUALSIGHT_CONFIG",
        "DUALSIGHT_CAMERA",
        "DUALSIGHT_ALT_CAMERA",
        "DUALSIGHT_OBJECT_INTERVAL_MS",
        "DUALSIGHT_FACE_INTERVAL_MS",
        "DUALSIGHT_CLASSES_FILE",
        "DUALSIGHT_FACES_DIR",
        "DUALSIGHT_OBJECT_MODEL",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "camera": {
            "device": "/dev/video0",
            "alternate_device": "/dev/video1",
            "target_fps": 15,
            "max_width": 960,
            "max_height": 540
        },
        "detection": {
            "object_interval_ms": 500,
            "face_interval_ms": 1500,
            "face_enabled": false
        },
        "catalog": {
            "classes_file": "models/coco.names",
            "faces_dir": "people"
        },
        "object_model": {
            "input_width": 320,
            "input_height": 320,
            "confidence_threshold": 0.6
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("DUALSIGHT_CONFIG", file.path());
    std::env::set_var("DUALSIGHT_CAMERA", "stub://bench");
    std::env::set_var("DUALSIGHT_FACE_INTERVAL_MS", "2500");
    std::env::set_var("DUALSIGHT_OBJECT_MODEL", "models/yolo.onnx");

    let cfg = AppConfig::load().expect("load config");

    assert_eq!(cfg.camera.device, "stub://bench");
    assert_eq!(cfg.camera.alternate_device.as_deref(), Some("/dev/video1"));
    assert_eq!(cfg.camera.target_fps, 15);
    assert_eq!(cfg.camera.max_width, 960);
    assert_eq!(cfg.camera.max_height, 540);
    assert_eq!(cfg.detection.object_interval, Duration::from_millis(500));
    assert_eq!(cfg.detection.face_interval, Duration::from_millis(2500));
    assert!(cfg.detection.object_enabled);
    assert!(!cfg.detection.face_enabled);
    assert_eq!(cfg.catalog.classes_file, PathBuf::from("models/coco.names"));
    assert_eq!(cfg.catalog.faces_dir, PathBuf::from("people"));
    assert_eq!(cfg.object_model.path, Some(PathBuf::from("models/yolo.onnx")));
    assert_eq!(cfg.object_model.input_width, 320);
    assert_eq!(cfg.object_model.confidence_threshold, 0.6);

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
        [camera]
        device = "/dev/video2"

        [detection]
        object_interval_ms = 250
        object_enabled = false

        [face]
        process_width = 160
        process_height = 120
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    let cfg = AppConfig::load_from(Some(file.path())).expect("load config");

    assert_eq!(cfg.camera.device, "/dev/video2");
    assert_eq!(cfg.detection.object_interval, Duration::from_millis(250));
    assert_eq!(cfg.detection.face_interval, Duration::from_secs(2));
    assert!(!cfg.detection.object_enabled);
    assert_eq!(cfg.face.process_width, 160);
    assert_eq!(cfg.face.process_height, 120);

    clear_env();
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = AppConfig::load().expect("load defaults");
    assert_eq!(cfg, AppConfig::default());
    assert_eq!(cfg.detection.object_interval, Duration::from_secs(1));
    assert_eq!(cfg.detection.face_interval, Duration::from_secs(2));
    assert!(cfg.object_model.path.is_none());
}

#[test]
fn rejects_bad_interval_override() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("DUALSIGHT_OBJECT_INTERVAL_MS", "soon");
    assert!(AppConfig::load().is_err());

    std::env::set_var("DUALSIGHT_OBJECT_INTERVAL_MS", "0");
    let err = AppConfig::load().unwrap_err();
    assert!(err.to_string().contains("object_interval_ms"));

    clear_env();
}

#[test]
fn rejects_malformed_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{ \"camera\": ").expect("write config");
    let err = AppConfig::load_from(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("invalid config file"));

    clear_env();
}
