use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use redmark::config::RedmarkConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "REDMARK_CONFIG",
        "REDMARK_INPUT",
        "REDMARK_OUTPUT",
        "REDMARK_MIN_AREA",
        "REDMARK_CODEC",
        "REDMARK_SNAPSHOT_DIR",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = RedmarkConfig::load().expect("load defaults");

    assert_eq!(cfg.input, "original.mp4");
    assert_eq!(cfg.output.as_deref(), Some("output.mp4"));
    assert_eq!(cfg.pipeline.min_area, 100.0);
    assert_eq!(cfg.pipeline.codec.to_string(), "mp4v");
    assert_eq!(cfg.pipeline.default_fps, 30);
    assert!(cfg.snapshot_dir.is_none());
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "input": "clips/street.mp4",
        "output": "clips/street_boxed.mp4",
        "min_area": 250,
        "codec": "XVID",
        "default_fps": 24,
        "snapshots": {
            "dir": "/tmp/redmark-previews",
            "every": 10
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("REDMARK_CONFIG", file.path());
    std::env::set_var("REDMARK_MIN_AREA", "400");
    std::env::set_var("REDMARK_CODEC", "mp4v");

    let cfg = RedmarkConfig::load().expect("load config");

    assert_eq!(cfg.input, "clips/street.mp4");
    assert_eq!(cfg.output.as_deref(), Some("clips/street_boxed.mp4"));
    assert_eq!(cfg.pipeline.min_area, 400.0);
    assert_eq!(cfg.pipeline.codec.to_string(), "mp4v");
    assert_eq!(cfg.pipeline.default_fps, 24);
    assert_eq!(
        cfg.snapshot_dir,
        Some(PathBuf::from("/tmp/redmark-previews"))
    );
    assert_eq!(cfg.snapshot_every, 10);

    clear_env();
}

#[test]
fn empty_output_env_disables_sink() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("REDMARK_INPUT", "stub://clip");
    std::env::set_var("REDMARK_OUTPUT", "");

    let cfg = RedmarkConfig::load().expect("load config");
    assert_eq!(cfg.input, "stub://clip");
    assert_eq!(cfg.output, None);

    clear_env();
}

#[test]
fn rejects_invalid_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("REDMARK_MIN_AREA", "large");
    assert!(RedmarkConfig::load().is_err());
    std::env::remove_var("REDMARK_MIN_AREA");

    std::env::set_var("REDMARK_MIN_AREA", "-5");
    assert!(RedmarkConfig::load().is_err());
    std::env::remove_var("REDMARK_MIN_AREA");

    std::env::set_var("REDMARK_CODEC", "h264x");
    assert!(RedmarkConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_malformed_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{ \"min_area\": ").expect("write config");
    std::env::set_var("REDMARK_CONFIG", file.path());

    let err = RedmarkConfig::load().unwrap_err();
    assert!(err.to_string().contains("invalid config file"));

    std::env::set_var("REDMARK_CONFIG", "/nonexistent/redmark.json");
    assert!(RedmarkConfig::load().is_err());

    clear_env();
}
