//! Golden configuration fixtures (JSON contracts).

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use prism_core::{load_engine_config_from, RenderError};

const ENGINE_FULL_JSON: &str = include_str!("../fixtures/engine_full.json");
const ENGINE_MINIMAL_JSON: &str = include_str!("../fixtures/engine_minimal.json");
const ENGINE_NOT_JSON: &str = include_str!("../fixtures/engine_not_json.txt");
const ENGINE_ZERO_SIZE_JSON: &str = include_str!("../fixtures/engine_zero_size.json");

fn write_temp_fixture(name: &str, contents: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_nanos();
    p.push(format!("prism_contract_tests_{name}_{ts}.json"));
    fs::write(&p, contents).expect("write fixture");
    p
}

#[test]
fn golden_full_config_loads() {
    let path = write_temp_fixture("engine_full", ENGINE_FULL_JSON);

    let cfg = load_engine_config_from(&path).expect("engine_full.json should load");
    assert_eq!((cfg.width, cfg.height), (1920, 1080));
    assert_eq!(cfg.fps_limit, Some(60));
    assert_eq!(cfg.mode_addr, "127.0.0.1:6666");
    assert_eq!(cfg.shader_root, PathBuf::from("data"));

    let _ = fs::remove_file(path);
}

#[test]
fn golden_minimal_config_gets_defaults() {
    let path = write_temp_fixture("engine_minimal", ENGINE_MINIMAL_JSON);

    let cfg = load_engine_config_from(&path).expect("engine_minimal.json should load");
    assert_eq!((cfg.width, cfg.height), (960, 540));
    assert_eq!(cfg.fps_limit, None);
    assert_eq!(cfg.param_addr, "127.0.0.1:9000");

    let _ = fs::remove_file(path);
}

#[test]
fn golden_malformed_config_is_a_json_error() {
    let path = write_temp_fixture("engine_not_json", ENGINE_NOT_JSON);

    match load_engine_config_from(&path) {
        Err(RenderError::Json { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected Json error, got {other:?}"),
    }

    let _ = fs::remove_file(path);
}

#[test]
fn golden_zero_resolution_is_rejected() {
    let path = write_temp_fixture("engine_zero_size", ENGINE_ZERO_SIZE_JSON);

    match load_engine_config_from(&path) {
        Err(RenderError::InvalidConfig { msg, .. }) => {
            assert!(msg.contains("resolution"), "unexpected msg: {msg}")
        }
        other => panic!("expected InvalidConfig, got {other:?}"),
    }

    let _ = fs::remove_file(path);
}

#[test]
fn missing_file_is_an_io_error() {
    let mut path = std::env::temp_dir();
    path.push("prism_contract_tests_definitely_absent.json");
    assert!(matches!(
        load_engine_config_from(&path),
        Err(RenderError::Io { .. })
    ));
}
