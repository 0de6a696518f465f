//! Loading and persisting optimizer options as JSON files.

use thorn_core::config::{OptimizationLevel, OptimizerOptions};
use thorn_core::errors::OptimizeError;

#[test]
fn test_roundtrip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("optimizer.json");

    OptimizerOptions::init_file(&path).unwrap();
    let loaded = OptimizerOptions::from_file(&path).unwrap();
    assert_eq!(loaded.level, OptimizationLevel::O0);
    assert!(!loaded.debug);
    assert!(loaded.disabled_passes.is_empty());
}

#[test]
fn test_load_partial_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("optimizer.json");
    std::fs::write(&path, r#"{"level": "O2"}"#).unwrap();

    let loaded = OptimizerOptions::from_file(&path).unwrap();
    assert_eq!(loaded.level, OptimizationLevel::O2);
    assert!(!loaded.validate);
    assert!(loaded.pass_settings.is_empty());
}

#[test]
fn test_load_full_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("optimizer.json");
    std::fs::write(
        &path,
        r#"{
            "level": "O3",
            "debug": true,
            "validate": true,
            "enabledPasses": ["function-inlining"],
            "disabledPasses": ["tail-call-optimization"],
            "passSettings": [
                {"pass": "function-inlining", "key": "threshold", "value": "12"}
            ]
        }"#,
    )
    .unwrap();

    let loaded = OptimizerOptions::from_file(&path).unwrap();
    assert_eq!(loaded.level, OptimizationLevel::O3);
    assert!(loaded.debug);
    assert!(loaded.validate);

    let context = loaded.build_context();
    assert!(context.is_pass_enabled("function-inlining"));
    assert!(context.is_pass_disabled("tail-call-optimization"));
    assert_eq!(
        context.pass_setting_int("function-inlining", "threshold", 5),
        12
    );
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does-not-exist.json");
    let err = OptimizerOptions::from_file(&path).unwrap_err();
    assert!(matches!(err, OptimizeError::Io(_)));
}

#[test]
fn test_malformed_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("optimizer.json");
    std::fs::write(&path, "{not json").unwrap();
    let err = OptimizerOptions::from_file(&path).unwrap_err();
    assert!(matches!(err, OptimizeError::Config(_)));
}

#[test]
fn test_invalid_level_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("optimizer.json");
    std::fs::write(&path, r#"{"level": "O9"}"#).unwrap();
    assert!(OptimizerOptions::from_file(&path).is_err());
}
