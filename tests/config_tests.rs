// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use filter_preview::Config;
use filter_preview::config::SourceConfig;
use filter_preview::errors::{ConfigurationError, PipelineError};
use std::time::Duration;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!((config.width, config.height), (640, 480));
    assert_eq!(config.framerate, 30);
    assert_eq!(config.effect_index, 0);
    assert_eq!(config.source, SourceConfig::Synthetic);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = Config {
        effect_index: 7,
        source: SourceConfig::V4l2 {
            device: "/dev/video2".to_string(),
        },
        ..Config::default()
    };
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = Config::load_from(&dir.path().join("absent.json")).unwrap();
    assert_eq!(loaded, Config::default());
}

#[test]
fn test_partial_file_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "effect_index": 3 }"#).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.effect_index, 3);
    assert_eq!(loaded.width, Config::default().width);
}

#[test]
fn test_malformed_file_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(
        Config::load_from(&path),
        Err(PipelineError::Configuration(ConfigurationError::Parse(_)))
    ));
}

#[test]
fn test_invalid_geometry_rejected() {
    let config = Config {
        width: 0,
        ..Config::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigurationError::InvalidGeometry(_))
    ));
}

#[test]
fn test_source_serialization() {
    let json = serde_json::to_string(&SourceConfig::V4l2 {
        device: "/dev/video0".to_string(),
    })
    .unwrap();
    assert_eq!(json, r#"{"kind":"v4l2","device":"/dev/video0"}"#);

    let synthetic: SourceConfig = serde_json::from_str(r#"{"kind":"synthetic"}"#).unwrap();
    assert_eq!(synthetic, SourceConfig::Synthetic);
}

#[test]
fn test_lock_timeouts_from_config() {
    let config = Config {
        switch_timeout_ms: 250,
        render_timeout_ms: 100,
        ..Config::default()
    };
    let timeouts = config.lock_timeouts();
    assert_eq!(timeouts.switch, Duration::from_millis(250));
    assert_eq!(timeouts.render, Duration::from_millis(100));
}
