//! Unit tests for configuration module
//!
//! Tests configuration parsing, validation, serialization/deserialization,
//! and edge cases in configuration handling.

use super::*;
use anyhow::Result;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_default_configuration_is_valid() {
    let config = SeatConfig::default();

    assert!(config.validate().is_ok());
    assert_eq!(config.seat.name, "seat0");
    assert_eq!(config.keyboard.repeat_rate, 40);
    assert_eq!(config.keyboard.repeat_delay, 400);
    assert!(config.keyboard.use_keymap_engine);
    assert_eq!(config.pointer.initial_x, 100.0);
    assert_eq!(config.pointer.initial_y, 100.0);
}

#[test]
fn test_configuration_serialization_roundtrip() -> Result<()> {
    let original_config = SeatConfig::default();

    let toml_string = toml::to_string(&original_config)?;
    let deserialized_config: SeatConfig = toml::from_str(&toml_string)?;

    assert_eq!(original_config, deserialized_config);

    Ok(())
}

#[test]
fn test_configuration_from_file() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("seat.toml");

    let test_config = r#"
[seat]
name = "seat-left"

[keyboard]
repeat_rate = 30
repeat_delay = 250
use_keymap_engine = true

[keyboard.xkb]
rules = "evdev"
model = "pc104"
layout = "de"
variant = "nodeadkeys"
options = "caps:escape"

[pointer]
initial_x = 640.0
initial_y = 360.5
"#;

    fs::write(&file_path, test_config)?;

    let config = SeatConfig::load(&file_path)?;

    assert_eq!(config.seat.name, "seat-left");
    assert_eq!(config.keyboard.repeat_rate, 30);
    assert_eq!(config.keyboard.xkb.layout, "de");
    assert_eq!(config.keyboard.xkb.options.as_deref(), Some("caps:escape"));
    assert_eq!(config.pointer.initial_y, 360.5);

    Ok(())
}

#[test]
fn test_partial_configuration_uses_defaults() -> Result<()> {
    let config = SeatConfig::from_toml_str(
        r#"
[keyboard]
repeat_rate = 0
repeat_delay = 600
"#,
    )?;

    assert_eq!(config.keyboard.repeat_rate, 0);
    assert!(config.keyboard.use_keymap_engine);
    assert_eq!(config.keyboard.xkb, KeymapNames::default());
    assert_eq!(config.seat.name, "seat0");
    assert_eq!(config.pointer, PointerConfig::default());

    Ok(())
}

#[test]
fn test_empty_configuration_is_default() -> Result<()> {
    let config = SeatConfig::from_toml_str("")?;
    assert_eq!(config, SeatConfig::default());
    Ok(())
}

#[test]
fn test_invalid_values_are_rejected() {
    let mut config = SeatConfig::default();
    config.seat.name = "  ".to_string();
    assert!(config.validate().is_err());

    let mut config = SeatConfig::default();
    config.keyboard.repeat_rate = -1;
    assert!(config.validate().is_err());

    let mut config = SeatConfig::default();
    config.keyboard.repeat_delay = 0;
    assert!(config.validate().is_err());

    let mut config = SeatConfig::default();
    config.pointer.initial_x = f64::NAN;
    assert!(config.validate().is_err());
}

#[test]
fn test_malformed_toml_reports_context() {
    let err = SeatConfig::from_toml_str("[keyboard\nrepeat_rate = 1").unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse configuration"));
}

#[test]
fn test_missing_file_reports_path() {
    let err = SeatConfig::load("/nonexistent/axiom-seat.toml").unwrap_err();
    assert!(err.to_string().contains("/nonexistent/axiom-seat.toml"));
}

#[test]
fn test_save_and_reload() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("saved.toml");

    let mut config = SeatConfig::default();
    config.seat.name = "seat1".to_string();
    config.keyboard.use_keymap_engine = false;
    config.save(&file_path)?;

    let reloaded = SeatConfig::load(&file_path)?;
    assert_eq!(reloaded, config);

    Ok(())
}
