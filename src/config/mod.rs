//! Configuration management for a seat
//!
//! Loads, validates and saves the TOML settings a seat is created from:
//! its name, keyboard repeat and keymap names, and where the pointer starts.

use crate::keymap::KeymapNames;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main configuration struct containing all seat settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SeatConfig {
    #[serde(default)]
    pub seat: SeatSection,

    /// Repeat and keymap settings
    #[serde(default)]
    pub keyboard: KeyboardConfig,

    #[serde(default)]
    pub pointer: PointerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeatSection {
    /// Advertised to clients with `wl_seat.name`
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyboardConfig {
    /// Key repeats per second, 0 disables repeat
    pub repeat_rate: i32,

    /// Delay before repeat starts (milliseconds)
    pub repeat_delay: i32,

    /// Track modifiers through a keymap engine. When off, keyboards send
    /// `no_keymap` and modifier updates are skipped.
    #[serde(default = "KeyboardConfig::default_use_keymap_engine")]
    pub use_keymap_engine: bool,

    /// Names the default keymap is compiled from
    #[serde(default)]
    pub xkb: KeymapNames,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointerConfig {
    /// Global position of a newly created pointer
    pub initial_x: f64,
    pub initial_y: f64,
}

impl Default for SeatSection {
    fn default() -> Self {
        Self {
            name: "seat0".to_string(),
        }
    }
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            repeat_rate: 40,
            repeat_delay: 400,
            use_keymap_engine: Self::default_use_keymap_engine(),
            xkb: KeymapNames::default(),
        }
    }
}

impl KeyboardConfig {
    fn default_use_keymap_engine() -> bool {
        true
    }
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            initial_x: 100.0,
            initial_y: 100.0,
        }
    }
}

impl SeatConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Expand ~ to home directory
        let expanded_path = if path.to_string_lossy().starts_with('~') {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            Path::new(&home).join(path.strip_prefix("~").unwrap_or(path))
        } else {
            path.to_path_buf()
        };

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to load config file: {}", expanded_path.display()))
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: SeatConfig = toml::from_str(contents).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.seat.name.trim().is_empty() {
            anyhow::bail!("Invalid seat name: must not be empty");
        }

        if !(0..=1000).contains(&self.keyboard.repeat_rate) {
            anyhow::bail!(
                "Invalid repeat_rate {}: must be between 0 and 1000",
                self.keyboard.repeat_rate
            );
        }

        if !(1..=10_000).contains(&self.keyboard.repeat_delay) {
            anyhow::bail!(
                "Invalid repeat_delay {}: must be between 1 and 10000 ms",
                self.keyboard.repeat_delay
            );
        }

        if !self.pointer.initial_x.is_finite() || !self.pointer.initial_y.is_finite() {
            anyhow::bail!("Invalid initial pointer position: coordinates must be finite");
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests;

#[cfg(test)]
mod property_tests;
