//! Configuration surface consumed by the core
//!
//! The core never parses a config *file* itself — an external loader
//! (out of scope) is expected to read JSON off disk and hand the core a
//! [`serde_json::Value`] patch. `AppConfig::load_with_overrides` applies
//! that patch over the documented defaults, the way
//! `soul-server::config::ServerConfig` layers `config::File` sources over
//! per-field `#[serde(default = ...)]` functions, except the patch here
//! is a single JSON merge rather than TOML/env layering, matching the
//! plain "JSON map with lowercase keys" shape this core reads.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Per-level (or blanket) autoplay-on-load setting: either a single
/// bool applied to every extraction level, or a per-level override
/// keyed by level-as-string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AutoplaySetting {
    /// Same value applies to every extraction level
    Blanket(bool),
    /// Per-level override, keyed by level as a string ("0".."3")
    PerLevel(HashMap<String, bool>),
}

impl Default for AutoplaySetting {
    fn default() -> Self {
        AutoplaySetting::Blanket(true)
    }
}

impl AutoplaySetting {
    /// Resolve whether autoplay applies for the given extraction level
    pub fn for_level(&self, level: u8) -> bool {
        match self {
            AutoplaySetting::Blanket(b) => *b,
            AutoplaySetting::PerLevel(map) => map
                .get(&level.to_string())
                .copied()
                .unwrap_or(true),
        }
    }
}

/// Typed configuration record the core reads, resolved from defaults
/// merged with an external JSON override file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// ALSA device string for RamPlayer's audio sink (e.g. "hw:0,0")
    #[serde(default = "default_alsa_device")]
    pub alsa_device: String,

    /// CD device path (e.g. "/dev/sr0")
    #[serde(default = "default_cd_device")]
    pub cd_device: String,

    /// Scratch mount used for the RAM extraction image
    #[serde(default = "default_ram_path")]
    pub ram_path: String,

    /// Per-level (or blanket) autoplay-on-load setting
    #[serde(default)]
    pub autoplay_on_load: AutoplaySetting,

    /// Audio sink write chunk size, in frames
    #[serde(default = "default_audio_buffer_frames")]
    pub audio_buffer_frames: u32,

    /// Streaming backend's startup-wait timeout, in seconds
    #[serde(default = "default_stream_startup_timeout")]
    pub stream_startup_timeout_secs: u64,

    /// Number of tracks ahead to preload (fixed at 1)
    #[serde(default = "default_preload_ahead")]
    pub preload_ahead: u32,
}

fn default_alsa_device() -> String {
    "default".to_string()
}

fn default_cd_device() -> String {
    "/dev/sr0".to_string()
}

fn default_ram_path() -> String {
    "/tmp/cdplayer-ram".to_string()
}

fn default_audio_buffer_frames() -> u32 {
    4096
}

fn default_stream_startup_timeout() -> u64 {
    20
}

fn default_preload_ahead() -> u32 {
    1
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            alsa_device: default_alsa_device(),
            cd_device: default_cd_device(),
            ram_path: default_ram_path(),
            autoplay_on_load: AutoplaySetting::default(),
            audio_buffer_frames: default_audio_buffer_frames(),
            stream_startup_timeout_secs: default_stream_startup_timeout(),
            preload_ahead: default_preload_ahead(),
        }
    }
}

impl AppConfig {
    /// Merge a JSON override object over the documented defaults
    ///
    /// Unknown keys are ignored. A missing or empty `overrides` simply
    /// yields the defaults.
    pub fn load_with_overrides(overrides: &serde_json::Value) -> Result<Self> {
        let mut base = serde_json::to_value(Self::default())
            .map_err(|e| CoreError::Config(e.to_string()))?;
        merge_json(&mut base, overrides);
        serde_json::from_value(base).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Load defaults merged with overrides read from a JSON file on disk
    ///
    /// A missing file is not an error; it simply yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let overrides: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| CoreError::Config(e.to_string()))?;
        Self::load_with_overrides(&overrides)
    }
}

/// Recursively merge `patch` into `base`, in place
fn merge_json(base: &mut serde_json::Value, patch: &serde_json::Value) {
    match (base, patch) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(patch_map)) => {
            for (key, patch_val) in patch_map {
                match base_map.get_mut(key) {
                    Some(base_val) => merge_json(base_val, patch_val),
                    None => {
                        base_map.insert(key.clone(), patch_val.clone());
                    }
                }
            }
        }
        (base_slot, patch_val) => {
            *base_slot = patch_val.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_round_trip() {
        let config = AppConfig::default();
        assert_eq!(config.alsa_device, "default");
        assert_eq!(config.preload_ahead, 1);
    }

    #[test]
    fn overrides_merge_over_defaults() {
        let patch = json!({ "alsa_device": "hw:1,0", "unknown_key": 42 });
        let config = AppConfig::load_with_overrides(&patch).unwrap();
        assert_eq!(config.alsa_device, "hw:1,0");
        assert_eq!(config.cd_device, default_cd_device());
    }

    #[test]
    fn autoplay_blanket_applies_to_all_levels() {
        let patch = json!({ "autoplay_on_load": false });
        let config = AppConfig::load_with_overrides(&patch).unwrap();
        assert!(!config.autoplay_on_load.for_level(0));
        assert!(!config.autoplay_on_load.for_level(3));
    }

    #[test]
    fn autoplay_per_level_overrides() {
        let patch = json!({ "autoplay_on_load": { "0": false, "1": true } });
        let config = AppConfig::load_with_overrides(&patch).unwrap();
        assert!(!config.autoplay_on_load.for_level(0));
        assert!(config.autoplay_on_load.for_level(1));
        // Unmentioned levels default to true
        assert!(config.autoplay_on_load.for_level(2));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = AppConfig::load_from_path(Path::new("/nonexistent/path.json")).unwrap();
        assert_eq!(config.alsa_device, default_alsa_device());
    }
}
