//! Application configuration document and its on-disk store

use crate::error::{Error, Result};
use crate::markers::MarkerRecord;
use crate::run::LoopCount;
use crate::storage::write_json_atomic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "app_config.json";
const APP_DIR: &str = "autoclick";

/// Action name -> chord text, as persisted
pub type HotkeyMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub recorder: RecorderSection,
    pub clicker: ClickerSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderSection {
    pub hotkeys: HotkeyMap,
    pub params: PlaybackParams,
    pub last_file: Option<PathBuf>,
}

impl Default for RecorderSection {
    fn default() -> Self {
        Self {
            hotkeys: hotkeys(&[("toggle_record", "f9"), ("toggle_play", "f10")]),
            params: PlaybackParams::default(),
            last_file: None,
        }
    }
}

/// Recorder sampling plus playback parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackParams {
    /// Idle-position sample interval in seconds
    pub interval: f64,
    pub speed: f64,
    pub loops: LoopCount,
    pub gap: f64,
    pub delay: f64,
}

impl Default for PlaybackParams {
    fn default() -> Self {
        Self {
            interval: 0.1,
            speed: 1.0,
            loops: LoopCount::Finite(1),
            gap: 0.0,
            delay: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickerSection {
    pub hotkeys: HotkeyMap,
    pub params: ClickParams,
    pub markers: Vec<MarkerRecord>,
}

impl Default for ClickerSection {
    fn default() -> Self {
        Self {
            hotkeys: hotkeys(&[("start_stop", "f7"), ("add_marker", "f6")]),
            params: ClickParams::default(),
            markers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickParams {
    pub loops: LoopCount,
    pub delay: f64,
}

impl Default for ClickParams {
    fn default() -> Self {
        Self {
            loops: LoopCount::Finite(1),
            delay: 0.0,
        }
    }
}

fn hotkeys(pairs: &[(&str, &str)]) -> HotkeyMap {
    pairs
        .iter()
        .map(|(a, c)| (a.to_string(), c.to_string()))
        .collect()
}

pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config_dir>/autoclick/app_config.json`
    pub fn open_default() -> Result<Self> {
        let dir = dirs::config_dir().ok_or_else(|| {
            Error::new(
                crate::ErrorCode::Io,
                "Could not determine the user configuration directory",
            )
            .with_suggestions(vec!["Pass --config <path> explicitly".to_string()])
        })?;
        Ok(Self::new(dir.join(APP_DIR).join(CONFIG_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Defaults when the file is missing or unreadable
    pub fn load(&self) -> AppConfig {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no config file, using defaults");
            return AppConfig::default();
        }
        match self.load_strict() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "config unreadable, using defaults");
                AppConfig::default()
            }
        }
    }

    pub fn load_strict(&self) -> Result<AppConfig> {
        let bytes = fs::read(&self.path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::malformed("config", format!("{}: {}", self.path.display(), e)))
    }

    pub fn save(&self, config: &AppConfig) -> Result<()> {
        write_json_atomic(&self.path, config)?;
        tracing::debug!(path = %self.path.display(), "config saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;

    #[test]
    fn defaults_match_shipped_bindings() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.recorder.hotkeys["toggle_record"], "f9");
        assert_eq!(cfg.recorder.hotkeys["toggle_play"], "f10");
        assert_eq!(cfg.clicker.hotkeys["start_stop"], "f7");
        assert_eq!(cfg.clicker.hotkeys["add_marker"], "f6");
        assert_eq!(cfg.recorder.params.interval, 0.1);
        assert_eq!(cfg.clicker.params.loops, LoopCount::Finite(1));
    }

    #[test]
    fn partial_document_fills_defaults() {
        let cfg: AppConfig =
            serde_json::from_str(r#"{"recorder": {"params": {"speed": 2.5, "loops": -1}}}"#).unwrap();
        assert_eq!(cfg.recorder.params.speed, 2.5);
        assert_eq!(cfg.recorder.params.loops, LoopCount::Infinite);
        assert_eq!(cfg.recorder.params.interval, 0.1);
        assert_eq!(cfg.recorder.hotkeys["toggle_record"], "f9");
        assert_eq!(cfg.clicker, ClickerSection::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nested").join(CONFIG_FILE));
        let mut cfg = AppConfig::default();
        cfg.clicker.params.delay = 1.5;
        store.save(&cfg).unwrap();
        assert_eq!(store.load_strict().unwrap(), cfg);
    }

    #[test]
    fn garbage_falls_back_or_fails_strictly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{not json").unwrap();
        let store = ConfigStore::new(&path);
        assert_eq!(store.load(), AppConfig::default());
        assert_eq!(store.load_strict().unwrap_err().code, ErrorCode::MalformedInput);
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("absent.json"));
        assert_eq!(store.load(), AppConfig::default());
    }
}
