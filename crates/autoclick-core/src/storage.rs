//! Recording and click-profile files - pretty JSON documents
//!
//! Loads are all-or-nothing: a file is fully parsed and validated before
//! anything is handed back, so callers only replace their state on `Ok`.

use crate::config::{ClickParams, HotkeyMap};
use crate::error::{Error, Result};
use crate::events::Recording;
use crate::markers::MarkerRecord;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Markers plus loop parameters and bindings of the click-loop page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClickProfile {
    #[serde(default)]
    pub markers: Vec<MarkerRecord>,
    #[serde(default)]
    pub config: ClickParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotkeys: Option<HotkeyMap>,
}

pub fn save_recording(path: &Path, recording: &Recording) -> Result<()> {
    write_json_atomic(path, recording)
}

pub fn load_recording(path: &Path) -> Result<Recording> {
    read_json(path, "recording")
}

pub fn save_profile(path: &Path, profile: &ClickProfile) -> Result<()> {
    write_json_atomic(path, profile)
}

pub fn load_profile(path: &Path) -> Result<ClickProfile> {
    read_json(path, "click profile")
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path, what: &str) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| {
        Error::new(
            crate::ErrorCode::Io,
            format!("Could not read {} {}: {}", what, path.display(), e),
        )
    })?;
    serde_json::from_slice(&bytes).map_err(|e| Error::malformed(what, format!("{}: {}", path.display(), e)))
}

/// Write to a sibling temp file then rename over the target
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Directory of named recordings
pub struct RecordingStore {
    dir: PathBuf,
}

impl RecordingStore {
    /// `<data_dir>/autoclick/recordings`
    pub fn new() -> Result<Self> {
        let base = dirs::data_dir()
            .ok_or_else(|| Error::new(crate::ErrorCode::Io, "Could not determine the user data directory"))?;
        Self::with_dir(base.join("autoclick").join("recordings"))
    }

    pub fn with_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// A bare name resolves inside the store, anything with a separator is used as is
    pub fn resolve(&self, name: &str) -> PathBuf {
        let p = Path::new(name);
        if p.components().count() > 1 || p.is_absolute() {
            return p.to_path_buf();
        }
        let mut file = sanitize(name);
        if !file.ends_with(".json") {
            file.push_str(".json");
        }
        self.dir.join(file)
    }

    pub fn save(&self, name: &str, recording: &Recording) -> Result<PathBuf> {
        let path = self.resolve(name);
        save_recording(&path, recording)?;
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<Recording> {
        load_recording(&self.resolve(name))
    }

    pub fn list(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(s) = entry.file_name().to_str() {
                if s.ends_with(".json") {
                    files.push(s.to_string());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        fs::remove_file(self.resolve(name))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, EventKind, MouseButton};
    use crate::run::LoopCount;
    use crate::ErrorCode;

    fn sample() -> Recording {
        let mut rec = Recording::new();
        rec.push(Event::new(0.0, EventKind::PointerMove { x: 1, y: 2 }));
        rec.push(Event::new(
            0.25,
            EventKind::ButtonDown { x: 1, y: 2, button: MouseButton::Left },
        ));
        rec
    }

    #[test]
    fn recording_file_is_a_flat_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.json");
        save_recording(&path, &sample()).unwrap();

        let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw[1]["type"], "mouse_down");
        assert_eq!(raw[1]["t"], 0.25);
        assert_eq!(load_recording(&path).unwrap(), sample());
    }

    #[test]
    fn one_bad_event_rejects_the_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(
            &path,
            r#"[{"t":0.0,"type":"mouse_move","x":1,"y":1},{"t":0.1,"type":"teleport"}]"#,
        )
        .unwrap();
        assert_eq!(load_recording(&path).unwrap_err().code, ErrorCode::MalformedInput);
    }

    #[test]
    fn missing_file_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_recording(&dir.path().join("nope.json")).unwrap_err();
        assert_eq!(err.code, ErrorCode::Io);
    }

    #[test]
    fn profile_tolerates_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        fs::write(&path, r#"{"markers":[{"id":1,"x":5,"y":6,"button":"right","interval":0.3}]}"#)
            .unwrap();
        let profile = load_profile(&path).unwrap();
        assert_eq!(profile.markers[0].button, MouseButton::Right);
        assert_eq!(profile.config.loops, LoopCount::Finite(1));
        assert!(profile.hotkeys.is_none());
    }

    #[test]
    fn bare_names_resolve_inside_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordingStore::with_dir(dir.path().join("recordings")).unwrap();
        assert_eq!(store.resolve("daily"), store.path().join("daily.json"));
        assert_eq!(store.resolve("daily.json"), store.path().join("daily.json"));
        assert_eq!(store.resolve("my run"), store.path().join("my_run.json"));

        let elsewhere = dir.path().join("elsewhere.json");
        let explicit = elsewhere.to_string_lossy().into_owned();
        assert_eq!(store.resolve(&explicit), elsewhere);
        assert_eq!(store.resolve("sub/run.json"), PathBuf::from("sub/run.json"));

        store.save(&explicit, &sample()).unwrap();
        assert!(elsewhere.exists());
        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.load(&explicit).unwrap(), sample());
    }

    #[test]
    fn store_lists_saved_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordingStore::with_dir(dir.path()).unwrap();
        let path = store.save("my run", &sample()).unwrap();
        assert!(path.ends_with("my_run.json"));
        assert_eq!(store.list().unwrap(), vec!["my_run.json".to_string()]);
        assert_eq!(store.load("my run").unwrap().len(), 2);
        store.delete("my run").unwrap();
        assert!(store.list().unwrap().is_empty());
    }
}
