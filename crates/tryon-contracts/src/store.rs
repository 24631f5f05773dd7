use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{StudioError, StudioResult};
use crate::models::{Gallery, Measurements, TryOnResult};

pub const MEASUREMENTS_KEY: &str = "userMeasurements";
pub const GALLERY_KEY: &str = "virtualTryOnGallery";

/// Durable string-keyed slots backed by one JSON object file.
///
/// Every save re-serializes the whole value for its key and merges it into
/// whatever is on disk, so the two slots never clobber each other.
/// `load`/`save` never fail: errors are logged and the caller keeps going
/// with the default or in-memory value.
#[derive(Debug, Clone)]
pub struct PersistedStore {
    path: PathBuf,
}

impl PersistedStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join("store.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn try_load<T: DeserializeOwned>(&self, key: &str) -> StudioResult<Option<T>> {
        let Some(payload) = read_json_object(&self.path)? else {
            return Ok(None);
        };
        let Some(raw) = payload.get(key) else {
            return Ok(None);
        };
        serde_json::from_value::<T>(raw.clone())
            .map(Some)
            .map_err(|err| StudioError::Persistence(format!("'{key}' has an unexpected shape: {err}")))
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.try_load(key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(err) => {
                warn!(key, path = %self.path.display(), error = %err, "could not load stored value; using default");
                default
            }
        }
    }

    pub fn try_save<T: Serialize>(&self, key: &str, value: &T) -> StudioResult<()> {
        let snapshot = serde_json::to_value(value)
            .map_err(|err| StudioError::Persistence(format!("could not serialize '{key}': {err}")))?;
        let mut on_disk = match read_json_object(&self.path) {
            Ok(existing) => existing.unwrap_or_default(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "replacing unreadable store file");
                Map::new()
            }
        };
        on_disk.insert(key.to_string(), snapshot);
        write_json_object(&self.path, &on_disk)
    }

    pub fn save<T: Serialize>(&self, key: &str, value: &T) {
        match self.try_save(key, value) {
            Ok(()) => debug!(key, path = %self.path.display(), "stored value saved"),
            Err(err) => {
                warn!(key, path = %self.path.display(), error = %err, "could not save value; keeping in-memory state")
            }
        }
    }

    pub fn load_measurements(&self) -> Measurements {
        self.load(MEASUREMENTS_KEY, Measurements::default())
    }

    pub fn save_measurements(&self, measurements: &Measurements) {
        self.save(MEASUREMENTS_KEY, measurements);
    }

    pub fn load_gallery(&self) -> Gallery {
        self.load(GALLERY_KEY, Gallery::new())
    }

    pub fn save_gallery(&self, gallery: &[TryOnResult]) {
        self.save(GALLERY_KEY, &gallery);
    }
}

fn read_json_object(path: &Path) -> StudioResult<Option<Map<String, Value>>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(StudioError::Persistence(format!(
                "failed reading {}: {err}",
                path.display()
            )))
        }
    };
    let parsed: Value = serde_json::from_str(&raw).map_err(|err| {
        StudioError::Persistence(format!("{} is not valid JSON: {err}", path.display()))
    })?;
    match parsed {
        Value::Object(map) => Ok(Some(map)),
        _ => Err(StudioError::Persistence(format!(
            "{} does not hold a JSON object",
            path.display()
        ))),
    }
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> StudioResult<()> {
    let persistence = |err: std::io::Error| {
        StudioError::Persistence(format!("failed writing {}: {err}", path.display()))
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(persistence)?;
    }
    let body = serde_json::to_string_pretty(payload)
        .map_err(|err| StudioError::Persistence(err.to_string()))?;
    let staging = path.with_extension("json.tmp");
    std::fs::write(&staging, body).map_err(persistence)?;
    std::fs::rename(&staging, path).map_err(persistence)?;
    Ok(())
}
