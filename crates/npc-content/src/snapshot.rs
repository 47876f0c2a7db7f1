//! Typed JSON state for the content sources.
//!
//! Every source keeps its tables and counters in one serde struct. A
//! snapshot opened on a path is saved after each update; an in-memory
//! snapshot never touches the filesystem. IO problems are logged and the
//! source keeps working from memory.

use anyhow::Context;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct Snapshot<T> {
    path: Option<PathBuf>,
    data: Mutex<T>,
}

impl<T> Snapshot<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Load `path`, writing defaults there first if the file is missing.
    /// A file that cannot be parsed is replaced by defaults in memory.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match read_file::<T>(&path) {
            Ok(Some(data)) => data,
            Ok(None) => {
                let data = T::default();
                if let Err(e) = write_file(&path, &data) {
                    warn!("{e:#}");
                }
                data
            }
            Err(e) => {
                warn!("{e:#}; using defaults");
                T::default()
            }
        };
        Self {
            path: Some(path),
            data: Mutex::new(data),
        }
    }

    /// `open` when a path is given, defaults in memory otherwise.
    pub fn at(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => Self::open(path),
            None => Self::in_memory(T::default()),
        }
    }
}

impl<T> Snapshot<T>
where
    T: Serialize,
{
    pub fn in_memory(data: T) -> Self {
        Self {
            path: None,
            data: Mutex::new(data),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.data.lock())
    }

    /// Mutate the state and persist the result.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let (out, encoded) = {
            let mut data = self.data.lock();
            let out = f(&mut data);
            let encoded = self
                .path
                .as_ref()
                .map(|_| serde_json::to_string_pretty(&*data));
            (out, encoded)
        };
        match (self.path.as_ref(), encoded) {
            (Some(path), Some(Ok(json))) => {
                if let Err(e) = fs::write(path, json) {
                    warn!("writing {}: {e}", path.display());
                }
            }
            (Some(path), Some(Err(e))) => warn!("encoding {}: {e}", path.display()),
            _ => {}
        }
        out
    }

    pub fn save(&self) -> anyhow::Result<()> {
        match &self.path {
            Some(path) => write_file(path, &*self.data.lock()),
            None => Ok(()),
        }
    }
}

fn read_file<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw =
        fs::read_to_string(path).with_context(|| format!("reading snapshot: {}", path.display()))?;
    let data = serde_json::from_str(&raw)
        .with_context(|| format!("parsing snapshot: {}", path.display()))?;
    debug!("loaded snapshot {}", path.display());
    Ok(Some(data))
}

fn write_file<T: Serialize>(path: &Path, data: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating snapshot dir: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(data)?;
    fs::write(path, json).with_context(|| format!("writing snapshot: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Counter {
        hits: u32,
        label: String,
    }

    #[test]
    fn test_open_writes_defaults_and_persists_updates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("counter.json");

        let snap: Snapshot<Counter> = Snapshot::open(&path);
        assert!(path.exists());
        snap.update(|c| c.hits += 2);

        let reopened: Snapshot<Counter> = Snapshot::open(&path);
        assert_eq!(reopened.read(|c| c.hits), 2);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.json");
        fs::write(&path, "{ not json").unwrap();

        let snap: Snapshot<Counter> = Snapshot::open(&path);
        assert_eq!(snap.read(|c| c.hits), 0);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.json");
        fs::write(&path, r#"{"hits": 7}"#).unwrap();

        let snap: Snapshot<Counter> = Snapshot::open(&path);
        assert_eq!(snap.read(|c| c.hits), 7);
        assert_eq!(snap.read(|c| c.label.clone()), "");
    }

    #[test]
    fn test_in_memory_never_writes() {
        let snap = Snapshot::in_memory(Counter::default());
        snap.update(|c| c.hits += 1);
        assert!(snap.path().is_none());
        assert!(snap.save().is_ok());
    }
}
