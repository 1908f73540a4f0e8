// src/store/persist.rs
//! JSON file slots backing the state containers. One file per concern,
//! rewritten in full on every mutation and loaded in full at start-up.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SLOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    state: T,
}

#[derive(Debug, Clone)]
pub struct JsonSlot<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSlot<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            path: dir.join(format!("{}.json", name)),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing slots start from the default. Corrupt ones are copied to
    /// `<name>.json.bak`, then replaced by the default on the next save.
    pub async fn load(&self) -> Result<T, StoreError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        match serde_json::from_slice::<Envelope<T>>(&raw) {
            Ok(envelope) => {
                if envelope.version != SLOT_VERSION {
                    tracing::warn!(
                        path = %self.path.display(),
                        version = envelope.version,
                        "Stored slot has an unexpected version, loading anyway"
                    );
                }
                Ok(envelope.state)
            }
            Err(e) => {
                let backup = self.backup_path();
                tracing::warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    "Discarding unreadable slot: {}",
                    e
                );
                if let Err(e) = tokio::fs::write(&backup, &raw).await {
                    tracing::error!(path = %backup.display(), "Failed to back up unreadable slot: {}", e);
                }
                Ok(T::default())
            }
        }
    }

    pub fn backup_path(&self) -> PathBuf {
        self.path.with_extension("json.bak")
    }

    pub async fn save(&self, state: &T) -> Result<(), StoreError> {
        let envelope = Envelope {
            version: SLOT_VERSION,
            state,
        };
        let bytes = serde_json::to_vec_pretty(&envelope)?;

        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Counter {
        value: u32,
        label: String,
    }

    #[tokio::test]
    async fn test_missing_slot_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let slot: JsonSlot<Counter> = JsonSlot::new(dir.path(), "counter");
        assert_eq!(slot.load().await.unwrap(), Counter::default());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let slot: JsonSlot<Counter> = JsonSlot::new(&dir.path().join("nested"), "counter");
        let state = Counter { value: 7, label: "seven".to_string() };
        slot.save(&state).await.unwrap();

        assert_eq!(slot.load().await.unwrap(), state);
        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(slot.path()).unwrap()).unwrap();
        assert_eq!(raw["version"], SLOT_VERSION);
        assert_eq!(raw["state"]["value"], 7);
    }

    #[tokio::test]
    async fn test_corrupt_slot_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let slot: JsonSlot<Counter> = JsonSlot::new(dir.path(), "counter");
        tokio::fs::write(slot.path(), b"{not json").await.unwrap();
        assert_eq!(slot.load().await.unwrap(), Counter::default());
        assert_eq!(std::fs::read(slot.backup_path()).unwrap(), b"{not json");
    }

    #[tokio::test]
    async fn test_corrupt_slot_survives_next_save_as_backup() {
        let dir = tempfile::tempdir().unwrap();
        let slot: JsonSlot<Counter> = JsonSlot::new(dir.path(), "counter");
        let broken = br#"{"version": 1, "state": {"value": "seven", "label": "x"}}"#;
        tokio::fs::write(slot.path(), broken).await.unwrap();

        let state = slot.load().await.unwrap();
        slot.save(&state).await.unwrap();

        assert_eq!(slot.backup_path(), dir.path().join("counter.json.bak"));
        assert_eq!(std::fs::read(slot.backup_path()).unwrap(), broken.to_vec());
        assert_eq!(slot.load().await.unwrap(), Counter::default());
    }
}
