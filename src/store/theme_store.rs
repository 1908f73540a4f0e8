// src/store/theme_store.rs
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::RwLock;

use super::persist::{JsonSlot, StoreError};
use crate::models::ThemeMode;

pub const THEME_SLOT: &str = "vira-theme-storage";

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedTheme {
    #[serde(default)]
    mode: ThemeMode,
}

pub struct ThemeStore {
    mode: RwLock<ThemeMode>,
    slot: JsonSlot<PersistedTheme>,
}

impl ThemeStore {
    pub async fn load(data_dir: &Path) -> Result<Self, StoreError> {
        let slot = JsonSlot::new(data_dir, THEME_SLOT);
        let persisted: PersistedTheme = slot.load().await?;
        Ok(Self {
            mode: RwLock::new(persisted.mode),
            slot,
        })
    }

    pub async fn mode(&self) -> ThemeMode {
        *self.mode.read().await
    }

    pub async fn set_theme(&self, mode: ThemeMode) -> Result<(), StoreError> {
        let mut current = self.mode.write().await;
        self.slot.save(&PersistedTheme { mode }).await?;
        *current = mode;
        tracing::debug!(mode = %mode, "Theme updated");
        Ok(())
    }

    /// Light goes to dark; dark and system both go to light.
    pub async fn toggle_theme(&self) -> Result<ThemeMode, StoreError> {
        let mut current = self.mode.write().await;
        let next = current.toggled();
        self.slot.save(&PersistedTheme { mode: next }).await?;
        *current = next;
        Ok(next)
    }

    pub async fn is_dark(&self, system_prefers_dark: bool) -> bool {
        self.mode().await.is_dark(system_prefers_dark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_to_dark() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThemeStore::load(dir.path()).await.unwrap();
        assert_eq!(store.mode().await, ThemeMode::Dark);
        assert!(store.is_dark(false).await);
    }

    #[tokio::test]
    async fn test_toggle_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThemeStore::load(dir.path()).await.unwrap();
        assert_eq!(store.toggle_theme().await.unwrap(), ThemeMode::Light);
        assert_eq!(store.toggle_theme().await.unwrap(), ThemeMode::Dark);

        store.set_theme(ThemeMode::System).await.unwrap();
        assert!(!store.is_dark(false).await);
        assert!(store.is_dark(true).await);
        assert_eq!(store.toggle_theme().await.unwrap(), ThemeMode::Light);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_mode() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let store = ThemeStore::load(&data_dir).await.unwrap();
        std::fs::write(&data_dir, b"").unwrap();

        assert!(store.set_theme(ThemeMode::Light).await.is_err());
        assert!(store.toggle_theme().await.is_err());
        assert_eq!(store.mode().await, ThemeMode::Dark);
    }

    #[tokio::test]
    async fn test_mode_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThemeStore::load(dir.path()).await.unwrap();
        store.set_theme(ThemeMode::Light).await.unwrap();

        let reloaded = ThemeStore::load(dir.path()).await.unwrap();
        assert_eq!(reloaded.mode().await, ThemeMode::Light);
    }
}
