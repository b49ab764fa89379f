//! JSON file implementation of the `ConfigStore` port.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bridge_core::{BridgeSettings, ConfigStore, ConfigStoreError};
use tokio::sync::Mutex;

/// Environment variable overriding the settings file location.
pub const CONFIG_ENV: &str = "COMPUTE_BRIDGE_CONFIG";

/// `<config_dir>/compute-bridge/settings.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("compute-bridge").join("settings.json"))
}

/// Settings persisted as a pretty-printed JSON document.
///
/// A missing or empty file reads as defaults. Writes go to a sibling
/// temporary file first and are renamed into place.
#[derive(Debug)]
pub struct JsonFileConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigStore for JsonFileConfigStore {
    async fn load(&self) -> Result<BridgeSettings, ConfigStoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(BridgeSettings::default()),
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                ConfigStoreError::Malformed(format!("{}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BridgeSettings::default()),
            Err(e) => Err(ConfigStoreError::Read(format!(
                "{}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn save(&self, settings: &BridgeSettings) -> Result<(), ConfigStoreError> {
        let write_error = |e: std::io::Error| {
            ConfigStoreError::Write(format!("{}: {e}", self.path.display()))
        };

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
        }
        let text = serde_json::to_string_pretty(settings)
            .map_err(|e| ConfigStoreError::Write(e.to_string()))?;

        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, text).await.map_err(write_error)?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(write_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_reads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileConfigStore::new(dir.path().join("nested/settings.json"));
        assert_eq!(store.load().await.unwrap(), BridgeSettings::default());
    }

    #[tokio::test]
    async fn test_save_creates_parent_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/settings.json");
        let store = JsonFileConfigStore::new(&path);

        let mut settings = BridgeSettings::default();
        settings.pod.auth_token = "tok".to_string();
        settings.llm.exposed_models = vec!["llama3".to_string()];
        store.save(&settings).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"authToken\": \"tok\""));
        assert!(!path.with_extension("json.tmp").exists());

        let reopened = JsonFileConfigStore::new(&path);
        assert_eq!(reopened.load().await.unwrap(), settings);
        assert_eq!(reopened.pod_settings().await.unwrap().auth_token, "tok");
    }

    #[tokio::test]
    async fn test_partial_document_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "llm": { "bridgeEnabled": true } }"#).unwrap();

        let settings = JsonFileConfigStore::new(&path).load().await.unwrap();
        assert!(settings.llm.bridge_enabled);
        assert_eq!(settings.pod, bridge_core::PodSettings::default());
    }

    #[tokio::test]
    async fn test_malformed_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonFileConfigStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, ConfigStoreError::Malformed(_)));
    }
}
