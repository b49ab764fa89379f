//! Config store port.
//!
//! The persisted settings live outside this crate. Components read them
//! through this trait every time they need a value, so edits made between
//! operations are picked up without a restart.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::settings::{BridgeSettings, LlmBridgeSettings, PodSettings};

/// Failure reading or writing persisted settings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigStoreError {
    #[error("Failed to read settings: {0}")]
    Read(String),

    #[error("Failed to write settings: {0}")]
    Write(String),

    #[error("Settings document is malformed: {0}")]
    Malformed(String),
}

/// Typed access to persisted settings.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the settings document. Returns defaults if none are stored.
    async fn load(&self) -> Result<BridgeSettings, ConfigStoreError>;

    /// Persist the whole settings document.
    async fn save(&self, settings: &BridgeSettings) -> Result<(), ConfigStoreError>;

    /// Current pod worker settings.
    async fn pod_settings(&self) -> Result<PodSettings, ConfigStoreError> {
        Ok(self.load().await?.pod)
    }

    /// Current local runtime bridge settings.
    async fn llm_settings(&self) -> Result<LlmBridgeSettings, ConfigStoreError> {
        Ok(self.load().await?.llm)
    }
}

/// Process-local store, used by tests and embedders that own persistence.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    settings: RwLock<BridgeSettings>,
}

impl InMemoryConfigStore {
    pub fn new(settings: BridgeSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn load(&self) -> Result<BridgeSettings, ConfigStoreError> {
        Ok(self.settings.read().await.clone())
    }

    async fn save(&self, settings: &BridgeSettings) -> Result<(), ConfigStoreError> {
        *self.settings.write().await = settings.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = InMemoryConfigStore::default();
        assert_eq!(store.load().await.unwrap(), BridgeSettings::default());

        let mut settings = BridgeSettings::default();
        settings.pod.auth_token = "secret".into();
        settings.llm.exposed_models = vec!["llama3".into()];
        store.save(&settings).await.unwrap();

        assert_eq!(store.pod_settings().await.unwrap().auth_token, "secret");
        assert_eq!(
            store.llm_settings().await.unwrap().exposed_models,
            vec!["llama3".to_string()]
        );
    }
}
