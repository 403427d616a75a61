// src/config.rs

//! Configuration loading from snapshot storage.
//!
//! Deployments without a local filesystem keep `roster.toml` next to the
//! snapshots and load it through the same store.

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::storage::SnapshotStore;

/// Loads the TOML configuration from a snapshot store.
pub struct StoreConfigLoader<'a> {
    store: &'a dyn SnapshotStore,
    key: String,
}

impl<'a> StoreConfigLoader<'a> {
    pub fn new(store: &'a dyn SnapshotStore, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Load and parse the configuration; a missing object is an error.
    pub async fn load(&self) -> Result<Config> {
        let location = self.store.location(&self.key);
        log::info!("Loading config file from {}", location);

        let bytes = self
            .store
            .load(&self.key)
            .await?
            .ok_or_else(|| AppError::config(format!("Config file not found: {location}")))?;

        let text = String::from_utf8(bytes).map_err(|e| {
            AppError::config(format!("Config file {location} is not valid UTF-8: {e}"))
        })?;
        Ok(toml::from_str(&text)?)
    }
}
