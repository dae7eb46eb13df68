//! JSON-file-backed user storage
//!
//! `load` reads the file into a fresh `Convo` and registers a storage
//! observer that writes the map back after every `set_to_storage`.

use crate::config::ConvoConfig;
use crate::convo::Convo;
use crate::error::{ConvoError, ConvoResult};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ConvoStorage {
    path: PathBuf,
}

impl ConvoStorage {
    /// # Errors
    ///
    /// Returns `ConvoError::InvalidArgument` for an empty path.
    pub fn new(path: impl Into<PathBuf>) -> ConvoResult<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(ConvoError::invalid_argument(
                "storage requires a file path to write to",
            ));
        }
        Ok(Self { path })
    }

    /// # Errors
    ///
    /// Returns `ConvoError::InvalidArgument` when no storage path is configured.
    pub fn from_config(config: &ConvoConfig) -> ConvoResult<Self> {
        let path = config.storage_path.clone().ok_or_else(|| {
            ConvoError::invalid_argument("no storage path configured (CONVO_STORAGE_PATH)")
        })?;
        Self::new(path)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load stored data into a new `Convo` and hand it to `callback`.
    ///
    /// A missing or unreadable file loads as empty storage.
    pub async fn load<T>(&self, callback: impl FnOnce(Convo) -> T) -> T {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => serde_json::from_str::<Map<String, Value>>(&text).unwrap_or_else(|e| {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Ignoring malformed storage file"
                );
                Map::new()
            }),
            Err(e) => {
                tracing::debug!(
                    path = %self.path.display(),
                    error = %e,
                    "No storage file, starting empty"
                );
                Map::new()
            }
        };

        let writer = self.clone();
        callback(
            Convo::new()
                .set_storage(Some(data))
                .on_storage_updated(move |storage| {
                    if let Err(e) = writer.write(storage) {
                        tracing::warn!(
                            path = %writer.path.display(),
                            error = %e,
                            "Failed to write storage"
                        );
                    }
                }),
        )
    }

    /// Pretty-print `storage` to the file
    ///
    /// # Errors
    ///
    /// Returns `ConvoError::Io` or `ConvoError::Serialization` when the file
    /// cannot be written.
    pub fn write(&self, storage: &Map<String, Value>) -> ConvoResult<()> {
        let text = serde_json::to_string_pretty(storage)?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}
