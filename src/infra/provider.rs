//! File-backed admin configuration.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::application::source::{AdminConfig, ConfigProvider, SourceError};

/// Reads the admin configuration document from disk on every call, so edits
/// are picked up by the next fetch without a restart.
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    path: PathBuf,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigProvider for FileConfigProvider {
    async fn load(&self) -> Result<AdminConfig, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|err| SourceError::Read {
                path: self.path.display().to_string(),
                message: err.to_string(),
            })?;

        serde_json::from_str(&raw).map_err(|err| SourceError::Malformed {
            path: self.path.display().to_string(),
            message: err.to_string(),
        })
    }
}
