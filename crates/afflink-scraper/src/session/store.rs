//! Persistence for the authenticated-session blob.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::driver::SessionBlob;
use crate::error::ScraperError;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns `None` when nothing has been saved yet.
    async fn load(&self) -> Result<Option<SessionBlob>, ScraperError>;

    async fn save(&self, blob: &SessionBlob) -> Result<(), ScraperError>;
}

/// Stores the blob as a JSON file, creating parent directories on save.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: std::io::Error) -> ScraperError {
        ScraperError::SessionStore {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<SessionBlob>, ScraperError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| ScraperError::SessionDecode {
                path: self.path.display().to_string(),
                source,
            })
    }

    async fn save(&self, blob: &SessionBlob) -> Result<(), ScraperError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        let body = serde_json::to_vec_pretty(blob).map_err(|e| self.io_error(e.into()))?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| self.io_error(e))?;
        tracing::debug!(path = %self.path.display(), "session blob saved");
        Ok(())
    }
}
