//! Cursor persistence backends.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::cursor::StreamCursor;
use crate::error::StreamError;

/// Loads and saves a stream cursor.
///
/// One store per streaming session; sharing a store between concurrent
/// sessions is unsupported.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the saved cursor (returns `None` if nothing was saved yet).
    async fn load(&self) -> Result<Option<StreamCursor>, StreamError>;

    /// Save (overwrite) the cursor.
    async fn save(&self, cursor: &StreamCursor) -> Result<(), StreamError>;
}

/// JSON file store. Writes go to a sibling temp file first and are then
/// renamed over the target, so a crash never leaves a truncated file.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<Option<StreamCursor>, StreamError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let cursor: StreamCursor = serde_json::from_str(&raw)?;
        tracing::info!(path = %self.path.display(), last_block = cursor.last_block, last_vop_block = cursor.last_vop_block, "restored saved state");
        Ok(Some(cursor))
    }

    async fn save(&self, cursor: &StreamCursor) -> Result<(), StreamError> {
        let body = serde_json::to_vec(cursor)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    cursor: Mutex<Option<StreamCursor>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a previously saved cursor.
    pub fn with_cursor(cursor: StreamCursor) -> Self {
        Self {
            cursor: Mutex::new(Some(cursor)),
        }
    }

    /// The last saved cursor.
    pub fn current(&self) -> Option<StreamCursor> {
        *self.cursor.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<Option<StreamCursor>, StreamError> {
        Ok(self.current())
    }

    async fn save(&self, cursor: &StreamCursor) -> Result<(), StreamError> {
        *self
            .cursor
            .lock()
            .map_err(|e| StreamError::Persistence(e.to_string()))? = Some(*cursor);
        Ok(())
    }
}
