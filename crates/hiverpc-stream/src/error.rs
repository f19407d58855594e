//! Error types for the streaming engine.

use hiverpc_client::ClientError;
use thiserror::Error;

/// Errors that can occur while streaming.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("RPC error: {0}")]
    Client(#[from] ClientError),

    #[error("Persistence error: {0}")]
    Persistence(String),

    /// State was loaded or saved with no backend configured.
    #[error("no state backend configured")]
    MissingStateBackend,

    #[error("Handler error in '{handler}': {reason}")]
    Handler { handler: String, reason: String },

    #[error("start block {from} is ahead of the current block {current}")]
    StartAheadOfHead { from: u64, current: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The spawned session panicked or was cancelled.
    #[error("stream task failed: {0}")]
    Task(String),
}

impl StreamError {
    /// Shorthand for handler implementations.
    pub fn handler(handler: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Handler {
            handler: handler.into(),
            reason: reason.to_string(),
        }
    }
}
