//! Transport-level error types.

use thiserror::Error;

use crate::namespace::ChainNamespace;
use crate::request::RpcError;

/// Errors that can occur while executing an RPC call.
///
/// The split between node failures and application errors is decided once,
/// here, and never re-classified by higher layers.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, non-2xx status, garbled body).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The node executed the method and rejected it.
    #[error("{0}")]
    Rpc(RpcError),

    /// Every node in the pool was tried and failed.
    #[error("All {tried} {namespace} nodes failed, last error: {last_error}")]
    PoolExhausted {
        namespace: ChainNamespace,
        tried: usize,
        last_error: String,
    },

    /// A successful result could not be decoded into the requested type.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if the error is the node's fault and counts against
    /// its health (the call moves on to the next node).
    pub fn is_node_failure(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout { .. })
    }

    /// Returns `true` if this is a node-side rejection of the call itself.
    pub fn is_application_error(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }

    /// Returns the node-reported rejection, if this is one.
    pub fn as_rpc_error(&self) -> Option<&RpcError> {
        match self {
            Self::Rpc(e) => Some(e),
            _ => None,
        }
    }
}
