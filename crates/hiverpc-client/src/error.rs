use hiverpc_core::{ChainNamespace, RpcError, TransportError};
use thiserror::Error;

/// Errors returned by the [`Client`](crate::Client) façade.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The call targeted a namespace the client was built without.
    #[error("{0} namespace is not configured")]
    NamespaceNotConfigured(ChainNamespace),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// The node-reported rejection, if this is one.
    pub fn as_rpc_error(&self) -> Option<&RpcError> {
        match self {
            Self::Transport(e) => e.as_rpc_error(),
            _ => None,
        }
    }
}
