//! How a single request reaches a single node.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// Sends one JSON-RPC request to one endpoint URL.
///
/// Implementations must classify failures: anything that prevented a
/// well-formed JSON-RPC response from arriving is `Http`/`Timeout`; a
/// well-formed response carrying an `error` member is returned as `Ok` and
/// turned into an application error by the caller.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks; the
/// trait is object-safe and is stored as `Arc<dyn RpcTransport>`.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// Send a single JSON-RPC request to `url` and return the raw response.
    async fn send(&self, url: &str, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;
}
