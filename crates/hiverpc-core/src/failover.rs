//! Failover transport: executes one logical call against a pool, rotating
//! through nodes on transport failure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TransportError;
use crate::namespace::ChainNamespace;
use crate::pool::NodePool;
use crate::transport::RpcTransport;

/// Routes calls for one namespace through its [`NodePool`].
///
/// Each node is attempted at most once per call, head first. Transport
/// failures count against the node and move on to the next one. A node's
/// rejection of the method is returned immediately and never counts as a
/// failure: the node answered, and every other node would reject it the
/// same way.
pub struct FailoverTransport {
    pool: Arc<NodePool>,
    transport: Arc<dyn RpcTransport>,
    timeout: Duration,
    next_id: AtomicU64,
}

impl FailoverTransport {
    pub fn new(pool: Arc<NodePool>, transport: Arc<dyn RpcTransport>, timeout: Duration) -> Self {
        Self {
            pool,
            transport,
            timeout,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn namespace(&self) -> ChainNamespace {
        self.pool.namespace()
    }

    pub fn pool(&self) -> &Arc<NodePool> {
        &self.pool
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute `api.method(params)` and return the raw result value.
    pub async fn call(&self, api: &str, method: &str, params: Value) -> Result<Value, TransportError> {
        let namespace = self.namespace();
        let order = self.pool.addresses();
        let mut last_error: Option<TransportError> = None;

        for address in &order {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let req = namespace.request(id, api, method, params.clone());
            let url = namespace.endpoint(address, api);

            let outcome = match tokio::time::timeout(self.timeout, self.transport.send(&url, req)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout {
                    ms: self.timeout.as_millis() as u64,
                }),
            };

            match outcome {
                Ok(resp) => {
                    // The node answered; whatever it said, it is alive.
                    self.pool.record_success(address);
                    return resp.into_result().map_err(|e| {
                        tracing::debug!(%namespace, node = %address, api, method, error = %e, "rpc call rejected");
                        TransportError::Rpc(e)
                    });
                }
                Err(e) if e.is_node_failure() => {
                    tracing::debug!(%namespace, node = %address, api, method, error = %e, "node failed, trying next");
                    self.pool.record_failure(address);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no nodes".into());
        tracing::error!(%namespace, tried = order.len(), api, method, %last_error, "all nodes failed");
        Err(TransportError::PoolExhausted {
            namespace,
            tried: order.len(),
            last_error,
        })
    }

    /// Convenience: call and deserialize the result.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        api: &str,
        method: &str,
        params: Value,
    ) -> Result<T, TransportError> {
        let value = self.call(api, method, params).await?;
        serde_json::from_value(value).map_err(TransportError::Deserialization)
    }
}

impl std::fmt::Debug for FailoverTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverTransport")
            .field("pool", &self.pool)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
