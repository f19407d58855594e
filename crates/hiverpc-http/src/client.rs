//! HTTP JSON-RPC transport backed by `reqwest`.
//!
//! One `HttpTransport` serves every node of a pool: the target URL is chosen
//! per request by the failover layer, which also owns timeouts-per-attempt,
//! retry order and health accounting. This type only classifies outcomes.

use std::time::Duration;

use async_trait::async_trait;

use hiverpc_core::error::TransportError;
use hiverpc_core::request::{JsonRpcRequest, JsonRpcResponse};
use hiverpc_core::transport::RpcTransport;

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Hard upper bound on a single HTTP exchange.
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            user_agent: concat!("hiverpc/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Stateless HTTP transport shared by all nodes of a namespace.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            request_timeout: config.request_timeout,
        })
    }

    /// Create with the given request timeout and default settings otherwise.
    pub fn with_timeout(request_timeout: Duration) -> Result<Self, TransportError> {
        Self::new(HttpTransportConfig {
            request_timeout,
            ..Default::default()
        })
    }

    fn map_reqwest(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            TransportError::Http(e.to_string())
        }
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn send(&self, url: &str, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let resp = self
            .http
            .post(url)
            .json(&req)
            .send()
            .await
            .map_err(|e| self.map_reqwest(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(url, status, "node returned non-success status");
            return Err(TransportError::Http(format!("HTTP {status}: {body}")));
        }

        // A body that is not a JSON-RPC response means the node is broken,
        // not that the call was rejected.
        resp.json::<JsonRpcResponse>()
            .await
            .map_err(|e| self.map_reqwest(e))
    }
}
