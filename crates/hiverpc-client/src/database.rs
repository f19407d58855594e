//! Primary-chain read accessors used by the streaming engine.

use std::sync::Arc;

use hiverpc_core::FailoverTransport;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::chain::{AppliedOperation, BlockHeader, DynamicGlobalProperties, SignedBlock};
use crate::error::ClientError;

const API: &str = "condenser_api";

/// `condenser_api` accessors routed through the primary failover transport.
#[derive(Debug, Clone)]
pub struct DatabaseApi {
    transport: Arc<FailoverTransport>,
}

impl DatabaseApi {
    pub fn new(transport: Arc<FailoverTransport>) -> Self {
        Self { transport }
    }

    pub async fn get_dynamic_global_properties(&self) -> Result<DynamicGlobalProperties, ClientError> {
        Ok(self
            .transport
            .call_as(API, "get_dynamic_global_properties", json!([]))
            .await?)
    }

    /// `None` if the block does not exist yet or could not be decoded.
    pub async fn get_block_header(&self, block_num: u64) -> Result<Option<BlockHeader>, ClientError> {
        self.optional("get_block_header", block_num, json!([block_num])).await
    }

    /// `None` if the block does not exist yet or could not be decoded.
    pub async fn get_block(&self, block_num: u64) -> Result<Option<SignedBlock>, ClientError> {
        self.optional("get_block", block_num, json!([block_num])).await
    }

    /// Every operation applied in `block_num`, virtual ones included.
    ///
    /// `None` if the node returned no list or an entry could not be decoded;
    /// an empty block is `Some(vec![])`.
    pub async fn get_operations(&self, block_num: u64) -> Result<Option<Vec<AppliedOperation>>, ClientError> {
        let value = self
            .transport
            .call(API, "get_ops_in_block", json!([block_num, false]))
            .await?;
        if !value.is_array() {
            tracing::debug!(block_num, "operations not available");
            return Ok(None);
        }
        match serde_json::from_value(value) {
            Ok(ops) => Ok(Some(ops)),
            Err(e) => {
                tracing::warn!(block_num, error = %e, "malformed operations payload");
                Ok(None)
            }
        }
    }

    async fn optional<T: DeserializeOwned>(
        &self,
        method: &str,
        block_num: u64,
        params: Value,
    ) -> Result<Option<T>, ClientError> {
        let value = self.transport.call(API, method, params).await?;
        if value.is_null() {
            return Ok(None);
        }
        match serde_json::from_value(value) {
            Ok(decoded) => Ok(Some(decoded)),
            Err(e) => {
                tracing::debug!(block_num, method, error = %e, "malformed block payload");
                Ok(None)
            }
        }
    }
}
