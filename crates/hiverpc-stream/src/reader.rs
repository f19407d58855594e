//! The chain data the streaming engine reads.

use async_trait::async_trait;
use hiverpc_client::{AppliedOperation, BlockHeader, DatabaseApi, DynamicGlobalProperties, SignedBlock};

use crate::error::StreamError;

/// Read access to the primary chain.
///
/// `block` / `block_header` / `operations` return `Ok(None)` for a block
/// that does not exist yet or came back malformed; `Err` is reserved for
/// failed calls.
#[async_trait]
pub trait ChainReader: Send + Sync + 'static {
    async fn dynamic_global_properties(&self) -> Result<DynamicGlobalProperties, StreamError>;

    async fn block_header(&self, block_num: u64) -> Result<Option<BlockHeader>, StreamError>;

    async fn block(&self, block_num: u64) -> Result<Option<SignedBlock>, StreamError>;

    /// Every operation applied in `block_num`, virtual ones included.
    async fn operations(&self, block_num: u64) -> Result<Option<Vec<AppliedOperation>>, StreamError>;
}

#[async_trait]
impl ChainReader for DatabaseApi {
    async fn dynamic_global_properties(&self) -> Result<DynamicGlobalProperties, StreamError> {
        Ok(self.get_dynamic_global_properties().await?)
    }

    async fn block_header(&self, block_num: u64) -> Result<Option<BlockHeader>, StreamError> {
        Ok(self.get_block_header(block_num).await?)
    }

    async fn block(&self, block_num: u64) -> Result<Option<SignedBlock>, StreamError> {
        Ok(self.get_block(block_num).await?)
    }

    async fn operations(&self, block_num: u64) -> Result<Option<Vec<AppliedOperation>>, StreamError> {
        Ok(self.get_operations(block_num).await?)
    }
}
