//! Stream callback traits + registry.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hiverpc_client::{AppliedOperation, Operation, SignedBlock};

use crate::error::StreamError;

/// Where an operation sits in the chain.
#[derive(Debug, Clone)]
pub struct OpContext<'a> {
    pub block_num: u64,
    pub block_id: &'a str,
    pub previous_block_id: &'a str,
    /// `None` if the node did not report transaction ids.
    pub tx_id: Option<&'a str>,
    /// Block timestamp (UTC).
    pub block_time: DateTime<Utc>,
    /// Index of the transaction within the block.
    pub tx_index: usize,
    /// Index of the operation within its transaction.
    pub op_index: usize,
}

/// Called once per block, before any of its operations.
///
/// An error aborts the current tick; the block is retried on the next one.
#[async_trait]
pub trait BlockHandler: Send + Sync {
    async fn on_block(&self, block_num: u64, block: &SignedBlock, head: u64) -> Result<(), StreamError>;
}

/// Called for every operation of every transaction, in order.
///
/// Errors are logged and do not stop the stream.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    async fn on_op(&self, op: &Operation, ctx: &OpContext<'_>) -> Result<(), StreamError>;
}

/// Called for every virtual operation of a consumed virtual-op block.
///
/// An error aborts the current tick, like [`BlockHandler`].
#[async_trait]
pub trait VirtualOpHandler: Send + Sync {
    async fn on_virtual_op(&self, op: &AppliedOperation, block_num: u64) -> Result<(), StreamError>;
}

/// Advisory signal that the stream is `gap` blocks behind head.
pub trait BehindBlocksHandler: Send + Sync {
    fn on_behind_blocks(&self, gap: u64);
}

/// The callbacks of one streaming session. Each slot is optional.
#[derive(Clone, Default)]
pub struct StreamHandlers {
    pub(crate) block: Option<Arc<dyn BlockHandler>>,
    pub(crate) op: Option<Arc<dyn OperationHandler>>,
    pub(crate) virtual_op: Option<Arc<dyn VirtualOpHandler>>,
    pub(crate) behind: Option<Arc<dyn BehindBlocksHandler>>,
}

impl StreamHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_block(mut self, handler: Arc<dyn BlockHandler>) -> Self {
        self.block = Some(handler);
        self
    }

    pub fn on_op(mut self, handler: Arc<dyn OperationHandler>) -> Self {
        self.op = Some(handler);
        self
    }

    /// Enables virtual-op consumption.
    pub fn on_virtual_op(mut self, handler: Arc<dyn VirtualOpHandler>) -> Self {
        self.virtual_op = Some(handler);
        self
    }

    pub fn on_behind_blocks(mut self, handler: Arc<dyn BehindBlocksHandler>) -> Self {
        self.behind = Some(handler);
        self
    }

    pub fn wants_virtual_ops(&self) -> bool {
        self.virtual_op.is_some()
    }
}

impl std::fmt::Debug for StreamHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandlers")
            .field("block", &self.block.is_some())
            .field("op", &self.op.is_some())
            .field("virtual_op", &self.virtual_op.is_some())
            .field("behind", &self.behind.is_some())
            .finish()
    }
}
