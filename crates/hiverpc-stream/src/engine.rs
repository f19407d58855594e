//! The block streaming loop.
//!
//! Each tick:
//! 1. Read the chain height and resolve the working head for the mode.
//! 2. Seed the cursor to `head - 1` on a fresh start.
//! 3. Fire the behind-blocks signal if the gap reached the threshold.
//! 4. Drain the backlog one block (or one concurrent batch) at a time,
//!    persisting the cursor after every block, and pull one virtual-op
//!    block after each processed block when a virtual-op handler is set.
//! 5. On a block that is not retrievable yet, wait and end the tick
//!    without advancing.
//!
//! Delivery is at-least-once: the cursor is saved after a block's
//! callbacks ran, so a crash in between replays that block.

use std::sync::Arc;

use futures::future::join_all;
use hiverpc_client::SignedBlock;
use tokio::sync::watch;

use crate::config::StreamConfig;
use crate::cursor::StreamCursor;
use crate::error::StreamError;
use crate::handler::{OpContext, StreamHandlers};
use crate::reader::ChainReader;
use crate::state::StateStore;

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Working head for this tick.
    pub head: u64,
    /// Blocks processed.
    pub processed: u64,
    /// `true` if the tick ended early on a block that is not available yet.
    pub stalled: bool,
}

/// One streaming session: cursor, callbacks, and optional persistence.
pub struct BlockStream {
    reader: Arc<dyn ChainReader>,
    config: StreamConfig,
    handlers: StreamHandlers,
    store: Option<Arc<dyn StateStore>>,
    cursor: StreamCursor,
    stop: Option<watch::Receiver<bool>>,
}

impl BlockStream {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        config: StreamConfig,
        handlers: StreamHandlers,
        store: Option<Arc<dyn StateStore>>,
    ) -> Self {
        Self {
            reader,
            config,
            handlers,
            store,
            cursor: StreamCursor::default(),
            stop: None,
        }
    }

    pub fn cursor(&self) -> StreamCursor {
        self.cursor
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Load the persisted cursor, if a store is configured and has one.
    pub async fn restore(&mut self) -> Result<(), StreamError> {
        if let Some(store) = &self.store {
            if let Some(saved) = store.load().await? {
                self.cursor = saved;
            }
        }
        Ok(())
    }

    fn stop_requested(&self) -> bool {
        self.stop.as_ref().is_some_and(|rx| *rx.borrow())
    }

    async fn persist(&self) -> Result<(), StreamError> {
        match &self.store {
            Some(store) => store.save(&self.cursor).await,
            None => Ok(()),
        }
    }

    /// Run one polling step.
    pub async fn tick(&mut self) -> Result<TickReport, StreamError> {
        let props = self.reader.dynamic_global_properties().await?;
        let head = self.config.mode.head(&props, self.config.blocks_behind_head);
        let lib = props.last_irreversible_block_num;
        let mut report = TickReport {
            head,
            ..Default::default()
        };

        if !self.cursor.is_seeded() {
            self.cursor.last_block = head.saturating_sub(1);
        }

        let gap = head.saturating_sub(self.cursor.last_block);
        if gap >= self.config.behind_threshold {
            tracing::warn!(gap, head, last_block = self.cursor.last_block, "streaming is behind");
            if let Some(handler) = &self.handlers.behind {
                handler.on_behind_blocks(gap);
            }
        }

        while head > self.cursor.last_block {
            if self.stop_requested() {
                break;
            }

            let first = self.cursor.next_block();
            let last = if self.config.batched() {
                head.min(first + self.config.replay_batch_size as u64 - 1)
            } else {
                first
            };

            let fetched = join_all((first..=last).map(|n| self.reader.block(n))).await;
            let mut blocks = Vec::with_capacity(fetched.len());
            for (n, block) in (first..=last).zip(fetched) {
                match block? {
                    Some(block) => blocks.push((n, block)),
                    None => {
                        // Not produced yet; the whole batch is retried later.
                        tracing::debug!(block_num = n, first, last, "block not available yet");
                        tokio::time::sleep(self.config.retry_delay()).await;
                        report.stalled = true;
                        return Ok(report);
                    }
                }
            }

            for (n, block) in &blocks {
                self.process_block(*n, block, head).await?;
                report.processed += 1;
                if self.handlers.wants_virtual_ops() {
                    self.next_virtual_ops(lib).await?;
                }
            }
        }

        Ok(report)
    }

    /// Deliver one block's callbacks, then advance and persist the cursor.
    pub async fn process_block(&mut self, block_num: u64, block: &SignedBlock, head: u64) -> Result<(), StreamError> {
        if block_num % 1000 == 0 {
            tracing::info!(block_num, head, to_head = head.saturating_sub(block_num), "processing block");
        } else {
            tracing::debug!(block_num, head, to_head = head.saturating_sub(block_num), "processing block");
        }

        if let Some(handler) = &self.handlers.block {
            handler.on_block(block_num, block, head).await?;
        }

        if let Some(handler) = &self.handlers.op {
            for (tx_index, tx) in block.transactions.iter().enumerate() {
                let tx_id = block.transaction_id(tx_index);
                for (op_index, op) in tx.operations.iter().enumerate() {
                    let ctx = OpContext {
                        block_num,
                        block_id: &block.block_id,
                        previous_block_id: &block.previous,
                        tx_id,
                        block_time: block.timestamp,
                        tx_index,
                        op_index,
                    };
                    if let Err(e) = handler.on_op(op, &ctx).await {
                        tracing::error!(
                            block_num,
                            tx_id = tx_id.unwrap_or_default(),
                            op_index,
                            op = %op.name,
                            error = %e,
                            "operation handler failed"
                        );
                    }
                }
            }
        }

        self.cursor.advance_block(block_num);
        self.persist().await
    }

    /// Consume the next unseen virtual-op block, never past `lib`.
    ///
    /// A fresh cursor starts at `lib` itself rather than replaying history.
    /// If the block's operations are not available the cursor stays put.
    pub async fn next_virtual_ops(&mut self, lib: u64) -> Result<(), StreamError> {
        if lib <= self.cursor.last_vop_block {
            return Ok(());
        }
        let block_num = if self.cursor.last_vop_block == 0 {
            lib
        } else {
            self.cursor.last_vop_block + 1
        };

        let Some(ops) = self.reader.operations(block_num).await? else {
            // Retried after the next block.
            tracing::debug!(block_num, "virtual ops not available yet");
            return Ok(());
        };
        let virtual_ops: Vec<_> = ops.iter().filter(|op| op.virtual_op).collect();
        tracing::debug!(block_num, count = virtual_ops.len(), "loading virtual ops");

        if let Some(handler) = &self.handlers.virtual_op {
            for op in virtual_ops {
                handler.on_virtual_op(op, block_num).await?;
            }
        }

        self.cursor.advance_vop(block_num);
        self.persist().await
    }

    /// Tick until `stop` flips to `true`. Tick errors are logged and the
    /// loop carries on. Returns the final cursor.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> StreamCursor {
        self.stop = Some(stop.clone());
        loop {
            if *stop.borrow() {
                break;
            }
            match self.tick().await {
                Ok(report) if report.processed > 0 => {
                    tracing::debug!(head = report.head, processed = report.processed, "tick complete");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, last_block = self.cursor.last_block, "error getting next block"),
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.tick_interval()) => {}
                changed = stop.changed() => {
                    // A dropped sender means nobody can stop us any more.
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!(last_block = self.cursor.last_block, last_vop_block = self.cursor.last_vop_block, "stream stopped");
        self.cursor
    }
}

impl std::fmt::Debug for BlockStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStream")
            .field("config", &self.config)
            .field("handlers", &self.handlers)
            .field("cursor", &self.cursor)
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

/// Control handle for a spawned [`BlockStream`]. Dropping it stops the
/// session at its next check.
#[derive(Debug)]
pub struct StreamHandle {
    stop: watch::Sender<bool>,
    task: Option<tokio::task::JoinHandle<StreamCursor>>,
}

impl StreamHandle {
    /// Spawn `stream` onto the current Tokio runtime.
    pub fn spawn(stream: BlockStream) -> Self {
        let (stop, rx) = watch::channel(false);
        let task = tokio::spawn(stream.run(rx));
        Self { stop, task: Some(task) }
    }

    /// Ask the session to stop after the current block. Idempotent.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Stop the session and wait for it, returning the final cursor.
    pub async fn join(mut self) -> Result<StreamCursor, StreamError> {
        self.stop();
        match self.task.take() {
            Some(task) => task.await.map_err(|e| StreamError::Task(e.to_string())),
            None => Err(StreamError::Task("already joined".into())),
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
