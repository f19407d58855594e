//! The streaming entry point.

use std::sync::Arc;

use hiverpc_client::{BlockHeader, Client, SignedBlock};

use crate::config::{BlockMode, StreamConfig};
use crate::cursor::StreamCursor;
use crate::engine::{BlockStream, StreamHandle};
use crate::error::StreamError;
use crate::handler::StreamHandlers;
use crate::numbers::{current_head, BlockNumbers, BlockNumbersOptions};
use crate::reader::ChainReader;
use crate::state::{FileStateStore, StateStore};

/// Primary-chain block access and streaming.
#[derive(Clone)]
pub struct Blockchain {
    reader: Arc<dyn ChainReader>,
    config: StreamConfig,
    store: Option<Arc<dyn StateStore>>,
}

impl Blockchain {
    pub fn new(reader: Arc<dyn ChainReader>, config: StreamConfig) -> Self {
        Self {
            reader,
            config,
            store: None,
        }
    }

    /// Read through `client`'s primary-chain pool.
    pub fn from_client(client: &Client, config: StreamConfig) -> Self {
        Self::new(Arc::new(client.database()), config)
    }

    /// Persist the cursor to `store`.
    pub fn with_state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Persist the cursor as JSON in `config.state_file`.
    pub fn with_file_state(self) -> Self {
        let store = FileStateStore::new(self.config.state_file.clone());
        self.with_state_store(Arc::new(store))
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Current head number for `mode` (no `blocks_behind_head` offset).
    pub async fn current_block_num(&self, mode: BlockMode) -> Result<u64, StreamError> {
        current_head(self.reader.as_ref(), mode).await
    }

    pub async fn current_block_header(&self, mode: BlockMode) -> Result<Option<BlockHeader>, StreamError> {
        let n = self.current_block_num(mode).await?;
        self.reader.block_header(n).await
    }

    pub async fn current_block(&self, mode: BlockMode) -> Result<Option<SignedBlock>, StreamError> {
        let n = self.current_block_num(mode).await?;
        self.reader.block(n).await
    }

    /// Load the persisted cursor.
    pub async fn load_state(&self) -> Result<Option<StreamCursor>, StreamError> {
        self.store
            .as_ref()
            .ok_or(StreamError::MissingStateBackend)?
            .load()
            .await
    }

    /// Persist `cursor`.
    pub async fn save_state(&self, cursor: &StreamCursor) -> Result<(), StreamError> {
        self.store
            .as_ref()
            .ok_or(StreamError::MissingStateBackend)?
            .save(cursor)
            .await
    }

    /// A stream session that is driven manually with
    /// [`BlockStream::tick`]. The cursor is not restored yet.
    pub fn block_stream(&self, handlers: StreamHandlers) -> BlockStream {
        BlockStream::new(
            Arc::clone(&self.reader),
            self.config.clone(),
            handlers,
            self.store.clone(),
        )
    }

    /// Restore the cursor and start streaming in the background.
    ///
    /// Fails if the saved state cannot be loaded.
    pub async fn stream(&self, handlers: StreamHandlers) -> Result<StreamHandle, StreamError> {
        let mut stream = self.block_stream(handlers);
        stream.restore().await?;
        tracing::info!(
            mode = ?self.config.mode,
            last_block = stream.cursor().last_block,
            last_vop_block = stream.cursor().last_vop_block,
            persistent = self.store.is_some(),
            "starting block stream"
        );
        Ok(StreamHandle::spawn(stream))
    }

    /// Lazy sequence of block numbers.
    pub async fn block_numbers(&self, options: BlockNumbersOptions) -> Result<BlockNumbers, StreamError> {
        BlockNumbers::start(Arc::clone(&self.reader), options).await
    }
}

impl std::fmt::Debug for Blockchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blockchain")
            .field("config", &self.config)
            .field("persistent", &self.store.is_some())
            .finish()
    }
}
