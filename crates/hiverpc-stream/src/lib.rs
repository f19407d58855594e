//! hiverpc-stream — resumable block and operation streaming.
//!
//! # Architecture
//!
//! ```text
//! ChainReader (DatabaseApi over the failover pool)
//!     │
//!     ▼
//! BlockStream::tick ── head / behind signal ──► BehindBlocksHandler
//!     │
//!     ├─ blocks (one or a concurrent batch, emitted ascending)
//!     │       ├─► BlockHandler
//!     │       └─► OperationHandler (per op, errors isolated)
//!     ├─ virtual ops (one block per processed block, ≤ LIB) ─► VirtualOpHandler
//!     └─ StreamCursor ──► StateStore (after every step)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use hiverpc_client::{Client, ClientConfig, Operation};
//! use hiverpc_stream::{Blockchain, OpContext, OperationHandler, StreamConfig, StreamError, StreamHandlers};
//!
//! struct PrintOps;
//!
//! #[async_trait]
//! impl OperationHandler for PrintOps {
//!     async fn on_op(&self, op: &Operation, ctx: &OpContext<'_>) -> Result<(), StreamError> {
//!         println!("{} {} {:?}", ctx.block_num, op.name, ctx.tx_id);
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new(ClientConfig::default()).await?;
//! let handle = Blockchain::from_client(&client, StreamConfig::default())
//!     .with_file_state()
//!     .stream(StreamHandlers::new().on_op(Arc::new(PrintOps)))
//!     .await?;
//! // ...
//! let cursor = handle.join().await?;
//! println!("stopped at {}", cursor.last_block);
//! # Ok(())
//! # }
//! ```

pub mod blockchain;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod handler;
pub mod numbers;
pub mod reader;
pub mod state;

pub use blockchain::Blockchain;
pub use config::{BlockMode, StreamConfig};
pub use cursor::StreamCursor;
pub use engine::{BlockStream, StreamHandle, TickReport};
pub use error::StreamError;
pub use handler::{
    BehindBlocksHandler, BlockHandler, OpContext, OperationHandler, StreamHandlers, VirtualOpHandler,
};
pub use numbers::{BlockNumbers, BlockNumbersOptions};
pub use reader::ChainReader;
pub use state::{FileStateStore, MemoryStateStore, StateStore};
