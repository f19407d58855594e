//! hiverpc-client — the multi-chain RPC façade.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hiverpc_client::{Client, ClientConfig};
//! use hiverpc_core::ChainNamespace;
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), hiverpc_client::ClientError> {
//! let client = Client::new(ClientConfig::default()).await?;
//! client.load_nodes().await;
//!
//! let accounts = client
//!     .call(ChainNamespace::Primary, "condenser_api", "get_accounts", json!([["initminer"]]))
//!     .await?;
//! println!("{accounts}");
//!
//! let props = client.database().get_dynamic_global_properties().await?;
//! println!("head block {}", props.head_block_number);
//!
//! client.destroy();
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod telemetry;

pub use chain::{AppliedOperation, BlockHeader, DynamicGlobalProperties, Operation, SignedBlock, Transaction};
pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, EngineConfig, NamespaceSettings};
pub use database::DatabaseApi;
pub use error::ClientError;
pub use telemetry::{init_tracing, LogConfig};
