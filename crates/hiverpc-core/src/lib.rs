//! hiverpc-core — node pools, failover and health ranking for hiverpc.
//!
//! # Overview
//!
//! hiverpc talks to a set of interchangeable public nodes per chain and keeps
//! working while individual nodes are down. The core crate defines:
//!
//! - [`RpcTransport`] — the async trait a single-node transport implements
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`] / [`RpcError`] — wire types
//! - [`TransportError`] — node failures vs. application errors
//! - [`ChainNamespace`] — primary chain vs. side-chain, and each one's dialect
//! - [`pool`] module — ordered node pool with error counters
//! - [`failover`] module — one logical call across the pool
//! - [`beacon`] module — periodic probing and re-ranking of a pool

pub mod beacon;
pub mod error;
pub mod failover;
pub mod namespace;
pub mod node;
pub mod pool;
pub mod request;
pub mod transport;

pub use beacon::{
    Beacon, BeaconConfig, BeaconMode, LatencyHeightRanker, NodeProber, NodeRanker, ProbeResult,
    RefreshReport, RpcProber,
};
pub use error::TransportError;
pub use failover::FailoverTransport;
pub use namespace::ChainNamespace;
pub use node::{normalize_address, HealthStatus, Node};
pub use pool::NodePool;
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcError, RpcId};
pub use transport::RpcTransport;
