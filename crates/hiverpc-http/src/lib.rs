//! hiverpc-http — `reqwest`-backed [`RpcTransport`](hiverpc_core::RpcTransport).

pub mod client;

pub use client::{HttpTransport, HttpTransportConfig};
