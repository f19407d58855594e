//! Chain namespaces and the request dialect each one speaks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request::JsonRpcRequest;

/// The chain a call is routed to. Each namespace owns an isolated pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChainNamespace {
    /// The main chain (hived nodes).
    Primary,
    /// The side-chain (hive-engine nodes).
    SideChain,
}

impl ChainNamespace {
    /// Built-in fallback node list for this namespace.
    pub fn default_nodes(&self) -> &'static [&'static str] {
        match self {
            Self::Primary => PRIMARY_DEFAULT_NODES,
            Self::SideChain => SIDE_CHAIN_DEFAULT_NODES,
        }
    }

    /// The URL a call to `api` is posted to on the node at `address`.
    ///
    /// Primary nodes expose a single endpoint; side-chain nodes expose one
    /// endpoint per contract API (`/blockchain`, `/contracts`, …).
    pub fn endpoint(&self, address: &str, api: &str) -> String {
        match self {
            Self::Primary => address.to_string(),
            Self::SideChain => format!("{}/{}", address.trim_end_matches('/'), api),
        }
    }

    /// Encode `api`/`method`/`params` as this namespace's JSON-RPC request.
    pub fn request(&self, id: u64, api: &str, method: &str, params: Value) -> JsonRpcRequest {
        match self {
            Self::Primary => JsonRpcRequest::new(id, format!("{api}.{method}"), params),
            Self::SideChain => JsonRpcRequest::new(id, method, params),
        }
    }
}

impl std::fmt::Display for ChainNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::SideChain => write!(f, "side-chain"),
        }
    }
}

pub const PRIMARY_DEFAULT_NODES: &[&str] = &[
    "https://api.hive.blog",
    "https://api.deathwing.me",
    "https://anyx.io",
    "https://api.openhive.network",
    "https://techcoderx.com",
    "https://hived.emre.sh",
    "https://rpc.mahdiyari.info",
    "https://hive-api.arcange.eu",
    "https://api.c0ff33a.uk",
    "https://hive-api.3speak.tv",
];

pub const SIDE_CHAIN_DEFAULT_NODES: &[&str] = &[
    "https://api.hive-engine.com/rpc",
    "https://engine.rishipanthee.com",
    "https://herpc.dtools.dev",
    "https://api.primersion.com",
    "https://ha.herpc.dtools.dev",
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primary_dialect_joins_api_and_method() {
        let req = ChainNamespace::Primary.request(7, "condenser_api", "get_block", json!([1]));
        assert_eq!(req.method, "condenser_api.get_block");
        assert_eq!(
            ChainNamespace::Primary.endpoint("https://api.hive.blog", "condenser_api"),
            "https://api.hive.blog"
        );
    }

    #[test]
    fn side_chain_dialect_posts_to_api_path() {
        let req = ChainNamespace::SideChain.request(1, "blockchain", "getLatestBlockInfo", json!({}));
        assert_eq!(req.method, "getLatestBlockInfo");
        assert_eq!(
            ChainNamespace::SideChain.endpoint("https://api.hive-engine.com/rpc/", "blockchain"),
            "https://api.hive-engine.com/rpc/blockchain"
        );
    }

    #[test]
    fn serde_names() {
        assert_eq!(serde_json::to_string(&ChainNamespace::SideChain).unwrap(), "\"side-chain\"");
        assert_eq!(ChainNamespace::Primary.to_string(), "primary");
    }
}
