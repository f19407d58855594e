//! Client configuration.
//!
//! ```json
//! {
//!   "nodes": ["api.hive.blog", "https://api.deathwing.me"],
//!   "timeout": 10000,
//!   "nodeErrorLimit": 10,
//!   "beacon": { "mode": "auto", "intervalTime": 300, "loadOnInitialize": false },
//!   "engine": { "nodes": ["https://api.hive-engine.com/rpc"], "timeout": 5000 }
//! }
//! ```

use std::time::Duration;

use hiverpc_core::{BeaconConfig, ChainNamespace};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Options for the whole [`Client`](crate::Client).
///
/// Top-level `timeout`, `nodeErrorLimit` and `beacon` apply to both
/// namespaces; the `engine` section may override each of them for the
/// side-chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Primary-chain node addresses. Empty means the built-in defaults.
    pub nodes: Vec<String>,
    /// Per-attempt request timeout in milliseconds.
    pub timeout: u64,
    /// Consecutive failures after which a node is demoted.
    pub node_error_limit: u32,
    pub beacon: BeaconConfig,
    pub engine: EngineConfig,
    /// Height lag (blocks) within which probed nodes rank by latency alone.
    pub max_lag: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            nodes: vec![],
            timeout: 10_000,
            node_error_limit: 10,
            beacon: BeaconConfig::default(),
            engine: EngineConfig::default(),
            max_lag: 3,
        }
    }
}

/// Side-chain options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Build the side-chain pair at all.
    pub enabled: bool,
    /// Side-chain node addresses. Empty means the built-in defaults.
    pub nodes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_error_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beacon: Option<BeaconConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            nodes: vec![],
            timeout: None,
            node_error_limit: None,
            beacon: None,
        }
    }
}

/// Effective settings for one namespace after applying overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceSettings {
    pub namespace: ChainNamespace,
    pub nodes: Vec<String>,
    pub timeout: Duration,
    pub node_error_limit: u32,
    pub beacon: BeaconConfig,
}

impl ClientConfig {
    /// Parse camelCase JSON options; missing fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self, ClientError> {
        let config: Self = serde_json::from_str(raw).map_err(|e| ClientError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.timeout == 0 {
            return Err(ClientError::Config("timeout must be greater than zero".into()));
        }
        if self.engine.timeout == Some(0) {
            return Err(ClientError::Config("engine.timeout must be greater than zero".into()));
        }
        if self.node_error_limit == 0 || self.engine.node_error_limit == Some(0) {
            return Err(ClientError::Config("nodeErrorLimit must be at least 1".into()));
        }
        Ok(())
    }

    /// Resolved settings for `namespace`, or `None` for a disabled side-chain.
    pub fn settings(&self, namespace: ChainNamespace) -> Option<NamespaceSettings> {
        match namespace {
            ChainNamespace::Primary => Some(NamespaceSettings {
                namespace,
                nodes: self.nodes.clone(),
                timeout: Duration::from_millis(self.timeout),
                node_error_limit: self.node_error_limit,
                beacon: self.beacon.clone(),
            }),
            ChainNamespace::SideChain if self.engine.enabled => Some(NamespaceSettings {
                namespace,
                nodes: self.engine.nodes.clone(),
                timeout: Duration::from_millis(self.engine.timeout.unwrap_or(self.timeout)),
                node_error_limit: self.engine.node_error_limit.unwrap_or(self.node_error_limit),
                beacon: self.engine.beacon.clone().unwrap_or_else(|| self.beacon.clone()),
            }),
            ChainNamespace::SideChain => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiverpc_core::BeaconMode;

    #[test]
    fn defaults() {
        let config = ClientConfig::from_json("{}").unwrap();
        assert_eq!(config.timeout, 10_000);
        assert_eq!(config.node_error_limit, 10);
        assert_eq!(config.beacon.mode, BeaconMode::Auto);
        assert_eq!(config.beacon.interval_time, 300);
        assert!(!config.beacon.load_on_initialize);
        assert!(config.engine.enabled);
    }

    #[test]
    fn engine_inherits_then_overrides() {
        let config = ClientConfig::from_json(
            r#"{
                "nodes": ["api.hive.blog"],
                "timeout": 2000,
                "nodeErrorLimit": 3,
                "beacon": {"mode": "manual"},
                "engine": {"nodes": ["https://api.hive-engine.com/rpc"], "timeout": 500}
            }"#,
        )
        .unwrap();

        let primary = config.settings(ChainNamespace::Primary).unwrap();
        assert_eq!(primary.timeout, Duration::from_millis(2000));
        assert_eq!(primary.nodes, vec!["api.hive.blog"]);

        let side = config.settings(ChainNamespace::SideChain).unwrap();
        assert_eq!(side.timeout, Duration::from_millis(500));
        assert_eq!(side.node_error_limit, 3);
        assert_eq!(side.beacon.mode, BeaconMode::Manual);
    }

    #[test]
    fn disabled_engine_has_no_settings() {
        let config = ClientConfig::from_json(r#"{"engine": {"enabled": false}}"#).unwrap();
        assert!(config.settings(ChainNamespace::SideChain).is_none());
    }

    #[test]
    fn rejects_zero_timeout_and_bad_json() {
        assert!(matches!(
            ClientConfig::from_json(r#"{"timeout": 0}"#),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::from_json(r#"{"nodes": 5}"#),
            Err(ClientError::Config(_))
        ));
    }
}
