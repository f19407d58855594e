//! A single RPC endpoint and its health counters.

use serde::Serialize;

/// One node of a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    /// Normalised endpoint URL (unique within a pool).
    pub address: String,
    /// Consecutive transport failures since the last success.
    pub error_count: u32,
    /// `false` once `error_count` reached the pool's error limit.
    pub healthy: bool,
    /// Pool epoch at which the node was last demoted.
    #[serde(skip)]
    pub(crate) demoted_at: Option<u64>,
}

impl Node {
    /// A fresh node with zeroed counters.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            error_count: 0,
            healthy: true,
            demoted_at: None,
        }
    }
}

/// Aggregate health of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every node is healthy.
    Healthy,
    /// Some nodes are demoted.
    Degraded,
    /// Every node is demoted.
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Normalise a configured node address.
///
/// Bare host names get `https://` prepended; anything that does not parse
/// as an http(s) URL with a host is rejected. Trailing slashes are dropped so
/// that `https://a.com` and `https://a.com/` dedupe to the same node.
pub fn normalize_address(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let parsed = url::Url::parse(&candidate).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }
    Some(candidate.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_https() {
        assert_eq!(
            normalize_address("wrong.api.hive.com").as_deref(),
            Some("https://wrong.api.hive.com")
        );
    }

    #[test]
    fn keeps_path_and_drops_trailing_slash() {
        assert_eq!(
            normalize_address(" https://api.hive-engine.com/rpc/ ").as_deref(),
            Some("https://api.hive-engine.com/rpc")
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(normalize_address("").is_none());
        assert!(normalize_address("ftp://example.com").is_none());
        assert!(normalize_address("https://").is_none());
        assert!(normalize_address("not a url").is_none());
    }
}
