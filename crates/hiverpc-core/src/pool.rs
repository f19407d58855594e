//! Ordered node pool for one chain namespace, with health tracking.
//!
//! The pool is the only mutable state shared between the failover transport
//! (which records call outcomes) and the beacon (which replaces the
//! ordering). Every mutation happens under one mutex and bumps an epoch
//! counter, which lets a beacon refresh tell whether a demotion happened
//! before or after it started probing.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::namespace::ChainNamespace;
use crate::node::{normalize_address, HealthStatus, Node};

struct PoolState {
    nodes: Vec<Node>,
    epoch: u64,
}

/// Ordered, de-duplicated set of nodes serving one namespace.
///
/// Never empty: if the configured list is empty or entirely invalid, the
/// namespace's built-in defaults are used instead.
pub struct NodePool {
    namespace: ChainNamespace,
    node_error_limit: u32,
    state: Mutex<PoolState>,
}

impl NodePool {
    /// Build a pool from configured addresses.
    pub fn new<S: AsRef<str>>(namespace: ChainNamespace, configured: &[S], node_error_limit: u32) -> Self {
        let mut addresses = dedup_normalized(configured.iter().map(AsRef::as_ref));
        if addresses.is_empty() {
            if !configured.is_empty() {
                tracing::warn!(%namespace, "no valid configured nodes, using built-in defaults");
            }
            addresses = dedup_normalized(namespace.default_nodes().iter().copied());
        }
        Self {
            namespace,
            node_error_limit: node_error_limit.max(1),
            state: Mutex::new(PoolState {
                nodes: addresses.into_iter().map(Node::new).collect(),
                epoch: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn namespace(&self) -> ChainNamespace {
        self.namespace
    }

    pub fn node_error_limit(&self) -> u32 {
        self.node_error_limit
    }

    /// Number of nodes in the pool.
    pub fn len(&self) -> usize {
        self.lock().nodes.len()
    }

    /// Always `false` after construction; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.lock().nodes.is_empty()
    }

    /// Copy of the current ordering and counters.
    pub fn snapshot(&self) -> Vec<Node> {
        self.lock().nodes.clone()
    }

    /// Current ordering, head first.
    pub fn addresses(&self) -> Vec<String> {
        self.lock().nodes.iter().map(|n| n.address.clone()).collect()
    }

    /// Look up one node by address.
    pub fn get(&self, address: &str) -> Option<Node> {
        self.lock().nodes.iter().find(|n| n.address == address).cloned()
    }

    /// Mutation counter; increases on every recorded outcome or refresh.
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    pub fn health(&self) -> HealthStatus {
        let state = self.lock();
        let healthy = state.nodes.iter().filter(|n| n.healthy).count();
        match healthy {
            0 => HealthStatus::Unhealthy,
            n if n == state.nodes.len() => HealthStatus::Healthy,
            _ => HealthStatus::Degraded,
        }
    }

    /// Record a successful call: reset the counter and make the node the
    /// rotation head.
    pub fn record_success(&self, address: &str) {
        let mut state = self.lock();
        state.epoch += 1;
        let Some(idx) = state.nodes.iter().position(|n| n.address == address) else {
            return;
        };
        let mut node = state.nodes.remove(idx);
        node.error_count = 0;
        node.healthy = true;
        node.demoted_at = None;
        state.nodes.insert(0, node);
    }

    /// Record a transport failure. Returns `true` if the node is now at or
    /// over the error limit, in which case it was moved to the back.
    pub fn record_failure(&self, address: &str) -> bool {
        let mut state = self.lock();
        state.epoch += 1;
        let epoch = state.epoch;
        let limit = self.node_error_limit;
        let Some(idx) = state.nodes.iter().position(|n| n.address == address) else {
            return false;
        };
        state.nodes[idx].error_count = state.nodes[idx].error_count.saturating_add(1);
        if state.nodes[idx].error_count < limit {
            return false;
        }
        let mut node = state.nodes.remove(idx);
        node.healthy = false;
        node.demoted_at = Some(epoch);
        tracing::warn!(
            namespace = %self.namespace,
            node = %node.address,
            errors = node.error_count,
            "node demoted"
        );
        state.nodes.push(node);
        true
    }

    /// Replace the ordering with a beacon ranking.
    ///
    /// `ranked` addresses go first, in order; known addresses missing from
    /// the ranking (failed probes) keep their relative order behind them.
    /// Counters are carried over for known addresses and start at zero for
    /// new ones. A ranked node that was demoted before `started_at` (the
    /// epoch at which the refresh began) is marked healthy again; its
    /// `error_count` is left alone, so the next transport failure demotes it
    /// straight away. A node demoted after `started_at` goes to the very
    /// back regardless of its rank, since its failure is newer than the
    /// probe that ranked it.
    ///
    /// An empty ranking leaves the pool untouched. Returns the number of
    /// newly added nodes.
    pub fn apply_ranking(&self, ranked: &[String], started_at: u64) -> usize {
        if ranked.is_empty() {
            return 0;
        }
        let mut state = self.lock();
        state.epoch += 1;

        let old_order: Vec<String> = state.nodes.iter().map(|n| n.address.clone()).collect();
        let mut known: HashMap<String, Node> =
            state.nodes.drain(..).map(|n| (n.address.clone(), n)).collect();

        let mut front = Vec::with_capacity(ranked.len());
        let mut demoted = Vec::new();
        let mut added = 0;
        for address in dedup_normalized(ranked.iter().map(String::as_str)) {
            let mut node = match known.remove(&address) {
                Some(node) => node,
                None => {
                    added += 1;
                    Node::new(address)
                }
            };
            if node.demoted_at.is_some_and(|at| at > started_at) {
                demoted.push(node);
            } else {
                node.healthy = true;
                node.demoted_at = None;
                front.push(node);
            }
        }

        let mut nodes = front;
        for address in old_order {
            if let Some(node) = known.remove(&address) {
                if node.demoted_at.is_some_and(|at| at > started_at) {
                    demoted.push(node);
                } else {
                    nodes.push(node);
                }
            }
        }
        nodes.extend(demoted);
        state.nodes = nodes;
        added
    }
}

impl std::fmt::Debug for NodePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodePool")
            .field("namespace", &self.namespace)
            .field("node_error_limit", &self.node_error_limit)
            .field("nodes", &self.snapshot())
            .finish()
    }
}

fn dedup_normalized<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for entry in raw {
        match normalize_address(entry) {
            Some(address) => {
                if seen.insert(address.clone()) {
                    out.push(address);
                }
            }
            None => tracing::warn!(address = entry, "ignoring invalid node address"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(addrs: &[&str], limit: u32) -> NodePool {
        NodePool::new(ChainNamespace::Primary, addrs, limit)
    }

    #[test]
    fn empty_config_falls_back_to_defaults() {
        let p = pool(&[], 3);
        assert_eq!(p.len(), ChainNamespace::Primary.default_nodes().len());
        assert!(!p.is_empty());
    }

    #[test]
    fn all_invalid_falls_back_to_defaults() {
        let p = NodePool::new(ChainNamespace::SideChain, &["ftp://x", " "], 3);
        assert_eq!(p.addresses()[0], "https://api.hive-engine.com/rpc");
    }

    #[test]
    fn dedupes_and_normalises() {
        let p = pool(&["a.com", "https://a.com/", "b.com"], 3);
        assert_eq!(p.addresses(), vec!["https://a.com", "https://b.com"]);
    }

    #[test]
    fn failure_under_limit_keeps_position() {
        let p = pool(&["a.com", "b.com"], 3);
        assert!(!p.record_failure("https://a.com"));
        let head = &p.snapshot()[0];
        assert_eq!(head.address, "https://a.com");
        assert_eq!(head.error_count, 1);
        assert!(head.healthy);
    }

    #[test]
    fn failure_at_limit_demotes_to_back() {
        let p = pool(&["a.com", "b.com", "c.com"], 1);
        assert!(p.record_failure("https://a.com"));
        assert_eq!(p.addresses(), vec!["https://b.com", "https://c.com", "https://a.com"]);
        assert!(!p.get("https://a.com").unwrap().healthy);
        assert_eq!(p.health(), HealthStatus::Degraded);
    }

    #[test]
    fn success_resets_counter_to_zero_and_becomes_head() {
        let p = pool(&["a.com", "b.com"], 3);
        p.record_failure("https://b.com");
        assert_eq!(p.get("https://b.com").unwrap().error_count, 1);
        p.record_success("https://b.com");
        let head = &p.snapshot()[0];
        assert_eq!(head.address, "https://b.com");
        assert_eq!(head.error_count, 0);
    }

    #[test]
    fn ranking_preserves_counters_and_adds_new_nodes() {
        let p = pool(&["a.com", "b.com"], 5);
        p.record_failure("https://a.com");
        let started = p.epoch();
        let added = p.apply_ranking(
            &["https://c.com".into(), "https://a.com".into()],
            started,
        );
        assert_eq!(added, 1);
        assert_eq!(p.addresses(), vec!["https://c.com", "https://a.com", "https://b.com"]);
        assert_eq!(p.get("https://a.com").unwrap().error_count, 1);
        assert_eq!(p.get("https://c.com").unwrap().error_count, 0);
    }

    #[test]
    fn demotion_newer_than_refresh_wins() {
        let p = pool(&["a.com", "b.com"], 1);
        let started = p.epoch();
        // a fails while the beacon is still probing
        p.record_failure("https://a.com");
        p.apply_ranking(&["https://a.com".into(), "https://b.com".into()], started);
        assert_eq!(p.addresses(), vec!["https://b.com", "https://a.com"]);
    }

    #[test]
    fn demotion_older_than_refresh_can_be_restored() {
        let p = pool(&["a.com", "b.com"], 1);
        p.record_failure("https://a.com");
        let started = p.epoch();
        p.apply_ranking(&["https://a.com".into(), "https://b.com".into()], started);
        assert_eq!(p.addresses()[0], "https://a.com");
        let a = p.get("https://a.com").unwrap();
        assert!(a.healthy);
        assert_eq!(p.health(), HealthStatus::Healthy);
        // counters are not the beacon's to touch
        assert_eq!(a.error_count, 1);
        // the next failure demotes it again
        assert!(p.record_failure("https://a.com"));
        assert_eq!(p.addresses(), vec!["https://b.com", "https://a.com"]);
    }

    #[test]
    fn unranked_demoted_node_stays_unhealthy() {
        let p = pool(&["a.com", "b.com"], 1);
        p.record_failure("https://a.com");
        let started = p.epoch();
        p.apply_ranking(&["https://b.com".into()], started);
        assert_eq!(p.addresses(), vec!["https://b.com", "https://a.com"]);
        assert!(!p.get("https://a.com").unwrap().healthy);
        assert_eq!(p.health(), HealthStatus::Degraded);
    }

    #[test]
    fn empty_ranking_is_a_no_op() {
        let p = pool(&["a.com", "b.com"], 1);
        let before = p.addresses();
        assert_eq!(p.apply_ranking(&[], p.epoch()), 0);
        assert_eq!(p.addresses(), before);
    }
}
