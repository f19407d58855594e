//! Beacon health service: probes candidate nodes, ranks them, and replaces
//! a pool's ordering.
//!
//! The beacon's health signal (probe latency and reported chain height) is
//! independent of the transport's error counters: probes never touch
//! `error_count`, and the transport never reads probe results.
//!
//! ```text
//! candidates (pool ∪ defaults) → [NodeProber] → [NodeRanker] → NodePool::apply_ranking
//! ```

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use crate::error::TransportError;
use crate::namespace::ChainNamespace;
use crate::node::normalize_address;
use crate::pool::NodePool;
use crate::transport::RpcTransport;

/// Whether refreshes run on a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeaconMode {
    /// Refresh every `interval_time` seconds once started.
    Auto,
    /// Refresh only when explicitly asked to.
    Manual,
}

/// Beacon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BeaconConfig {
    pub mode: BeaconMode,
    /// Seconds between automatic refreshes.
    pub interval_time: u64,
    /// Run one refresh while the client is being built.
    pub load_on_initialize: bool,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            mode: BeaconMode::Auto,
            interval_time: 300,
            load_on_initialize: false,
        }
    }
}

impl BeaconConfig {
    /// Refresh period, never shorter than one second.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_time.max(1))
    }
}

// ─── Probing ──────────────────────────────────────────────────────────────────

/// Outcome of a successful health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub address: String,
    pub latency: Duration,
    /// Chain height the node reported.
    pub height: u64,
}

/// Checks one node's liveness and chain height.
#[async_trait]
pub trait NodeProber: Send + Sync + 'static {
    async fn probe(&self, namespace: ChainNamespace, address: &str) -> Result<ProbeResult, TransportError>;
}

/// Probes nodes with a cheap height query over an [`RpcTransport`].
///
/// - primary: `condenser_api.get_dynamic_global_properties` → `head_block_number`
/// - side-chain: `blockchain.getLatestBlockInfo` → `blockNumber`
pub struct RpcProber {
    transport: Arc<dyn RpcTransport>,
    timeout: Duration,
}

impl RpcProber {
    pub fn new(transport: Arc<dyn RpcTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }
}

#[async_trait]
impl NodeProber for RpcProber {
    async fn probe(&self, namespace: ChainNamespace, address: &str) -> Result<ProbeResult, TransportError> {
        let (api, method, params, height_field) = match namespace {
            ChainNamespace::Primary => (
                "condenser_api",
                "get_dynamic_global_properties",
                json!([]),
                "head_block_number",
            ),
            ChainNamespace::SideChain => ("blockchain", "getLatestBlockInfo", json!({}), "blockNumber"),
        };
        let url = namespace.endpoint(address, api);
        let req = namespace.request(0, api, method, params);

        let started = Instant::now();
        let resp = tokio::time::timeout(self.timeout, self.transport.send(&url, req))
            .await
            .map_err(|_| TransportError::Timeout {
                ms: self.timeout.as_millis() as u64,
            })??;
        let latency = started.elapsed();

        let value = resp.into_result().map_err(TransportError::Rpc)?;
        let height = value
            .get(height_field)
            .and_then(Value::as_u64)
            .ok_or_else(|| TransportError::Other(format!("probe response has no {height_field}")))?;

        Ok(ProbeResult {
            address: address.to_string(),
            latency,
            height,
        })
    }
}

// ─── Ranking ──────────────────────────────────────────────────────────────────

/// Turns successful probes into a node ordering, best first.
pub trait NodeRanker: Send + Sync + 'static {
    fn rank(&self, probes: &[ProbeResult]) -> Vec<String>;
}

/// Ranks caught-up nodes by latency, then lagging nodes by lag.
///
/// A node is caught up when it is at most `max_lag` blocks behind the highest
/// height observed in the same refresh.
#[derive(Debug, Clone)]
pub struct LatencyHeightRanker {
    pub max_lag: u64,
}

impl Default for LatencyHeightRanker {
    fn default() -> Self {
        Self { max_lag: 3 }
    }
}

impl NodeRanker for LatencyHeightRanker {
    fn rank(&self, probes: &[ProbeResult]) -> Vec<String> {
        let Some(best) = probes.iter().map(|p| p.height).max() else {
            return vec![];
        };
        let (mut current, mut lagging): (Vec<&ProbeResult>, Vec<&ProbeResult>) =
            probes.iter().partition(|p| best - p.height <= self.max_lag);

        current.sort_by_key(|p| (p.latency, Reverse(p.height)));
        lagging.sort_by_key(|p| (best - p.height, p.latency));

        current
            .into_iter()
            .chain(lagging)
            .map(|p| p.address.clone())
            .collect()
    }
}

// ─── Beacon ───────────────────────────────────────────────────────────────────

/// Summary of one refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Addresses probed.
    pub probed: usize,
    /// Addresses that answered and were ranked.
    pub ranked: usize,
    /// Addresses whose probe failed.
    pub failed: usize,
    /// Addresses newly added to the pool.
    pub added: usize,
    /// `false` if the ranking was discarded (nothing answered, or the
    /// beacon was stopped while probing).
    pub applied: bool,
}

struct BeaconCore {
    pool: Arc<NodePool>,
    prober: Arc<dyn NodeProber>,
    ranker: Arc<dyn NodeRanker>,
    /// Held while a ranking is written, so `stop()` cannot return while the
    /// pool is mid-rewrite.
    stopped: Mutex<bool>,
}

impl BeaconCore {
    fn is_stopped(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn candidates(&self) -> Vec<String> {
        let namespace = self.pool.namespace();
        let mut seen = HashSet::new();
        self.pool
            .addresses()
            .into_iter()
            .chain(namespace.default_nodes().iter().filter_map(|a| normalize_address(a)))
            .filter(|a| seen.insert(a.clone()))
            .collect()
    }

    async fn refresh(&self) -> RefreshReport {
        let namespace = self.pool.namespace();
        if self.is_stopped() {
            return RefreshReport::default();
        }

        let started_at = self.pool.epoch();
        let candidates = self.candidates();
        let outcomes = join_all(
            candidates
                .iter()
                .map(|address| self.prober.probe(namespace, address)),
        )
        .await;

        let mut probes = Vec::with_capacity(outcomes.len());
        for (address, outcome) in candidates.iter().zip(outcomes) {
            match outcome {
                Ok(probe) => probes.push(probe),
                Err(e) => tracing::debug!(%namespace, node = %address, error = %e, "health probe failed"),
            }
        }

        let mut report = RefreshReport {
            probed: candidates.len(),
            ranked: probes.len(),
            failed: candidates.len() - probes.len(),
            ..Default::default()
        };

        let ranking = self.ranker.rank(&probes);
        if ranking.is_empty() {
            tracing::warn!(%namespace, probed = report.probed, "no node answered the health probe");
            return report;
        }

        {
            let stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
            // Results of a refresh that outlived stop() are dropped.
            if *stopped {
                tracing::debug!(%namespace, "beacon stopped during refresh, ranking discarded");
                return report;
            }
            report.added = self.pool.apply_ranking(&ranking, started_at);
            report.applied = true;
        }
        tracing::info!(
            %namespace,
            probed = report.probed,
            ranked = report.ranked,
            failed = report.failed,
            added = report.added,
            head = %ranking[0],
            "beacon refresh complete"
        );
        report
    }
}

/// Health service for one pool, owning its refresh timer.
///
/// The timer task only holds the beacon's internals, never the `Beacon`
/// itself, so dropping the `Beacon` (including on a failed client build)
/// always cancels the timer.
pub struct Beacon {
    core: Arc<BeaconCore>,
    config: BeaconConfig,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Beacon {
    pub fn new(
        pool: Arc<NodePool>,
        prober: Arc<dyn NodeProber>,
        ranker: Arc<dyn NodeRanker>,
        config: BeaconConfig,
    ) -> Self {
        Self {
            core: Arc::new(BeaconCore {
                pool,
                prober,
                ranker,
                stopped: Mutex::new(false),
            }),
            config,
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BeaconConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<NodePool> {
        &self.core.pool
    }

    /// Probe, rank, and replace the pool ordering once.
    pub async fn refresh(&self) -> RefreshReport {
        self.core.refresh().await
    }

    /// Start the refresh timer (auto mode only). The first tick fires one
    /// interval from now. No-op if already running, stopped, or manual.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        if self.config.mode != BeaconMode::Auto || self.core.is_stopped() {
            return;
        }
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return;
        }
        let core = Arc::clone(&self.core);
        let period = self.config.interval();
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if core.is_stopped() {
                    break;
                }
                core.refresh().await;
            }
        }));
        tracing::debug!(namespace = %self.core.pool.namespace(), interval_s = period.as_secs(), "beacon timer started");
    }

    /// Returns `true` while the refresh timer is scheduled.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    pub fn is_stopped(&self) -> bool {
        self.core.is_stopped()
    }

    /// Cancel the timer and discard any in-flight refresh. Idempotent; once
    /// this returns, the beacon never touches the pool again.
    pub fn stop(&self) {
        *self.core.stopped.lock().unwrap_or_else(PoisonError::into_inner) = true;
        if let Some(task) = self.task.lock().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
            tracing::debug!(namespace = %self.core.pool.namespace(), "beacon timer stopped");
        }
    }
}

impl Drop for Beacon {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Beacon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Beacon")
            .field("namespace", &self.core.pool.namespace())
            .field("config", &self.config)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    /// Probe outcomes keyed by address; unknown addresses fail.
    struct MockProber {
        heights: HashMap<String, (u64, u64)>,
        calls: AtomicUsize,
    }

    impl MockProber {
        fn new(spec: &[(&str, u64, u64)]) -> Arc<Self> {
            Arc::new(Self {
                heights: spec
                    .iter()
                    .map(|(a, h, ms)| (a.to_string(), (*h, *ms)))
                    .collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl NodeProber for MockProber {
        async fn probe(&self, _ns: ChainNamespace, address: &str) -> Result<ProbeResult, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.heights.get(address) {
                Some((height, ms)) => Ok(ProbeResult {
                    address: address.to_string(),
                    latency: Duration::from_millis(*ms),
                    height: *height,
                }),
                None => Err(TransportError::Http("unreachable".into())),
            }
        }
    }

    /// Answers every address, but only once the gate is opened.
    struct GatedProber {
        gate: Semaphore,
        calls: AtomicUsize,
    }

    impl GatedProber {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(0),
                calls: AtomicUsize::new(0),
            })
        }

        fn open(&self) {
            self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }

        async fn wait_for_first_call(&self) {
            while self.calls.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        }
    }

    #[async_trait]
    impl NodeProber for GatedProber {
        async fn probe(&self, _ns: ChainNamespace, address: &str) -> Result<ProbeResult, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| TransportError::Other(e.to_string()))?;
            Ok(probe(address, 10, 1))
        }
    }

    fn probe(address: &str, height: u64, ms: u64) -> ProbeResult {
        ProbeResult {
            address: address.into(),
            latency: Duration::from_millis(ms),
            height,
        }
    }

    fn beacon(pool: Arc<NodePool>, prober: Arc<MockProber>, mode: BeaconMode) -> Beacon {
        Beacon::new(
            pool,
            prober,
            Arc::new(LatencyHeightRanker::default()),
            BeaconConfig {
                mode,
                interval_time: 2,
                load_on_initialize: false,
            },
        )
    }

    #[test]
    fn ranker_prefers_fast_caught_up_nodes() {
        let ranked = LatencyHeightRanker { max_lag: 2 }.rank(&[
            probe("slow", 100, 300),
            probe("fast", 99, 50),
            probe("stale", 80, 10),
            probe("lagging", 95, 20),
        ]);
        assert_eq!(ranked, vec!["fast", "slow", "lagging", "stale"]);
    }

    #[test]
    fn ranker_empty() {
        assert!(LatencyHeightRanker::default().rank(&[]).is_empty());
    }

    #[test]
    fn config_defaults_and_serde() {
        let cfg: BeaconConfig = serde_json::from_str(r#"{"intervalTime": 2, "mode": "manual"}"#).unwrap();
        assert_eq!(cfg.mode, BeaconMode::Manual);
        assert_eq!(cfg.interval(), Duration::from_secs(2));
        assert!(!cfg.load_on_initialize);
        assert_eq!(BeaconConfig::default().interval(), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn refresh_appends_defaults_and_ranks() {
        let pool = Arc::new(NodePool::new(ChainNamespace::Primary, &["wrong.api.hive.com"], 1));
        let prober = MockProber::new(&[
            ("https://api.hive.blog", 1000, 80),
            ("https://api.deathwing.me", 1000, 40),
        ]);
        let b = beacon(pool.clone(), prober, BeaconMode::Manual);

        let report = b.refresh().await;
        assert!(report.applied);
        assert_eq!(report.ranked, 2);
        assert_eq!(report.probed, 1 + ChainNamespace::Primary.default_nodes().len());

        let addrs = pool.addresses();
        assert_eq!(addrs[0], "https://api.deathwing.me");
        assert_eq!(addrs[1], "https://api.hive.blog");
        // the failed configured node is kept, just not ranked
        assert!(addrs.contains(&"https://wrong.api.hive.com".to_string()));
        assert!(pool.len() > 2);
    }

    #[tokio::test]
    async fn failed_probe_leaves_error_count_alone() {
        let pool = Arc::new(NodePool::new(ChainNamespace::Primary, &["a.com", "b.com"], 5));
        pool.record_failure("https://a.com");
        let prober = MockProber::new(&[("https://b.com", 10, 5)]);
        beacon(pool.clone(), prober, BeaconMode::Manual).refresh().await;

        assert_eq!(pool.addresses()[0], "https://b.com");
        assert_eq!(pool.get("https://a.com").unwrap().error_count, 1);
        assert_eq!(pool.get("https://b.com").unwrap().error_count, 0);
    }

    #[tokio::test]
    async fn nothing_answers_pool_unchanged() {
        let pool = Arc::new(NodePool::new(ChainNamespace::SideChain, &["a.com"], 5));
        let report = beacon(pool.clone(), MockProber::new(&[]), BeaconMode::Manual)
            .refresh()
            .await;
        assert!(!report.applied);
        assert_eq!(pool.addresses(), vec!["https://a.com"]);
    }

    #[tokio::test]
    async fn manual_mode_never_starts_timer() {
        let pool = Arc::new(NodePool::new(ChainNamespace::Primary, &["a.com"], 5));
        let b = beacon(pool, MockProber::new(&[]), BeaconMode::Manual);
        b.start();
        assert!(!b.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn auto_mode_refreshes_on_interval_until_stopped() {
        let pool = Arc::new(NodePool::new(ChainNamespace::Primary, &["a.com"], 5));
        let prober = MockProber::new(&[("https://a.com", 1, 1)]);
        let b = beacon(pool, prober.clone(), BeaconMode::Auto);
        let per_refresh = 1 + ChainNamespace::Primary.default_nodes().len();

        b.start();
        b.start(); // idempotent
        assert!(b.is_running());
        assert_eq!(prober.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2_100)).await;
        assert_eq!(prober.calls.load(Ordering::SeqCst), per_refresh);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(prober.calls.load(Ordering::SeqCst), 2 * per_refresh);

        b.stop();
        b.stop();
        assert!(!b.is_running());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(prober.calls.load(Ordering::SeqCst), 2 * per_refresh);
    }

    #[tokio::test]
    async fn stopped_beacon_discards_refresh() {
        let pool = Arc::new(NodePool::new(ChainNamespace::Primary, &["a.com"], 5));
        let prober = MockProber::new(&[("https://api.hive.blog", 1, 1)]);
        let b = beacon(pool.clone(), prober, BeaconMode::Manual);
        b.stop();
        assert!(!b.refresh().await.applied);
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn refresh_in_flight_when_stopped_is_discarded() {
        let pool = Arc::new(NodePool::new(ChainNamespace::Primary, &["a.com"], 5));
        let prober = GatedProber::new();
        let b = Beacon::new(
            pool.clone(),
            prober.clone(),
            Arc::new(LatencyHeightRanker::default()),
            BeaconConfig {
                mode: BeaconMode::Manual,
                ..Default::default()
            },
        );

        let (report, ()) = tokio::join!(b.refresh(), async {
            prober.wait_for_first_call().await;
            b.stop();
            prober.open();
        });

        // every probe answered, but after stop()
        assert_eq!(report.ranked, report.probed);
        assert!(!report.applied);
        assert_eq!(report.added, 0);
        assert_eq!(pool.addresses(), vec!["https://a.com"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pool_is_final_once_stop_returns() {
        for _ in 0..20 {
            let pool = Arc::new(NodePool::new(ChainNamespace::Primary, &["a.com"], 5));
            let prober = GatedProber::new();
            let b = Arc::new(Beacon::new(
                pool.clone(),
                prober.clone(),
                Arc::new(LatencyHeightRanker::default()),
                BeaconConfig {
                    mode: BeaconMode::Manual,
                    ..Default::default()
                },
            ));

            let refresh = tokio::spawn({
                let b = Arc::clone(&b);
                async move { b.refresh().await }
            });
            prober.wait_for_first_call().await;
            prober.open();
            b.stop();
            let after_stop = pool.addresses();

            let report = refresh.await.unwrap();
            assert_eq!(pool.addresses(), after_stop);
            if !report.applied {
                assert_eq!(after_stop, vec!["https://a.com"]);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_beacon_cancels_timer() {
        let pool = Arc::new(NodePool::new(ChainNamespace::Primary, &["a.com"], 5));
        let prober = MockProber::new(&[("https://a.com", 1, 1)]);
        let b = beacon(pool, prober.clone(), BeaconMode::Auto);
        b.start();
        drop(b);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(prober.calls.load(Ordering::SeqCst), 0);
    }
}
