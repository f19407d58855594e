//! The `Client` façade: one failover transport and beacon per namespace.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hiverpc_core::{
    Beacon, BeaconMode, ChainNamespace, FailoverTransport, HealthStatus, LatencyHeightRanker, Node,
    NodePool, NodeProber, NodeRanker, RefreshReport, RpcProber, RpcTransport,
};
use hiverpc_http::HttpTransport;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::{ClientConfig, NamespaceSettings};
use crate::database::DatabaseApi;
use crate::error::ClientError;

struct ChainPair {
    transport: Arc<FailoverTransport>,
    beacon: Beacon,
}

impl ChainPair {
    fn build(
        settings: &NamespaceSettings,
        transport: Arc<dyn RpcTransport>,
        prober: Option<Arc<dyn NodeProber>>,
        ranker: Arc<dyn NodeRanker>,
    ) -> Self {
        let pool = Arc::new(NodePool::new(
            settings.namespace,
            &settings.nodes,
            settings.node_error_limit,
        ));
        let prober =
            prober.unwrap_or_else(|| Arc::new(RpcProber::new(Arc::clone(&transport), settings.timeout)));
        let beacon = Beacon::new(Arc::clone(&pool), prober, ranker, settings.beacon.clone());
        let transport = Arc::new(FailoverTransport::new(pool, transport, settings.timeout));
        Self { transport, beacon }
    }

    async fn initialize(&self) {
        let config = self.beacon.config();
        if config.load_on_initialize {
            self.beacon.refresh().await;
            if config.mode == BeaconMode::Auto {
                self.beacon.start();
            }
        }
    }
}

/// Builder for [`Client`]. Every part not supplied gets its production
/// default: an [`HttpTransport`], an [`RpcProber`] per namespace and a
/// [`LatencyHeightRanker`].
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn RpcTransport>>,
    prober: Option<Arc<dyn NodeProber>>,
    ranker: Option<Arc<dyn NodeRanker>>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn transport(mut self, transport: Arc<dyn RpcTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn prober(mut self, prober: Arc<dyn NodeProber>) -> Self {
        self.prober = Some(prober);
        self
    }

    pub fn ranker(mut self, ranker: Arc<dyn NodeRanker>) -> Self {
        self.ranker = Some(ranker);
        self
    }

    /// Build the client. With `beacon.loadOnInitialize`, this runs the
    /// first refresh of every pair before returning.
    pub async fn build(self) -> Result<Client, ClientError> {
        self.config.validate()?;

        let primary_settings = self
            .config
            .settings(ChainNamespace::Primary)
            .ok_or_else(|| ClientError::Config("primary namespace settings missing".into()))?;
        let side_settings = self.config.settings(ChainNamespace::SideChain);

        let transport = match self.transport {
            Some(t) => t,
            None => {
                let longest = side_settings
                    .as_ref()
                    .map_or(primary_settings.timeout, |s| s.timeout.max(primary_settings.timeout));
                Arc::new(HttpTransport::with_timeout(longest)?) as Arc<dyn RpcTransport>
            }
        };
        let ranker = self.ranker.unwrap_or_else(|| {
            Arc::new(LatencyHeightRanker {
                max_lag: self.config.max_lag,
            })
        });

        let primary = ChainPair::build(
            &primary_settings,
            Arc::clone(&transport),
            self.prober.clone(),
            Arc::clone(&ranker),
        );
        let side_chain = side_settings.map(|s| ChainPair::build(&s, transport, self.prober, ranker));

        let client = Client {
            config: self.config,
            primary,
            side_chain,
            destroyed: AtomicBool::new(false),
        };
        futures::join!(
            client.primary.initialize(),
            async {
                if let Some(pair) = &client.side_chain {
                    pair.initialize().await;
                }
            }
        );
        tracing::info!(
            primary_nodes = client.primary.transport.pool().len(),
            side_chain = client.side_chain.is_some(),
            "client ready"
        );
        Ok(client)
    }
}

/// Resilient RPC client for the primary chain and the side-chain.
///
/// Each namespace owns an isolated node pool. Calls rotate through the pool
/// on node failure; the beacon re-ranks the pool on demand
/// ([`load_nodes`](Self::load_nodes)) and, in auto mode, on a timer.
///
/// Dropping the client stops every beacon timer.
pub struct Client {
    config: ClientConfig,
    primary: ChainPair,
    side_chain: Option<ChainPair>,
    destroyed: AtomicBool,
}

impl Client {
    /// Build a client with HTTP transport and default probing.
    pub async fn new(config: ClientConfig) -> Result<Self, ClientError> {
        ClientBuilder::new(config).build().await
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn pair(&self, namespace: ChainNamespace) -> Result<&ChainPair, ClientError> {
        match namespace {
            ChainNamespace::Primary => Ok(&self.primary),
            ChainNamespace::SideChain => self
                .side_chain
                .as_ref()
                .ok_or(ClientError::NamespaceNotConfigured(namespace)),
        }
    }

    /// Call `api.method(params)` on the given namespace.
    pub async fn call(
        &self,
        namespace: ChainNamespace,
        api: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, ClientError> {
        Ok(self.pair(namespace)?.transport.call(api, method, params).await?)
    }

    /// Call and deserialize the result.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        namespace: ChainNamespace,
        api: &str,
        method: &str,
        params: Value,
    ) -> Result<T, ClientError> {
        Ok(self
            .pair(namespace)?
            .transport
            .call_as(api, method, params)
            .await?)
    }

    /// Refresh every configured pool now and wait for the results. In auto
    /// mode this also starts the refresh timers.
    ///
    /// After [`destroy`](Self::destroy) this is a no-op returning no reports.
    pub async fn load_nodes(&self) -> Vec<(ChainNamespace, RefreshReport)> {
        if self.destroyed.load(Ordering::Acquire) {
            return vec![];
        }
        let pairs: Vec<&ChainPair> = std::iter::once(&self.primary)
            .chain(self.side_chain.as_ref())
            .collect();
        let reports = futures::future::join_all(pairs.iter().map(|pair| pair.beacon.refresh())).await;
        for pair in &pairs {
            pair.beacon.start();
        }
        pairs
            .iter()
            .map(|pair| pair.transport.namespace())
            .zip(reports)
            .collect()
    }

    /// Stop every beacon timer. Idempotent; calls keep working afterwards.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.primary.beacon.stop();
        if let Some(pair) = &self.side_chain {
            pair.beacon.stop();
        }
        tracing::debug!("client destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Current ordering and counters of a namespace's pool.
    pub fn pool(&self, namespace: ChainNamespace) -> Result<Vec<Node>, ClientError> {
        Ok(self.pair(namespace)?.transport.pool().snapshot())
    }

    pub fn health(&self, namespace: ChainNamespace) -> Result<HealthStatus, ClientError> {
        Ok(self.pair(namespace)?.transport.pool().health())
    }

    /// `true` while the namespace's refresh timer is scheduled.
    pub fn beacon_running(&self, namespace: ChainNamespace) -> Result<bool, ClientError> {
        Ok(self.pair(namespace)?.beacon.is_running())
    }

    /// Primary-chain read accessors.
    pub fn database(&self) -> DatabaseApi {
        DatabaseApi::new(Arc::clone(&self.primary.transport))
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("primary", &self.primary.transport)
            .field("side_chain", &self.side_chain.as_ref().map(|p| &p.transport))
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
