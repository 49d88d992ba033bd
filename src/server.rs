//! DNS server setup and lifecycle management.

use hickory_server::authority::{AuthorityObject, Catalog};
use hickory_server::ServerFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::authority::{ClientAuthority, NegativeAuthority};
use crate::config::DnsConfig;
use crate::domains::NetworkDomains;
use crate::error::DnsError;
use crate::forward::{ForwardAuthority, UpstreamForwarder};
use crate::refresh::RefreshScheduler;
use crate::resolver::ClientResolver;
use crate::snapshot::{NameSource, SnapshotBuilder};
use crate::state::ClientCache;
use crate::unifi::ClientSource;

/// Interval for emitting state metrics.
const METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// Periodically emit state metrics.
async fn metrics_loop(cache: ClientCache, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(METRICS_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                cache.emit_metrics();
                debug!(
                    hosts = cache.host_count(),
                    ready = cache.is_ready(),
                    "emitted state metrics"
                );
            }
            _ = shutdown.cancelled() => {
                debug!("metrics loop shutting down");
                return;
            }
        }
    }
}

/// DNS server answering for controller clients.
pub struct DnsServer {
    config: DnsConfig,
    resolver: ClientResolver,
    scheduler: RefreshScheduler,
    shutdown: CancellationToken,
}

impl DnsServer {
    /// Create a new DNS server reading clients from `source`.
    pub fn new(config: DnsConfig, source: Arc<dyn ClientSource>) -> Self {
        let shutdown = CancellationToken::new();
        let domains = NetworkDomains::new(&config.networks);
        let cache = ClientCache::new(config.ttl);
        let builder = SnapshotBuilder::new(
            source,
            domains.clone(),
            NameSource::from_toggle(config.use_name_as_hostname),
            config.ttl,
        );
        let scheduler =
            RefreshScheduler::with_cancellation(cache.clone(), builder, shutdown.child_token());

        Self {
            config,
            resolver: ClientResolver::new(cache, domains),
            scheduler,
            shutdown,
        }
    }

    /// Get a reference to the client cache.
    pub fn cache(&self) -> &ClientCache {
        self.resolver.cache()
    }

    /// The scheduler refreshing the cache.
    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    /// Readiness for health checks: true once a refresh attempt completed.
    pub fn is_ready(&self) -> bool {
        self.cache().is_ready()
    }

    /// Readiness check path: refresh once if nothing has been attempted yet.
    pub async fn ensure_ready(&self) -> bool {
        self.scheduler.ensure_ready().await
    }

    /// Build the catalog.
    ///
    /// Each served suffix gets the client authority followed by a fallback:
    /// the upstream forwarder when one is configured, otherwise an
    /// authoritative negative responder. With upstreams, the root zone
    /// forwards every other name.
    pub fn catalog(&self) -> Result<Catalog, DnsError> {
        let forwarder = (!self.config.upstreams.is_empty()).then(|| {
            UpstreamForwarder::new(
                self.config.upstreams.clone(),
                Duration::from_millis(self.config.upstream_timeout_ms),
            )
        });

        let mut catalog = Catalog::new();
        for suffix in self.resolver.domains().suffixes() {
            let client: Arc<dyn AuthorityObject> = Arc::new(ClientAuthority::new(
                suffix,
                self.resolver.clone(),
                self.scheduler.clone(),
            )?);
            let fallback: Arc<dyn AuthorityObject> = match &forwarder {
                Some(forwarder) => Arc::new(ForwardAuthority::new(suffix, forwarder.clone())?),
                None => Arc::new(NegativeAuthority::new(suffix, self.resolver.clone())?),
            };
            catalog.upsert(client.origin().clone(), vec![client, fallback]);
        }

        if let Some(forwarder) = forwarder {
            let root: Arc<dyn AuthorityObject> = Arc::new(ForwardAuthority::new(".", forwarder)?);
            catalog.upsert(root.origin().clone(), vec![root]);
        }
        Ok(catalog)
    }

    /// Run the DNS server until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), DnsError> {
        info!(
            listen_addr = %self.config.listen_addr,
            ttl = self.config.ttl,
            domains = ?self.resolver.domains().suffixes().collect::<Vec<_>>(),
            upstreams = ?self.config.upstreams,
            "Starting unifi-names server"
        );

        // One eager refresh so the server comes up with data when the
        // controller is reachable. Never blocks startup on failure.
        info!("Fetching initial client list...");
        tokio::select! {
            _ = self.ensure_ready() => {
                info!(hosts = self.cache().host_count(), "Initial client fetch complete");
            }
            _ = shutdown.cancelled() => {
                info!("Shutdown requested before initial fetch completed");
                return Ok(());
            }
        }

        let mut server = ServerFuture::new(self.catalog()?);

        // Bind UDP
        let udp_socket = UdpSocket::bind(self.config.listen_addr).await?;
        info!(addr = %self.config.listen_addr, "DNS UDP listening");
        server.register_socket(udp_socket);

        // Bind TCP
        let tcp_listener = TcpListener::bind(self.config.listen_addr).await?;
        info!(addr = %self.config.listen_addr, "DNS TCP listening");
        server.register_listener(tcp_listener, Duration::from_secs(30));

        info!("DNS server ready to serve queries");

        let metrics_handle = tokio::spawn(metrics_loop(
            self.cache().clone(),
            self.shutdown.child_token(),
        ));
        self.cache().emit_metrics();

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("DNS server shutdown requested");
            }
            result = server.block_until_done() => {
                if let Err(e) = result {
                    error!("DNS server error: {}", e);
                }
            }
        }

        self.shutdown.cancel();
        let _ = metrics_handle.await;

        info!("Waiting for refresh loop to stop...");
        self.scheduler.stop().await;

        info!("DNS server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unifi::{ClientEntry, Site};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct Unreachable;

    #[async_trait]
    impl ClientSource for Unreachable {
        async fn sites(&self) -> Result<Vec<Site>, DnsError> {
            Err(DnsError::Upstream("controller unreachable".to_string()))
        }

        async fn clients(&self, _sites: &[Site]) -> Result<Vec<ClientEntry>, DnsError> {
            Ok(Vec::new())
        }
    }

    fn config() -> DnsConfig {
        let mut networks = HashMap::new();
        networks.insert("lan".to_string(), "home.arpa".to_string());
        networks.insert("iot".to_string(), "iot.home.arpa".to_string());
        DnsConfig {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            ttl: 60,
            networks,
            use_name_as_hostname: false,
            debug: false,
            upstreams: Vec::new(),
            upstream_timeout_ms: 2_000,
        }
    }

    #[test]
    fn test_server_creation() {
        let server = DnsServer::new(config(), Arc::new(Unreachable));
        assert!(!server.is_ready());
        assert_eq!(server.cache().ttl(), 60);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let server = DnsServer::new(config(), Arc::new(Unreachable));
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        server.run(shutdown).await.unwrap();
    }
}
