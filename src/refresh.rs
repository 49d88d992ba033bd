//! Background refresh of the client cache.
//!
//! One loop per scheduler, launched at most once. It refreshes immediately,
//! then every `ttl` seconds until stopped. A failed refresh leaves the live
//! snapshot in place and is retried on the next tick.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::DnsError;
use crate::metrics;
use crate::snapshot::SnapshotBuilder;
use crate::state::ClientCache;

/// Owns the refresh loop for one [`ClientCache`].
#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    cache: ClientCache,
    builder: SnapshotBuilder,
    interval: Duration,

    /// Set once by whichever caller launches the loop.
    started: AtomicBool,

    /// Serializes writers. Held across the upstream fetch, never by readers.
    refresh_lock: tokio::sync::Mutex<()>,

    shutdown: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    /// Create a scheduler refreshing `cache` every `cache.ttl()` seconds.
    pub fn new(cache: ClientCache, builder: SnapshotBuilder) -> Self {
        Self::with_cancellation(cache, builder, CancellationToken::new())
    }

    /// Like [`RefreshScheduler::new`], stopped by an externally owned token.
    pub fn with_cancellation(
        cache: ClientCache,
        builder: SnapshotBuilder,
        shutdown: CancellationToken,
    ) -> Self {
        let interval = Duration::from_secs(u64::from(cache.ttl().max(1)));
        Self {
            inner: Arc::new(SchedulerInner {
                cache,
                builder,
                interval,
                started: AtomicBool::new(false),
                refresh_lock: tokio::sync::Mutex::new(()),
                shutdown,
                handle: Mutex::new(None),
            }),
        }
    }

    /// The cache this scheduler writes to.
    pub fn cache(&self) -> &ClientCache {
        &self.inner.cache
    }

    /// Whether the loop has been launched.
    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    /// Launch the refresh loop unless it is already running.
    ///
    /// Returns `true` for the one caller that launched it. Must be called
    /// from within a tokio runtime.
    pub fn start(&self) -> bool {
        if self
            .inner
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        info!(interval_secs = self.inner.interval.as_secs(), "starting client refresh loop");
        let scheduler = self.clone();
        let mut slot = self.inner.handle.lock();
        *slot = Some(tokio::spawn(async move { scheduler.run().await }));
        true
    }

    async fn run(self) {
        let mut interval = tokio::time::interval(self.inner.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.inner.shutdown.cancelled() => {
                    info!("client refresh loop shutting down");
                    return;
                }

                _ = interval.tick() => {
                    // Errors are logged inside; the next tick retries.
                    let _ = self.refresh().await;
                }
            }
        }
    }

    /// Run one refresh cycle now.
    ///
    /// The snapshot is built without holding the cache lock and swapped in
    /// on success. Any completed attempt marks the cache ready.
    pub async fn refresh(&self) -> Result<usize, DnsError> {
        let _writer = self.inner.refresh_lock.lock().await;
        debug!("updating clients");

        let result = self.inner.builder.build().await;
        let outcome = match result {
            Ok(snapshot) => {
                let hosts = snapshot.len();
                self.inner.cache.install(snapshot);
                info!(hosts, "got hosts");
                metrics::record_refresh(true);
                Ok(hosts)
            }
            Err(e) => {
                warn!(error = %e, "unable to get clients");
                metrics::record_refresh(false);
                Err(e)
            }
        };

        self.inner.cache.mark_ready();
        outcome
    }

    /// Refresh once if no attempt has completed yet, then report readiness.
    ///
    /// Always ends ready, even when the upstream is unreachable.
    pub async fn ensure_ready(&self) -> bool {
        if !self.inner.cache.is_ready() {
            let _ = self.refresh().await;
        }
        self.inner.cache.is_ready()
    }

    /// Stop the loop and wait for it to exit.
    pub async fn stop(&self) {
        self.inner.shutdown.cancel();
        let handle = self.inner.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
