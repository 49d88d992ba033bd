//! Live client cache shared between the refresh task and the query path.
//!
//! The live snapshot and its update time sit behind one mutex. Writers swap
//! in a fully built snapshot; readers take a reference to the current one, so
//! a query never sees a mix of two refresh cycles.

use hickory_proto::rr::{Record, RecordType};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::metrics;
use crate::snapshot::ClientSnapshot;

/// Thread-safe handle to the live client snapshot.
#[derive(Debug, Clone)]
pub struct ClientCache {
    inner: Arc<CacheInner>,
}

#[derive(Debug)]
struct CacheInner {
    /// Configured refresh interval, also the base TTL.
    ttl: u32,

    live: Mutex<LiveState>,

    /// True once any refresh attempt finished, successful or not.
    ready: AtomicBool,
}

#[derive(Debug)]
struct LiveState {
    snapshot: Arc<ClientSnapshot>,

    /// Time of the last successful refresh.
    last_update: Option<Instant>,
}

/// A consistent view of the cache for the duration of one query.
#[derive(Debug, Clone)]
pub struct CacheView {
    snapshot: Arc<ClientSnapshot>,
    last_update: Option<Instant>,
    ttl: u32,
}

impl CacheView {
    /// Look up `name` and render it with a TTL reduced by the snapshot's age.
    pub fn answer(&self, name: &str, record_type: RecordType) -> Option<Record> {
        let record = self.snapshot.find(name, record_type)?;
        let ttl = match self.last_update {
            Some(updated) => live_ttl(self.ttl, updated.elapsed()),
            None => self.ttl,
        };
        Some(record.to_record(ttl))
    }

    /// The snapshot this view reads from.
    pub fn snapshot(&self) -> &ClientSnapshot {
        &self.snapshot
    }
}

/// Remaining TTL for a record refreshed `age` ago. Never below zero.
pub fn live_ttl(ttl: u32, age: Duration) -> u32 {
    let age = u32::try_from(age.as_secs()).unwrap_or(u32::MAX);
    ttl.saturating_sub(age)
}

impl ClientCache {
    /// Create an empty cache with the given base TTL in seconds.
    pub fn new(ttl: u32) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                ttl,
                live: Mutex::new(LiveState {
                    snapshot: Arc::new(ClientSnapshot::empty()),
                    last_update: None,
                }),
                ready: AtomicBool::new(false),
            }),
        }
    }

    /// Configured base TTL.
    pub fn ttl(&self) -> u32 {
        self.inner.ttl
    }

    /// Replace the live snapshot and stamp the update time.
    pub fn install(&self, snapshot: ClientSnapshot) {
        let hosts = snapshot.len();
        let snapshot = Arc::new(snapshot);
        {
            let mut live = self.inner.live.lock();
            live.snapshot = snapshot;
            live.last_update = Some(Instant::now());
        }
        debug!(hosts, "installed client snapshot");
    }

    /// Current snapshot and update time, read under the lock.
    pub fn view(&self) -> CacheView {
        let live = self.inner.live.lock();
        CacheView {
            snapshot: Arc::clone(&live.snapshot),
            last_update: live.last_update,
            ttl: self.inner.ttl,
        }
    }

    /// Time of the last successful refresh.
    pub fn last_update(&self) -> Option<Instant> {
        self.inner.live.lock().last_update
    }

    /// Number of records in the live snapshot.
    pub fn host_count(&self) -> usize {
        self.inner.live.lock().snapshot.len()
    }

    /// Check if at least one refresh attempt has completed.
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    /// Mark that a refresh attempt has completed.
    pub fn mark_ready(&self) {
        if !self.inner.ready.swap(true, Ordering::AcqRel) {
            debug!("client cache ready");
        }
    }

    /// Emit current state metrics.
    pub fn emit_metrics(&self) {
        let age = self.last_update().map(|updated| updated.elapsed());
        metrics::record_state(self.is_ready(), age);
    }
}
