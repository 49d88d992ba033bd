//! Metrics instrumentation for unifi-names.
//!
//! All metrics are prefixed with `unifi_names.`

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use std::time::{Duration, Instant};

const REQUEST_COUNT: &str = "unifi_names.request.count";
const QUERY_DURATION: &str = "unifi_names.query.duration.seconds";
const HOSTS_COUNT: &str = "unifi_names.hosts.count";
const REFRESH_COUNT: &str = "unifi_names.refresh.count";
const STATE_READY: &str = "unifi_names.state.ready";
const SNAPSHOT_AGE: &str = "unifi_names.state.snapshot_age.seconds";

/// Register descriptions with the installed recorder.
pub fn describe() {
    describe_counter!(REQUEST_COUNT, "Queries handled by the client resolver");
    describe_histogram!(
        QUERY_DURATION,
        Unit::Seconds,
        "Client cache lookup latency by record type and outcome"
    );
    describe_gauge!(HOSTS_COUNT, "Address records in the latest client snapshot");
    describe_counter!(REFRESH_COUNT, "Controller refresh attempts by outcome");
    describe_gauge!(STATE_READY, "1 once a refresh attempt has completed");
    describe_gauge!(
        SNAPSHOT_AGE,
        Unit::Seconds,
        "Seconds since the last successful controller refresh"
    );
}

/// Count one resolver invocation, matched or not.
pub fn record_request() {
    counter!(REQUEST_COUNT).increment(1);
}

/// Record the outcome and latency of a query.
pub fn record_query(record_type: &str, result: QueryResult, duration: Duration) {
    let result_str = match result {
        QueryResult::Answered => "answered",
        QueryResult::FallThrough => "fallthrough",
    };

    histogram!(
        QUERY_DURATION,
        "type" => record_type.to_string(),
        "result" => result_str
    )
    .record(duration.as_secs_f64());
}

/// Query result type for metrics.
#[derive(Debug, Clone, Copy)]
pub enum QueryResult {
    /// Answered from the client cache.
    Answered,
    /// Not ours or not cached; handed to the next handler.
    FallThrough,
}

/// Record the number of hosts in the latest snapshot.
pub fn record_host_count(hosts: usize) {
    gauge!(HOSTS_COUNT).set(hosts as f64);
}

/// Record a refresh attempt.
pub fn record_refresh(success: bool) {
    let outcome = if success { "success" } else { "error" };
    counter!(REFRESH_COUNT, "outcome" => outcome).increment(1);
}

/// Record readiness and how old the live snapshot is.
pub fn record_state(ready: bool, snapshot_age: Option<Duration>) {
    gauge!(STATE_READY).set(if ready { 1.0 } else { 0.0 });
    if let Some(age) = snapshot_age {
        gauge!(SNAPSHOT_AGE).set(age.as_secs_f64());
    }
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
