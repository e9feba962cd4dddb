//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lookup_requests_total` (counter): lookups by outcome
//!   (`hit`, `miss`, `special`, `denied`, `throttled`)
//! - `upstream_requests_total` (counter): upstream fetches by result
//! - `upstream_request_duration_seconds` (histogram): upstream latency
//! - `cache_entries` (gauge): current cache occupancy
//! - `cache_evictions_total` (counter): LRU evictions on insert
//! - `rate_limited_total` (counter): rejected checks by window
//! - `reaper_swept_total` (counter): reaper removals by kind
//!
//! Recording is always safe: without an installed recorder the macros are
//! no-ops, so library code and tests never need to initialize anything.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);

    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_lookup(outcome: &'static str) {
    metrics::counter!("lookup_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_upstream(result: &'static str, start: Instant) {
    metrics::counter!("upstream_requests_total", "result" => result).increment(1);
    metrics::histogram!("upstream_request_duration_seconds")
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_size(entries: usize) {
    metrics::gauge!("cache_entries").set(entries as f64);
}

pub fn record_cache_eviction() {
    metrics::counter!("cache_evictions_total").increment(1);
}

pub fn record_rate_limited(window: &'static str) {
    metrics::counter!("rate_limited_total", "window" => window).increment(1);
}

pub fn record_sweep(expired_entries: usize, idle_clients: usize) {
    metrics::counter!("reaper_swept_total", "kind" => "cache_entry")
        .increment(expired_entries as u64);
    metrics::counter!("reaper_swept_total", "kind" => "idle_client")
        .increment(idle_clients as u64);
}
