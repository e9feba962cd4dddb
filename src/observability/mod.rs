//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! cache, limiter, upstream, pipeline, reaper
//!     → logging.rs (tracing events, x-request-id spans from the HTTP layer)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape (when metrics are enabled)
//! ```

pub mod logging;
pub mod metrics;
