//! In-memory result cache.
//!
//! # Data Flow
//! ```text
//! lookup pipeline
//!     → get(ip)   hit: served without touching the rate limiter
//!     → set(ip)   only after a successful upstream answer
//! reaper
//!     → cleanup_expired() every sweep interval
//! ```
//!
//! # Design Decisions
//! - Capacity bound (LRU) caps memory under many distinct lookups
//! - TTL bound keeps geolocation data from being served indefinitely
//! - Expired entries are dropped lazily on read and eagerly by the reaper

pub mod ttl;

pub use ttl::{CacheStats, TtlLruCache};
