//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Lookup request:
//!     → access_control.rs (Origin / Referer / Host against the allow-list)
//!     → rate_limit.rs (per-client minute and hour windows, cache misses only)
//!
//! Every response:
//!     → headers.rs (hardening headers, CORS for allow-listed origins)
//! ```
//!
//! # Design Decisions
//! - Fail closed: an unparseable Origin or Referer counts as absent
//! - Rejected attempts are not charged against the limiter

pub mod access_control;
pub mod headers;
pub mod rate_limit;

pub use access_control::{authorize, domain_allowed, DomainAllowList, DomainPattern, PatternError};
pub use headers::SecurityHeaders;
pub use rate_limit::{LimiterStats, RateLimitDecision, SlidingWindowLimiter};
