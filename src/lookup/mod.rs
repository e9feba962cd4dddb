//! Lookup request handling.
//!
//! # Data Flow
//! ```text
//! HTTP handler (validated target IP, client id, headers)
//!     → pipeline.rs (authorize → special? → cache → limiter → upstream)
//!     → LookupResponse { document, HIT|MISS, rate limit }
//!       or LookupError (denied / throttled)
//! ```

pub mod pipeline;
pub mod special;

pub use pipeline::{
    CacheStatus, ClientLimiter, LookupCache, LookupError, LookupPipeline, LookupQuery,
    LookupResponse, RateLimitInfo,
};
