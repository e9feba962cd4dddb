//! Upstream geolocation API.
//!
//! # Data Flow
//! ```text
//! lookup pipeline (cache miss, quota granted)
//!     → Upstream::fetch(ip)            no cache/limiter lock held
//!     → GET {host}{path}?ip=<ip>       Authorization: APPCODE <code>
//!     → Ok(document) | Err(UpstreamError)
//! ```
//!
//! # Design Decisions
//! - Every fetch has a fixed deadline; expiry is a failure, not a retry
//! - Failures become structured documents for the caller and are never cached
//! - The pipeline depends on the [`Upstream`] trait so tests can script answers

pub mod client;

use futures_util::future::BoxFuture;
use serde_json::{json, Value};
use thiserror::Error;

pub use client::HttpUpstream;

/// Why an upstream lookup produced no usable document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("upstream request timed out after {0}s")]
    Timeout(u64),

    #[error("upstream network error: {0}")]
    Transport(String),

    #[error("upstream request failed: {status} {reason}")]
    Http { status: u16, reason: String },
}

impl UpstreamError {
    /// The `ret` code reported to the caller for this failure.
    pub fn ret_code(&self) -> u16 {
        match self {
            Self::Timeout(_) => 504,
            Self::Transport(_) => 500,
            Self::Http { status, .. } => *status,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Transport(_) => "transport",
            Self::Http { .. } => "http",
        }
    }

    /// The failure document returned in place of lookup data.
    pub fn to_document(&self) -> Value {
        json!({
            "ret": self.ret_code(),
            "msg": self.to_string(),
        })
    }
}

/// A source of IP metadata documents.
pub trait Upstream: Send + Sync {
    fn fetch<'a>(&'a self, ip: &'a str) -> BoxFuture<'a, Result<Value, UpstreamError>>;
}

/// Returns true if the upstream reported the lookup as successful, which is
/// the only case in which a document may be cached.
pub fn is_success(document: &Value) -> bool {
    document.get("ret").and_then(Value::as_i64) == Some(200)
}
