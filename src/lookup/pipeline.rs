//! Admission pipeline for lookup requests.
//!
//! ```text
//! AUTHORIZE ──✗──▶ AuthorizationDenied (403)
//!     │
//! CACHE_LOOKUP ──hit──▶ cached document (no quota used)
//!     │ miss
//! RATE_CHECK ──✗──▶ RateLimited (429)
//!     │
//! UPSTREAM_FETCH ──▶ CACHE_STORE (successful documents only) ──▶ document
//! ```
//!
//! The cache is consulted before the limiter so repeat lookups are free;
//! only misses spend quota. No lock is held across the upstream fetch.

use std::net::IpAddr;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::cache::TtlLruCache;
use crate::lookup::special;
use crate::observability::metrics;
use crate::security::access_control::{authorize, DomainAllowList};
use crate::security::rate_limit::SlidingWindowLimiter;
use crate::upstream::{self, Upstream};

pub type LookupCache = TtlLruCache<String, Value>;
pub type ClientLimiter = SlidingWindowLimiter<String>;

/// One inbound lookup, as extracted by the HTTP layer.
#[derive(Debug, Clone)]
pub struct LookupQuery {
    /// Address being looked up.
    pub target: IpAddr,
    /// Identity quota is charged to (the caller's IP).
    pub client_id: String,
    pub origin: Option<String>,
    pub referer: Option<String>,
    /// Host the request was addressed to, without port.
    pub request_host: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }
}

/// Quota state reported alongside a metered response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    pub reset_in: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookupResponse {
    pub document: Value,
    pub cache_status: CacheStatus,
    /// Present only when the request was charged against the limiter.
    pub rate_limit: Option<RateLimitInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("access denied: requests must come from an authorized domain")]
    AuthorizationDenied,

    #[error("too many requests, retry in {} seconds", .0.reset_in)]
    RateLimited(RateLimitInfo),
}

/// Sequences authorization, cache, limiter and upstream for each lookup.
#[derive(Clone)]
pub struct LookupPipeline {
    cache: Arc<LookupCache>,
    limiter: Arc<ClientLimiter>,
    upstream: Arc<dyn Upstream>,
    allow_list: Arc<DomainAllowList>,
}

impl LookupPipeline {
    pub fn new(
        cache: Arc<LookupCache>,
        limiter: Arc<ClientLimiter>,
        upstream: Arc<dyn Upstream>,
        allow_list: DomainAllowList,
    ) -> Self {
        Self {
            cache,
            limiter,
            upstream,
            allow_list: Arc::new(allow_list),
        }
    }

    pub fn cache(&self) -> &Arc<LookupCache> {
        &self.cache
    }

    pub fn limiter(&self) -> &Arc<ClientLimiter> {
        &self.limiter
    }

    pub fn allow_list(&self) -> &DomainAllowList {
        &self.allow_list
    }

    /// Run one lookup through the pipeline.
    pub async fn lookup(&self, query: &LookupQuery) -> Result<LookupResponse, LookupError> {
        if !authorize(
            query.origin.as_deref(),
            query.referer.as_deref(),
            &query.request_host,
            &self.allow_list,
        ) {
            tracing::warn!(
                client = %query.client_id,
                origin = ?query.origin,
                referer = ?query.referer,
                host = %query.request_host,
                "Lookup denied"
            );
            metrics::record_lookup("denied");
            return Err(LookupError::AuthorizationDenied);
        }

        if let Some(scope) = special::classify(query.target) {
            return Ok(self.serve_special(query.target, scope));
        }

        let key = query.target.to_string();
        if let Some(document) = self.cache.get(&key) {
            tracing::debug!(target_ip = %key, "Cache hit");
            metrics::record_lookup("hit");
            return Ok(LookupResponse {
                document,
                cache_status: CacheStatus::Hit,
                rate_limit: None,
            });
        }

        let decision = self.limiter.check_and_record(&query.client_id);
        let rate_limit = RateLimitInfo {
            limit: self.limiter.per_minute(),
            remaining: decision.remaining,
            reset_in: decision.reset_in,
        };
        if !decision.allowed {
            tracing::warn!(client = %query.client_id, reset_in = decision.reset_in, "Rate limit exceeded");
            metrics::record_lookup("throttled");
            return Err(LookupError::RateLimited(rate_limit));
        }

        let document = match self.upstream.fetch(&key).await {
            Ok(document) => {
                if upstream::is_success(&document) {
                    self.cache.set(key, document.clone());
                } else {
                    tracing::debug!(target_ip = %key, ret = ?document.get("ret"), "Upstream reported failure, not caching");
                }
                document
            }
            Err(e) => e.to_document(),
        };

        metrics::record_lookup("miss");
        Ok(LookupResponse {
            document,
            cache_status: CacheStatus::Miss,
            rate_limit: Some(rate_limit),
        })
    }

    fn serve_special(&self, ip: IpAddr, scope: special::AddressScope) -> LookupResponse {
        let key = special::pseudo_key(ip);
        if let Some(document) = self.cache.get(&key) {
            metrics::record_lookup("special");
            return LookupResponse {
                document,
                cache_status: CacheStatus::Hit,
                rate_limit: None,
            };
        }

        let document = special::local_document(ip, scope);
        self.cache.set(key, document.clone());
        metrics::record_lookup("special");
        LookupResponse {
            document,
            cache_status: CacheStatus::Miss,
            rate_limit: None,
        }
    }
}

impl std::fmt::Debug for LookupPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupPipeline")
            .field("cache", &self.cache)
            .field("limiter", &self.limiter)
            .field("allow_list", &self.allow_list)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::upstream::UpstreamError;
    use futures_util::future::BoxFuture;
    use serde_json::json;
    use std::num::NonZeroUsize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    type Script = Box<dyn Fn(&str) -> Result<Value, UpstreamError> + Send + Sync>;

    struct ScriptedUpstream {
        calls: AtomicUsize,
        script: Script,
    }

    impl ScriptedUpstream {
        fn new(script: impl Fn(&str) -> Result<Value, UpstreamError> + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script: Box::new(script),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Upstream for ScriptedUpstream {
        fn fetch<'a>(&'a self, ip: &'a str) -> BoxFuture<'a, Result<Value, UpstreamError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = (self.script)(ip);
            Box::pin(async move { result })
        }
    }

    fn geo(ip: &str) -> Result<Value, UpstreamError> {
        Ok(json!({"ret": 200, "msg": "success", "data": {"ip": ip, "country": "US"}}))
    }

    fn pipeline(per_minute: u32, upstream: Arc<ScriptedUpstream>) -> LookupPipeline {
        let clock = Arc::new(ManualClock::new(Duration::from_secs(1_700_000_000)));
        let cache = TtlLruCache::with_clock(
            NonZeroUsize::new(100).unwrap(),
            Duration::from_secs(3600),
            clock.clone(),
        );
        let limiter = SlidingWindowLimiter::with_clock(per_minute, 100, clock);
        LookupPipeline::new(
            Arc::new(cache),
            Arc::new(limiter),
            upstream,
            DomainAllowList::parse(&["*.example.com"]).unwrap(),
        )
    }

    fn query(target: &str) -> LookupQuery {
        LookupQuery {
            target: target.parse().unwrap(),
            client_id: "198.18.0.9".to_string(),
            origin: Some("https://www.example.com".to_string()),
            referer: None,
            request_host: "geo.service.net".to_string(),
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let upstream = ScriptedUpstream::new(geo);
        let pipeline = pipeline(10, upstream.clone());

        let first = pipeline.lookup(&query("8.8.8.8")).await.unwrap();
        assert_eq!(first.cache_status, CacheStatus::Miss);
        assert_eq!(
            first.rate_limit,
            Some(RateLimitInfo {
                limit: 10,
                remaining: 9,
                reset_in: 40
            })
        );

        let second = pipeline.lookup(&query("8.8.8.8")).await.unwrap();
        assert_eq!(second.cache_status, CacheStatus::Hit);
        assert_eq!(second.rate_limit, None);
        assert_eq!(second.document, first.document);
        assert_eq!(upstream.calls(), 1);
    }

    #[tokio::test]
    async fn test_denied_request_touches_nothing() {
        let upstream = ScriptedUpstream::new(geo);
        let pipeline = pipeline(10, upstream.clone());
        let mut q = query("8.8.8.8");
        q.origin = Some("https://evil.net".to_string());

        assert_eq!(
            pipeline.lookup(&q).await,
            Err(LookupError::AuthorizationDenied)
        );
        assert_eq!(upstream.calls(), 0);
        assert_eq!(pipeline.cache().size(), 0);
        assert_eq!(pipeline.limiter().stats().minute_clients, 0);
    }

    #[tokio::test]
    async fn test_cache_hits_do_not_spend_quota() {
        let upstream = ScriptedUpstream::new(geo);
        let pipeline = pipeline(3, upstream.clone());

        pipeline.lookup(&query("1.1.1.1")).await.unwrap();
        pipeline.lookup(&query("1.0.0.1")).await.unwrap();
        pipeline.lookup(&query("9.9.9.9")).await.unwrap();

        match pipeline.lookup(&query("4.4.4.4")).await {
            Err(LookupError::RateLimited(info)) => {
                assert_eq!(info.remaining, 0);
                assert_eq!(info.limit, 3);
                assert_eq!(info.reset_in, 40);
            }
            other => panic!("expected rate limit, got {other:?}"),
        }

        let cached = pipeline.lookup(&query("1.1.1.1")).await.unwrap();
        assert_eq!(cached.cache_status, CacheStatus::Hit);
        assert_eq!(upstream.calls(), 3);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_returned_but_not_cached() {
        let upstream = ScriptedUpstream::new(|_| Err(UpstreamError::Timeout(5)));
        let pipeline = pipeline(10, upstream.clone());

        let response = pipeline.lookup(&query("8.8.4.4")).await.unwrap();
        assert_eq!(response.cache_status, CacheStatus::Miss);
        assert_eq!(response.document["ret"], 504);

        pipeline.lookup(&query("8.8.4.4")).await.unwrap();
        assert_eq!(upstream.calls(), 2);
        assert_eq!(pipeline.cache().size(), 0);
    }

    #[tokio::test]
    async fn test_unsuccessful_document_is_not_cached() {
        let upstream = ScriptedUpstream::new(|_| Ok(json!({"ret": 401, "msg": "bad appcode"})));
        let pipeline = pipeline(10, upstream.clone());

        let response = pipeline.lookup(&query("8.8.4.4")).await.unwrap();
        assert_eq!(response.document, json!({"ret": 401, "msg": "bad appcode"}));
        assert_eq!(pipeline.cache().size(), 0);
    }

    #[tokio::test]
    async fn test_special_addresses_bypass_upstream_and_quota() {
        let upstream = ScriptedUpstream::new(geo);
        let pipeline = pipeline(1, upstream.clone());

        let first = pipeline.lookup(&query("192.168.1.20")).await.unwrap();
        assert_eq!(first.cache_status, CacheStatus::Miss);
        assert_eq!(first.rate_limit, None);
        assert_eq!(first.document["data"]["scope"], "private");

        let second = pipeline.lookup(&query("192.168.1.20")).await.unwrap();
        assert_eq!(second.cache_status, CacheStatus::Hit);

        // The single unit of quota is still available for a real lookup.
        let real = pipeline.lookup(&query("8.8.8.8")).await.unwrap();
        assert_eq!(real.rate_limit.map(|r| r.remaining), Some(0));
        assert_eq!(upstream.calls(), 1);
    }

    #[test]
    fn test_error_messages() {
        let info = RateLimitInfo {
            limit: 10,
            remaining: 0,
            reset_in: 12,
        };
        assert_eq!(
            LookupError::RateLimited(info).to_string(),
            "too many requests, retry in 12 seconds"
        );
    }
}
