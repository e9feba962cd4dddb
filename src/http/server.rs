//! HTTP server setup and request handlers.
//!
//! # Responsibilities
//! - Build the shared cache, limiter, upstream client and pipeline
//! - Create the Axum router with the lookup, health and admin routes
//! - Wire up middleware (security headers, timeout, request ID, tracing)
//! - Run the reaper alongside the server and stop it on every exit path

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, Query, State},
    http::{header, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::cache::TtlLruCache;
use crate::config::validation::validate_config;
use crate::config::{AdminConfig, ConfigError, ProxyConfig};
use crate::error::Error;
use crate::http::request::{self, MakeRequestUuid, X_REQUEST_ID};
use crate::http::response::error_document;
use crate::lifecycle::Reaper;
use crate::lookup::{LookupPipeline, LookupQuery};
use crate::security::headers::{security_headers, SecurityHeaders};
use crate::security::{DomainAllowList, SlidingWindowLimiter};
use crate::upstream::{HttpUpstream, Upstream};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: LookupPipeline,
    pub reaper: Reaper,
    pub admin: AdminConfig,
    pub started_at: Instant,
}

/// HTTP server for the lookup proxy.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a server that queries the configured upstream API.
    pub fn new(config: ProxyConfig) -> Result<Self, Error> {
        let upstream = HttpUpstream::from_config(&config.upstream)?;
        Self::with_upstream(config, Arc::new(upstream))
    }

    /// Create a server around an arbitrary upstream.
    ///
    /// The configuration is validated first; zero sizes or intervals are
    /// rejected rather than clamped.
    pub fn with_upstream(config: ProxyConfig, upstream: Arc<dyn Upstream>) -> Result<Self, Error> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let allow_list = DomainAllowList::parse(&config.security.allowed_domains)?;

        let capacity = NonZeroUsize::new(config.cache.max_size).unwrap_or(NonZeroUsize::MIN);
        let cache = Arc::new(TtlLruCache::new(
            capacity,
            Duration::from_secs(config.cache.ttl_secs),
        ));
        let limiter = Arc::new(SlidingWindowLimiter::from_config(&config.rate_limit));

        let reaper = Reaper::new(
            cache.clone(),
            limiter.clone(),
            Duration::from_secs(config.reaper.interval_secs),
        );
        let headers = SecurityHeaders::new(config.security.enable_headers, Arc::new(allow_list.clone()));
        let pipeline = LookupPipeline::new(cache, limiter, upstream, allow_list);

        let state = AppState {
            pipeline,
            reaper,
            admin: config.admin.clone(),
            started_at: Instant::now(),
        };

        let router = Self::build_router(&config, state.clone(), headers);
        Ok(Self {
            router,
            state,
            config,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState, headers: SecurityHeaders) -> Router {
        let mut routes = Router::new()
            .route("/api/query", get(query_handler).options(preflight_handler))
            .route("/health", get(health_handler))
            .route("/robots.txt", get(robots_handler))
            .route("/", get(index_handler));

        if config.admin.enabled {
            routes = routes.merge(admin::router(state.clone()));
        }

        routes
            .with_state(state)
            .layer(middleware::from_fn_with_state(headers, security_headers))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = %request::request_id(req.headers()),
                )
            }))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// The fully layered router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires, running the reaper for
    /// as long as the server is up.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let reaper = self.state.reaper.clone().spawn(shutdown.resubscribe());

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        // An early error returns here and drops `reaper`, aborting the task.
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reaper.stop().await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct QueryParams {
    ip: Option<String>,
}

fn peer_addr(request: &Request<Body>) -> SocketAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 0)))
}

/// `GET /api/query?ip=<ip>`: look up `ip`, or the caller's own address.
async fn query_handler(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
    request: Request<Body>,
) -> Response {
    let (query, request_id) = {
        let headers = request.headers();
        let request_id = request::request_id(headers).to_string();
        let client_id = request::client_ip(headers, peer_addr(&request));

        let raw_target = params
            .ip
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .unwrap_or(&client_id);
        let target: IpAddr = match raw_target.parse() {
            Ok(ip) => ip,
            Err(_) => {
                tracing::debug!(request_id = %request_id, target = %raw_target, "Rejected invalid IP");
                return error_document(StatusCode::BAD_REQUEST, "invalid IPv4 or IPv6 address");
            }
        };

        let query = LookupQuery {
            target,
            client_id,
            origin: request::optional_header(headers, header::ORIGIN),
            referer: request::optional_header(headers, header::REFERER),
            request_host: request::request_host(headers),
        };
        (query, request_id)
    };

    match state.pipeline.lookup(&query).await {
        Ok(response) => {
            tracing::debug!(
                request_id = %request_id,
                target = %query.target,
                cache_status = response.cache_status.as_str(),
                "Lookup served"
            );
            response.into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// `OPTIONS /api/query`: CORS preflight; headers come from the security layer.
async fn preflight_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}

async fn robots_handler() -> &'static str {
    "User-agent: *\nAllow: /"
}

/// `GET /`: the caller's IP as plain text.
async fn index_handler(request: Request<Body>) -> String {
    format!("{}\n", request::client_ip(request.headers(), peer_addr(&request)))
}
