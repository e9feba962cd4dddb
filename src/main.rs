//! IP lookup proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                  IP LOOKUP PROXY                     │
//!                      │                                                      │
//!   GET /api/query     │  ┌──────────┐   ┌────────────┐   ┌───────────────┐   │
//!   ───────────────────┼─▶│  http    │──▶│ authorizer │──▶│ TTL-LRU cache │───┼──▶ HIT
//!                      │  │  server  │   └────────────┘   └───────┬───────┘   │
//!                      │  └──────────┘                        miss │           │
//!                      │                                          ▼           │
//!                      │                 ┌────────────┐   ┌───────────────┐   │
//!   ◀──────────────────┼─────────────────│   store    │◀──│ rate limiter  │   │
//!   document + headers │                 │ (ret==200) │   └───────┬───────┘   │
//!                      │                 └─────▲──────┘           ▼           │
//!                      │                       │          ┌───────────────┐   │
//!                      │                       └──────────│   upstream    │◀──┼──▶ geolocation API
//!                      │                                  └───────────────┘   │
//!                      │  ┌────────────────────────────────────────────────┐  │
//!                      │  │ reaper (periodic sweep) · config · observability│  │
//!                      │  └────────────────────────────────────────────────┘  │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use tokio::net::TcpListener;

use ip_lookup_proxy::config::{self, ConfigSource};
use ip_lookup_proxy::http::HttpServer;
use ip_lookup_proxy::lifecycle::{signals, Shutdown};
use ip_lookup_proxy::observability::{logging, metrics};

/// Environment variable naming the config file when no argument is given.
const CONFIG_ENV: &str = "IPLOOKUP_CONFIG";

fn config_path() -> PathBuf {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path();
    let (config, source) = config::load_or_default(&path)?;

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ip-lookup-proxy starting");
    if source == ConfigSource::Defaults {
        tracing::warn!(path = %path.display(), "Config file not found, using defaults");
    }

    if config.upstream.app_code.is_empty() {
        tracing::warn!("No APPCODE configured, upstream lookups will be rejected");
    }

    tracing::info!(
        path = %path.display(),
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.host,
        cache_max_size = config.cache.max_size,
        cache_ttl_secs = config.cache.ttl_secs,
        per_minute = config.rate_limit.per_minute,
        per_hour = config.rate_limit.per_hour,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Validation has already checked the address.
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    let server_shutdown = shutdown.subscribe();

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        signals::shutdown_signal().await;
        signal_shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
