//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the lookup
//! proxy. All types derive Serde traits for deserialization from TOML and
//! every section falls back to defaults, so an empty file is a valid config.

use serde::{Deserialize, Serialize};

/// Root configuration for the lookup proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream geolocation API.
    pub upstream: UpstreamConfig,

    /// Result cache sizing.
    pub cache: CacheConfig,

    /// Per-client request limits.
    pub rate_limit: RateLimitConfig,

    /// Origin allow-list and response headers.
    pub security: SecurityConfig,

    /// Background cleanup schedule.
    pub reaper: ReaperConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Upstream geolocation API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Scheme and host of the API (e.g., "https://c2ba.api.huachen.cn").
    pub host: String,

    /// Path of the lookup endpoint; the target is sent as `?ip=`.
    pub path: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Credential sent as `Authorization: APPCODE <app_code>`.
    /// Overridden by the `APPCODE` environment variable.
    pub app_code: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: "https://c2ba.api.huachen.cn".to_string(),
            path: "/ip".to_string(),
            timeout_secs: 5,
            app_code: String::new(),
        }
    }
}

/// Result cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached lookups.
    pub max_size: usize,

    /// Lifetime of a cached lookup in seconds.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            ttl_secs: 3600,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum upstream-bound requests per client per minute.
    pub per_minute: u32,

    /// Maximum upstream-bound requests per client per hour.
    pub per_hour: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: 10,
            per_hour: 100,
        }
    }
}

/// Security configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Hostnames allowed to call the API. A leading `*.` matches any
    /// subdomain.
    pub allowed_domains: Vec<String>,

    /// Enable security and CORS response headers.
    pub enable_headers: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_domains: vec!["localhost".to_string(), "127.0.0.1".to_string()],
            enable_headers: true,
        }
    }
}

/// Reaper configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Seconds between cache/limiter sweeps.
    pub interval_secs: u64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the `/admin` routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}
