//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (sizes, limits and intervals > 0)
//! - Check addresses and the upstream URL parse
//! - Check allow-list patterns are well formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;
use crate::security::access_control::DomainPattern;

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("rate_limit.per_hour ({per_hour}) is below rate_limit.per_minute ({per_minute})")]
    HourBelowMinute { per_minute: u32, per_hour: u32 },

    #[error("{field} is not a socket address: {value:?}")]
    Address { field: &'static str, value: String },

    #[error("upstream.host must be an absolute http(s) URL: {0:?}")]
    UpstreamHost(String),

    #[error("security.allowed_domains: {0}")]
    DomainPattern(String),

    #[error("admin.api_key must be set when the admin API is enabled")]
    MissingAdminKey,
}

/// Check every semantic constraint and report all violations at once.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let positive: [(&'static str, u64); 7] = [
        ("cache.max_size", config.cache.max_size as u64),
        ("cache.ttl_secs", config.cache.ttl_secs),
        ("rate_limit.per_minute", config.rate_limit.per_minute as u64),
        ("rate_limit.per_hour", config.rate_limit.per_hour as u64),
        ("reaper.interval_secs", config.reaper.interval_secs),
        ("upstream.timeout_secs", config.upstream.timeout_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ];
    errors.extend(
        positive
            .iter()
            .filter(|(_, value)| *value == 0)
            .map(|(field, _)| ValidationError::Zero { field: *field }),
    );

    if config.rate_limit.per_hour < config.rate_limit.per_minute {
        errors.push(ValidationError::HourBelowMinute {
            per_minute: config.rate_limit.per_minute,
            per_hour: config.rate_limit.per_hour,
        });
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::Address {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::Address {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let upstream_ok = Url::parse(&config.upstream.host)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false);
    if !upstream_ok {
        errors.push(ValidationError::UpstreamHost(config.upstream.host.clone()));
    }

    for entry in &config.security.allowed_domains {
        if let Err(e) = entry.parse::<DomainPattern>() {
            errors.push(ValidationError::DomainPattern(e.to_string()));
        }
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::MissingAdminKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ProxyConfig::default();
        config.cache.max_size = 0;
        config.rate_limit.per_minute = 20;
        config.rate_limit.per_hour = 5;
        config.upstream.host = "ftp://example.com".to_string();
        config.security.allowed_domains.push("api.*.example.com".to_string());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::Zero {
            field: "cache.max_size"
        }));
        assert!(errors.contains(&ValidationError::HourBelowMinute {
            per_minute: 20,
            per_hour: 5
        }));
        assert!(matches!(errors[2], ValidationError::UpstreamHost(_)));
        assert!(matches!(errors[3], ValidationError::DomainPattern(_)));
    }

    #[test]
    fn test_bad_addresses() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "localhost".to_string();
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "nope".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_admin_requires_key() {
        let mut config = ProxyConfig::default();
        config.admin.enabled = true;
        config.admin.api_key = "  ".to_string();

        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::MissingAdminKey])
        );
    }
}
