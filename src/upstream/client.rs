//! HTTP implementation of [`Upstream`].

use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde_json::Value;

use crate::config::UpstreamConfig;
use crate::observability::metrics;
use crate::upstream::{Upstream, UpstreamError};

/// Fetches lookups from the configured geolocation API.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    url: String,
    app_code: String,
    timeout: Duration,
}

impl HttpUpstream {
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: format!("{}{}", config.host.trim_end_matches('/'), config.path),
            app_code: config.app_code.clone(),
            timeout,
        })
    }

    async fn request(&self, ip: &str) -> Result<Value, UpstreamError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("ip", ip)])
            .header(AUTHORIZATION, format!("APPCODE {}", self.app_code))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(UpstreamError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        response.json::<Value>().await.map_err(|e| self.classify(e))
    }

    fn classify(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout(self.timeout.as_secs())
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }
}

impl Upstream for HttpUpstream {
    fn fetch<'a>(&'a self, ip: &'a str) -> BoxFuture<'a, Result<Value, UpstreamError>> {
        Box::pin(async move {
            let start = Instant::now();
            let result = self.request(ip).await;

            match &result {
                Ok(_) => {
                    tracing::debug!(ip = %ip, elapsed = ?start.elapsed(), "Upstream lookup complete");
                    metrics::record_upstream("ok", start);
                }
                Err(e) => {
                    tracing::warn!(ip = %ip, kind = e.kind(), error = %e, "Upstream lookup failed");
                    metrics::record_upstream(e.kind(), start);
                }
            }

            result
        })
    }
}
