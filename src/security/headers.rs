//! Security and CORS response headers.
//!
//! Every response gets the hardening headers; pages outside the API also get
//! a Content-Security-Policy. API responses echo the caller's `Origin` back
//! in `Access-Control-Allow-Origin` only when its host is allow-listed.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::security::access_control::{domain_allowed, header_host, DomainAllowList};

const CONTENT_SECURITY_POLICY: &str =
    "default-src 'self'; style-src 'self' 'unsafe-inline'; script-src 'self' 'unsafe-inline'";

/// Response header policy shared by all routes.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    enabled: bool,
    allow_list: Arc<DomainAllowList>,
}

impl SecurityHeaders {
    pub fn new(enabled: bool, allow_list: Arc<DomainAllowList>) -> Self {
        Self {
            enabled,
            allow_list,
        }
    }

    /// Add the policy's headers to `headers`.
    pub fn apply(&self, headers: &mut HeaderMap, is_api: bool, origin: Option<&HeaderValue>) {
        if !self.enabled {
            return;
        }

        headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
        headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        headers.insert(header::X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));
        headers.insert(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        );

        if !is_api {
            headers.insert(
                header::CONTENT_SECURITY_POLICY,
                HeaderValue::from_static(CONTENT_SECURITY_POLICY),
            );
            return;
        }

        let Some(origin) = origin else { return };
        let allowed = origin
            .to_str()
            .ok()
            .and_then(header_host)
            .is_some_and(|host| domain_allowed(&host, &self.allow_list));
        if allowed {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, OPTIONS"),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type"),
            );
            headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
        }
    }
}

/// JSON endpoints; everything else is treated as a page.
fn is_api_path(path: &str) -> bool {
    path.starts_with("/api/") || path == "/health"
}

/// Middleware applying [`SecurityHeaders`] to every response.
pub async fn security_headers(
    State(policy): State<SecurityHeaders>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let is_api = is_api_path(request.uri().path());
    let origin = request.headers().get(header::ORIGIN).cloned();

    let mut response = next.run(request).await;
    policy.apply(response.headers_mut(), is_api, origin.as_ref());
    response
}
