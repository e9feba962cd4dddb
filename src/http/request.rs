//! Request inspection: client identity, request host and request IDs.

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, HeaderName, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Assigns a UUID v4 to requests arriving without an `x-request-id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        id.parse().ok().map(RequestId::new)
    }
}

/// The request ID for logging, or `"unknown"` outside the request-id layer.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Identify the caller: first `X-Forwarded-For` hop, then `X-Real-IP`, then
/// the TCP peer.
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    if let Some(first) = header_str(headers, X_FORWARDED_FOR)
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }

    if let Some(real_ip) = header_str(headers, X_REAL_IP) {
        return real_ip.to_string();
    }

    peer.ip().to_string()
}

/// Hostname the request was addressed to, lowercased and without port.
/// Falls back to `localhost` when `Host` is missing or unreadable.
pub fn request_host(headers: &HeaderMap) -> String {
    let Some(host) = header_str(headers, header::HOST.as_str()) else {
        return "localhost".to_string();
    };

    let hostname = if let Some(rest) = host.strip_prefix('[') {
        // [v6]:port
        rest.split(']').next().unwrap_or(rest)
    } else {
        host.split(':').next().unwrap_or(host)
    };

    if hostname.is_empty() {
        "localhost".to_string()
    } else {
        hostname.to_ascii_lowercase()
    }
}

/// Optional string header, as the pipeline expects it.
pub fn optional_header(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    header_str(headers, name.as_str()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> SocketAddr {
        "203.0.113.9:51000".parse().unwrap()
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_client_ip_precedence() {
        let h = headers(&[
            ("x-forwarded-for", " 198.51.100.1, 10.0.0.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        assert_eq!(client_ip(&h, peer()), "198.51.100.1");

        let h = headers(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_ip(&h, peer()), "198.51.100.2");

        let h = headers(&[("x-forwarded-for", " ,")]);
        assert_eq!(client_ip(&h, peer()), "203.0.113.9");

        assert_eq!(client_ip(&HeaderMap::new(), peer()), "203.0.113.9");
    }

    #[test]
    fn test_request_host_strips_port() {
        assert_eq!(request_host(&headers(&[("host", "Geo.Example.com:8443")])), "geo.example.com");
        assert_eq!(request_host(&headers(&[("host", "127.0.0.1")])), "127.0.0.1");
        assert_eq!(request_host(&headers(&[("host", "[::1]:8000")])), "::1");
        assert_eq!(request_host(&HeaderMap::new()), "localhost");
    }

    #[test]
    fn test_request_ids_are_uuids() {
        let request = Request::new(());
        let id = MakeRequestUuid.make_request_id(&request).unwrap();
        let text = id.header_value().to_str().unwrap();
        assert!(Uuid::parse_str(text).is_ok());
    }
}
