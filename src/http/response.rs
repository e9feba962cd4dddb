//! Mapping lookup outcomes to HTTP responses.
//!
//! Successful lookups and upstream failures are both HTTP 200 with the
//! document as body; callers inspect `ret`. Admission failures use real
//! status codes.

use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::lookup::{LookupError, LookupResponse, RateLimitInfo};

pub const X_CACHE_STATUS: HeaderName = HeaderName::from_static("x-cache-status");
pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

fn rate_limit_headers(headers: &mut HeaderMap, info: &RateLimitInfo) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(info.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(info.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(info.reset_in));
}

/// `{"ret": <code>, "msg": <text>}` with the matching status.
pub fn error_document(status: StatusCode, msg: impl Into<String>) -> Response {
    let body = json!({ "ret": status.as_u16(), "msg": msg.into() });
    (status, Json(body)).into_response()
}

impl IntoResponse for LookupResponse {
    fn into_response(self) -> Response {
        let mut response = Json(self.document).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(
            X_CACHE_STATUS,
            HeaderValue::from_static(self.cache_status.as_str()),
        );
        if let Some(info) = &self.rate_limit {
            rate_limit_headers(headers, info);
        }
        response
    }
}

impl IntoResponse for LookupError {
    fn into_response(self) -> Response {
        match &self {
            LookupError::AuthorizationDenied => {
                error_document(StatusCode::FORBIDDEN, self.to_string())
            }
            LookupError::RateLimited(info) => {
                let mut response = error_document(StatusCode::TOO_MANY_REQUESTS, self.to_string());
                let headers = response.headers_mut();
                headers.insert(header::RETRY_AFTER, HeaderValue::from(info.reset_in));
                rate_limit_headers(
                    headers,
                    &RateLimitInfo {
                        remaining: 0,
                        ..*info
                    },
                );
                response
            }
        }
    }
}
