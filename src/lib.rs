//! IP lookup proxy library.
//!
//! A caching, rate-limited front for an IP geolocation API. See
//! [`lookup::LookupPipeline`] for the admission order.

pub mod admin;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod lookup;
pub mod observability;
pub mod security;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use error::Error;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
