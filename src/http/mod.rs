//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, handlers)
//!     → request.rs (request ID, client IP, request host)
//!     → lookup pipeline
//!     → response.rs (status, X-Cache-Status, X-RateLimit-* headers)
//!     → security headers layer
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
