//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, APPCODE env override)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → consumed once at startup to build cache, limiter and upstream
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; cache and limiter parameters are fixed
//!   for the life of the process
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, parse_config, ConfigError, ConfigSource};
pub use schema::{
    AdminConfig, CacheConfig, ListenerConfig, ObservabilityConfig, ProxyConfig, RateLimitConfig,
    ReaperConfig, SecurityConfig, TimeoutConfig, UpstreamConfig,
};
pub use validation::ValidationError;
