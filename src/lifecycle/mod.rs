//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast → HTTP server stops accepting, drains
//!               → reaper exits its loop
//!
//! Reaper (reaper.rs):
//!     every interval → cache.cleanup_expired + limiter.cleanup_idle_clients
//! ```

pub mod reaper;
pub mod shutdown;
pub mod signals;

pub use reaper::{Reaper, ReaperHandle, SweepReport};
pub use shutdown::Shutdown;
