//! Top-level error for assembling and running the service.

use thiserror::Error;

use crate::config::ConfigError;
use crate::security::PatternError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid allow-list: {0}")]
    Pattern(#[from] PatternError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
