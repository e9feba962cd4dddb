//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable that overrides `upstream.app_code`.
pub const APPCODE_ENV: &str = "APPCODE";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML document, apply environment overrides and validate.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    let mut config: ProxyConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    /// The file was missing; built-in defaults were used.
    Defaults,
}

/// Load the file at `path` if it exists, otherwise start from defaults.
///
/// Nothing is logged here: this usually runs before the subscriber is
/// installed, so the caller reports the returned [`ConfigSource`].
pub fn load_or_default(path: &Path) -> Result<(ProxyConfig, ConfigSource), ConfigError> {
    if path.exists() {
        return Ok((load_config(path)?, ConfigSource::File));
    }

    let mut config = ProxyConfig::default();
    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok((config, ConfigSource::Defaults))
}

fn apply_env_overrides(config: &mut ProxyConfig) {
    if let Ok(code) = std::env::var(APPCODE_ENV) {
        if !code.is_empty() {
            config.upstream.app_code = code;
        }
    }
}
