//! Configuration file loading and parsing.
//!
//! This module handles loading the configuration file from disk and parsing
//! it into validated, type-safe structures.
//!
//! # Configuration File Locations
//!
//! The configuration file is searched in the following order:
//!
//! 1. Path given as the positional CLI argument (must exist)
//! 2. Default location, used only if the file exists:
//!    - **Linux/macOS:** `~/.pizzaz-mcp/config.json`
//!    - **Windows:** `%USERPROFILE%\.pizzaz-mcp\config.json`
//!
//! Without a file, built-in defaults apply.
//!
//! # Environment Overrides
//!
//! - `PORT`: listening port; ignored with a warning when not a valid port
//! - `PERSONAL_AUTO_API_KEY`: API key for the product lookup tool

mod settings;

pub use settings::{Config, LoggingConfig, ProductsConfig, ServerConfig, DEFAULT_PORT};

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Environment variable holding the listening port.
pub const PORT_ENV: &str = "PORT";

/// Environment variable holding the product API key.
pub const API_KEY_ENV: &str = "PERSONAL_AUTO_API_KEY";

/// Returns the default configuration directory.
///
/// - **Linux/macOS:** `~/.pizzaz-mcp/`
/// - **Windows:** `%USERPROFILE%\.pizzaz-mcp\`
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".pizzaz-mcp"))
}

/// Returns the platform-specific default configuration file path.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("config.json"))
}

/// Loads and parses the configuration file.
///
/// If `path` is `None`, uses the platform-specific default location when a
/// file exists there, and built-in defaults otherwise.
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly given configuration file cannot be found
/// - The file cannot be read
/// - The JSON is malformed
/// - Fields are invalid
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound {
                    path: p.to_path_buf(),
                });
            }
            p.to_path_buf()
        }
        None => match default_config_path().filter(|p| p.exists()) {
            Some(p) => p,
            None => return Ok(Config::default()),
        },
    };

    let contents = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;

    let config: Config = serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: config_path.clone(),
        source: e,
    })?;

    // Validate the configuration
    config.validate()?;

    Ok(config)
}

/// Picks the listening port: CLI flag, then `PORT`, then the configured port.
///
/// A `PORT` value that is not a valid port number is ignored.
#[must_use]
pub fn resolve_port(cli: Option<u16>, env: Option<&str>, configured: u16) -> u16 {
    if let Some(port) = cli {
        return port;
    }

    match env.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(value = %raw, fallback = configured, "Ignoring non-numeric PORT");
            configured
        }),
        None => configured,
    }
}

/// Applies environment overrides to a loaded configuration.
pub fn apply_env_overrides(config: &mut Config, port: Option<&str>, api_key: Option<String>) {
    config.server.port = resolve_port(None, port, config.server.port);
    if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
        config.products.api_key = Some(key);
    }
}
