//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use serde::Deserialize;

use crate::error::ConfigError;

/// Port used when nothing else is configured.
pub const DEFAULT_PORT: u16 = 8000;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Personal auto product lookup settings.
    #[serde(default)]
    pub products: ProductsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "server.host must not be empty".to_string(),
            });
        }

        for (name, path) in [
            ("server.sse_path", &self.server.sse_path),
            ("server.message_path", &self.server.message_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::ValidationError {
                    message: format!("{name} must start with '/', got '{path}'"),
                });
            }

            // The router treats these as capture syntax and refuses to start.
            let captures = path.contains(['{', '}'])
                || path.split('/').any(|segment| segment.starts_with([':', '*']));
            if captures {
                return Err(ConfigError::ValidationError {
                    message: format!("{name} must be a literal path, got '{path}'"),
                });
            }
        }

        if self.server.sse_path == self.server.message_path {
            return Err(ConfigError::ValidationError {
                message: "server.sse_path and server.message_path must differ".to_string(),
            });
        }

        if self.products.timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "products.timeout_secs must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind. The `PORT` environment variable overrides it.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path of the SSE stream endpoint.
    #[serde(default = "default_sse_path")]
    pub sse_path: String,

    /// Path clients post messages to.
    #[serde(default = "default_message_path")]
    pub message_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            sse_path: default_sse_path(),
            message_path: default_message_path(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_sse_path() -> String {
    "/mcp".to_string()
}

fn default_message_path() -> String {
    "/mcp/messages".to_string()
}

/// Personal auto product API configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductsConfig {
    /// Base URL; `/<STATE>/activeProducts` is appended per request.
    #[serde(default = "default_products_endpoint")]
    pub endpoint: String,

    /// API key sent as `x-api-key`. `PERSONAL_AUTO_API_KEY` overrides it.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProductsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_products_endpoint(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_products_endpoint() -> String {
    "https://gateway.pre.zrater.io/api/v1/linesOfBusiness/personalAuto/states".to_string()
}

const fn default_timeout_secs() -> u64 {
    10
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
