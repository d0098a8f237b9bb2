//! Error types for pizzaz-mcp.
//!
//! Lookup and validation failures are reported to the immediate caller of
//! dispatch. Handler failures keep the downstream cause in their `source`
//! chain together with the operation and key that triggered them.

use std::path::PathBuf;

use thiserror::Error;

use crate::mcp::schema::ValidationError;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Boxed downstream error carried by [`HandlerError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A tool handler failed while doing its work.
#[derive(Error, Debug)]
#[error("{operation} failed for '{target}'")]
pub struct HandlerError {
    /// What the handler was doing, e.g. "fetch personal auto products".
    pub operation: String,
    /// The key the operation was run against, e.g. a state code.
    pub target: String,
    /// The downstream cause.
    #[source]
    pub source: BoxError,
}

impl HandlerError {
    /// Wraps a downstream error with the operation and target that produced it.
    pub fn new(
        operation: impl Into<String>,
        target: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self {
            operation: operation.into(),
            target: target.into(),
            source: source.into(),
        }
    }

    /// Renders the error together with its whole source chain.
    #[must_use]
    pub fn detailed(&self) -> String {
        let mut message = self.to_string();
        let mut cause: Option<&(dyn std::error::Error + 'static)> = Some(self.source.as_ref());
        while let Some(err) = cause {
            message.push_str(": ");
            message.push_str(&err.to_string());
            cause = err.source();
        }
        message
    }
}

/// Errors produced when resolving or invoking tools and resources.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// No tool is registered under the requested name.
    #[error("Unknown tool: {name}")]
    ToolNotFound {
        /// The requested tool name.
        name: String,
    },

    /// No resource is registered under the requested URI.
    #[error("Unknown resource: {uri}")]
    ResourceNotFound {
        /// The requested URI.
        uri: String,
    },

    /// The arguments did not satisfy the tool's declared input shape.
    #[error("Input validation error for '{tool}': {source}")]
    InvalidArguments {
        /// The tool the arguments were meant for.
        tool: String,
        /// The field-level reason.
        #[source]
        source: ValidationError,
    },

    /// The tool handler ran and failed.
    #[error("Tool execution error in '{tool}': {}", .source.detailed())]
    HandlerFailed {
        /// The tool whose handler failed.
        tool: String,
        /// The handler failure.
        #[source]
        source: HandlerError,
    },
}

/// Errors raised by the session table and the outbound stream.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The session id does not name an active session.
    #[error("unknown session: {id}")]
    UnknownSession {
        /// The session id the caller supplied.
        id: String,
    },

    /// The outbound stream of the session could not be written.
    #[error("transport error on session {id}: {message}")]
    Transport {
        /// The affected session.
        id: String,
        /// What went wrong.
        message: String,
    },
}

/// Errors reported to the poster of an inbound command.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The payload is not a well-formed JSON-RPC message.
    #[error("malformed command payload: {0}")]
    BadRequest(String),

    /// The session could not accept or deliver the command.
    #[error(transparent)]
    Session(#[from] SessionError),
}
