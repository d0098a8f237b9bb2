//! pizzaz-mcp: MCP server exposing widget-backed tools over an SSE transport
//!
//! Clients open a long-lived Server-Sent Events stream, learn from its first
//! event where to post their JSON-RPC messages, and receive every result on
//! that same stream.
//!
//! # Architecture
//!
//! - **Transport**: one SSE stream per session plus a shared POST endpoint,
//!   correlated by session id
//! - **Protocol**: one MCP protocol instance per session
//! - **Catalog**: tools and resources, built once and shared read-only
//!
//! Tool handlers only return data. Boundary validation, envelope assembly and
//! error mapping happen in the dispatcher, so new tools plug in without
//! touching the protocol path.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Error types
//! - [`http`]: HTTP routes, CORS and serving
//! - [`mcp`]: MCP protocol, sessions and dispatch
//! - [`products`]: Personal auto product lookup
//! - [`widgets`]: The widget catalog

pub mod config;
pub mod error;
pub mod http;
pub mod mcp;
pub mod products;
pub mod widgets;
