//! Model Context Protocol (MCP) server implementation.
//!
//! This module implements the MCP specification for exposing widget-backed
//! tools and UI resources to an assistant runtime. Each client holds a
//! long-lived SSE stream and posts JSON-RPC 2.0 messages to a separate
//! endpoint, correlated by session id.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            MCP Server                            │
//! │                                                                  │
//! │  GET /mcp ──▶ ┌───────────┐    ┌───────────┐    ┌────────────┐   │
//! │               │  Session  │───▶│ McpServer │───▶│  Dispatch  │   │
//! │  POST ──────▶ │  Bridge   │    │ (per      │    │  (schema,  │   │
//! │  ?sessionId   └───────────┘    │  session) │    │  handlers) │   │
//! │                     │          └───────────┘    └────────────┘   │
//! │                     ▼                │                 │         │
//! │              ┌────────────┐          ▼                 ▼         │
//! │  ◀── SSE ─── │ Transport  │◀──── responses     ┌────────────┐    │
//! │              └────────────┘                    │  Catalog   │    │
//! │                                                └────────────┘    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2025-06-18 and accepts
//! 2025-03-26 and 2024-11-05.

pub mod bridge;
pub mod catalog;
pub mod dispatch;
pub mod protocol;
pub mod resources;
pub mod schema;
pub mod server;
pub mod session;
pub mod tools;
pub mod transport;

pub use bridge::TransportBridge;
pub use catalog::Catalog;
pub use dispatch::{Dispatcher, Envelope};
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use server::McpServer;
pub use session::SessionManager;
pub use transport::SseTransport;
