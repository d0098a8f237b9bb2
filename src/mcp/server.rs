//! Per-session MCP protocol instance.
//!
//! This module implements the MCP server lifecycle for one session:
//!
//! 1. **Initialisation**: Capability negotiation and version agreement
//! 2. **Operation**: Handling tool calls, resource reads and listings
//! 3. **Shutdown**: Dropped by the session manager when the stream closes
//!
//! Every session gets its own [`McpServer`]; they share only the immutable
//! [`Catalog`] behind an `Arc`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::DispatchError;
use crate::mcp::catalog::Catalog;
use crate::mcp::dispatch::{Dispatcher, Envelope};
use crate::mcp::protocol::{
    is_false, negotiate_version, ErrorCode, IncomingMessage, JsonRpcError, JsonRpcErrorData,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, OutgoingMessage, SERVER_NAME,
};

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for initialize request.
    AwaitingInit,
    /// Initialize received, waiting for initialized notification.
    Initialising,
    /// Ready for normal operation.
    Running,
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    pub tools: ListCapabilities,
    /// Resource-related capabilities.
    pub resources: ListCapabilities,
}

/// Capabilities of a listable primitive.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListCapabilities {
    /// Whether the list can change during the session.
    #[serde(rename = "listChanged", skip_serializing_if = "is_false")]
    pub list_changed: bool,
}

/// Server information for initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by client.
    pub protocol_version: String,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// Parameters for tools/call request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: Value,
}

/// Parameters for resources/read request.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceReadParams {
    /// URI of the resource to read.
    pub uri: String,
}

/// The MCP protocol instance bound to one session.
pub struct McpServer {
    /// Current server state.
    state: ServerState,
    /// Client information sent with initialize.
    client_info: Option<ClientInfo>,
    /// Tool dispatch over the shared catalog.
    dispatcher: Dispatcher,
}

impl McpServer {
    /// Creates a protocol instance over the shared catalog.
    #[must_use]
    pub const fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            state: ServerState::AwaitingInit,
            client_info: None,
            dispatcher: Dispatcher::new(catalog),
        }
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Returns the client information sent with initialize.
    #[must_use]
    pub const fn client_info(&self) -> Option<&ClientInfo> {
        self.client_info.as_ref()
    }

    /// Handles a parsed incoming message.
    ///
    /// Returns the message to push to the client, or `None` for
    /// notifications.
    pub async fn handle_message(&mut self, msg: IncomingMessage) -> Option<OutgoingMessage> {
        match msg {
            IncomingMessage::Request(req) => Some(self.handle_request(req).await),
            IncomingMessage::Notification(ref notif) => {
                self.handle_notification(notif);
                None
            }
        }
    }

    /// Handles an incoming request.
    async fn handle_request(&mut self, req: JsonRpcRequest) -> OutgoingMessage {
        tracing::debug!(method = %req.method, id = %req.id, "Handling request");

        let response = match req.method.as_str() {
            "initialize" => self.handle_initialize(&req),
            "ping" => Ok(Self::handle_ping(&req)),
            "tools/list" => self.handle_tools_list(&req),
            "tools/call" => self.handle_tools_call(&req).await,
            "resources/list" => self.handle_resources_list(&req),
            "resources/templates/list" => self.handle_resource_templates_list(&req),
            "resources/read" => self.handle_resources_read(&req),
            _ => Err(JsonRpcError::method_not_found(req.id.clone(), &req.method)),
        };

        match response {
            Ok(resp) => resp.into(),
            Err(error) => error.into(),
        }
    }

    /// Handles an incoming notification.
    fn handle_notification(&mut self, notif: &JsonRpcNotification) {
        match notif.method.as_str() {
            "notifications/initialized" if self.state == ServerState::Initialising => {
                self.state = ServerState::Running;
            }
            "notifications/initialized" => {}
            other => tracing::debug!(method = %other, "Ignoring notification"),
        }
    }

    /// Handles the initialize request.
    fn handle_initialize(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        if self.state != ServerState::AwaitingInit {
            return Err(JsonRpcError::new(
                Some(req.id.clone()),
                JsonRpcErrorData::with_message(
                    ErrorCode::InvalidRequest,
                    "Server already initialised",
                ),
            ));
        }

        let params: InitializeParams = parse_params(req, "initialize")?;

        let negotiated_version = negotiate_version(&params.protocol_version).to_string();

        tracing::info!(
            client = params.client_info.as_ref().map_or("unknown", |c| c.name.as_str()),
            requested = %params.protocol_version,
            negotiated = %negotiated_version,
            "Client initialised session"
        );

        self.client_info = params.client_info;
        self.state = ServerState::Initialising;

        let result = json!({
            "protocolVersion": negotiated_version,
            "capabilities": ServerCapabilities::default(),
            "serverInfo": ServerInfo::default(),
        });

        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Handles the ping request.
    fn handle_ping(req: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(req.id.clone(), json!({}))
    }

    /// Handles the tools/list request.
    fn handle_tools_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        let tools = self.dispatcher.catalog().tools.list();
        let result = json!({ "tools": tools });
        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Handles the tools/call request.
    ///
    /// Dispatch failures become error envelopes, not JSON-RPC errors, so the
    /// client sees them as a failed tool call in an otherwise healthy session.
    async fn handle_tools_call(
        &self,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        let params: ToolCallParams = parse_params(req, "tool call")?;

        let envelope = match self.dispatcher.invoke(&params.name, &params.arguments).await {
            Ok(envelope) => envelope,
            Err(error) => {
                log_dispatch_error(&params.name, &error);
                Envelope::from(&error)
            }
        };

        let result_value = serde_json::to_value(&envelope).map_err(|e| {
            tracing::error!(error = %e, "Failed to serialise tool call result");
            JsonRpcError::internal_error(
                req.id.clone(),
                "Internal error: failed to serialise result",
            )
        })?;

        Ok(JsonRpcResponse::success(req.id.clone(), result_value))
    }

    /// Handles the resources/list request.
    fn handle_resources_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        let resources = self.dispatcher.catalog().resources.list();
        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "resources": resources }),
        ))
    }

    /// Handles the resources/templates/list request.
    fn handle_resource_templates_list(
        &self,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        let templates = self.dispatcher.catalog().resources.templates();
        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "resourceTemplates": templates }),
        ))
    }

    /// Handles the resources/read request.
    fn handle_resources_read(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        let params: ResourceReadParams = parse_params(req, "resource read")?;

        let entry = self
            .dispatcher
            .catalog()
            .resources
            .read(&params.uri)
            .map_err(|_| {
                tracing::debug!(uri = %params.uri, "Unknown resource requested");
                JsonRpcError::resource_not_found(req.id.clone(), &params.uri)
            })?;

        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "contents": [entry.contents()] }),
        ))
    }
}

/// Deserialises request params, reporting failures as invalid params.
fn parse_params<T: serde::de::DeserializeOwned>(
    req: &JsonRpcRequest,
    what: &str,
) -> Result<T, JsonRpcError> {
    req.params
        .as_ref()
        .map(|p| serde_json::from_value(p.clone()))
        .transpose()
        .map_err(|e| JsonRpcError::invalid_params(req.id.clone(), format!("Invalid {what} params: {e}")))?
        .ok_or_else(|| JsonRpcError::invalid_params(req.id.clone(), format!("Missing {what} params")))
}

fn log_dispatch_error(tool: &str, error: &DispatchError) {
    match error {
        DispatchError::HandlerFailed { .. } => {
            tracing::warn!(tool = %tool, error = %error, "Tool call failed");
        }
        _ => tracing::debug!(tool = %tool, error = %error, "Tool call rejected"),
    }
}
