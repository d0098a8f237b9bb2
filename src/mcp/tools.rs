//! Tool definitions, handlers and the registry that maps names to them.
//!
//! The registry is filled once at startup and only read afterwards.
//! Registering a name twice replaces the earlier registration (last write
//! wins) while keeping the name's original position in listings.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::HandlerError;
use crate::mcp::schema::{InputShape, ValidatedArgs};

/// A tool as advertised by `tools/list`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Short human-readable title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared shape of the tool's arguments.
    pub input_schema: InputShape,
    /// Opaque side-channel metadata.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

/// Content item in a tool call response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

impl ToolContent {
    /// Creates a text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// What a handler hands back to the dispatcher.
///
/// Every field is optional; the dispatcher fills the gaps from the
/// registration's defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    /// Explicit content blocks, passed through verbatim when non-empty.
    pub content: Option<Vec<ToolContent>>,
    /// Structured result data.
    pub structured_content: Option<Map<String, Value>>,
    /// Text for the synthesised content block.
    pub response_text: Option<String>,
    /// Response metadata overriding the registration default.
    pub meta: Option<Map<String, Value>>,
}

impl ToolOutput {
    /// An output carrying only structured content.
    #[must_use]
    pub fn structured(content: Map<String, Value>) -> Self {
        Self {
            structured_content: Some(content),
            ..Self::default()
        }
    }

    /// Sets the response text.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.response_text = Some(text.into());
        self
    }

    /// Sets explicit content blocks.
    #[must_use]
    pub fn with_content(mut self, content: Vec<ToolContent>) -> Self {
        self.content = Some(content);
        self
    }

    /// Sets response metadata.
    #[must_use]
    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Runs a tool against validated arguments.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Executes the tool.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] when a downstream collaborator fails.
    async fn call(&self, args: &ValidatedArgs) -> Result<ToolOutput, HandlerError>;
}

#[async_trait]
impl<F> ToolHandler for F
where
    F: Fn(&ValidatedArgs) -> Result<ToolOutput, HandlerError> + Send + Sync,
{
    async fn call(&self, args: &ValidatedArgs) -> Result<ToolOutput, HandlerError> {
        self(args)
    }
}

/// A tool definition bound to its handler and response defaults.
#[derive(Clone)]
pub struct ToolRegistration {
    /// The advertised definition.
    pub tool: ToolDefinition,
    /// The handler invoked with validated arguments.
    pub handler: Arc<dyn ToolHandler>,
    /// Text used when the handler supplies neither content nor text.
    pub default_response_text: String,
    /// Metadata used when the handler supplies none.
    pub default_meta: Option<Map<String, Value>>,
}

impl fmt::Debug for ToolRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistration")
            .field("tool", &self.tool.name)
            .field("default_response_text", &self.default_response_text)
            .field("default_meta", &self.default_meta)
            .finish_non_exhaustive()
    }
}

/// Name-keyed tool registry with insertion-stable listing order.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, ToolRegistration>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any earlier registration with the same name.
    ///
    /// Returns the replaced registration, if any.
    pub fn register(&mut self, registration: ToolRegistration) -> Option<ToolRegistration> {
        let name = registration.tool.name.clone();
        let replaced = self.tools.insert(name.clone(), registration);
        if replaced.is_some() {
            tracing::warn!(tool = %name, "Tool registered twice, keeping the latest registration");
        }
        replaced
    }

    /// Returns all tool definitions in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<&ToolDefinition> {
        self.tools.values().map(|registration| &registration.tool).collect()
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&ToolRegistration> {
        self.tools.get(name)
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns whether no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registration(name: &str, text: &str) -> ToolRegistration {
        ToolRegistration {
            tool: ToolDefinition {
                name: name.to_string(),
                title: None,
                description: Some(format!("{name} tool")),
                input_schema: InputShape::new(),
                meta: None,
            },
            handler: Arc::new(|_: &ValidatedArgs| Ok::<_, HandlerError>(ToolOutput::default())),
            default_response_text: text.to_string(),
            default_meta: None,
        }
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = ToolRegistry::new();
        assert!(registry.register(registration("alpha", "first")).is_none());
        registry.register(registration("beta", "other"));
        let replaced = registry.register(registration("alpha", "second"));

        assert_eq!(replaced.unwrap().default_response_text, "first");
        assert_eq!(
            registry.resolve("alpha").unwrap().default_response_text,
            "second"
        );
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn listing_keeps_insertion_order() {
        let mut registry = ToolRegistry::new();
        for name in ["c", "a", "b"] {
            registry.register(registration(name, "text"));
        }
        registry.register(registration("a", "again"));

        let names: Vec<_> = registry.list().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["c", "a", "b"]);
    }

    #[test]
    fn resolve_unknown_is_none() {
        let registry = ToolRegistry::new();
        assert!(registry.resolve("nonexistent").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn definition_serialises_with_schema_and_meta() {
        let mut meta = Map::new();
        meta.insert("openai/widgetAccessible".into(), json!(true));
        let tool = ToolDefinition {
            name: "pizza-map".to_string(),
            title: Some("Show Pizza Map".to_string()),
            description: None,
            input_schema: InputShape::new(),
            meta: Some(meta),
        };

        let value = serde_json::to_value(&tool).unwrap();
        assert_eq!(value["name"], "pizza-map");
        assert_eq!(value["inputSchema"]["type"], "object");
        assert_eq!(value["_meta"]["openai/widgetAccessible"], true);
        assert!(value.get("description").is_none());
    }

    #[test]
    fn text_content_serialises_with_type_tag() {
        let value = serde_json::to_value(ToolContent::text("hi")).unwrap();
        assert_eq!(value, json!({ "type": "text", "text": "hi" }));
    }
}
