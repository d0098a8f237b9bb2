//! Tool invocation: lookup, boundary validation, handler call and envelope
//! assembly.
//!
//! Handlers never build protocol responses themselves. The dispatcher fills
//! in content, structured content and metadata from the handler output and
//! the registration defaults, so adding a tool never touches this path.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::DispatchError;
use crate::mcp::catalog::Catalog;
use crate::mcp::protocol::is_false;
use crate::mcp::tools::{ToolContent, ToolOutput, ToolRegistration};

/// The uniform result of a tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Content blocks, never empty.
    pub content: Vec<ToolContent>,
    /// Structured result data.
    pub structured_content: Map<String, Value>,
    /// Side-channel metadata, omitted when unset.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
    /// Whether the call failed.
    #[serde(skip_serializing_if = "is_false")]
    pub is_error: bool,
}

impl Envelope {
    /// Builds a successful envelope from handler output and registration defaults.
    #[must_use]
    pub fn assemble(output: ToolOutput, registration: &ToolRegistration) -> Self {
        let content = match output.content {
            Some(content) if !content.is_empty() => content,
            _ => vec![ToolContent::text(
                output
                    .response_text
                    .unwrap_or_else(|| registration.default_response_text.clone()),
            )],
        };

        Self {
            content,
            structured_content: output.structured_content.unwrap_or_default(),
            meta: output.meta.or_else(|| registration.default_meta.clone()),
            is_error: false,
        }
    }

    /// Builds an error envelope carrying a single text block.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(message)],
            structured_content: Map::new(),
            meta: None,
            is_error: true,
        }
    }
}

impl From<&DispatchError> for Envelope {
    fn from(error: &DispatchError) -> Self {
        Self::error(error.to_string())
    }
}

/// Resolves and runs tools from a shared catalog.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    catalog: Arc<Catalog>,
}

impl Dispatcher {
    /// Creates a dispatcher over `catalog`.
    #[must_use]
    pub const fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Returns the catalog this dispatcher reads from.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Invokes `name` with `raw_args`.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::ToolNotFound`] if no tool has that name
    /// - [`DispatchError::InvalidArguments`] if validation fails; the handler
    ///   is not called
    /// - [`DispatchError::HandlerFailed`] if the handler returns an error
    pub async fn invoke(&self, name: &str, raw_args: &Value) -> Result<Envelope, DispatchError> {
        let registration =
            self.catalog
                .tools
                .resolve(name)
                .ok_or_else(|| DispatchError::ToolNotFound {
                    name: name.to_string(),
                })?;

        let args = registration
            .tool
            .input_schema
            .validate(raw_args)
            .map_err(|source| DispatchError::InvalidArguments {
                tool: name.to_string(),
                source,
            })?;

        tracing::debug!(tool = %name, "Invoking tool handler");

        let output = registration.handler.call(&args).await.map_err(|source| {
            tracing::warn!(tool = %name, error = %source.detailed(), "Tool handler failed");
            DispatchError::HandlerFailed {
                tool: name.to_string(),
                source,
            }
        })?;

        Ok(Envelope::assemble(output, registration))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::error::HandlerError;
    use crate::mcp::schema::{FieldSpec, InputShape, ValidatedArgs};
    use crate::mcp::tools::{ToolDefinition, ToolHandler, ToolRegistry};
    use crate::mcp::resources::ResourceCatalog;

    fn meta(key: &str) -> Map<String, Value> {
        let mut meta = Map::new();
        meta.insert(key.to_string(), json!(true));
        meta
    }

    fn registration(
        name: &str,
        handler: Arc<dyn ToolHandler>,
        default_meta: Option<Map<String, Value>>,
    ) -> ToolRegistration {
        ToolRegistration {
            tool: ToolDefinition {
                name: name.to_string(),
                title: None,
                description: None,
                input_schema: InputShape::new().field("topping", FieldSpec::string().required()),
                meta: None,
            },
            handler,
            default_response_text: "default text".to_string(),
            default_meta,
        }
    }

    fn dispatcher(registrations: Vec<ToolRegistration>) -> Dispatcher {
        let mut tools = ToolRegistry::new();
        for registration in registrations {
            tools.register(registration);
        }
        Dispatcher::new(Arc::new(Catalog::new(tools, ResourceCatalog::new())))
    }

    #[tokio::test]
    async fn synthesises_text_from_default() {
        let handler = Arc::new(|_: &ValidatedArgs| Ok::<_, HandlerError>(ToolOutput::default()));
        let dispatcher = dispatcher(vec![registration("t", handler, None)]);

        let envelope = dispatcher
            .invoke("t", &json!({ "topping": "basil" }))
            .await
            .unwrap();

        assert_eq!(envelope.content, vec![ToolContent::text("default text")]);
        assert!(envelope.structured_content.is_empty());
        assert!(envelope.meta.is_none());

        let value = serde_json::to_value(&envelope).unwrap();
        assert!(value.get("_meta").is_none());
        assert!(value.get("isError").is_none());
        assert_eq!(value["structuredContent"], json!({}));
    }

    #[tokio::test]
    async fn handler_text_and_meta_take_precedence() {
        let handler = Arc::new(|args: &ValidatedArgs| {
            Ok::<_, HandlerError>(
                ToolOutput::structured(args.to_map())
                    .with_text("handler text")
                    .with_meta(meta("handler")),
            )
        });
        let dispatcher = dispatcher(vec![registration("t", handler, Some(meta("default")))]);

        let envelope = dispatcher
            .invoke("t", &json!({ "topping": "basil" }))
            .await
            .unwrap();

        assert_eq!(envelope.content, vec![ToolContent::text("handler text")]);
        assert_eq!(envelope.structured_content["topping"], "basil");
        assert!(envelope.meta.unwrap().contains_key("handler"));
    }

    #[tokio::test]
    async fn explicit_content_passes_through() {
        let handler = Arc::new(|_: &ValidatedArgs| {
            Ok::<_, HandlerError>(
                ToolOutput::default()
                    .with_text("ignored")
                    .with_content(vec![ToolContent::text("one"), ToolContent::text("two")]),
            )
        });
        let dispatcher = dispatcher(vec![registration("t", handler, Some(meta("default")))]);

        let envelope = dispatcher
            .invoke("t", &json!({ "topping": "basil" }))
            .await
            .unwrap();

        assert_eq!(envelope.content.len(), 2);
        assert!(envelope.meta.unwrap().contains_key("default"));
    }

    #[tokio::test]
    async fn invalid_arguments_skip_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler = Arc::new(move |_: &ValidatedArgs| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, HandlerError>(ToolOutput::default())
        });
        let dispatcher = dispatcher(vec![registration("t", handler, None)]);

        let err = dispatcher.invoke("t", &json!({})).await.unwrap_err();

        assert!(matches!(
            err,
            DispatchError::InvalidArguments { ref source, .. } if source.field == "topping"
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let dispatcher = dispatcher(Vec::new());
        let err = dispatcher.invoke("nonexistent", &json!({})).await.unwrap_err();
        assert!(matches!(err, DispatchError::ToolNotFound { ref name } if name == "nonexistent"));
    }

    #[tokio::test]
    async fn handler_failure_is_wrapped() {
        let handler = Arc::new(|args: &ValidatedArgs| {
            Err::<ToolOutput, _>(HandlerError::new(
                "fetch toppings",
                args.str("topping").unwrap_or_default(),
                "upstream returned 503",
            ))
        });
        let dispatcher = dispatcher(vec![registration("t", handler, None)]);

        let err = dispatcher
            .invoke("t", &json!({ "topping": "basil" }))
            .await
            .unwrap_err();

        let DispatchError::HandlerFailed { tool, source } = &err else {
            panic!("Expected HandlerFailed, got {err:?}");
        };
        assert_eq!(tool, "t");
        assert_eq!(source.target, "basil");

        let envelope = Envelope::from(&err);
        assert!(envelope.is_error);
        let ToolContent::Text { text } = &envelope.content[0];
        assert!(text.contains("upstream returned 503"));
    }
}
