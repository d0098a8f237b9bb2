//! The widget catalog served by this binary.
//!
//! Every widget is exposed twice: as a tool whose `_meta` points the host at
//! an output template, and as a resource holding the template markup. The
//! product lookup tool has no widget and is registered alongside them.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::error::HandlerError;
use crate::mcp::catalog::Catalog;
use crate::mcp::resources::{ResourceCatalog, ResourceEntry};
use crate::mcp::schema::{FieldSpec, InputShape, ValidatedArgs};
use crate::mcp::tools::{
    ToolDefinition, ToolHandler, ToolOutput, ToolRegistration, ToolRegistry,
};
use crate::products::{PersonalAutoProducts, ProductSource};

/// MIME type of widget markup.
pub const MIME_TYPE: &str = "text/html+skybridge";

/// Name of the product lookup tool.
pub const PRODUCTS_TOOL: &str = "fetch-personal-auto-products";

const STATE_DESCRIPTION: &str =
    "Two-letter U.S. state or District of Columbia abbreviation (for example, \"CA\").";

const STATE_PATTERN: &str = "^[A-Za-z]{2}$";

/// Markup mounting one of the hosted pizzaz bundles.
macro_rules! pizzaz_markup {
    ($root:literal, $bundle:literal) => {
        concat!(
            "<div id=\"",
            $root,
            "\"></div>\n",
            "<link rel=\"stylesheet\" href=\"https://persistent.oaistatic.com/ecosystem-built-assets/",
            $bundle,
            ".css\">\n",
            "<script type=\"module\" src=\"https://persistent.oaistatic.com/ecosystem-built-assets/",
            $bundle,
            ".js\"></script>"
        )
    };
}

/// Which argument shape and handler a widget uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    /// Takes a required `pizzaTopping` and echoes it back.
    Pizza,
    /// Takes an optional two-letter `state`.
    InsuranceState,
}

/// A widget: tool identity, invocation strings and template markup.
#[derive(Debug, Clone, Copy)]
pub struct Widget {
    /// Tool name.
    pub id: &'static str,
    /// Tool and resource title.
    pub title: &'static str,
    /// Resource URI of the template.
    pub template_uri: &'static str,
    /// Status text while the tool runs.
    pub invoking: &'static str,
    /// Status text once the tool has run.
    pub invoked: &'static str,
    /// Template markup.
    pub html: &'static str,
    /// Default response text.
    pub response_text: &'static str,
    /// Tool description; the title is used when absent.
    pub description: Option<&'static str>,
    /// Argument shape and handler.
    pub kind: WidgetKind,
}

/// All widgets, in listing order.
pub static WIDGETS: [Widget; 6] = [
    Widget {
        id: "pizza-map",
        title: "Show Pizza Map",
        template_uri: "ui://widget/pizza-map.html",
        invoking: "Hand-tossing a map",
        invoked: "Served a fresh map",
        html: pizzaz_markup!("pizzaz-root", "pizzaz-0038"),
        response_text: "Rendered a pizza map!",
        description: None,
        kind: WidgetKind::Pizza,
    },
    Widget {
        id: "pizza-carousel",
        title: "Show Pizza Carousel",
        template_uri: "ui://widget/pizza-carousel.html",
        invoking: "Carousel some spots",
        invoked: "Served a fresh carousel",
        html: pizzaz_markup!("pizzaz-carousel-root", "pizzaz-carousel-0038"),
        response_text: "Rendered a pizza carousel!",
        description: None,
        kind: WidgetKind::Pizza,
    },
    Widget {
        id: "pizza-albums",
        title: "Show Pizza Album",
        template_uri: "ui://widget/pizza-albums.html",
        invoking: "Hand-tossing an album",
        invoked: "Served a fresh album",
        html: pizzaz_markup!("pizzaz-albums-root", "pizzaz-albums-0038"),
        response_text: "Rendered a pizza album!",
        description: None,
        kind: WidgetKind::Pizza,
    },
    Widget {
        id: "pizza-list",
        title: "Show Pizza List",
        template_uri: "ui://widget/pizza-list.html",
        invoking: "Hand-tossing a list",
        invoked: "Served a fresh list",
        html: pizzaz_markup!("pizzaz-list-root", "pizzaz-list-0038"),
        response_text: "Rendered a pizza list!",
        description: None,
        kind: WidgetKind::Pizza,
    },
    Widget {
        id: "pizza-video",
        title: "Show Pizza Video",
        template_uri: "ui://widget/pizza-video.html",
        invoking: "Hand-tossing a video",
        invoked: "Served a fresh video",
        html: pizzaz_markup!("pizzaz-video-root", "pizzaz-video-0038"),
        response_text: "Rendered a pizza video!",
        description: None,
        kind: WidgetKind::Pizza,
    },
    Widget {
        id: "insurance-state-selector",
        title: "Collect insurance state",
        template_uri: "ui://widget/insurance-state.html",
        invoking: "Collecting a customer's state",
        invoked: "Captured the customer's state",
        html: include_str!("../assets/insurance-state-widget.html"),
        response_text:
            "Let's confirm the customer's state before we continue with their insurance quote.",
        description: Some(
            "Collects the customer's U.S. state so the assistant can surface insurance options that apply there.",
        ),
        kind: WidgetKind::InsuranceState,
    },
];

impl Widget {
    /// Metadata attached to the tool definition and the resource.
    #[must_use]
    pub fn meta(&self) -> Map<String, Value> {
        let mut meta = Map::new();
        meta.insert("openai/outputTemplate".into(), json!(self.template_uri));
        meta.insert("openai/toolInvocation/invoking".into(), json!(self.invoking));
        meta.insert("openai/toolInvocation/invoked".into(), json!(self.invoked));
        meta.insert("openai/widgetAccessible".into(), json!(true));
        meta.insert("openai/resultCanProduceWidget".into(), json!(true));
        meta.insert(
            "annotations".into(),
            json!({
                "destructiveHint": false,
                "openWorldHint": false,
                "readOnlyHint": true,
            }),
        );
        meta
    }

    /// Response metadata: [`Widget::meta`] plus the markup as an embedded
    /// resource.
    #[must_use]
    pub fn response_meta(&self) -> Map<String, Value> {
        let mut meta = self.meta();
        meta.insert(
            "openai.com/widget".into(),
            json!({
                "type": "resource",
                "resource": {
                    "uri": self.template_uri,
                    "mimeType": MIME_TYPE,
                    "text": self.html,
                    "title": self.title,
                },
            }),
        );
        meta
    }

    fn resource(&self) -> ResourceEntry {
        ResourceEntry {
            uri: self.template_uri.to_string(),
            name: self.title.to_string(),
            title: Some(self.title.to_string()),
            description: Some(format!("{} widget markup", self.title)),
            mime_type: MIME_TYPE.to_string(),
            text: self.html.to_string(),
            meta: Some(self.meta()),
        }
    }

    fn registration(&self) -> Result<ToolRegistration, regex::Error> {
        let input_schema = match self.kind {
            WidgetKind::Pizza => pizza_shape(),
            WidgetKind::InsuranceState => InputShape::new().field("state", state_field()?),
        };
        let handler: Arc<dyn ToolHandler> = match self.kind {
            WidgetKind::Pizza => Arc::new(pizza_handler),
            WidgetKind::InsuranceState => Arc::new(insurance_state_handler),
        };

        Ok(ToolRegistration {
            tool: ToolDefinition {
                name: self.id.to_string(),
                title: Some(self.title.to_string()),
                description: Some(self.description.unwrap_or(self.title).to_string()),
                input_schema,
                meta: Some(self.meta()),
            },
            handler,
            default_response_text: self.response_text.to_string(),
            default_meta: Some(self.response_meta()),
        })
    }
}

fn pizza_shape() -> InputShape {
    InputShape::new().field(
        "pizzaTopping",
        FieldSpec::string()
            .required()
            .description("Topping to mention when rendering the widget."),
    )
}

/// A two-letter state code, trimmed and uppercased.
fn state_field() -> Result<FieldSpec, regex::Error> {
    Ok(FieldSpec::string()
        .description(STATE_DESCRIPTION)
        .trimmed()
        .length(2, 2)
        .pattern(STATE_PATTERN)?
        .uppercase())
}

fn pizza_handler(args: &ValidatedArgs) -> Result<ToolOutput, HandlerError> {
    let mut structured = Map::new();
    if let Some(topping) = args.get("pizzaTopping") {
        structured.insert("pizzaTopping".into(), topping.clone());
    }
    Ok(ToolOutput::structured(structured))
}

fn insurance_state_handler(args: &ValidatedArgs) -> Result<ToolOutput, HandlerError> {
    let Some(state) = args.str("state") else {
        return Ok(ToolOutput::structured(Map::new()));
    };

    let mut structured = Map::new();
    structured.insert("state".into(), json!(state));
    Ok(ToolOutput::structured(structured)
        .with_text(format!("Captured {state} as the customer's state.")))
}

fn products_registration(source: Arc<dyn ProductSource>) -> Result<ToolRegistration, regex::Error> {
    Ok(ToolRegistration {
        tool: ToolDefinition {
            name: PRODUCTS_TOOL.to_string(),
            title: Some("Fetch personal auto products".to_string()),
            description: Some(
                "Retrieve active personal auto insurance products for a given state.".to_string(),
            ),
            input_schema: InputShape::new().field("state", state_field()?.required()),
            meta: None,
        },
        handler: Arc::new(PersonalAutoProducts::new(source)),
        default_response_text: "Retrieved personal auto product availability.".to_string(),
        default_meta: None,
    })
}

/// Builds the full catalog: every widget plus the product lookup tool.
///
/// # Errors
///
/// Returns an error if an argument pattern fails to compile.
pub fn build_catalog(products: Arc<dyn ProductSource>) -> Result<Catalog, regex::Error> {
    let mut tools = ToolRegistry::new();
    let mut resources = ResourceCatalog::new();

    for widget in &WIDGETS {
        tools.register(widget.registration()?);
        resources.register(widget.resource());
    }
    tools.register(products_registration(products)?);

    tracing::debug!(
        tools = tools.len(),
        resources = resources.len(),
        "Catalog built"
    );

    Ok(Catalog::new(tools, resources))
}
