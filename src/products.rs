//! Personal auto product lookup.
//!
//! The tool asks a third-party rating gateway which personal auto products
//! are active in a state. The gateway is reached through [`ProductSource`],
//! so the interpretation of its answers can be exercised without a network.
//!
//! # Response Handling
//!
//! | Gateway answer          | Tool result                              |
//! |-------------------------|------------------------------------------|
//! | 404                     | empty product list, status 404           |
//! | other non-2xx           | handler failure                          |
//! | 2xx, empty body         | empty product list                       |
//! | 2xx, body not JSON      | handler failure                          |
//! | 2xx, JSON but not array | empty product list                       |
//! | 2xx, JSON array         | the array                                |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode, Url};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::config::ProductsConfig;
use crate::error::HandlerError;
use crate::mcp::schema::ValidatedArgs;
use crate::mcp::tools::{ToolHandler, ToolOutput};

/// Operation name attached to handler failures.
const OPERATION: &str = "fetch personal auto products";

/// Errors raised while talking to the product gateway.
#[derive(Error, Debug)]
pub enum ProductsError {
    /// The configured endpoint is not a usable base URL.
    #[error("invalid products endpoint: {endpoint}")]
    InvalidEndpoint {
        /// The configured endpoint.
        endpoint: String,
    },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    /// The request could not be sent or timed out.
    #[error("personal auto products request failed")]
    Request(#[source] reqwest::Error),

    /// The response body could not be read.
    #[error("failed to read personal auto products response")]
    Body(#[source] reqwest::Error),

    /// The gateway answered with a non-success status other than 404.
    #[error("personal auto products request failed with status {status}")]
    Status {
        /// The HTTP status code.
        status: u16,
    },

    /// The response body is not valid JSON.
    #[error("failed to parse personal auto products response")]
    Parse(#[source] serde_json::Error),

    /// The validated arguments carried no state.
    #[error("missing state argument")]
    MissingState,
}

/// A raw gateway answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

/// Fetches active products for a state.
#[async_trait]
pub trait ProductSource: Send + Sync {
    /// Requests the active products for `state`, a two-letter uppercase code.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be completed. Non-success
    /// statuses are returned as responses, not errors.
    async fn active_products(&self, state: &str) -> Result<ProductResponse, ProductsError>;
}

/// [`ProductSource`] backed by the rating gateway's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpProductSource {
    client: Client,
    base: Url,
    api_key: Option<String>,
}

impl HttpProductSource {
    /// Creates a source from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot serve as a base URL or the
    /// client cannot be built.
    pub fn new(config: &ProductsConfig) -> Result<Self, ProductsError> {
        let invalid = || ProductsError::InvalidEndpoint {
            endpoint: config.endpoint.clone(),
        };
        let base = Url::parse(&config.endpoint).map_err(|_| invalid())?;
        if base.cannot_be_a_base() {
            return Err(invalid());
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ProductsError::Client)?;

        Ok(Self {
            client,
            base,
            api_key: config.api_key.clone(),
        })
    }

    /// Builds `<endpoint>/<state>/activeProducts`, escaping the state.
    fn url_for(&self, state: &str) -> Result<Url, ProductsError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ProductsError::InvalidEndpoint {
                endpoint: self.base.to_string(),
            })?
            .pop_if_empty()
            .push(state)
            .push("activeProducts");
        Ok(url)
    }
}

#[async_trait]
impl ProductSource for HttpProductSource {
    async fn active_products(&self, state: &str) -> Result<ProductResponse, ProductsError> {
        let url = self.url_for(state)?;
        tracing::debug!(url = %url, "Requesting active personal auto products");

        let mut request = self.client.get(url).header(ACCEPT, "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.map_err(ProductsError::Request)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(ProductsError::Body)?;

        Ok(ProductResponse { status, body })
    }
}

/// Turns a gateway answer into tool output.
///
/// # Errors
///
/// Returns an error for non-success statuses other than 404 and for bodies
/// that are not JSON.
pub fn interpret(state: &str, response: &ProductResponse) -> Result<ToolOutput, ProductsError> {
    let products = if response.status == StatusCode::NOT_FOUND.as_u16() {
        Vec::new()
    } else if (200..300).contains(&response.status) {
        parse_products(&response.body)?
    } else {
        return Err(ProductsError::Status {
            status: response.status,
        });
    };

    let text = match products.len() {
        0 => format!("No active personal auto products found for {state}."),
        1 => format!("Found 1 active personal auto product for {state}."),
        n => format!("Found {n} active personal auto products for {state}."),
    };

    let mut structured = Map::new();
    structured.insert("state".into(), json!(state));
    structured.insert("status".into(), json!(response.status));
    structured.insert("products".into(), Value::Array(products));

    Ok(ToolOutput::structured(structured).with_text(text))
}

fn parse_products(body: &str) -> Result<Vec<Value>, ProductsError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str(body).map_err(ProductsError::Parse)? {
        Value::Array(products) => Ok(products),
        _ => Ok(Vec::new()),
    }
}

/// Tool handler for `fetch-personal-auto-products`.
#[derive(Clone)]
pub struct PersonalAutoProducts {
    source: Arc<dyn ProductSource>,
}

impl std::fmt::Debug for PersonalAutoProducts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonalAutoProducts").finish_non_exhaustive()
    }
}

impl PersonalAutoProducts {
    /// Creates the handler over `source`.
    #[must_use]
    pub fn new(source: Arc<dyn ProductSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl ToolHandler for PersonalAutoProducts {
    async fn call(&self, args: &ValidatedArgs) -> Result<ToolOutput, HandlerError> {
        let state = args
            .str("state")
            .ok_or_else(|| HandlerError::new(OPERATION, "", ProductsError::MissingState))?;

        let response = self
            .source
            .active_products(state)
            .await
            .map_err(|e| HandlerError::new(OPERATION, state, e))?;

        tracing::info!(state = %state, status = response.status, "Personal auto products fetched");

        interpret(state, &response).map_err(|e| HandlerError::new(OPERATION, state, e))
    }
}
