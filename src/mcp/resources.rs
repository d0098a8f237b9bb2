//! URI-addressed static resources (widget markup) and their listings.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::DispatchError;

/// A static resource entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEntry {
    /// Unique resource URI.
    pub uri: String,
    /// Display name.
    pub name: String,
    /// Optional title.
    pub title: Option<String>,
    /// Human-readable description.
    pub description: Option<String>,
    /// MIME type of the payload.
    pub mime_type: String,
    /// The payload itself.
    pub text: String,
    /// Opaque side-channel metadata.
    pub meta: Option<Map<String, Value>>,
}

/// A resource as advertised by `resources/list`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceListing<'a> {
    uri: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    mime_type: &'a str,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    meta: Option<&'a Map<String, Value>>,
}

/// A resource as advertised by `resources/templates/list`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplateListing<'a> {
    uri_template: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    mime_type: &'a str,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    meta: Option<&'a Map<String, Value>>,
}

/// The payload returned by `resources/read`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents<'a> {
    uri: &'a str,
    mime_type: &'a str,
    text: &'a str,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    meta: Option<&'a Map<String, Value>>,
}

impl ResourceEntry {
    /// Borrows the entry as a plain listing item.
    #[must_use]
    pub fn listing(&self) -> ResourceListing<'_> {
        ResourceListing {
            uri: &self.uri,
            name: &self.name,
            title: self.title.as_deref(),
            description: self.description.as_deref(),
            mime_type: &self.mime_type,
            meta: self.meta.as_ref(),
        }
    }

    /// Borrows the entry as a template listing item.
    #[must_use]
    pub fn template_listing(&self) -> ResourceTemplateListing<'_> {
        ResourceTemplateListing {
            uri_template: &self.uri,
            name: &self.name,
            title: self.title.as_deref(),
            description: self.description.as_deref(),
            mime_type: &self.mime_type,
            meta: self.meta.as_ref(),
        }
    }

    /// Borrows the entry as read contents.
    #[must_use]
    pub fn contents(&self) -> ResourceContents<'_> {
        ResourceContents {
            uri: &self.uri,
            mime_type: &self.mime_type,
            text: &self.text,
            meta: self.meta.as_ref(),
        }
    }
}

/// URI-keyed resource catalog with insertion-stable listing order.
#[derive(Debug, Clone, Default)]
pub struct ResourceCatalog {
    entries: IndexMap<String, ResourceEntry>,
}

impl ResourceCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entry, replacing any earlier entry with the same URI.
    pub fn register(&mut self, entry: ResourceEntry) -> Option<ResourceEntry> {
        self.entries.insert(entry.uri.clone(), entry)
    }

    /// Lists all entries in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<ResourceListing<'_>> {
        self.entries.values().map(ResourceEntry::listing).collect()
    }

    /// Lists all entries as URI templates, in registration order.
    #[must_use]
    pub fn templates(&self) -> Vec<ResourceTemplateListing<'_>> {
        self.entries
            .values()
            .map(ResourceEntry::template_listing)
            .collect()
    }

    /// Looks up an entry by URI.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::ResourceNotFound`] for unknown URIs.
    pub fn read(&self, uri: &str) -> Result<&ResourceEntry, DispatchError> {
        self.entries
            .get(uri)
            .ok_or_else(|| DispatchError::ResourceNotFound {
                uri: uri.to_string(),
            })
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(uri: &str) -> ResourceEntry {
        ResourceEntry {
            uri: uri.to_string(),
            name: "Show Pizza Map".to_string(),
            title: Some("Show Pizza Map".to_string()),
            description: Some("Show Pizza Map widget markup".to_string()),
            mime_type: "text/html+skybridge".to_string(),
            text: "<div id=\"pizzaz-root\"></div>".to_string(),
            meta: None,
        }
    }

    #[test]
    fn read_known_and_unknown() {
        let mut catalog = ResourceCatalog::new();
        catalog.register(entry("ui://widget/pizza-map.html"));

        let found = catalog.read("ui://widget/pizza-map.html").unwrap();
        assert_eq!(found.name, "Show Pizza Map");

        let err = catalog.read("ui://widget/missing.html").unwrap_err();
        assert!(matches!(err, DispatchError::ResourceNotFound { ref uri } if uri == "ui://widget/missing.html"));
    }

    #[test]
    fn template_listing_mirrors_plain_listing() {
        let mut catalog = ResourceCatalog::new();
        catalog.register(entry("ui://widget/a.html"));
        catalog.register(entry("ui://widget/b.html"));

        let plain = serde_json::to_value(catalog.list()).unwrap();
        let templates = serde_json::to_value(catalog.templates()).unwrap();

        assert_eq!(plain[0]["uri"], templates[0]["uriTemplate"]);
        assert_eq!(plain[1]["mimeType"], templates[1]["mimeType"]);
        assert_eq!(plain[1]["description"], templates[1]["description"]);
        assert!(templates[0].get("uri").is_none());
    }

    #[test]
    fn contents_carry_payload() {
        let entry = entry("ui://widget/a.html");
        let value = serde_json::to_value(entry.contents()).unwrap();
        assert_eq!(value["text"], "<div id=\"pizzaz-root\"></div>");
        assert_eq!(value["mimeType"], "text/html+skybridge");
    }
}
