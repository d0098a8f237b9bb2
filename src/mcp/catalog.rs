//! The immutable set of tools and resources a server exposes.

use crate::mcp::resources::ResourceCatalog;
use crate::mcp::tools::ToolRegistry;

/// Tools and resources, built once before the server accepts connections
/// and shared read-only by every session.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Registered tools.
    pub tools: ToolRegistry,
    /// Registered resources.
    pub resources: ResourceCatalog,
}

impl Catalog {
    /// Creates a catalog from its two registries.
    #[must_use]
    pub const fn new(tools: ToolRegistry, resources: ResourceCatalog) -> Self {
        Self { tools, resources }
    }
}
