//! Table configuration.

use crate::type_registry::TypeRegistry;
use std::sync::Arc;

/// Options for creating or loading a table.
#[derive(Debug, Clone)]
pub struct TableOptions {
    /// Whether to compact the log immediately after loading.
    ///
    /// Compaction rewrites the file to a minimal snapshot of current state,
    /// discarding the full history of updates and deletes. This has privacy
    /// implications in both directions: with compaction on (the default),
    /// previously deleted or updated data is removed from disk; with it
    /// off, the complete mutation history remains readable in the file.
    pub compact_on_load: bool,

    /// Always use the streaming (line-at-a-time) load strategy, regardless
    /// of file size. Streaming loads never compact on load.
    pub always_stream: bool,

    /// Whether the background writer syncs to durable storage after every
    /// append. Safer but slower; defaults to on.
    pub sync_on_write: bool,

    /// Registry used to reconstruct tagged instances at load time.
    pub type_registry: Arc<TypeRegistry>,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            compact_on_load: true,
            always_stream: false,
            sync_on_write: true,
            type_registry: Arc::new(TypeRegistry::new()),
        }
    }
}

impl TableOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to compact the log after loading.
    #[must_use]
    pub fn compact_on_load(mut self, value: bool) -> Self {
        self.compact_on_load = value;
        self
    }

    /// Forces the streaming load strategy.
    #[must_use]
    pub fn always_stream(mut self, value: bool) -> Self {
        self.always_stream = value;
        self
    }

    /// Sets whether every append is synced to durable storage.
    #[must_use]
    pub fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the instance type registry.
    #[must_use]
    pub fn type_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.type_registry = registry;
        self
    }
}
