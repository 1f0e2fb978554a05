//! Reconstruction of tagged instances at load time.

use oplogdb_codec::Value;
use std::collections::HashMap;

/// A constructor for a registered instance type: receives the replayed
/// fields and produces the value the application wants in the graph.
pub type Constructor = dyn Fn(Vec<(String, Value)>) -> Value + Send + Sync;

/// Maps instance type tags to constructors supplied by the embedding
/// application.
///
/// A table log records non-plain records as `instance(`Tag`)` shells plus
/// their fields. When a table is loaded, each replayed instance is passed
/// through this registry: a registered tag goes through its constructor,
/// an unknown tag falls back to a plain object holding the same fields.
///
/// ```
/// use oplogdb_core::TypeRegistry;
/// use oplogdb_codec::Value;
///
/// let mut registry = TypeRegistry::new();
/// registry.register("Person", |fields| Value::instance("Person", fields));
/// assert!(registry.contains("Person"));
/// ```
#[derive(Default)]
pub struct TypeRegistry {
    constructors: HashMap<String, Box<Constructor>>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor for a type tag.
    pub fn register(
        &mut self,
        tag: impl Into<String>,
        constructor: impl Fn(Vec<(String, Value)>) -> Value + Send + Sync + 'static,
    ) {
        self.constructors.insert(tag.into(), Box::new(constructor));
    }

    /// Registers a tag whose instances are kept as-is, tag included.
    pub fn register_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        let kept = tag.clone();
        self.register(tag, move |fields| Value::instance(kept.clone(), fields));
    }

    /// Whether a tag has a registered constructor.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Resolves a replayed instance: registered tags construct, unknown
    /// tags degrade to a plain object.
    pub(crate) fn resolve(&self, tag: &str, fields: Vec<(String, Value)>) -> Value {
        match self.constructors.get(tag) {
            Some(constructor) => constructor(fields),
            None => Value::Object(fields),
        }
    }

    /// Walks a replayed value, resolving every instance node bottom-up.
    pub(crate) fn resolve_tree(&self, value: Value) -> Value {
        match value {
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|v| self.resolve_tree(v)).collect())
            }
            Value::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, self.resolve_tree(v)))
                    .collect(),
            ),
            Value::Instance { tag, fields } => {
                let fields = fields
                    .into_iter()
                    .map(|(k, v)| (k, self.resolve_tree(v)))
                    .collect();
                self.resolve(&tag, fields)
            }
            scalar => scalar,
        }
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("tags", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}
