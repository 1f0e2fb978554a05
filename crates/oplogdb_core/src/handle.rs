//! Node handles: live, change-tracking wrappers over table locations.
//!
//! A handle owns no data. It is a capability bound to `(table, path)`:
//! reads look up the current value under the table's lock, and writes are
//! serialized into log operations, applied to the in-memory graph, and
//! handed to the table's append path — all before the call returns.

use crate::error::{CoreError, CoreResult};
use crate::query::{IncompleteQuery, Query};
use crate::table::{normalize_value, TableShared};
use oplogdb_codec::{apply, serialize, Key, KeyPath, Operation, Value};
use std::sync::Arc;

/// What a read through a handle returns.
///
/// Containers come back as live [`NodeHandle`]s rather than detached
/// copies, so further reads and writes keep tracking the same location.
/// Scalars come back by value.
#[derive(Debug, Clone)]
pub enum Entry {
    /// A scalar value, copied out of the graph.
    Value(Value),
    /// A live handle on a container child.
    Node(NodeHandle),
}

impl Entry {
    /// The node handle, if this entry is a container.
    #[must_use]
    pub fn as_node(&self) -> Option<&NodeHandle> {
        match self {
            Entry::Node(node) => Some(node),
            Entry::Value(_) => None,
        }
    }

    /// Consumes the entry into a node handle, if it is a container.
    #[must_use]
    pub fn into_node(self) -> Option<NodeHandle> {
        match self {
            Entry::Node(node) => Some(node),
            Entry::Value(_) => None,
        }
    }

    /// A deep copy of the entry's current value.
    ///
    /// # Errors
    ///
    /// [`CoreError::NodeDetached`] if a node entry's location is gone.
    pub fn snapshot(&self) -> CoreResult<Value> {
        match self {
            Entry::Value(value) => Ok(value.clone()),
            Entry::Node(node) => node.snapshot(),
        }
    }
}

/// A live wrapper bound to one container location in a table.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    shared: Arc<TableShared>,
    path: KeyPath,
}

impl NodeHandle {
    pub(crate) fn new(shared: Arc<TableShared>, path: KeyPath) -> Self {
        Self { shared, path }
    }

    /// The path this handle is bound to.
    #[must_use]
    pub fn path(&self) -> &KeyPath {
        &self.path
    }

    /// Kind name of the value at this handle's location.
    ///
    /// # Errors
    ///
    /// [`CoreError::NodeDetached`] if the location no longer exists.
    pub fn kind(&self) -> CoreResult<&'static str> {
        let root = self.shared.root.read();
        Ok(self.resolve(&root)?.kind())
    }

    /// Number of elements (arrays) or fields (objects and instances).
    ///
    /// # Errors
    ///
    /// [`CoreError::NodeDetached`] if the location no longer exists.
    pub fn len(&self) -> CoreResult<usize> {
        let root = self.shared.root.read();
        let node = self.resolve(&root)?;
        match node {
            Value::Array(items) => Ok(items.len()),
            other => Ok(other.fields().map_or(0, |fields| fields.len())),
        }
    }

    /// Whether the container is empty.
    ///
    /// # Errors
    ///
    /// [`CoreError::NodeDetached`] if the location no longer exists.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// A deep copy of the value at this handle's location.
    ///
    /// # Errors
    ///
    /// [`CoreError::NodeDetached`] if the location no longer exists.
    pub fn snapshot(&self) -> CoreResult<Value> {
        let root = self.shared.root.read();
        Ok(self.resolve(&root)?.clone())
    }

    /// Reads a child. Containers return live handles; scalars return
    /// copies. A missing key returns `None`.
    ///
    /// # Errors
    ///
    /// [`CoreError::NodeDetached`] if this handle's own location is gone.
    pub fn get(&self, key: impl Into<Key>) -> CoreResult<Option<Entry>> {
        let key = key.into();
        let root = self.shared.root.read();
        let node = self.resolve(&root)?;

        let Some(child) = lookup_child(node, &key) else {
            return Ok(None);
        };
        if child.is_container() {
            Ok(Some(Entry::Node(NodeHandle::new(
                Arc::clone(&self.shared),
                self.path.child(key),
            ))))
        } else {
            Ok(Some(Entry::Value(child.clone())))
        }
    }

    /// Writes a child value.
    ///
    /// A scalar emits exactly one assign operation for this path; a
    /// container emits a shell assign plus one operation per descendant.
    /// The in-memory graph is updated synchronously, then the whole batch
    /// is handed to the table's append path in order. If the append later
    /// fails, the mutation stands in memory but is not yet durable.
    ///
    /// # Errors
    ///
    /// [`CoreError::NodeDetached`] if this handle's location is gone, and
    /// append-path errors from the table.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> CoreResult<()> {
        let mut root = self.shared.root.write();
        self.resolve(&root)?;
        self.write_in_place(&mut root, key.into(), value.into())
    }

    /// Appends a value to the end of an array.
    ///
    /// This assigns at the current length; array length itself is derived
    /// state and never appears in the log.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotAnArray`] if this handle is not an array, plus the
    /// errors of [`NodeHandle::set`].
    pub fn push(&self, value: impl Into<Value>) -> CoreResult<()> {
        let mut root = self.shared.root.write();
        let node = self.resolve(&root)?;
        let index = match node {
            Value::Array(items) => items.len(),
            other => {
                return Err(CoreError::NotAnArray {
                    path: self.path.to_string(),
                    kind: other.kind(),
                })
            }
        };
        self.write_in_place(&mut root, Key::Index(index), value.into())
    }

    /// Deletes a child. Object keys disappear; array slots become holes.
    /// Deleting a missing key is a no-op but is still logged, mirroring
    /// replay semantics exactly.
    ///
    /// # Errors
    ///
    /// [`CoreError::NodeDetached`] if this handle's location is gone, and
    /// append-path errors from the table.
    pub fn remove(&self, key: impl Into<Key>) -> CoreResult<()> {
        let mut root = self.shared.root.write();
        self.resolve(&root)?;

        let op = Operation::delete(self.path.child(key));
        apply_in_place(&mut root, std::slice::from_ref(&op))?;
        self.shared.persist(std::slice::from_ref(&op))
    }

    /// Starts a fluent query on this array.
    ///
    /// # Errors
    ///
    /// [`CoreError::QueryTarget`] if this handle is not an array.
    pub fn where_(&self, field: impl Into<String>) -> CoreResult<IncompleteQuery> {
        self.require_array()?;
        Ok(IncompleteQuery::new(
            Arc::clone(&self.shared),
            self.path.clone(),
            field.into(),
        ))
    }

    /// Starts a raw-predicate query on this array.
    ///
    /// The predicate body uses `valueOf.` subjects and supports grouped
    /// logic, e.g. `valueOf.age >= 21 && (valueOf.name.startsWith('A') ||
    /// valueOf.name.startsWith('B'))`. The string passes the injection
    /// sieve before it is ever compiled; a predicate that fails the sieve
    /// silently yields an empty result set.
    ///
    /// # Errors
    ///
    /// [`CoreError::QueryTarget`] if this handle is not an array.
    pub fn where_raw(&self, predicate: impl Into<String>) -> CoreResult<Query> {
        self.require_array()?;
        Ok(Query::raw(
            Arc::clone(&self.shared),
            self.path.clone(),
            predicate.into(),
        ))
    }

    fn require_array(&self) -> CoreResult<()> {
        let root = self.shared.root.read();
        let node = self.resolve(&root)?;
        match node {
            Value::Array(_) => Ok(()),
            other => Err(CoreError::QueryTarget {
                path: self.path.to_string(),
                kind: other.kind(),
            }),
        }
    }

    /// Serializes, applies to memory, and persists one write, under the
    /// caller's root write lock.
    fn write_in_place(&self, root: &mut Value, key: Key, value: Value) -> CoreResult<()> {
        let value = normalize_value(value);
        let child_path = self.path.child(key);
        let ops = serialize(&value, &child_path)?;

        apply_in_place(root, &ops)?;
        self.shared.persist(&ops)
    }

    fn resolve<'a>(&self, root: &'a Value) -> CoreResult<&'a Value> {
        value_at(root, &self.path).ok_or_else(|| CoreError::NodeDetached {
            path: self.path.to_string(),
        })
    }
}

/// Replays a batch against the in-memory root. The first operation of a
/// batch carries the full target path, so a failure happens before
/// anything is applied and the graph is left untouched.
fn apply_in_place(root: &mut Value, ops: &[Operation]) -> CoreResult<()> {
    let mut slot = Some(std::mem::replace(root, Value::Undefined));
    let mut outcome = Ok(());
    for op in ops {
        if let Err(error) = apply(&mut slot, op) {
            outcome = Err(error.into());
            break;
        }
    }
    *root = slot.unwrap_or(Value::Undefined);
    outcome
}

/// Navigates to the value at `path`, if it exists.
pub(crate) fn value_at<'a>(root: &'a Value, path: &KeyPath) -> Option<&'a Value> {
    let mut current = root;
    for key in path.keys() {
        current = lookup_child(current, key)?;
    }
    Some(current)
}

fn lookup_child<'a>(node: &'a Value, key: &Key) -> Option<&'a Value> {
    match node {
        Value::Array(items) => items.get(key.as_index()?),
        Value::Object(_) | Value::Instance { .. } => node.get(&key.as_name()),
        _ => None,
    }
}
