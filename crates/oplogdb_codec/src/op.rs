//! Operation model: the replayable instructions a table log is made of.

use crate::key::KeyPath;
use chrono::{DateTime, Utc};

/// Kind of a table's root container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    /// The root is an object.
    Object,
    /// The root is an array.
    Array,
}

/// The right-hand side of an assign operation.
///
/// Containers never travel whole: a container assign carries only an empty
/// shell, and each descendant arrives as its own operation. This is what
/// lets the streaming load strategy execute a log line by line.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// `null`
    Null,
    /// `undefined`
    Undefined,
    /// `true` / `false`
    Bool(bool),
    /// Number literal, including `NaN`, `Infinity`, and `-Infinity`.
    Number(f64),
    /// Backtick-delimited text literal.
    Text(String),
    /// `date(`…`)` with an RFC 3339 UTC timestamp.
    Date(DateTime<Utc>),
    /// `{}` — empty object shell.
    EmptyObject,
    /// `[]` — empty array shell.
    EmptyArray,
    /// `instance(`Tag`)` — empty tagged-instance shell.
    Instance(String),
}

/// One atomic, replayable log instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Establishes (or resets) the root container. Always the first line of
    /// a well-formed log; a compacted log starts over with one of these.
    CreateRoot(RootKind),
    /// Sets the value at `path` to `payload`.
    Assign {
        /// Location being assigned.
        path: KeyPath,
        /// The value (scalar or empty shell) being placed there.
        payload: Payload,
    },
    /// Removes the value at `path`. On objects the key disappears; on
    /// arrays the slot becomes a hole.
    Delete {
        /// Location being removed.
        path: KeyPath,
    },
}

impl Operation {
    /// Convenience constructor for an assign.
    #[must_use]
    pub fn assign(path: KeyPath, payload: Payload) -> Self {
        Operation::Assign { path, payload }
    }

    /// Convenience constructor for a delete.
    #[must_use]
    pub fn delete(path: KeyPath) -> Self {
        Operation::Delete { path }
    }
}
