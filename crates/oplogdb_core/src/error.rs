//! Error types for oplogdb core.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core table and query operations.
///
/// Rejected query predicates are deliberately *not* represented here: a
/// predicate that fails the injection sieve resolves to an empty result set
/// rather than an error, so a hostile caller cannot distinguish "rejected"
/// from "no results".
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] oplogdb_storage::StorageError),

    /// Operation log codec error: a malformed or unreplayable log.
    #[error("log error: {0}")]
    Codec(#[from] oplogdb_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A value of a kind that cannot be a table root was used as one.
    #[error("a value of type {kind} cannot be stored as a table root; use an object or an array")]
    UnsupportedType {
        /// Kind name of the offending value.
        kind: &'static str,
    },

    /// Attempt to create a table over an existing, non-empty table file.
    ///
    /// Replacing a live table without deleting it first would silently
    /// interleave two logs; the caller must delete the table explicitly.
    #[error("table file already exists at {}; delete the table before recreating it", path.display())]
    TableConflict {
        /// The conflicting table path.
        path: PathBuf,
    },

    /// The table has been closed; no further mutation is possible.
    #[error("table is closed")]
    TableClosed,

    /// An unrecognized operator name was used on an incomplete predicate.
    #[error("unknown query operator `{name}`; valid operators are: {valid}")]
    UnknownOperator {
        /// The unrecognized name.
        name: String,
        /// Comma-separated list of valid operator names.
        valid: String,
    },

    /// A query was started on a node that is not an array.
    #[error("queries can only be applied to arrays, but {path} is {kind}")]
    QueryTarget {
        /// Path of the node the query was started on.
        path: String,
        /// Kind of the value found there.
        kind: &'static str,
    },

    /// An array operation was applied to a non-array node.
    #[error("{path} is {kind}, not an array")]
    NotAnArray {
        /// Path of the node.
        path: String,
        /// Kind of the value found there.
        kind: &'static str,
    },

    /// A node handle points at a location that no longer exists, usually
    /// because an ancestor was deleted or overwritten.
    #[error("no value exists at {path}")]
    NodeDetached {
        /// Path of the stale handle.
        path: String,
    },

    /// The table file content is not valid log text.
    #[error("corrupt table file: {message}")]
    Corrupt {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a corrupt-table error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}
