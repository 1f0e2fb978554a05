//! # oplogdb storage
//!
//! Append-oriented storage backends for oplogdb table logs.
//!
//! A table log is a sequence of text operations that only ever grows at the
//! end (compaction replaces the whole file through the filesystem, not
//! through this crate). Backends are opaque byte stores: they know nothing
//! about operations, values, or the log grammar.
//!
//! Two implementations are provided:
//! - [`FileBackend`] for persistent table files
//! - [`InMemoryBackend`] for tests and ephemeral tables

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
