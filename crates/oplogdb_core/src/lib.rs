//! # oplogdb core
//!
//! An embedded object store that keeps each table — one root object or
//! array — in its own append-only, human-readable operation log file, and
//! presents the loaded graph as a live structure: every write through a
//! [`NodeHandle`] is applied to memory synchronously and appended to the
//! log durably.
//!
//! ```no_run
//! use oplogdb_core::{Table, Value};
//!
//! let table = Table::create(
//!     "data/cars.olf".as_ref(),
//!     Value::Array(vec![
//!         Value::object(vec![
//!             ("make".into(), Value::from("Subaru")),
//!             ("year".into(), Value::from(1991)),
//!         ]),
//!     ]),
//! )?;
//!
//! // Mutations persist transparently.
//! let cars = table.root();
//! cars.push(Value::object(vec![
//!     ("make".into(), Value::from("Lexus")),
//!     ("year".into(), Value::from(1997)),
//! ]))?;
//!
//! // Queries run over the live collection.
//! let older = cars.where_("year")?.is_less_than(1995).get();
//! assert_eq!(older.len(), 1);
//!
//! table.close()?;
//! # Ok::<(), oplogdb_core::CoreError>(())
//! ```
//!
//! The crate is organized around four pieces:
//! - [`Table`]: the log engine — create, load (whole-file or streaming),
//!   append, compact, close, delete
//! - [`NodeHandle`]: change-tracking wrappers over locations in the graph
//! - the query engine: [`IncompleteQuery`]/[`Query`] with a fluent builder,
//!   a raw-expression escape hatch, and a two-layer injection defense
//! - [`TypeRegistry`]: reconstruction of tagged application types at load

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod events;
mod handle;
mod query;
mod table;
mod type_registry;

pub use config::TableOptions;
pub use error::{CoreError, CoreResult};
pub use events::TableEvent;
pub use handle::{Entry, NodeHandle};
pub use query::{IncompleteQuery, Literal, Query};
pub use table::{Table, TableState, STREAMING_LOAD_THRESHOLD};
pub use type_registry::TypeRegistry;

// The value model is the public currency of the whole API.
pub use oplogdb_codec::{Key, KeyPath, Value};
