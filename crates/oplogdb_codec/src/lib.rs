//! # oplogdb codec
//!
//! The operation log format (OLF) used by oplogdb table files.
//!
//! A table file is a plain-text sequence of operations, one per line, that
//! rebuilds the table's root value when executed in order:
//!
//! ```text
//! _ = {};
//! _['settings'] = {};
//! _['settings']['darkMode'] = `auto`;
//! _['scores'] = [];
//! _['scores'][0] = 42;
//! delete _['settings']['darkMode'];
//! ```
//!
//! This crate provides:
//! - the dynamic [`Value`] model (including dates and tagged instances)
//! - [`Key`]/[`KeyPath`] location tokens
//! - the [`Operation`] model (`CreateRoot`, `Assign`, `Delete`)
//! - [`serialize`]: value → ordered operation list (shell-plus-children
//!   walk, so every operation stands alone in the log)
//! - [`encode_line`]/[`parse_line`]: operation ↔ log line
//! - [`apply`]: replay one operation against a root slot
//!
//! Determinism matters: encoding the same value twice yields byte-identical
//! output, which is what makes table compaction idempotent.
//!
//! ## Round trip
//!
//! ```
//! use oplogdb_codec::{apply, parse_line, serialize_root, encode_line, Value};
//!
//! let root = Value::object(vec![("answer".into(), Value::Number(42.0))]);
//! let ops = serialize_root(&root).unwrap();
//!
//! let mut replayed = None;
//! for op in &ops {
//!     let line = encode_line(op);
//!     let parsed = parse_line(line.trim_end()).unwrap();
//!     apply(&mut replayed, &parsed).unwrap();
//! }
//! assert_eq!(replayed.unwrap(), root);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decode;
mod encode;
mod error;
mod key;
mod op;
mod replay;
mod value;

pub use decode::parse_line;
pub use encode::{encode_line, serialize, serialize_root};
pub use error::{CodecError, CodecResult};
pub use key::{Key, KeyPath};
pub use op::{Operation, Payload, RootKind};
pub use replay::apply;
pub use value::Value;
