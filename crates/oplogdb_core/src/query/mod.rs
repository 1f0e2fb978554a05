//! The in-process query engine.
//!
//! Predicates are built either fluently (`where_('year').is_greater_than(
//! 2004)`) or from a raw expression string (`where_raw("valueOf.year >
//! 2004")`). Both produce the same expression tree; there is no dynamic
//! code evaluation anywhere in the engine. Raw strings additionally pass a
//! two-layer injection defense before they are parsed: a dangerous-
//! character denylist, then a closed allow-list sieve that must reduce the
//! string to empty residue. Anything that fails either layer silently
//! yields an empty result set.

mod builder;
mod eval;
mod operators;
mod parser;
mod predicate;
mod sieve;

pub use builder::{IncompleteQuery, Query};
pub use predicate::Literal;
