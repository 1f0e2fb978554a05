//! The fluent predicate builder and the executable query.

use crate::error::{CoreError, CoreResult};
use crate::handle::{value_at, Entry, NodeHandle};
use crate::query::eval::matches;
use crate::query::operators::{lookup, Comparison, OperatorKind, StringOp, OPERATOR_NAMES};
use crate::query::parser::parse_predicate;
use crate::query::predicate::{Literal, Predicate};
use crate::query::sieve::passes_sieve;
use crate::table::TableShared;
use oplogdb_codec::{KeyPath, Value};
use parking_lot::Mutex;
use std::sync::Arc;

/// The array a query runs over: a table plus the path of the collection.
#[derive(Clone)]
struct Collection {
    shared: Arc<TableShared>,
    path: KeyPath,
}

#[derive(Clone, Copy)]
enum Connective {
    And,
    Or,
}

/// How a query's predicate was supplied.
enum Source {
    /// Built fluently; already an expression tree.
    Tree(Predicate),
    /// A raw string, sieved and parsed lazily at first evaluation.
    Raw(String),
}

/// A predicate with a subject but no condition yet.
///
/// `where_('year')` yields one of these; attaching an operator completes
/// it into a [`Query`]. Operators can also be attached dynamically by
/// name via [`IncompleteQuery::op`], which fails loudly on a name outside
/// the valid set — that is a programmer error, unlike hostile predicate
/// *content*, which degrades silently.
pub struct IncompleteQuery {
    collection: Collection,
    prior: Option<(Predicate, Connective)>,
    field: String,
    rejected: bool,
}

impl IncompleteQuery {
    pub(crate) fn new(shared: Arc<TableShared>, path: KeyPath, field: String) -> Self {
        Self {
            collection: Collection { shared, path },
            prior: None,
            field,
            rejected: false,
        }
    }

    /// Attaches an operator by name: `op("is_greater_than", 2004)`.
    ///
    /// # Errors
    ///
    /// [`CoreError::UnknownOperator`] for a name outside the valid set.
    pub fn op(self, name: &str, value: impl Into<Literal>) -> CoreResult<Query> {
        match lookup(name) {
            Some(kind) => Ok(self.complete(kind, value.into())),
            None => Err(CoreError::UnknownOperator {
                name: name.to_string(),
                valid: OPERATOR_NAMES.join(", "),
            }),
        }
    }

    /// Equality.
    pub fn is(self, value: impl Into<Literal>) -> Query {
        self.complete(OperatorKind::Relational(Comparison::Eq), value.into())
    }

    /// Equality (alias of [`IncompleteQuery::is`]).
    pub fn is_equal_to(self, value: impl Into<Literal>) -> Query {
        self.complete(OperatorKind::Relational(Comparison::Eq), value.into())
    }

    /// Equality (alias of [`IncompleteQuery::is`]).
    pub fn equals(self, value: impl Into<Literal>) -> Query {
        self.complete(OperatorKind::Relational(Comparison::Eq), value.into())
    }

    /// Inequality. A record without the field counts as unequal.
    pub fn is_not(self, value: impl Into<Literal>) -> Query {
        self.complete(OperatorKind::Relational(Comparison::Ne), value.into())
    }

    /// Inequality (alias of [`IncompleteQuery::is_not`]).
    pub fn does_not_equal(self, value: impl Into<Literal>) -> Query {
        self.complete(OperatorKind::Relational(Comparison::Ne), value.into())
    }

    /// Strictly greater than.
    pub fn is_greater_than(self, value: impl Into<Literal>) -> Query {
        self.complete(OperatorKind::Relational(Comparison::Gt), value.into())
    }

    /// Greater than or equal.
    pub fn is_greater_than_or_equal_to(self, value: impl Into<Literal>) -> Query {
        self.complete(OperatorKind::Relational(Comparison::Ge), value.into())
    }

    /// Strictly less than.
    pub fn is_less_than(self, value: impl Into<Literal>) -> Query {
        self.complete(OperatorKind::Relational(Comparison::Lt), value.into())
    }

    /// Less than or equal.
    pub fn is_less_than_or_equal_to(self, value: impl Into<Literal>) -> Query {
        self.complete(OperatorKind::Relational(Comparison::Le), value.into())
    }

    /// String prefix test.
    pub fn starts_with(self, value: impl Into<Literal>) -> Query {
        self.complete(OperatorKind::Functional { op: StringOp::StartsWith, case_insensitive: false }, value.into())
    }

    /// String suffix test.
    pub fn ends_with(self, value: impl Into<Literal>) -> Query {
        self.complete(OperatorKind::Functional { op: StringOp::EndsWith, case_insensitive: false }, value.into())
    }

    /// Substring test on strings; membership test on arrays.
    pub fn includes(self, value: impl Into<Literal>) -> Query {
        self.complete(OperatorKind::Functional { op: StringOp::Includes, case_insensitive: false }, value.into())
    }

    /// Case-insensitive prefix test (string fields only).
    pub fn starts_with_case_insensitive(self, value: impl Into<Literal>) -> Query {
        self.complete(OperatorKind::Functional { op: StringOp::StartsWith, case_insensitive: true }, value.into())
    }

    /// Case-insensitive suffix test (string fields only).
    pub fn ends_with_case_insensitive(self, value: impl Into<Literal>) -> Query {
        self.complete(OperatorKind::Functional { op: StringOp::EndsWith, case_insensitive: true }, value.into())
    }

    /// Case-insensitive substring test (string fields only).
    pub fn includes_case_insensitive(self, value: impl Into<Literal>) -> Query {
        self.complete(OperatorKind::Functional { op: StringOp::Includes, case_insensitive: true }, value.into())
    }

    fn complete(self, kind: OperatorKind, literal: Literal) -> Query {
        let condition = match kind {
            OperatorKind::Relational(op) => Predicate::Compare {
                field: self.field,
                op,
                literal,
            },
            OperatorKind::Functional {
                op,
                case_insensitive,
            } => Predicate::Func {
                field: self.field,
                op,
                case_insensitive,
                arg: literal,
            },
        };

        let combined = match self.prior {
            None => condition,
            Some((left, Connective::And)) => Predicate::And(Box::new(left), Box::new(condition)),
            Some((left, Connective::Or)) => Predicate::Or(Box::new(left), Box::new(condition)),
        };

        Query {
            collection: self.collection,
            source: Source::Tree(combined),
            rejected: self.rejected,
            cached: Mutex::new(None),
        }
    }
}

impl std::fmt::Debug for IncompleteQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncompleteQuery")
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

/// An executable predicate over one table array.
///
/// The result is computed lazily at the first terminal call
/// (`get`/`get_first`/`get_last`) and memoized for the lifetime of the
/// query instance. Result rows are live references: mutating a field of a
/// returned record mutates — and persists through — the same underlying
/// node as the source collection. The returned `Vec` itself is the
/// caller's to rearrange; pushing to or removing from it never touches
/// the collection.
pub struct Query {
    collection: Collection,
    source: Source,
    rejected: bool,
    cached: Mutex<Option<Vec<Entry>>>,
}

impl Query {
    pub(crate) fn raw(shared: Arc<TableShared>, path: KeyPath, predicate: String) -> Self {
        Self {
            collection: Collection { shared, path },
            source: Source::Raw(predicate),
            rejected: false,
            cached: Mutex::new(None),
        }
    }

    /// Extends the predicate with a conjunction on a new field.
    #[must_use]
    pub fn and(self, field: impl Into<String>) -> IncompleteQuery {
        self.connect(Connective::And, field.into())
    }

    /// Extends the predicate with a disjunction on a new field.
    #[must_use]
    pub fn or(self, field: impl Into<String>) -> IncompleteQuery {
        self.connect(Connective::Or, field.into())
    }

    fn connect(self, connective: Connective, field: String) -> IncompleteQuery {
        let (prior, rejected) = match self.source {
            Source::Tree(predicate) => (Some((predicate, connective)), self.rejected),
            Source::Raw(text) => match compile_raw(&text) {
                // A rejected raw predicate poisons the whole chain: the
                // original string never becomes executable, so no
                // connective may resurrect it.
                Some(predicate) => (Some((predicate, connective)), self.rejected),
                None => (None, true),
            },
        };
        IncompleteQuery {
            collection: self.collection,
            prior,
            field,
            rejected,
        }
    }

    /// All matching records, in collection order.
    #[must_use]
    pub fn get(&self) -> Vec<Entry> {
        self.cached_result()
    }

    /// The first matching record, if any.
    #[must_use]
    pub fn get_first(&self) -> Option<Entry> {
        self.cached_result().into_iter().next()
    }

    /// The last matching record, if any.
    #[must_use]
    pub fn get_last(&self) -> Option<Entry> {
        self.cached_result().into_iter().next_back()
    }

    fn cached_result(&self) -> Vec<Entry> {
        let mut cached = self.cached.lock();
        if let Some(rows) = cached.as_ref() {
            return rows.clone();
        }
        let rows = self.execute();
        *cached = Some(rows.clone());
        rows
    }

    fn execute(&self) -> Vec<Entry> {
        if self.rejected {
            return Vec::new();
        }
        let predicate = match &self.source {
            Source::Tree(predicate) => predicate.clone(),
            Source::Raw(text) => match compile_raw(text) {
                Some(predicate) => predicate,
                None => return Vec::new(),
            },
        };

        let root = self.collection.shared.root.read();
        let Some(Value::Array(records)) = value_at(&root, &self.collection.path) else {
            return Vec::new();
        };

        records
            .iter()
            .enumerate()
            .filter(|&(_, record)| matches(record, &predicate))
            .map(|(index, record)| {
                if record.is_container() {
                    Entry::Node(NodeHandle::new(
                        Arc::clone(&self.collection.shared),
                        self.collection.path.child(index),
                    ))
                } else {
                    Entry::Value(record.clone())
                }
            })
            .collect()
    }
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.source {
            Source::Tree(_) => "tree",
            Source::Raw(_) => "raw",
        };
        f.debug_struct("Query")
            .field("source", &source)
            .field("memoized", &self.cached.lock().is_some())
            .finish_non_exhaustive()
    }
}

/// Sieve, then parse. `None` means the predicate is rejected and the
/// result set is empty — deliberately indistinguishable from no matches.
fn compile_raw(text: &str) -> Option<Predicate> {
    if !passes_sieve(text) {
        return None;
    }
    parse_predicate(text)
}
