//! Sandboxed predicate evaluation.
//!
//! The evaluator's only input is the record under test; there is no access
//! to any ambient scope. A type error while evaluating one record (a
//! functional operator on a non-string, for example) makes that record
//! non-matching — it never aborts the filter as a whole.

use crate::query::operators::{Comparison, StringOp};
use crate::query::predicate::{Literal, Predicate};
use oplogdb_codec::Value;

/// Whether a record matches a predicate. Evaluation errors count as a
/// non-match.
pub(crate) fn matches(record: &Value, predicate: &Predicate) -> bool {
    eval(record, predicate).unwrap_or(false)
}

/// A per-record evaluation type error. Absorbed by [`matches`].
struct TypeMismatch;

fn eval(record: &Value, predicate: &Predicate) -> Result<bool, TypeMismatch> {
    match predicate {
        Predicate::And(a, b) => Ok(eval(record, a)? && eval(record, b)?),
        Predicate::Or(a, b) => Ok(eval(record, a)? || eval(record, b)?),
        Predicate::Compare { field, op, literal } => {
            Ok(compare(lookup_field(record, field), *op, literal))
        }
        Predicate::Func {
            field,
            op,
            case_insensitive,
            arg,
        } => functional(lookup_field(record, field), *op, *case_insensitive, arg),
    }
}

/// Navigates a dotted field path. A missing step yields `None`, which
/// behaves like an undefined field.
fn lookup_field<'a>(record: &'a Value, field: &str) -> Option<&'a Value> {
    let mut current = record;
    for segment in field.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn compare(value: Option<&Value>, op: Comparison, literal: &Literal) -> bool {
    match op {
        Comparison::Eq => strict_eq(value, literal),
        // A missing field is unequal to every literal, so `is_not` matches
        // records that lack the field entirely.
        Comparison::Ne => !strict_eq(value, literal),
        Comparison::Gt | Comparison::Ge | Comparison::Lt | Comparison::Le => {
            let ordering = match (value, literal) {
                (Some(Value::Number(a)), Literal::Number(b)) => a.partial_cmp(b),
                (Some(Value::Text(a)), Literal::Text(b)) => Some(a.as_str().cmp(b.as_str())),
                // Ordering across types is undefined and matches nothing.
                _ => None,
            };
            match (ordering, op) {
                (Some(ord), Comparison::Gt) => ord.is_gt(),
                (Some(ord), Comparison::Ge) => ord.is_ge(),
                (Some(ord), Comparison::Lt) => ord.is_lt(),
                (Some(ord), Comparison::Le) => ord.is_le(),
                _ => false,
            }
        }
    }
}

/// Strict equality: same type and equal, NaN unequal to everything.
fn strict_eq(value: Option<&Value>, literal: &Literal) -> bool {
    match (value, literal) {
        (Some(Value::Number(a)), Literal::Number(b)) => a == b,
        (Some(Value::Text(a)), Literal::Text(b)) => a == b,
        (Some(Value::Bool(a)), Literal::Bool(b)) => a == b,
        _ => false,
    }
}

fn functional(
    value: Option<&Value>,
    op: StringOp,
    case_insensitive: bool,
    arg: &Literal,
) -> Result<bool, TypeMismatch> {
    let value = value.ok_or(TypeMismatch)?;

    if case_insensitive {
        // Case-insensitive operators lower-case both operands, which only
        // makes sense for strings; anything else is a type error and the
        // record does not match.
        let (Value::Text(value), Literal::Text(arg)) = (value, arg) else {
            return Err(TypeMismatch);
        };
        let value = value.to_lowercase();
        let arg = arg.to_lowercase();
        return Ok(match op {
            StringOp::StartsWith => value.starts_with(&arg),
            StringOp::EndsWith => value.ends_with(&arg),
            StringOp::Includes => value.contains(&arg),
        });
    }

    match (op, value, arg) {
        (StringOp::StartsWith, Value::Text(value), Literal::Text(arg)) => {
            Ok(value.starts_with(arg))
        }
        (StringOp::EndsWith, Value::Text(value), Literal::Text(arg)) => Ok(value.ends_with(arg)),
        (StringOp::Includes, Value::Text(value), Literal::Text(arg)) => Ok(value.contains(arg)),
        // `includes` on an array is membership.
        (StringOp::Includes, Value::Array(items), arg) => {
            Ok(items.iter().any(|element| element_eq(element, arg)))
        }
        _ => Err(TypeMismatch),
    }
}

/// Array-membership equality. Unlike [`strict_eq`], NaN finds itself, so
/// membership tests behave like a set lookup.
fn element_eq(element: &Value, literal: &Literal) -> bool {
    match (element, literal) {
        (Value::Number(a), Literal::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
        (Value::Text(a), Literal::Text(b)) => a == b,
        (Value::Bool(a), Literal::Bool(b)) => a == b,
        _ => false,
    }
}
