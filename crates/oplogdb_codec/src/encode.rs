//! Serialization: value → operations, operation → log line.

use crate::error::{CodecError, CodecResult};
use crate::key::KeyPath;
use crate::op::{Operation, Payload, RootKind};
use crate::value::Value;
use chrono::SecondsFormat;

/// Escapes text for a backtick-delimited literal.
///
/// Order is load-bearing: the backslash must be escaped first, then the
/// delimiter, then the `${` interpolation trigger. Escaping the delimiter
/// first would double-escape the backslashes it introduces and corrupt the
/// round trip. Line breaks are escaped last so one operation always
/// occupies exactly one line of the log.
fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

/// Formats a number literal. NaN and the infinities are bare words, not
/// strings, so they replay as numbers.
fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        format!("{n}")
    }
}

fn payload_text(payload: &Payload) -> String {
    match payload {
        Payload::Null => "null".to_string(),
        Payload::Undefined => "undefined".to_string(),
        Payload::Bool(true) => "true".to_string(),
        Payload::Bool(false) => "false".to_string(),
        Payload::Number(n) => format_number(*n),
        Payload::Text(s) => format!("`{}`", escape_text(s)),
        Payload::Date(d) => format!(
            "date(`{}`)",
            d.to_rfc3339_opts(SecondsFormat::Millis, true)
        ),
        Payload::EmptyObject => "{}".to_string(),
        Payload::EmptyArray => "[]".to_string(),
        Payload::Instance(tag) => format!("instance(`{}`)", escape_text(tag)),
    }
}

/// Encodes one operation as a complete log line, newline included.
#[must_use]
pub fn encode_line(op: &Operation) -> String {
    match op {
        Operation::CreateRoot(RootKind::Object) => "_ = {};\n".to_string(),
        Operation::CreateRoot(RootKind::Array) => "_ = [];\n".to_string(),
        Operation::Assign { path, payload } => {
            format!("{path} = {};\n", payload_text(payload))
        }
        Operation::Delete { path } => format!("delete {path};\n"),
    }
}

/// Serializes a value into the ordered operation list that reconstructs it
/// at `path`.
///
/// Scalars produce exactly one assign. Containers produce a shell assign
/// followed by one operation per descendant, depth first, in field order.
///
/// # Errors
///
/// Returns [`CodecError::InvalidKey`] when `path` is the root; root values
/// are established with [`serialize_root`].
pub fn serialize(value: &Value, path: &KeyPath) -> CodecResult<Vec<Operation>> {
    if path.is_root() {
        return Err(CodecError::InvalidKey);
    }
    let mut ops = Vec::new();
    push_value(value, path, &mut ops);
    Ok(ops)
}

/// Serializes a whole table: a root header followed by the operations for
/// every child of the root.
///
/// # Errors
///
/// Returns [`CodecError::UnsupportedRoot`] when the value is not an object
/// or an array.
pub fn serialize_root(root: &Value) -> CodecResult<Vec<Operation>> {
    let mut ops = Vec::new();
    match root {
        Value::Object(fields) => {
            ops.push(Operation::CreateRoot(RootKind::Object));
            for (name, child) in fields {
                push_value(child, &KeyPath::root().child(name.as_str()), &mut ops);
            }
        }
        Value::Array(items) => {
            ops.push(Operation::CreateRoot(RootKind::Array));
            for (index, child) in items.iter().enumerate() {
                push_value(child, &KeyPath::root().child(index), &mut ops);
            }
        }
        other => {
            return Err(CodecError::UnsupportedRoot { kind: other.kind() });
        }
    }
    Ok(ops)
}

fn push_value(value: &Value, path: &KeyPath, ops: &mut Vec<Operation>) {
    match value {
        Value::Null => ops.push(Operation::assign(path.clone(), Payload::Null)),
        Value::Undefined => ops.push(Operation::assign(path.clone(), Payload::Undefined)),
        Value::Bool(b) => ops.push(Operation::assign(path.clone(), Payload::Bool(*b))),
        Value::Number(n) => ops.push(Operation::assign(path.clone(), Payload::Number(*n))),
        Value::Text(s) => ops.push(Operation::assign(path.clone(), Payload::Text(s.clone()))),
        Value::Date(d) => ops.push(Operation::assign(path.clone(), Payload::Date(*d))),
        Value::Array(items) => {
            ops.push(Operation::assign(path.clone(), Payload::EmptyArray));
            for (index, child) in items.iter().enumerate() {
                push_value(child, &path.child(index), ops);
            }
        }
        Value::Object(fields) => {
            ops.push(Operation::assign(path.clone(), Payload::EmptyObject));
            for (name, child) in fields {
                push_value(child, &path.child(name.as_str()), ops);
            }
        }
        Value::Instance { tag, fields } => {
            ops.push(Operation::assign(
                path.clone(),
                Payload::Instance(tag.clone()),
            ));
            for (name, child) in fields {
                push_value(child, &path.child(name.as_str()), ops);
            }
        }
    }
}
