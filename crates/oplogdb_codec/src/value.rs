//! Dynamic value model for table contents.

use chrono::{DateTime, Utc};

/// A dynamic value held by a table.
///
/// This is the full set of shapes the operation log can round-trip. Object
/// fields preserve insertion order, which keeps re-serialization (and
/// therefore compaction) deterministic.
///
/// `Undefined` exists because deleting an array element leaves a hole
/// rather than shifting later elements; the hole replays as `Undefined`.
#[derive(Debug, Clone)]
pub enum Value {
    /// Explicit null.
    Null,
    /// A hole: a deleted array slot or a gap left by a sparse assign.
    Undefined,
    /// Boolean value.
    Bool(bool),
    /// Double-precision number. NaN and ±Infinity are representable and
    /// round-trip through the log.
    Number(f64),
    /// UTF-8 text.
    Text(String),
    /// A point in time, stored and logged as RFC 3339 UTC.
    Date(DateTime<Utc>),
    /// Ordered sequence of values.
    Array(Vec<Value>),
    /// Ordered field map.
    Object(Vec<(String, Value)>),
    /// A non-plain record: a type tag plus its fields. Used to round-trip
    /// application types the store does not know; see the core crate's
    /// type registry for reconstruction.
    Instance {
        /// Application type tag.
        tag: String,
        /// Ordered fields.
        fields: Vec<(String, Value)>,
    },
}

impl Value {
    /// Creates an object value from ordered fields.
    #[must_use]
    pub fn object(fields: Vec<(String, Value)>) -> Self {
        Value::Object(fields)
    }

    /// Creates a tagged instance value from ordered fields.
    #[must_use]
    pub fn instance(tag: impl Into<String>, fields: Vec<(String, Value)>) -> Self {
        Value::Instance {
            tag: tag.into(),
            fields,
        }
    }

    /// Name of this value's kind, for error messages and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::Date(_) => "date",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Instance { .. } => "instance",
        }
    }

    /// Whether this value is a container (array, object, or instance).
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Value::Array(_) | Value::Object(_) | Value::Instance { .. }
        )
    }

    /// Get this value as a boolean, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as a number, if it is one.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as text, if it is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Ordered fields of an object or instance, if this is one.
    #[must_use]
    pub fn fields(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Object(f) | Value::Instance { fields: f, .. } => Some(f),
            _ => None,
        }
    }

    /// Looks up a field by name on an object or instance.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields()?.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Sets a field on an object or instance, preserving the position of an
    /// existing key and appending new keys at the end.
    ///
    /// Returns `false` if this value is not an object or instance.
    pub fn set_field(&mut self, name: &str, value: Value) -> bool {
        let fields = match self {
            Value::Object(f) | Value::Instance { fields: f, .. } => f,
            _ => return false,
        };
        if let Some(slot) = fields.iter_mut().find(|(k, _)| k == name) {
            slot.1 = value;
        } else {
            fields.push((name.to_string(), value));
        }
        true
    }

    /// Removes a field from an object or instance. Removing a missing field
    /// is a no-op.
    ///
    /// Returns `false` if this value is not an object or instance.
    pub fn remove_field(&mut self, name: &str) -> bool {
        let fields = match self {
            Value::Object(f) | Value::Instance { fields: f, .. } => f,
            _ => return false,
        };
        fields.retain(|(k, _)| k != name);
        true
    }
}

// NaN never equals itself under IEEE 754, but a replayed log must compare
// equal to the value that produced it, so Number equality here treats NaN
// as equal to NaN.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Undefined, Value::Undefined) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (
                Value::Instance { tag: at, fields: af },
                Value::Instance { tag: bt, fields: bf },
            ) => at == bt && af == bf,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}
