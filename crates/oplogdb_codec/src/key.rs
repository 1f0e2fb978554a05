//! Location tokens: keys and key paths.

use std::fmt;

/// One step into a container: an array index or an object field name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Array index.
    Index(usize),
    /// Object field name.
    Name(String),
}

impl Key {
    /// Whether a field name would be emitted unquoted in the log.
    ///
    /// Only safe non-negative integers without a leading zero qualify;
    /// everything else is quoted. `"07"` stays quoted so it does not
    /// collapse into the index `7` on replay.
    #[must_use]
    pub fn is_safe_index(name: &str) -> bool {
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        if name.len() > 1 && name.starts_with('0') {
            return false;
        }
        name.parse::<usize>().is_ok()
    }

    /// Interprets this key as an array index. Numeric field names count,
    /// so `_['0']` and `_[0]` address the same array slot.
    #[must_use]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Name(name) if Key::is_safe_index(name) => name.parse().ok(),
            Key::Name(_) => None,
        }
    }

    /// Interprets this key as a field name; indices become their decimal
    /// form, matching how numeric keys address object fields.
    #[must_use]
    pub fn as_name(&self) -> String {
        match self {
            Key::Index(i) => i.to_string(),
            Key::Name(name) => name.clone(),
        }
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Name(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Name(s)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "[{i}]"),
            Key::Name(name) if Key::is_safe_index(name) => write!(f, "[{name}]"),
            Key::Name(name) => {
                // Backslash must be escaped before the quote; line breaks
                // would split the operation across log lines.
                let escaped = name
                    .replace('\\', "\\\\")
                    .replace('\'', "\\'")
                    .replace('\n', "\\n")
                    .replace('\r', "\\r");
                write!(f, "['{escaped}']")
            }
        }
    }
}

/// A sequence of keys locating a value relative to the table root.
///
/// The empty path is the root itself. Paths display in log syntax:
/// `_['cars'][0]['make']`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPath(Vec<Key>);

impl KeyPath {
    /// The root path.
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Builds a path from keys.
    #[must_use]
    pub fn from_keys(keys: Vec<Key>) -> Self {
        Self(keys)
    }

    /// Returns a path one step deeper.
    #[must_use]
    pub fn child(&self, key: impl Into<Key>) -> Self {
        let mut keys = self.0.clone();
        keys.push(key.into());
        Self(keys)
    }

    /// Whether this is the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of keys in the path.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the path is empty (the root).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The keys of this path.
    #[must_use]
    pub fn keys(&self) -> &[Key] {
        &self.0
    }

    /// Splits into the parent keys and the final key. `None` for the root.
    #[must_use]
    pub fn split_last(&self) -> Option<(&[Key], &Key)> {
        self.0.split_last().map(|(last, init)| (init, last))
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_")?;
        for key in &self.0 {
            write!(f, "{key}")?;
        }
        Ok(())
    }
}
