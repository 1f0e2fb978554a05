//! Decoding: log line → operation.

use crate::error::{CodecError, CodecResult};
use crate::key::{Key, KeyPath};
use crate::op::{Operation, Payload, RootKind};
use chrono::{DateTime, Utc};

/// Parses one log line (with or without its trailing newline) into an
/// operation.
///
/// # Errors
///
/// Returns [`CodecError::Parse`] with the byte position of the first
/// offending character when the line does not match the log grammar.
pub fn parse_line(line: &str) -> CodecResult<Operation> {
    let mut p = Parser::new(line.trim_end_matches(['\n', '\r']));

    if p.eat("delete ") {
        let path = p.parse_path()?;
        if path.is_root() {
            return Err(p.err("the root cannot be deleted"));
        }
        p.expect(";")?;
        p.expect_end()?;
        return Ok(Operation::Delete { path });
    }

    let path = p.parse_path()?;
    p.expect(" = ")?;
    let payload = p.parse_payload()?;
    p.expect(";")?;
    p.expect_end()?;

    if path.is_root() {
        return match payload {
            Payload::EmptyObject => Ok(Operation::CreateRoot(RootKind::Object)),
            Payload::EmptyArray => Ok(Operation::CreateRoot(RootKind::Array)),
            _ => Err(p.err("a root assignment must create an object or an array")),
        };
    }

    Ok(Operation::Assign { path, payload })
}

struct Parser<'a> {
    s: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(s: &'a str) -> Self {
        Self { s, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.s[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, lit: &str) -> bool {
        if self.rest().starts_with(lit) {
            self.pos += lit.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, lit: &str) -> CodecResult<()> {
        if self.eat(lit) {
            Ok(())
        } else {
            Err(self.err(format!("expected `{lit}`")))
        }
    }

    fn expect_end(&mut self) -> CodecResult<()> {
        if self.rest().is_empty() {
            Ok(())
        } else {
            Err(self.err("trailing characters after operation"))
        }
    }

    fn err(&self, message: impl Into<String>) -> CodecError {
        CodecError::parse(self.pos, message)
    }

    fn parse_path(&mut self) -> CodecResult<KeyPath> {
        self.expect("_")?;
        let mut keys = Vec::new();
        while self.peek() == Some('[') {
            keys.push(self.parse_key()?);
        }
        Ok(KeyPath::from_keys(keys))
    }

    fn parse_key(&mut self) -> CodecResult<Key> {
        self.expect("[")?;
        let key = match self.peek() {
            Some('\'') => {
                self.bump();
                Key::Name(self.parse_quoted_name()?)
            }
            Some(c) if c.is_ascii_digit() => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.bump();
                }
                let digits = &self.s[start..self.pos];
                let index = digits
                    .parse::<usize>()
                    .map_err(|_| CodecError::parse(start, "array index out of range"))?;
                Key::Index(index)
            }
            _ => return Err(self.err("expected an index or a quoted key")),
        };
        self.expect("]")?;
        Ok(key)
    }

    /// Parses a single-quoted key name; the opening quote is consumed.
    fn parse_quoted_name(&mut self) -> CodecResult<String> {
        let mut name = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some('\\') => name.push('\\'),
                    Some('\'') => name.push('\''),
                    Some('n') => name.push('\n'),
                    Some('r') => name.push('\r'),
                    _ => return Err(self.err("invalid escape in key")),
                },
                Some('\'') => return Ok(name),
                Some(c) => name.push(c),
                None => return Err(self.err("unterminated key")),
            }
        }
    }

    /// Parses a backtick-delimited text literal; the opening backtick is
    /// consumed by the caller via `expect`.
    fn parse_text_body(&mut self) -> CodecResult<String> {
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some('\\') => text.push('\\'),
                    Some('`') => text.push('`'),
                    Some('$') => text.push('$'),
                    Some('n') => text.push('\n'),
                    Some('r') => text.push('\r'),
                    _ => return Err(self.err("invalid escape in text literal")),
                },
                Some('`') => return Ok(text),
                Some(c) => text.push(c),
                None => return Err(self.err("unterminated text literal")),
            }
        }
    }

    fn parse_payload(&mut self) -> CodecResult<Payload> {
        if self.eat("null") {
            return Ok(Payload::Null);
        }
        if self.eat("undefined") {
            return Ok(Payload::Undefined);
        }
        if self.eat("true") {
            return Ok(Payload::Bool(true));
        }
        if self.eat("false") {
            return Ok(Payload::Bool(false));
        }
        if self.eat("NaN") {
            return Ok(Payload::Number(f64::NAN));
        }
        if self.eat("Infinity") {
            return Ok(Payload::Number(f64::INFINITY));
        }
        if self.eat("-Infinity") {
            return Ok(Payload::Number(f64::NEG_INFINITY));
        }
        if self.eat("{}") {
            return Ok(Payload::EmptyObject);
        }
        if self.eat("[]") {
            return Ok(Payload::EmptyArray);
        }
        if self.eat("date(`") {
            let text = self.parse_text_body()?;
            self.expect(")")?;
            let parsed = DateTime::parse_from_rfc3339(&text)
                .map_err(|e| self.err(format!("invalid timestamp: {e}")))?;
            return Ok(Payload::Date(parsed.with_timezone(&Utc)));
        }
        if self.eat("instance(`") {
            let tag = self.parse_text_body()?;
            self.expect(")")?;
            return Ok(Payload::Instance(tag));
        }
        if self.eat("`") {
            return Ok(Payload::Text(self.parse_text_body()?));
        }
        if matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '-' || c == '.') {
            return self.parse_number();
        }
        Err(self.err("expected a value"))
    }

    fn parse_number(&mut self) -> CodecResult<Payload> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(c) if c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')
        ) {
            self.bump();
        }
        let literal = &self.s[start..self.pos];
        let number = literal
            .parse::<f64>()
            .map_err(|_| CodecError::parse(start, format!("invalid number literal `{literal}`")))?;
        Ok(Payload::Number(number))
    }
}
