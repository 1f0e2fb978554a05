//! The raw-predicate mini-parser.
//!
//! Builds the same expression tree the fluent builder produces, from a
//! string that has already passed the injection sieve. Unlike the fluent
//! chain, the grammar here supports parenthesized grouping, with `&&`
//! binding tighter than `||`. Arguments and right-hand sides must be
//! literals; there is no way to express a call or a reference, so nothing
//! here ever evaluates attacker-controlled code. Any parse failure is
//! reported as `None` and resolves to an empty result set upstream.

use crate::query::operators::{Comparison, StringOp};
use crate::query::predicate::{Literal, Predicate};

/// Parses a raw predicate body, e.g.
/// `valueOf.age >= 21 && valueOf.name.startsWith('A')`.
pub(crate) fn parse_predicate(input: &str) -> Option<Predicate> {
    let mut parser = RawParser { s: input, pos: 0 };
    let predicate = parser.parse_or()?;
    parser.skip_whitespace();
    if parser.pos == parser.s.len() {
        Some(predicate)
    } else {
        None
    }
}

struct RawParser<'a> {
    s: &'a str,
    pos: usize,
}

impl<'a> RawParser<'a> {
    fn rest(&self) -> &'a str {
        &self.s[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn eat(&mut self, lit: &str) -> bool {
        if self.rest().starts_with(lit) {
            self.pos += lit.len();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn parse_or(&mut self) -> Option<Predicate> {
        let mut left = self.parse_and()?;
        loop {
            self.skip_whitespace();
            if self.eat("||") {
                let right = self.parse_and()?;
                left = Predicate::Or(Box::new(left), Box::new(right));
            } else {
                return Some(left);
            }
        }
    }

    fn parse_and(&mut self) -> Option<Predicate> {
        let mut left = self.parse_term()?;
        loop {
            self.skip_whitespace();
            if self.eat("&&") {
                let right = self.parse_term()?;
                left = Predicate::And(Box::new(left), Box::new(right));
            } else {
                return Some(left);
            }
        }
    }

    fn parse_term(&mut self) -> Option<Predicate> {
        self.skip_whitespace();
        if self.eat("(") {
            let inner = self.parse_or()?;
            self.skip_whitespace();
            if self.eat(")") {
                Some(inner)
            } else {
                None
            }
        } else {
            self.parse_condition()
        }
    }

    fn parse_condition(&mut self) -> Option<Predicate> {
        if !self.eat("valueOf.") {
            return None;
        }

        let mut segments: Vec<&str> = Vec::new();
        loop {
            let segment = self.take_segment();
            if segment.is_empty() {
                return None;
            }
            segments.push(segment);
            if self.peek() == Some('.') {
                self.pos += 1;
                continue;
            }
            break;
        }

        if self.peek() == Some('(') {
            return self.parse_functional(segments);
        }
        self.parse_relational(segments)
    }

    /// A field or operator segment: everything up to a delimiter.
    fn take_segment(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            let is_delimiter = matches!(
                c,
                '.' | '=' | '!' | '<' | '>' | '(' | ')' | '&' | '|' | '\'' | '"'
            ) || c.is_whitespace();
            if is_delimiter {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.s[start..self.pos]
    }

    /// `<field>.<op>(<literal>)` or `<field>.toLowerCase().<op>(<literal>)`;
    /// the segments collected so far end with the operator name (or with
    /// `toLowerCase`, whose `()` we are now looking at).
    fn parse_functional(&mut self, mut segments: Vec<&str>) -> Option<Predicate> {
        let mut case_insensitive = false;
        let mut name = segments.pop()?;

        if name == "toLowerCase" {
            if !self.eat("()") || !self.eat(".") {
                return None;
            }
            case_insensitive = true;
            name = self.take_segment();
            if self.peek() != Some('(') {
                return None;
            }
        }

        let (op, name_is_insensitive) = functional_operator(name)?;
        if segments.is_empty() {
            return None;
        }
        let field = segments.join(".");

        self.eat("(");
        let arg = self.parse_literal()?;
        self.skip_whitespace();
        if !self.eat(")") {
            return None;
        }

        Some(Predicate::Func {
            field,
            op,
            case_insensitive: case_insensitive || name_is_insensitive,
            arg,
        })
    }

    /// `<field> <op> <literal>`.
    fn parse_relational(&mut self, segments: Vec<&str>) -> Option<Predicate> {
        // The sieve's relational production forbids dotted fields.
        let [field] = segments.as_slice() else {
            return None;
        };

        self.skip_whitespace();
        let op = self.parse_comparison()?;
        let literal = self.parse_literal()?;

        Some(Predicate::Compare {
            field: (*field).to_string(),
            op,
            literal,
        })
    }

    fn parse_comparison(&mut self) -> Option<Comparison> {
        // Longest spellings first.
        if self.eat("===") {
            Some(Comparison::Eq)
        } else if self.eat("!==") {
            Some(Comparison::Ne)
        } else if self.eat(">=") {
            Some(Comparison::Ge)
        } else if self.eat("<=") {
            Some(Comparison::Le)
        } else if self.eat(">") {
            Some(Comparison::Gt)
        } else if self.eat("<") {
            Some(Comparison::Lt)
        } else {
            None
        }
    }

    fn parse_literal(&mut self) -> Option<Literal> {
        self.skip_whitespace();
        match self.peek()? {
            quote @ ('\'' | '"') => {
                self.pos += 1;
                let close = self.rest().find(quote)?;
                let text = &self.rest()[..close];
                self.pos += close + 1;
                Some(Literal::Text(text.to_string()))
            }
            c if c.is_ascii_digit() || c == '.' || c == '_' => {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() || matches!(c, '.' | '_') {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                let digits: String = self.s[start..self.pos]
                    .chars()
                    .filter(|c| *c != '_')
                    .collect();
                digits.parse::<f64>().ok().map(Literal::Number)
            }
            _ => {
                if self.eat("true") {
                    Some(Literal::Bool(true))
                } else if self.eat("false") {
                    Some(Literal::Bool(false))
                } else {
                    None
                }
            }
        }
    }
}

fn functional_operator(name: &str) -> Option<(StringOp, bool)> {
    Some(match name {
        "startsWith" => (StringOp::StartsWith, false),
        "endsWith" => (StringOp::EndsWith, false),
        "includes" => (StringOp::Includes, false),
        "startsWithCaseInsensitive" => (StringOp::StartsWith, true),
        "endsWithCaseInsensitive" => (StringOp::EndsWith, true),
        "includesCaseInsensitive" => (StringOp::Includes, true),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relational_comparisons() {
        assert_eq!(
            parse_predicate("valueOf.year > 2004"),
            Some(Predicate::Compare {
                field: "year".into(),
                op: Comparison::Gt,
                literal: Literal::Number(2004.0),
            })
        );
        assert_eq!(
            parse_predicate("valueOf.make === 'Subaru'"),
            Some(Predicate::Compare {
                field: "make".into(),
                op: Comparison::Eq,
                literal: Literal::Text("Subaru".into()),
            })
        );
        assert_eq!(
            parse_predicate("valueOf.own!==false"),
            Some(Predicate::Compare {
                field: "own".into(),
                op: Comparison::Ne,
                literal: Literal::Bool(false),
            })
        );
    }

    #[test]
    fn numeric_literals_allow_separators() {
        assert_eq!(
            parse_predicate("valueOf.price >= 1_000.5"),
            Some(Predicate::Compare {
                field: "price".into(),
                op: Comparison::Ge,
                literal: Literal::Number(1000.5),
            })
        );
    }

    #[test]
    fn functional_operators() {
        assert_eq!(
            parse_predicate("valueOf.name.startsWith('A')"),
            Some(Predicate::Func {
                field: "name".into(),
                op: StringOp::StartsWith,
                case_insensitive: false,
                arg: Literal::Text("A".into()),
            })
        );
        assert_eq!(
            parse_predicate("valueOf.tags.includes('sporty')"),
            Some(Predicate::Func {
                field: "tags".into(),
                op: StringOp::Includes,
                case_insensitive: false,
                arg: Literal::Text("sporty".into()),
            })
        );
    }

    #[test]
    fn lowercase_prefix_and_suffix_both_mean_case_insensitive() {
        let via_prefix = parse_predicate("valueOf.name.toLowerCase().startsWith('a')");
        let via_suffix = parse_predicate("valueOf.name.startsWithCaseInsensitive('a')");
        assert_eq!(via_prefix, via_suffix);
        assert!(matches!(
            via_prefix,
            Some(Predicate::Func {
                case_insensitive: true,
                ..
            })
        ));
    }

    #[test]
    fn dotted_functional_fields_navigate() {
        assert_eq!(
            parse_predicate("valueOf.owner.name.startsWith('A')"),
            Some(Predicate::Func {
                field: "owner.name".into(),
                op: StringOp::StartsWith,
                case_insensitive: false,
                arg: Literal::Text("A".into()),
            })
        );
    }

    #[test]
    fn connectives_and_grouping() {
        let flat = parse_predicate("valueOf.a === 1 && valueOf.b === 2 || valueOf.c === 3");
        assert!(matches!(flat, Some(Predicate::Or(_, _))));

        let grouped = parse_predicate("valueOf.a === 1 && (valueOf.b === 2 || valueOf.c === 3)");
        assert!(matches!(grouped, Some(Predicate::And(_, _))));
    }

    #[test]
    fn malformed_predicates_fail_silently() {
        assert!(parse_predicate("").is_none());
        assert!(parse_predicate("valueOf.x").is_none());
        assert!(parse_predicate("valueOf.x ==").is_none());
        assert!(parse_predicate("valueOf.x === ").is_none());
        assert!(parse_predicate("valueOf.x === y").is_none());
        assert!(parse_predicate("valueOf.a.b === 1").is_none()); // dotted relational field
        assert!(parse_predicate("valueOf.name.startsWith(alert())").is_none());
        assert!(parse_predicate("valueOf.name.frobnicate('x')").is_none());
        assert!(parse_predicate("valueOf.x === 1 valueOf.y === 2").is_none()); // missing connective
        assert!(parse_predicate("(valueOf.x === 1").is_none()); // unbalanced
    }
}
