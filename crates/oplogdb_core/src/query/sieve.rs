//! The injection sieve for raw predicate strings.
//!
//! Two layers, both of which must pass before a raw predicate may be
//! parsed and evaluated:
//!
//! 1. **Denylist**: any occurrence of a dangerous character (statement
//!    separator, backslash, concatenation/interpolation machinery, braces,
//!    brackets) rejects the predicate outright.
//! 2. **Allow-list sieve**: every substring matching a known-good grammar
//!    production — functional-operator calls, relational comparisons
//!    against a literal, logical connectives, permitted punctuation and
//!    whitespace — is stripped, repeatedly. Any non-empty residue rejects
//!    the predicate.
//!
//! The sieve is a closed allow-list, not a denylist: novel attack syntax
//! fails because nothing strips it, rather than because someone thought to
//! forbid it. Rejection is silent — the query simply has no results — so
//! an attacker cannot distinguish "rejected" from "no data matched".

/// Characters that reject a predicate outright.
const DANGEROUS_CHARACTERS: &[char] = &[';', '\\', '+', '`', '{', '}', '[', ']', '$'];

/// Functional operator names, longest first so the case-insensitive
/// variants win over their prefixes.
const FUNCTIONAL_OPERATORS: &[&str] = &[
    "startsWithCaseInsensitive",
    "endsWithCaseInsensitive",
    "includesCaseInsensitive",
    "startsWith",
    "endsWith",
    "includes",
];

/// Relational operator spellings, longest first.
const RELATIONAL_OPERATORS: &[&str] = &["===", "!==", ">=", "<=", ">", "<"];

const SUBJECT_PREFIX: &str = "valueOf.";

/// Whether a raw predicate passes both defense layers.
pub(crate) fn passes_sieve(query: &str) -> bool {
    if query.chars().any(|c| DANGEROUS_CHARACTERS.contains(&c)) {
        return false;
    }

    let residue = strip_all(query.to_string(), |s| find_functional(s, true));
    let residue = strip_all(residue, |s| find_functional(s, false));
    let residue = strip_all(residue, find_relational);
    let residue = residue.replace("||", "").replace("&&", "");

    residue
        .chars()
        .all(|c| matches!(c, '\'' | '"' | '(' | ')') || c.is_whitespace())
}

/// Removes every span the finder locates, left to right.
fn strip_all(mut s: String, finder: impl Fn(&str) -> Option<(usize, usize)>) -> String {
    while let Some((start, end)) = finder(&s) {
        s.replace_range(start..end, "");
    }
    s
}

/// Locates the first functional-operator call:
/// `valueOf.<field>.<op>(<arg>)`, or with `lowercase_form`,
/// `valueOf.<field>.toLowerCase().<op>(<arg>)`. Field and argument are
/// matched non-greedily, like the grammar they mirror.
fn find_functional(s: &str, lowercase_form: bool) -> Option<(usize, usize)> {
    let mut search_from = 0;
    while let Some(found) = s[search_from..].find(SUBJECT_PREFIX) {
        let start = search_from + found;
        let field_start = start + SUBJECT_PREFIX.len();
        if let Some(end) = functional_tail(s, field_start, lowercase_form) {
            return Some((start, end));
        }
        search_from = field_start;
    }
    None
}

/// Scans for the earliest `.op(...)` tail after at least one field char.
fn functional_tail(s: &str, field_start: usize, lowercase_form: bool) -> Option<usize> {
    for (i, c) in s.char_indices() {
        if i <= field_start || c != '.' {
            continue;
        }
        let mut at = i + 1;
        if lowercase_form {
            if !s[at..].starts_with("toLowerCase().") {
                continue;
            }
            at += "toLowerCase().".len();
        }
        for op in FUNCTIONAL_OPERATORS {
            if !s[at..].starts_with(op) || !s[at + op.len()..].starts_with('(') {
                continue;
            }
            let arg_start = at + op.len() + 1;
            // Non-greedy argument: the earliest close paren, at least one
            // character in.
            if let Some(close) = s[arg_start..].find(')') {
                if close >= 1 {
                    return Some(arg_start + close + 1);
                }
            }
        }
    }
    None
}

/// Locates the first relational comparison:
/// `valueOf.<field> <op> <literal>` where the field contains no dots and
/// the literal is a number, a quoted string, `true`, or `false`.
fn find_relational(s: &str) -> Option<(usize, usize)> {
    let mut search_from = 0;
    while let Some(found) = s[search_from..].find(SUBJECT_PREFIX) {
        let start = search_from + found;
        let field_start = start + SUBJECT_PREFIX.len();
        if let Some(end) = relational_tail(s, field_start) {
            return Some((start, end));
        }
        search_from = field_start;
    }
    None
}

fn relational_tail(s: &str, field_start: usize) -> Option<usize> {
    for (i, c) in s.char_indices() {
        if i < field_start {
            continue;
        }
        // Non-greedy field: try to match the operator before absorbing
        // this character into the field.
        if i > field_start {
            if let Some(end) = operator_and_literal(s, i) {
                return Some(end);
            }
        }
        // The field of a relational comparison cannot contain a dot.
        if c == '.' {
            return None;
        }
    }
    None
}

/// Matches `\s? <op> \s? <literal>` starting at `at`; returns the end.
fn operator_and_literal(s: &str, at: usize) -> Option<usize> {
    let mut positions = vec![at];
    if let Some(c) = s[at..].chars().next() {
        if c.is_whitespace() {
            positions.push(at + c.len_utf8());
        }
    }

    for position in positions {
        for op in RELATIONAL_OPERATORS {
            if !s[position..].starts_with(op) {
                continue;
            }
            let mut value_start = position + op.len();
            if let Some(c) = s[value_start..].chars().next() {
                if c.is_whitespace() {
                    value_start += c.len_utf8();
                }
            }
            if let Some(end) = literal_end(s, value_start) {
                return Some(end);
            }
        }
    }
    None
}

/// Matches a relational literal at `at`: `[0-9._]+` (with one optional
/// trailing whitespace), a quoted string, `true`, or `false`.
fn literal_end(s: &str, at: usize) -> Option<usize> {
    let rest = &s[at..];
    let first = rest.chars().next()?;

    if first.is_ascii_digit() || first == '.' || first == '_' {
        let digits = rest
            .chars()
            .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | '_'))
            .count();
        let mut end = at + digits;
        if let Some(c) = s[end..].chars().next() {
            if c.is_whitespace() {
                end += c.len_utf8();
            }
        }
        return Some(end);
    }

    if first == '\'' || first == '"' {
        // Non-greedy: earliest matching close quote, at least one char in.
        let close = rest[1..].find(first)?;
        if close >= 1 {
            return Some(at + 1 + close + 1);
        }
        return None;
    }

    if rest.starts_with("true") {
        return Some(at + 4);
    }
    if rest.starts_with("false") {
        return Some(at + 5);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_predicates_pass() {
        assert!(passes_sieve("valueOf.year > 2004"));
        assert!(passes_sieve("valueOf.year >= 2005 && valueOf.own === true"));
        assert!(passes_sieve("valueOf.make === 'Subaru' || valueOf.make === 'Lexus'"));
        assert!(passes_sieve("valueOf.name.startsWith('A')"));
        assert!(passes_sieve("valueOf.name.toLowerCase().startsWith('a')"));
        assert!(passes_sieve("valueOf.tags.includes('sporty')"));
        assert!(passes_sieve(
            "valueOf.age >= 21 && (valueOf.name.startsWith('A') || valueOf.name.endsWith('z'))"
        ));
        assert!(passes_sieve("valueOf.price === 1_000.5"));
    }

    #[test]
    fn dangerous_characters_reject_outright() {
        assert!(!passes_sieve("valueOf.x === 1; launch()"));
        assert!(!passes_sieve("valueOf.x === `1`"));
        assert!(!passes_sieve("valueOf.x === '1' + '2'"));
        assert!(!passes_sieve("valueOf.x === {}"));
        assert!(!passes_sieve("valueOf.tags[0] === 'a'"));
        assert!(!passes_sieve("valueOf.x === '\\''"));
        assert!(!passes_sieve("${payload}"));
    }

    #[test]
    fn residue_rejects() {
        assert!(!passes_sieve("launch_missiles()"));
        assert!(!passes_sieve("valueOf.x === 1 && launch()"));
        assert!(!passes_sieve("valueOf.x == 1")); // loose equality is not in the grammar
        assert!(!passes_sieve("valueOf.x === y")); // bare identifier literal
        assert!(!passes_sieve("valueOf.x"));
        assert!(!passes_sieve("true"));
    }

    #[test]
    fn nested_call_payloads_leave_residue() {
        // A call smuggled where a literal belongs survives the stripping
        // pass and rejects the predicate.
        assert!(!passes_sieve("valueOf.x === globalThis.alert(1)"));
    }

    #[test]
    fn non_greedy_argument_defers_to_the_parser() {
        // The non-greedy argument match strips up to the first close
        // paren, leaving only an allowed `)` — so this passes the sieve
        // and is stopped by the literal-only argument rule in the parser.
        assert!(passes_sieve("valueOf.name.startsWith(alert())"));
    }

    #[test]
    fn disguised_subjects_leave_residue() {
        assert!(!passes_sieve("valueOf.x === 1 valueOf2.y === 2 &&"));
        assert!(!passes_sieve("xvalueOf.y === 1 && fetch('x')"));
    }

    #[test]
    fn string_literals_may_contain_operator_text() {
        assert!(passes_sieve("valueOf.note === 'a && b || c'"));
        assert!(passes_sieve("valueOf.note === \"don't\""));
    }
}
