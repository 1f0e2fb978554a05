//! Operator tables shared by the fluent builder and the raw parser.

/// Relational comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Comparison {
    /// Strict equality.
    Eq,
    /// Strict inequality.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
}

/// Functional string/membership operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StringOp {
    StartsWith,
    EndsWith,
    Includes,
}

/// What an operator name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OperatorKind {
    Relational(Comparison),
    Functional {
        op: StringOp,
        case_insensitive: bool,
    },
}

/// Every operator name accepted by dynamic dispatch, in documentation
/// order. The equality family has aliases on purpose.
pub(crate) const OPERATOR_NAMES: &[&str] = &[
    "is",
    "is_equal_to",
    "equals",
    "is_not",
    "does_not_equal",
    "is_greater_than",
    "is_greater_than_or_equal_to",
    "is_less_than",
    "is_less_than_or_equal_to",
    "starts_with",
    "ends_with",
    "includes",
    "starts_with_case_insensitive",
    "ends_with_case_insensitive",
    "includes_case_insensitive",
];

/// Resolves an operator name to its kind.
pub(crate) fn lookup(name: &str) -> Option<OperatorKind> {
    use Comparison::*;
    use OperatorKind::*;
    use StringOp::*;

    Some(match name {
        "is" | "is_equal_to" | "equals" => Relational(Eq),
        "is_not" | "does_not_equal" => Relational(Ne),
        "is_greater_than" => Relational(Gt),
        "is_greater_than_or_equal_to" => Relational(Ge),
        "is_less_than" => Relational(Lt),
        "is_less_than_or_equal_to" => Relational(Le),
        "starts_with" => Functional {
            op: StartsWith,
            case_insensitive: false,
        },
        "ends_with" => Functional {
            op: EndsWith,
            case_insensitive: false,
        },
        "includes" => Functional {
            op: Includes,
            case_insensitive: false,
        },
        "starts_with_case_insensitive" => Functional {
            op: StartsWith,
            case_insensitive: true,
        },
        "ends_with_case_insensitive" => Functional {
            op: EndsWith,
            case_insensitive: true,
        },
        "includes_case_insensitive" => Functional {
            op: Includes,
            case_insensitive: true,
        },
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_name_resolves() {
        for name in OPERATOR_NAMES {
            assert!(lookup(name).is_some(), "{name} did not resolve");
        }
    }

    #[test]
    fn equality_aliases_agree() {
        assert_eq!(lookup("is"), lookup("equals"));
        assert_eq!(lookup("is"), lookup("is_equal_to"));
        assert_eq!(lookup("is_not"), lookup("does_not_equal"));
    }

    #[test]
    fn unknown_names_do_not_resolve() {
        assert!(lookup("isGreaterThan").is_none()); // raw-string spelling
        assert!(lookup("matches").is_none());
        assert!(lookup("").is_none());
    }
}
