use serde_json::Value;
use std::fmt;
use tower_lsp::lsp_types::Position;

/// Where a query was issued, for failure messages.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryLocation {
    Marker { name: String, path: String },
    Position { path: String, position: Position },
}

impl fmt::Display for QueryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryLocation::Marker { name, path } => write!(f, "At marker '{}' in {}", name, path),
            QueryLocation::Position { path, position } => write!(
                f,
                "At position (Ln {}, Col {}) in {}",
                position.line + 1,
                position.character + 1,
                path
            ),
        }
    }
}

/// What went wrong. Values are JSON so they print the way the wire showed them.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    IncompleteMismatch {
        expected: bool,
        actual: bool,
    },
    /// No completions were expected but the service returned some.
    UnexpectedList {
        actual: Value,
    },
    /// Completions were expected but the service returned none.
    MissingList,
    ItemDefaultsMismatch {
        field: &'static str,
        expected: Value,
        actual: Value,
    },
    MissingItem {
        label: String,
        actual_labels: Vec<String>,
    },
    UnexpectedItems {
        labels: Vec<String>,
    },
    ExcludedItemPresent {
        label: String,
    },
    AmbiguousMatch {
        label: String,
        candidates: Vec<Value>,
    },
    MismatchedField {
        label: String,
        field: &'static str,
        expected: Value,
        actual: Value,
    },
    OrderMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },
    HoverMismatch {
        field: &'static str,
        expected: String,
        actual: String,
    },
    MissingHover,
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::IncompleteMismatch { expected, actual } => write!(
                f,
                "IsIncomplete mismatch: expected {}, got {}",
                expected, actual
            ),
            FailureKind::UnexpectedList { actual } => write!(
                f,
                "Expected no completions but got:\n{}",
                pretty(actual)
            ),
            FailureKind::MissingList => f.write_str("Expected completion list but got nil."),
            FailureKind::ItemDefaultsMismatch {
                field,
                expected,
                actual,
            } => write!(
                f,
                "ItemDefaults mismatch: {}\nexpected: {}\nactual: {}",
                field,
                pretty(expected),
                pretty(actual)
            ),
            FailureKind::MissingItem {
                label,
                actual_labels,
            } => write!(
                f,
                "Label '{}' not found in actual items. Actual items: {:?}",
                label, actual_labels
            ),
            FailureKind::UnexpectedItems { labels } => write!(
                f,
                "Additional completions found but not expected: {:?}",
                labels
            ),
            FailureKind::ExcludedItemPresent { label } => write!(
                f,
                "Label '{}' should not be in actual items but was found",
                label
            ),
            FailureKind::AmbiguousMatch { label, candidates } => write!(
                f,
                "Expected item '{}' matches {} actual items:\n{}",
                label,
                candidates.len(),
                pretty(&Value::Array(candidates.clone()))
            ),
            FailureKind::MismatchedField {
                label,
                field,
                expected,
                actual,
            } => write!(
                f,
                "Completion item mismatch for label '{}': {} mismatch\nexpected: {}\nactual: {}",
                label,
                field,
                pretty(expected),
                pretty(actual)
            ),
            FailureKind::OrderMismatch { expected, actual } => write!(
                f,
                "Labels mismatch\nexpected: {:?}\nactual: {:?}",
                expected, actual
            ),
            FailureKind::HoverMismatch {
                field,
                expected,
                actual,
            } => write!(
                f,
                "Quick info {} mismatch\nexpected: {:?}\nactual: {:?}",
                field, expected, actual
            ),
            FailureKind::MissingHover => f.write_str("Expected quick info but got nil."),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub location: Option<QueryLocation>,
    pub kind: FailureKind,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}: {}", location, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Pass,
    Fail(Box<Failure>),
}

impl Verdict {
    pub fn fail(kind: FailureKind) -> Self {
        Verdict::Fail(Box::new(Failure {
            location: None,
            kind,
        }))
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Verdict::Pass => None,
            Verdict::Fail(failure) => Some(failure),
        }
    }

    pub fn kind(&self) -> Option<&FailureKind> {
        self.failure().map(|failure| &failure.kind)
    }

    /// Attach where the query ran. An existing location is kept.
    pub fn at(self, location: QueryLocation) -> Self {
        match self {
            Verdict::Pass => Verdict::Pass,
            Verdict::Fail(mut failure) => {
                failure.location.get_or_insert(location);
                Verdict::Fail(failure)
            }
        }
    }

    /// Panic with the failure message unless the verdict passed.
    #[track_caller]
    pub fn assert_pass(&self) {
        if let Verdict::Fail(failure) = self {
            panic!("{}", failure);
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("pass"),
            Verdict::Fail(failure) => failure.fmt(f),
        }
    }
}
