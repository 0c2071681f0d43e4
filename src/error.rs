//! Structured error types for the harness.
//!
//! Every variant is fatal to the single test case that produced it. Matcher
//! outcomes (ambiguous or mismatched items) are not errors; they travel as
//! [`Verdict`](crate::expect::Verdict) failures instead.

use std::fmt;
use thiserror::Error;

use crate::service::ServiceError;

/// Where in the raw fixture text a problem was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorSite {
    /// Not attributable to a single token (e.g. a lookup by name).
    Fixture,
    /// 1-based line and column in the raw fixture text.
    At {
        file: String,
        line: u32,
        column: u32,
    },
}

impl ErrorSite {
    pub fn at(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self::At {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for ErrorSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSite::Fixture => f.write_str("fixture"),
            ErrorSite::At { file, line, column } => write!(f, "{} ({},{})", file, line, column),
        }
    }
}

/// Structured error type for harness operations.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("{site}: {message}")]
    MalformedFixture { site: ErrorSite, message: String },

    #[error("Duplicate marker name: \"{name}\" at {first} and {second}")]
    DuplicateMarker {
        name: String,
        first: ErrorSite,
        second: ErrorSite,
    },

    #[error("Service fault during '{method}': {source}")]
    ServiceFault {
        method: String,
        #[source]
        source: ServiceError,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl HarnessError {
    /// Log the error at debug level.
    pub fn log_debug(&self) {
        tracing::debug!("Harness error: {}", self);
    }

    /// Log the error at warn level.
    pub fn log_warn(&self) {
        tracing::warn!("Harness error: {}", self);
    }

    pub fn malformed(site: ErrorSite, message: impl Into<String>) -> Self {
        Self::MalformedFixture {
            site,
            message: message.into(),
        }
    }

    /// A marker or range was referenced by a name the fixture never declared.
    pub fn unknown_marker(name: &str) -> Self {
        Self::malformed(ErrorSite::Fixture, format!("Marker '{}' not found", name))
    }

    pub fn unknown_range(name: &str) -> Self {
        Self::malformed(ErrorSite::Fixture, format!("Range '{}' not found", name))
    }

    pub fn service_fault(method: &str, source: ServiceError) -> Self {
        Self::ServiceFault {
            method: method.to_string(),
            source,
        }
    }

    pub fn is_malformed_fixture(&self) -> bool {
        matches!(self, Self::MalformedFixture { .. })
    }

    pub fn is_duplicate_marker(&self) -> bool {
        matches!(self, Self::DuplicateMarker { .. })
    }

    pub fn is_service_fault(&self) -> bool {
        matches!(self, Self::ServiceFault { .. })
    }
}
