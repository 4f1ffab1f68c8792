//! Filter compilation errors
//!
//! Error codes:
//! - ESGEO_FILTER_CONFIG (FATAL) malformed native override text
//!
//! Predicates the backend cannot express are not errors. They degrade to
//! match-all and are reported as [`Unsupported`] notes.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Result type for filter compilation
pub type FilterResult<T> = Result<T, FilterError>;

/// Errors that abort a compilation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// Native query or aggregation text could not be parsed
    #[error("Invalid native {part}: {reason}")]
    Configuration { part: &'static str, reason: String },
}

impl FilterError {
    pub fn configuration(part: &'static str, reason: impl Into<String>) -> Self {
        FilterError::Configuration {
            part,
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            FilterError::Configuration { .. } => "ESGEO_FILTER_CONFIG",
        }
    }

    pub fn is_fatal(&self) -> bool {
        true
    }
}

/// A predicate subtree that compiled to match-all
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unsupported {
    /// Predicate kind, e.g. `touches` or `meets`
    pub kind: String,
    pub reason: String,
}

impl Unsupported {
    pub fn new(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)
    }
}
