//! Scroll and paging errors
//!
//! Error codes:
//! - ESGEO_BACKEND_IO (surfaced, caller owns retry)
//! - ESGEO_BACKEND_RESPONSE (surfaced, caller owns retry)
//! - ESGEO_PAGER_INCONSISTENT (FATAL) page request out of sequence
//! - ESGEO_CURSOR_NOT_FOUND (FATAL) pager missing or expired
//! - ESGEO_INTERNAL (FATAL)

use thiserror::Error;

/// Result type for backend round trips
pub type BackendResult<T> = Result<T, BackendError>;

/// Result type for cursor and pager operations
pub type ScrollResult<T> = Result<T, ScrollError>;

// =============================================================================
// Backend Errors
// =============================================================================

/// Failures of a search, continuation or release round trip
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// Transport failure or non-success status
    #[error("Backend request failed: {0}")]
    Io(String),

    /// The backend answered with a body this crate cannot read
    #[error("Malformed backend response: {0}")]
    Malformed(String),
}

impl BackendError {
    pub fn code(&self) -> &'static str {
        match self {
            BackendError::Io(_) => "ESGEO_BACKEND_IO",
            BackendError::Malformed(_) => "ESGEO_BACKEND_RESPONSE",
        }
    }
}

// =============================================================================
// Scroll Errors
// =============================================================================

/// Cursor manager errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScrollError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Page request at the wrong start index
    #[error("Pager is at {expected} not {requested}")]
    IndexMismatch { expected: usize, requested: usize },

    /// Page request with a different page size than the bound one
    #[error("Page size is {expected} not {requested}")]
    SizeMismatch { expected: usize, requested: usize },

    /// The previous page of this session has not been closed
    #[error("Page at {start} is still open")]
    PageInProgress { start: usize },

    /// No pager bound for the session, or it expired
    #[error("No cached pager for session '{session}'")]
    CursorNotFound { session: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScrollError {
    pub fn code(&self) -> &'static str {
        match self {
            ScrollError::Backend(e) => e.code(),
            ScrollError::IndexMismatch { .. }
            | ScrollError::SizeMismatch { .. }
            | ScrollError::PageInProgress { .. } => "ESGEO_PAGER_INCONSISTENT",
            ScrollError::CursorNotFound { .. } => "ESGEO_CURSOR_NOT_FOUND",
            ScrollError::Internal(_) => "ESGEO_INTERNAL",
        }
    }

    /// Backend failures may succeed on a caller retry; the rest never will
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ScrollError::Backend(_))
    }

    /// True for sequencing errors on page requests
    pub fn is_inconsistent(&self) -> bool {
        self.code() == "ESGEO_PAGER_INCONSISTENT"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let err = ScrollError::IndexMismatch {
            expected: 20,
            requested: 40,
        };
        assert_eq!(err.code(), "ESGEO_PAGER_INCONSISTENT");
        assert!(err.is_fatal());
        assert!(err.is_inconsistent());
        assert_eq!(err.to_string(), "Pager is at 20 not 40");

        let err = ScrollError::CursorNotFound {
            session: "s1".into(),
        };
        assert_eq!(err.code(), "ESGEO_CURSOR_NOT_FOUND");
        assert!(!err.is_inconsistent());
    }

    #[test]
    fn test_backend_error_is_not_fatal() {
        let err: ScrollError = BackendError::Io("connection refused".into()).into();
        assert_eq!(err.code(), "ESGEO_BACKEND_IO");
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("connection refused"));
    }
}
