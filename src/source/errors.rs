//! Feature source errors

use thiserror::Error;

use crate::filter::FilterError;
use crate::scroll::ScrollError;

/// Result type for feature source operations
pub type SourceResult<T> = Result<T, SourceError>;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Scroll(#[from] ScrollError),

    /// A paged read on a source built without a pager store
    #[error("Paging requires a pager store")]
    PagingUnavailable,
}

impl SourceError {
    pub fn code(&self) -> &'static str {
        match self {
            SourceError::Filter(e) => e.code(),
            SourceError::Scroll(e) => e.code(),
            SourceError::PagingUnavailable => "ESGEO_PAGING_UNAVAILABLE",
        }
    }

    pub fn is_fatal(&self) -> bool {
        match self {
            SourceError::Filter(e) => e.is_fatal(),
            SourceError::Scroll(e) => e.is_fatal(),
            SourceError::PagingUnavailable => true,
        }
    }
}
