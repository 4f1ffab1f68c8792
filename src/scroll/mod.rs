//! Scroll cursor management
//!
//! Turns the backend's scroll primitive into two access patterns:
//!
//! - [`ScrollStream`]: bulk streaming, auto-advancing until exhausted
//! - [`PagerStore`]: client-driven paging with strict sequencing and idle expiry
//!
//! Every backend round trip is blocking and is never retried here. A
//! release failure is logged only; the backend's keep-alive reclaims the
//! scroll eventually.

pub mod backend;
pub mod cursor;
mod errors;
pub mod expiry;
pub mod pager;
pub mod stream;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{SearchBackend, SearchHit, SearchRequest, SearchResponse};
pub use cursor::{CursorState, ScrollContext, ScrollCursor};
pub use errors::{BackendError, BackendResult, ScrollError, ScrollResult};
pub use expiry::{ExpiryHandle, ExpiryScheduler};
pub use pager::{Page, PageRequest, PageStart, PagerStore};
pub use stream::ScrollStream;
