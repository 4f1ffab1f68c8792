//! esgeo - predicate compilation and scroll paging for geospatial layers
//! served from a document search backend
//!
//! - `filter`: predicate trees compiled to native queries, with in-memory
//!   post-filtering for what does not compile
//! - `geo`: spatial clauses, geography sanitization, grid precision
//! - `scroll`: scroll cursors, streaming and session paging
//! - `source`: per-layer reads tying the above together

pub mod cli;
pub mod config;
pub mod filter;
pub mod geo;
pub mod observability;
pub mod scroll;
pub mod source;
