//! Scroll cursor
//!
//! A cursor owns one server-side scroll. It tracks the current batch, the
//! hit budget and every scroll id the backend handed out, and releases all
//! of those ids exactly once when it is closed or dropped.
//!
//! Lifecycle: Active -> Exhausted -> Closed. A cursor whose first response
//! already fills the budget starts out Exhausted.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

use super::backend::{SearchBackend, SearchHit, SearchRequest, SearchResponse};
use super::errors::ScrollResult;

/// Backend handle and settings shared by every cursor of a source
#[derive(Clone)]
pub struct ScrollContext {
    pub backend: Arc<dyn SearchBackend>,
    pub keep_alive: Duration,
    pub metrics: Arc<MetricsRegistry>,
}

impl ScrollContext {
    pub fn new(backend: Arc<dyn SearchBackend>, keep_alive: Duration) -> Self {
        Self {
            backend,
            keep_alive,
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Run a search, counting it and logging failures
    pub fn search(&self, index: &str, request: &SearchRequest) -> ScrollResult<SearchResponse> {
        self.metrics.increment_searches();
        match self.backend.search(index, request) {
            Ok(response) => {
                let total = response.total.to_string();
                let returned = response.hits.len().to_string();
                log_event_with_fields(
                    Event::SearchExecuted,
                    &[
                        ("index", index),
                        ("total", total.as_str()),
                        ("returned", returned.as_str()),
                    ],
                );
                Ok(response)
            }
            Err(e) => {
                let message = e.to_string();
                log_event_with_fields(
                    Event::BackendFailed,
                    &[("operation", "search"), ("error", message.as_str())],
                );
                Err(e.into())
            }
        }
    }
}

/// Cursor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// More batches may follow
    Active,
    /// The last batch has been fetched
    Exhausted,
    /// Scroll ids released
    Closed,
}

pub struct ScrollCursor {
    ctx: ScrollContext,
    batch: VecDeque<SearchHit>,
    batch_size: usize,
    /// Hits taken into batches so far
    taken: usize,
    budget: usize,
    next_id: Option<String>,
    ids: BTreeSet<String>,
    state: CursorState,
}

impl ScrollCursor {
    /// Run the opening search and take its first batch
    ///
    /// The hit budget is the smaller of `max_hits` and the total the
    /// backend reports.
    pub fn open(
        ctx: ScrollContext,
        index: &str,
        request: &SearchRequest,
        max_hits: usize,
    ) -> ScrollResult<Self> {
        let response = ctx.search(index, request)?;
        let budget = max_hits.min(usize::try_from(response.total).unwrap_or(usize::MAX));
        Ok(Self::from_response(ctx, response, budget))
    }

    /// Start a cursor from an already executed opening search
    pub fn from_response(ctx: ScrollContext, response: SearchResponse, budget: usize) -> Self {
        let mut cursor = Self {
            ctx,
            batch: VecDeque::new(),
            batch_size: 0,
            taken: 0,
            budget,
            next_id: None,
            ids: BTreeSet::new(),
            state: CursorState::Active,
        };
        cursor.process_response(response);
        cursor
    }

    fn process_response(&mut self, response: SearchResponse) {
        if let Some(id) = response.scroll_id {
            self.ids.insert(id.clone());
            self.next_id = Some(id);
        }

        let remaining = self.budget.saturating_sub(self.taken);
        let mut hits = response.hits;
        if hits.len() >= remaining {
            hits.truncate(remaining);
            self.state = CursorState::Exhausted;
        }
        if hits.is_empty() {
            self.state = CursorState::Exhausted;
        }

        self.taken += hits.len();
        self.batch_size = hits.len();
        self.batch = hits.into();
    }

    /// Fetch the next batch, replacing whatever is left of the current one
    ///
    /// Returns false without a round trip when the cursor is exhausted.
    pub fn advance(&mut self) -> ScrollResult<bool> {
        if self.state != CursorState::Active {
            return Ok(false);
        }
        let Some(scroll_id) = self.next_id.clone() else {
            self.state = CursorState::Exhausted;
            self.batch.clear();
            self.batch_size = 0;
            return Ok(false);
        };

        self.ctx.metrics.increment_continuations();
        match self.ctx.backend.scroll(&scroll_id, self.ctx.keep_alive) {
            Ok(response) => {
                self.process_response(response);
                let taken = self.taken.to_string();
                log_event_with_fields(
                    Event::ScrollAdvanced,
                    &[("scroll_id", scroll_id.as_str()), ("taken", taken.as_str())],
                );
                Ok(true)
            }
            Err(e) => {
                let message = e.to_string();
                log_event_with_fields(
                    Event::BackendFailed,
                    &[("operation", "scroll"), ("error", message.as_str())],
                );
                Err(e.into())
            }
        }
    }

    /// Next hit of the current batch
    pub fn next_hit(&mut self) -> Option<SearchHit> {
        self.batch.pop_front()
    }

    /// Number of hits the current batch started with
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Hits left in the current batch
    pub fn remaining_in_batch(&self) -> usize {
        self.batch.len()
    }

    /// True once the last batch has been fetched
    pub fn is_final(&self) -> bool {
        self.state != CursorState::Active
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Every scroll id seen so far
    pub fn scroll_ids(&self) -> &BTreeSet<String> {
        &self.ids
    }

    /// Release every scroll id; later calls do nothing
    ///
    /// A failed release is logged and counted, never surfaced.
    pub fn release(&mut self) {
        if self.state == CursorState::Closed {
            return;
        }
        self.state = CursorState::Closed;
        self.batch.clear();
        if self.ids.is_empty() {
            return;
        }

        let count = self.ids.len().to_string();
        match self.ctx.backend.clear_scroll(&self.ids) {
            Ok(()) => {
                self.ctx.metrics.increment_releases();
                log_event_with_fields(Event::ScrollReleased, &[("count", count.as_str())]);
            }
            Err(e) => {
                self.ctx.metrics.increment_release_failures();
                let message = e.to_string();
                log_event_with_fields(
                    Event::ScrollReleaseFailed,
                    &[("count", count.as_str()), ("error", message.as_str())],
                );
            }
        }
    }
}

impl Drop for ScrollCursor {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ScrollCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollCursor")
            .field("state", &self.state)
            .field("taken", &self.taken)
            .field("budget", &self.budget)
            .field("ids", &self.ids)
            .finish()
    }
}
