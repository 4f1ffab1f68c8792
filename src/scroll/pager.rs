//! # Session Pagers
//!
//! Maps a session's sequential page requests onto one scroll cursor.
//!
//! ## Invariants
//! - At most one binding per session
//! - A page request must carry exactly the expected next index and the
//!   bound page size; anything else is rejected, never resynced
//! - The expected next index only advances by the page size
//! - An idle binding expires after the keep-alive window and releases its
//!   cursor; retrieval and expiry race through the timer's claim flag, and
//!   the cursor is owned by exactly one side

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use uuid::Uuid;

use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

use super::backend::SearchHit;
use super::cursor::ScrollCursor;
use super::errors::{ScrollError, ScrollResult};
use super::expiry::{ExpiryHandle, ExpiryScheduler};

/// One client page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub session: String,
    /// Identifies the query; a new query starting at 0 replaces the binding
    pub query_key: String,
    pub start_index: usize,
    pub page_size: usize,
}

impl PageRequest {
    pub fn new(
        session: impl Into<String>,
        query_key: impl Into<String>,
        start_index: usize,
        page_size: usize,
    ) -> Self {
        Self {
            session: session.into(),
            query_key: query_key.into(),
            start_index,
            page_size,
        }
    }
}

/// A cached cursor waiting for the next page request
struct Binding {
    pager_id: Uuid,
    query_key: String,
    next_index: usize,
    page_size: usize,
    cursor: ScrollCursor,
    timer: ExpiryHandle,
}

enum Slot {
    Live(Binding),
    /// A page is out with the client
    Busy {
        pager_id: Uuid,
        query_key: String,
        start_index: usize,
    },
    Expired,
}

/// Outcome of [`PagerStore::begin`]
#[derive(Debug)]
pub enum PageStart {
    /// No cursor to resume; run the opening search and call [`PagerStore::start`]
    Fresh,
    Resume(Page),
}

/// Session id to pager state, with idle expiry
pub struct PagerStore {
    slots: Mutex<HashMap<String, Slot>>,
    scheduler: Arc<ExpiryScheduler>,
    ttl: Duration,
    metrics: Arc<MetricsRegistry>,
}

impl PagerStore {
    pub fn new(scheduler: Arc<ExpiryScheduler>, ttl: Duration) -> Arc<Self> {
        Self::with_metrics(scheduler, ttl, Arc::new(MetricsRegistry::new()))
    }

    pub fn with_metrics(
        scheduler: Arc<ExpiryScheduler>,
        ttl: Duration,
        metrics: Arc<MetricsRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            slots: Mutex::new(HashMap::new()),
            scheduler,
            ttl,
            metrics,
        })
    }

    fn lock(&self) -> ScrollResult<MutexGuard<'_, HashMap<String, Slot>>> {
        self.slots
            .lock()
            .map_err(|_| ScrollError::Internal("pager store lock poisoned".into()))
    }

    /// Validate a page request against the session's binding
    pub fn begin(self: &Arc<Self>, request: &PageRequest) -> ScrollResult<PageStart> {
        let mut evicted = None;
        let result = self.begin_locked(request, &mut evicted);
        // Release outside the lock
        drop(evicted);

        let start = request.start_index.to_string();
        match &result {
            Ok(PageStart::Resume(_)) => log_event_with_fields(
                Event::PagerRetrieved,
                &[("session", request.session.as_str()), ("start", start.as_str())],
            ),
            Ok(PageStart::Fresh) => {}
            Err(e) => {
                self.metrics.increment_pager_rejections();
                let message = e.to_string();
                log_event_with_fields(
                    Event::PagerRejected,
                    &[
                        ("session", request.session.as_str()),
                        ("start", start.as_str()),
                        ("error", message.as_str()),
                    ],
                );
            }
        }
        result
    }

    fn begin_locked(
        self: &Arc<Self>,
        request: &PageRequest,
        evicted: &mut Option<Binding>,
    ) -> ScrollResult<PageStart> {
        let mut slots = self.lock()?;
        let session = request.session.clone();
        let requested = request.start_index;

        let binding = match slots.remove(&session) {
            None if requested == 0 => return Ok(PageStart::Fresh),
            None => {
                return Err(ScrollError::IndexMismatch {
                    expected: 0,
                    requested,
                })
            }
            Some(Slot::Expired) if requested == 0 => return Ok(PageStart::Fresh),
            Some(Slot::Expired) => {
                slots.insert(session.clone(), Slot::Expired);
                return Err(ScrollError::CursorNotFound { session });
            }
            Some(Slot::Busy {
                pager_id,
                query_key,
                start_index,
            }) => {
                // The open page drops its cursor when it finds itself superseded
                if requested == 0 && query_key != request.query_key {
                    return Ok(PageStart::Fresh);
                }
                slots.insert(
                    session,
                    Slot::Busy {
                        pager_id,
                        query_key,
                        start_index,
                    },
                );
                return Err(ScrollError::PageInProgress { start: start_index });
            }
            Some(Slot::Live(binding)) => binding,
        };

        if requested == 0 && binding.query_key != request.query_key {
            binding.timer.cancel();
            *evicted = Some(binding);
            return Ok(PageStart::Fresh);
        }

        let rejection = if binding.query_key != request.query_key {
            Some(ScrollError::IndexMismatch {
                expected: 0,
                requested,
            })
        } else if requested != binding.next_index {
            Some(ScrollError::IndexMismatch {
                expected: binding.next_index,
                requested,
            })
        } else if request.page_size != binding.page_size {
            Some(ScrollError::SizeMismatch {
                expected: binding.page_size,
                requested: request.page_size,
            })
        } else {
            None
        };
        if let Some(err) = rejection {
            slots.insert(session, Slot::Live(binding));
            return Err(err);
        }

        if !binding.timer.cancel() {
            // Expiry claimed the binding first
            slots.insert(session.clone(), Slot::Expired);
            self.metrics.increment_pager_expiries();
            *evicted = Some(binding);
            return Err(ScrollError::CursorNotFound { session });
        }

        slots.insert(
            session.clone(),
            Slot::Busy {
                pager_id: binding.pager_id,
                query_key: binding.query_key.clone(),
                start_index: requested,
            },
        );
        Ok(PageStart::Resume(Page {
            store: Arc::clone(self),
            session,
            pager_id: binding.pager_id,
            query_key: binding.query_key,
            start_index: requested,
            page_size: binding.page_size,
            cursor: Some(binding.cursor),
        }))
    }

    /// Bind a freshly opened cursor to the session as its first page
    pub fn start(self: &Arc<Self>, request: &PageRequest, cursor: ScrollCursor) -> ScrollResult<Page> {
        let pager_id = Uuid::new_v4();
        let previous = {
            let mut slots = self.lock()?;
            slots.insert(
                request.session.clone(),
                Slot::Busy {
                    pager_id,
                    query_key: request.query_key.clone(),
                    start_index: request.start_index,
                },
            )
        };
        if let Some(Slot::Live(binding)) = previous {
            binding.timer.cancel();
            drop(binding);
        }

        Ok(Page {
            store: Arc::clone(self),
            session: request.session.clone(),
            pager_id,
            query_key: request.query_key.clone(),
            start_index: request.start_index,
            page_size: request.page_size,
            cursor: Some(cursor),
        })
    }

    /// Cache an advanced cursor for the page after `page`
    fn cache(self: &Arc<Self>, page: &Page, cursor: ScrollCursor) -> ScrollResult<()> {
        let next_index = page.start_index + page.page_size;
        let superseded = {
            let mut slots = self.lock()?;
            let ours = matches!(
                slots.get(&page.session),
                Some(Slot::Busy { pager_id, .. }) if *pager_id == page.pager_id
            );
            if ours {
                let store = Arc::downgrade(self);
                let session = page.session.clone();
                let pager_id = page.pager_id;
                let timer = self
                    .scheduler
                    .schedule(self.ttl, move || expire(store, &session, pager_id));
                slots.insert(
                    page.session.clone(),
                    Slot::Live(Binding {
                        pager_id: page.pager_id,
                        query_key: page.query_key.clone(),
                        next_index,
                        page_size: page.page_size,
                        cursor,
                        timer,
                    }),
                );
                None
            } else {
                Some(cursor)
            }
        };

        if superseded.is_none() {
            let next = next_index.to_string();
            log_event_with_fields(
                Event::PagerCached,
                &[("session", page.session.as_str()), ("next", next.as_str())],
            );
        }
        Ok(())
    }

    /// Drop the session's slot if it still belongs to `pager_id`
    fn finish(&self, session: &str, pager_id: Uuid) {
        if let Ok(mut slots) = self.slots.lock() {
            let ours = matches!(
                slots.get(session),
                Some(Slot::Busy { pager_id: id, .. }) if *id == pager_id
            );
            if ours {
                slots.remove(session);
            }
        }
    }

    /// Force-close a live binding whose timer fired
    fn expire_binding(&self, session: &str, pager_id: Uuid) {
        let expired = match self.slots.lock() {
            Ok(mut slots) => match slots.remove(session) {
                Some(Slot::Live(binding)) if binding.pager_id == pager_id => {
                    slots.insert(session.to_string(), Slot::Expired);
                    Some(binding)
                }
                Some(other) => {
                    slots.insert(session.to_string(), other);
                    None
                }
                None => None,
            },
            Err(_) => None,
        };

        if let Some(binding) = expired {
            self.metrics.increment_pager_expiries();
            let next = binding.next_index.to_string();
            log_event_with_fields(
                Event::PagerExpired,
                &[("session", session), ("next", next.as_str())],
            );
            drop(binding);
        }
    }

    /// Close whatever pager the session holds
    ///
    /// Returns true if a cached cursor was released.
    pub fn release_session(&self, session: &str) -> ScrollResult<bool> {
        let removed = self.lock()?.remove(session);
        match removed {
            Some(Slot::Live(binding)) => {
                binding.timer.cancel();
                drop(binding);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Index the session's next page request must carry, if a cursor is cached
    pub fn expected_index(&self, session: &str) -> Option<usize> {
        let slots = self.slots.lock().ok()?;
        match slots.get(session) {
            Some(Slot::Live(binding)) => Some(binding.next_index),
            _ => None,
        }
    }

    /// Sessions with a cached cursor
    pub fn live_count(&self) -> usize {
        self.slots
            .lock()
            .map(|slots| {
                slots
                    .values()
                    .filter(|slot| matches!(slot, Slot::Live(_)))
                    .count()
            })
            .unwrap_or(0)
    }
}

fn expire(store: Weak<PagerStore>, session: &str, pager_id: Uuid) {
    if let Some(store) = store.upgrade() {
        store.expire_binding(session, pager_id);
    }
}

/// One page handed to the client
///
/// Hits come from the cursor's current batch only. [`Page::close`] either
/// caches the advanced cursor for the next request or, on the final page,
/// releases it. Dropping an unclosed page releases its cursor.
pub struct Page {
    store: Arc<PagerStore>,
    session: String,
    pager_id: Uuid,
    query_key: String,
    start_index: usize,
    page_size: usize,
    cursor: Option<ScrollCursor>,
}

impl Page {
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Hits in this page's batch
    pub fn len(&self) -> usize {
        self.cursor.as_ref().map(ScrollCursor::batch_size).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_final(&self) -> bool {
        self.cursor.as_ref().map(ScrollCursor::is_final).unwrap_or(true)
    }

    pub fn next_hit(&mut self) -> Option<SearchHit> {
        self.cursor.as_mut().and_then(ScrollCursor::next_hit)
    }

    /// Finish the page
    ///
    /// A non-final page advances its cursor and caches it under the next
    /// index. The final page releases the cursor with no further advance.
    pub fn close(mut self) -> ScrollResult<()> {
        let Some(mut cursor) = self.cursor.take() else {
            return Ok(());
        };

        if cursor.is_final() {
            self.store.finish(&self.session, self.pager_id);
            drop(cursor);
            let start = self.start_index.to_string();
            log_event_with_fields(
                Event::PagerFinished,
                &[("session", self.session.as_str()), ("start", start.as_str())],
            );
            return Ok(());
        }

        if let Err(e) = cursor.advance() {
            self.store.finish(&self.session, self.pager_id);
            return Err(e);
        }
        let store = Arc::clone(&self.store);
        store.cache(&self, cursor)
    }
}

impl Iterator for Page {
    type Item = SearchHit;

    fn next(&mut self) -> Option<SearchHit> {
        self.next_hit()
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        if let Some(cursor) = self.cursor.take() {
            self.store.finish(&self.session, self.pager_id);
            drop(cursor);
        }
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("session", &self.session)
            .field("start_index", &self.start_index)
            .field("page_size", &self.page_size)
            .field("cursor", &self.cursor)
            .finish()
    }
}
