//! In-memory backend that records every round trip

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Value};

use super::backend::{SearchBackend, SearchHit, SearchRequest, SearchResponse};
use super::errors::{BackendError, BackendResult};

#[derive(Default)]
struct State {
    searches: Vec<SearchRequest>,
    continuations: Vec<String>,
    releases: Vec<BTreeSet<String>>,
    open: HashMap<String, (usize, usize)>,
    next_scroll: usize,
}

/// Serves a fixed document list regardless of the query
pub struct RecordingBackend {
    docs: Vec<SearchHit>,
    state: Mutex<State>,
    pub fail_continuations: bool,
    pub fail_releases: bool,
    /// Returned as `aggregations` when a request carries any
    pub aggregation_result: Value,
}

impl RecordingBackend {
    pub fn new(docs: Vec<SearchHit>) -> Self {
        Self {
            docs,
            state: Mutex::new(State::default()),
            fail_continuations: false,
            fail_releases: false,
            aggregation_result: json!({"cells": {"buckets": []}}),
        }
    }

    /// `n` documents with ids `0..n` and a `rank` attribute
    pub fn with_hits(n: usize) -> Self {
        Self::new(
            (0..n)
                .map(|i| SearchHit::new(i.to_string(), json!({ "rank": i })))
                .collect(),
        )
    }

    pub fn searches(&self) -> Vec<SearchRequest> {
        self.state.lock().unwrap().searches.clone()
    }

    pub fn continuations(&self) -> Vec<String> {
        self.state.lock().unwrap().continuations.clone()
    }

    pub fn releases(&self) -> Vec<BTreeSet<String>> {
        self.state.lock().unwrap().releases.clone()
    }

    fn batch(&self, state: &mut State, offset: usize, size: usize) -> SearchResponse {
        let end = (offset + size).min(self.docs.len());
        let hits = self.docs[offset.min(end)..end].to_vec();
        state.next_scroll += 1;
        let id = format!("scroll-{}", state.next_scroll);
        state.open.insert(id.clone(), (end, size));
        SearchResponse {
            total: self.docs.len() as u64,
            hits,
            scroll_id: Some(id),
            aggregations: None,
        }
    }
}

impl SearchBackend for RecordingBackend {
    fn search(&self, _index: &str, request: &SearchRequest) -> BackendResult<SearchResponse> {
        let mut state = self.state.lock().unwrap();
        state.searches.push(request.clone());
        let offset = request.from.unwrap_or(0);
        if request.scroll.is_some() {
            return Ok(self.batch(&mut state, offset, request.size));
        }
        let end = (offset + request.size).min(self.docs.len());
        Ok(SearchResponse {
            total: self.docs.len() as u64,
            hits: self.docs[offset.min(end)..end].to_vec(),
            scroll_id: None,
            aggregations: request
                .aggregations
                .as_ref()
                .map(|_| self.aggregation_result.clone()),
        })
    }

    fn scroll(&self, scroll_id: &str, _keep_alive: Duration) -> BackendResult<SearchResponse> {
        let mut state = self.state.lock().unwrap();
        state.continuations.push(scroll_id.to_string());
        if self.fail_continuations {
            return Err(BackendError::Io("continuation refused".into()));
        }
        let (offset, size) = state
            .open
            .get(scroll_id)
            .copied()
            .ok_or_else(|| BackendError::Io(format!("unknown scroll {}", scroll_id)))?;
        Ok(self.batch(&mut state, offset, size))
    }

    fn clear_scroll(&self, scroll_ids: &BTreeSet<String>) -> BackendResult<()> {
        let mut state = self.state.lock().unwrap();
        state.releases.push(scroll_ids.clone());
        if self.fail_releases {
            return Err(BackendError::Io("release refused".into()));
        }
        for id in scroll_ids {
            state.open.remove(id);
        }
        Ok(())
    }
}
