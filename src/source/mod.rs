//! Layer reads
//!
//! A [`FeatureSource`] serves one layer of the store: it compiles the
//! read's predicate, prepares the search request, picks single-shot,
//! streaming or paged access and post-filters hits when the compiled query
//! is not equivalent to the predicate.
//!
//! Access selection:
//! - aggregation buckets when the read carries native aggregations
//! - paged when the read carries a session position
//! - streamed when scrolling is enabled and more hits are wanted than one
//!   scroll batch holds
//! - single search otherwise

mod errors;
pub mod query;
pub mod reader;

use std::sync::Arc;

use serde_json::Value;

use crate::config::StoreConfig;
use crate::filter::query::is_match_all;
use crate::filter::{bounds, CompiledFilter, FeatureSchema, FilterCompiler, PostFilter};
use crate::geo::{compute_precision, update_grid_aggregation_precision};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::scroll::{
    PageRequest, PageStart, PagerStore, ScrollContext, ScrollCursor, ScrollStream, SearchBackend,
    SearchRequest,
};

pub use errors::{SourceError, SourceResult};
pub use query::{FeatureQuery, Paging, SortBy, SortOrder};
pub use reader::{bucket_records, FeatureReader, AGGREGATION_ATTRIBUTE};

/// A compiled read, ready to send
#[derive(Debug, Clone)]
pub struct PreparedSearch {
    pub request: SearchRequest,
    pub compiled: CompiledFilter,
}

pub struct FeatureSource {
    schema: FeatureSchema,
    config: StoreConfig,
    ctx: ScrollContext,
    pagers: Option<Arc<PagerStore>>,
}

impl FeatureSource {
    pub fn new(schema: FeatureSchema, config: StoreConfig, backend: Arc<dyn SearchBackend>) -> Self {
        let ctx = ScrollContext::new(backend, config.scroll_time());
        Self {
            schema,
            config,
            ctx,
            pagers: None,
        }
    }

    /// Share a metrics registry with compilations and cursors
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.ctx = self.ctx.with_metrics(metrics);
        self
    }

    /// Enable paged reads
    pub fn with_pagers(mut self, pagers: Arc<PagerStore>) -> Self {
        self.pagers = Some(pagers);
        self
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.ctx.metrics
    }

    /// Compile the read and build its search request
    ///
    /// A scrolling request carries the keep-alive and ignores property
    /// sorts. When aggregations are present the grid precision is resolved
    /// from the predicate's bounds and no hits are requested.
    pub fn prepare(&self, query: &FeatureQuery, scroll: bool) -> SourceResult<PreparedSearch> {
        let compiled = FilterCompiler::new(&self.schema)
            .with_metrics(self.ctx.metrics.clone())
            .compile(&query.predicate, query.native.as_ref())?;
        let request = self.build_request(query, &compiled, scroll);
        Ok(PreparedSearch { request, compiled })
    }

    fn build_request(
        &self,
        query: &FeatureQuery,
        compiled: &CompiledFilter,
        scroll: bool,
    ) -> SearchRequest {
        let size = if query.is_paging() {
            self.max_size(query)
        } else {
            self.config.scroll_size
        };
        let mut request = SearchRequest::new(compiled.query.clone(), size);

        let mut natural_order = SortOrder::Asc;
        if scroll {
            request.scroll = Some(self.ctx.keep_alive);
        } else {
            for sort in &query.sort {
                match &sort.property {
                    Some(name) => {
                        let attribute = self.schema.resolve(name);
                        request.add_sort(attribute.field(), sort.order.as_str());
                    }
                    None => natural_order = sort.order,
                }
            }
        }

        if self.config.source_filtering {
            self.add_source_filtering(query, &mut request);
        }

        if query.is_sorted() && is_match_all(&compiled.native_query) {
            request.add_sort("_id", natural_order.as_str());
        }

        if let Some(aggregations) = &compiled.aggregations {
            let envelope = bounds(&query.predicate).envelope();
            let level = compute_precision(&envelope, self.config.grid_size);
            let mut aggregations = aggregations.clone();
            update_grid_aggregation_precision(&mut aggregations, level);
            let level = level.to_string();
            log_event_with_fields(
                Event::GridPrecisionResolved,
                &[
                    ("type", self.schema.type_name.as_str()),
                    ("precision", level.as_str()),
                ],
            );
            request.aggregations = Some(aggregations);
            request.size = 0;
        }

        request
    }

    fn add_source_filtering(&self, query: &FeatureQuery, request: &mut SearchRequest) {
        match &query.properties {
            Some(properties) => {
                for name in properties {
                    let field = self.schema.resolve(name).field().to_string();
                    request.source_includes.push(field);
                }
            }
            None => {
                for attribute in self.schema.used() {
                    let field = attribute.field().to_string();
                    if attribute.stored {
                        request.stored_fields.push(field);
                    } else {
                        request.source_includes.push(field);
                    }
                }
            }
        }
    }

    fn max_size(&self, query: &FeatureQuery) -> usize {
        query
            .max_features
            .unwrap_or(self.config.default_max_features)
    }

    /// Hits the backend holds for the compiled query, before post-filtering
    fn raw_total(&self, prepared: &PreparedSearch) -> SourceResult<usize> {
        let mut request = prepared.request.clone();
        request.size = 0;
        request.scroll = None;
        let response = self.ctx.search(&self.config.index_name, &request)?;
        Ok(usize::try_from(response.total).unwrap_or(usize::MAX))
    }

    /// Number of features the read yields
    ///
    /// Counted by the backend when the compiled query is exact, otherwise by
    /// reading and post-filtering every candidate. Capped by the read's
    /// maximum.
    pub fn count(&self, query: &FeatureQuery) -> SourceResult<usize> {
        let prepared = self.prepare(query, false)?;
        let total = if prepared.compiled.fully_supported {
            self.raw_total(&prepared)?
        } else {
            let mut unbounded = query.clone();
            unbounded.paging = None;
            unbounded.max_features = Some(usize::MAX);
            let mut matched = 0;
            for hit in self.read_prepared(&unbounded, prepared)? {
                hit?;
                matched += 1;
            }
            matched
        };
        Ok(total.min(self.max_size(query)))
    }

    /// Run the aggregation of a read and return the backend's result
    pub fn aggregate(&self, query: &FeatureQuery) -> SourceResult<Option<Value>> {
        let prepared = self.prepare(query, false)?;
        if prepared.request.aggregations.is_none() {
            return Ok(None);
        }
        let response = self
            .ctx
            .search(&self.config.index_name, &prepared.request)?;
        Ok(response.aggregations)
    }

    /// Open a reader over the read's features
    ///
    /// A read with native aggregations yields one record per bucket of the
    /// first aggregation instead of documents.
    pub fn read(&self, query: &FeatureQuery) -> SourceResult<FeatureReader> {
        if query.is_paging() {
            return self.read_page(query);
        }
        let prepared = self.prepare(query, false)?;
        self.read_prepared(query, prepared)
    }

    /// Read with an already compiled filter; the scroll request is derived
    /// from it without recompiling
    fn read_prepared(
        &self,
        query: &FeatureQuery,
        prepared: PreparedSearch,
    ) -> SourceResult<FeatureReader> {
        let max = self.max_size(query);
        if prepared.request.aggregations.is_some() {
            let response = self.ctx.search(&self.config.index_name, &prepared.request)?;
            return Ok(FeatureReader::buckets(response.aggregations.as_ref()));
        }

        let total = self.raw_total(&prepared)?;
        // Post-filtering drops hits, so every candidate is fetched
        let wanted = if prepared.compiled.fully_supported {
            total.min(max)
        } else {
            total
        };

        let scroll = self.config.scroll_enabled && wanted > self.config.scroll_size;
        let reader = if scroll {
            let request = self.build_request(query, &prepared.compiled, true);
            let cursor =
                ScrollCursor::open(self.ctx.clone(), &self.config.index_name, &request, wanted)?;
            FeatureReader::stream(ScrollStream::new(cursor))
        } else {
            let mut request = prepared.request.clone();
            request.size = wanted;
            let response = self.ctx.search(&self.config.index_name, &request)?;
            FeatureReader::hits(response.hits)
        };

        Ok(self.finish_reader(reader, &prepared.compiled, query).capped(max))
    }

    fn read_page(&self, query: &FeatureQuery) -> SourceResult<FeatureReader> {
        let pagers = self.pagers.as_ref().ok_or(SourceError::PagingUnavailable)?;
        let Some(paging) = &query.paging else {
            return Err(SourceError::PagingUnavailable);
        };
        let request = PageRequest::new(
            paging.session.clone(),
            query.query_key(&self.schema.type_name),
            paging.start_index,
            self.max_size(query),
        );

        let prepared = self.prepare(query, true)?;
        let page = match pagers.begin(&request)? {
            PageStart::Resume(page) => page,
            PageStart::Fresh => {
                let cursor = ScrollCursor::open(
                    self.ctx.clone(),
                    &self.config.index_name,
                    &prepared.request,
                    usize::MAX,
                )?;
                pagers.start(&request, cursor)?
            }
        };

        Ok(self.finish_reader(FeatureReader::page(page), &prepared.compiled, query))
    }

    fn finish_reader(
        &self,
        reader: FeatureReader,
        compiled: &CompiledFilter,
        query: &FeatureQuery,
    ) -> FeatureReader {
        if compiled.fully_supported {
            reader
        } else {
            reader.filtered(PostFilter::new(query.predicate.clone(), self.schema.clone()))
        }
    }
}
