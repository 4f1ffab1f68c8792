//! Feature readers
//!
//! One reader type over the access paths, optionally post-filtered and
//! capped. Aggregation reads turn buckets into records.

use std::fmt;
use std::vec;

use serde_json::{Map, Value};

use crate::filter::PostFilter;
use crate::scroll::{Page, ScrollStream, SearchHit};

use super::errors::SourceResult;

/// Attribute holding the bucket of an aggregation record
pub const AGGREGATION_ATTRIBUTE: &str = "_aggregation";

/// One record per bucket of the first aggregation
///
/// A record's id is the bucket key, or its position when the bucket has
/// none. Later aggregations are ignored.
pub fn bucket_records(aggregations: Option<&Value>) -> Vec<SearchHit> {
    let Some(buckets) = aggregations
        .and_then(Value::as_object)
        .and_then(|aggs| aggs.values().next())
        .and_then(|first| first.get("buckets"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    buckets
        .iter()
        .enumerate()
        .map(|(position, bucket)| {
            let id = match bucket.get("key") {
                Some(Value::String(key)) => key.clone(),
                Some(key) => key.to_string(),
                None => position.to_string(),
            };
            let mut source = Map::new();
            source.insert(AGGREGATION_ATTRIBUTE.to_string(), bucket.clone());
            SearchHit::new(id, Value::Object(source))
        })
        .collect()
}

enum Access {
    Hits(vec::IntoIter<SearchHit>),
    Buckets(vec::IntoIter<SearchHit>),
    Stream(ScrollStream),
    Page(Page),
}

pub struct FeatureReader {
    access: Access,
    filter: Option<PostFilter>,
    remaining: usize,
}

impl FeatureReader {
    pub(crate) fn hits(hits: Vec<SearchHit>) -> Self {
        Self::from_access(Access::Hits(hits.into_iter()))
    }

    pub(crate) fn buckets(aggregations: Option<&Value>) -> Self {
        Self::from_access(Access::Buckets(bucket_records(aggregations).into_iter()))
    }

    pub(crate) fn stream(stream: ScrollStream) -> Self {
        Self::from_access(Access::Stream(stream))
    }

    pub(crate) fn page(page: Page) -> Self {
        Self::from_access(Access::Page(page))
    }

    fn from_access(access: Access) -> Self {
        Self {
            access,
            filter: None,
            remaining: usize::MAX,
        }
    }

    /// Drop hits the filter rejects
    pub(crate) fn filtered(mut self, filter: PostFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Stop after `limit` accepted hits
    pub(crate) fn capped(mut self, limit: usize) -> Self {
        self.remaining = limit;
        self
    }

    pub fn is_post_filtered(&self) -> bool {
        self.filter.is_some()
    }

    pub fn is_paged(&self) -> bool {
        matches!(self.access, Access::Page(_))
    }

    pub fn is_aggregation(&self) -> bool {
        matches!(self.access, Access::Buckets(_))
    }

    /// Finish reading
    ///
    /// A page caches its advanced cursor for the next request, or releases
    /// it when final. A stream releases its cursor.
    pub fn close(self) -> SourceResult<()> {
        match self.access {
            Access::Hits(_) | Access::Buckets(_) => Ok(()),
            Access::Stream(stream) => {
                stream.close();
                Ok(())
            }
            Access::Page(page) => Ok(page.close()?),
        }
    }

    fn next_raw(&mut self) -> Option<SourceResult<SearchHit>> {
        match &mut self.access {
            Access::Hits(hits) | Access::Buckets(hits) => hits.next().map(Ok),
            Access::Stream(stream) => stream.next().map(|r| r.map_err(Into::into)),
            Access::Page(page) => page.next_hit().map(Ok),
        }
    }
}

impl Iterator for FeatureReader {
    type Item = SourceResult<SearchHit>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            let hit = match self.next_raw()? {
                Ok(hit) => hit,
                Err(e) => return Some(Err(e)),
            };
            let accepted = self
                .filter
                .as_ref()
                .map(|f| f.matches(&hit.id, &hit.source))
                .unwrap_or(true);
            if accepted {
                self.remaining -= 1;
                return Some(Ok(hit));
            }
        }
        None
    }
}

impl fmt::Debug for FeatureReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let access = match self.access {
            Access::Hits(_) => "hits",
            Access::Buckets(_) => "buckets",
            Access::Stream(_) => "stream",
            Access::Page(_) => "page",
        };
        f.debug_struct("FeatureReader")
            .field("access", &access)
            .field("post_filtered", &self.filter.is_some())
            .field("remaining", &self.remaining)
            .finish()
    }
}
