//! Layer read requests

use serde::{Deserialize, Serialize};

use crate::filter::{NativeOverride, Predicate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Sort key; no property means natural (document id) order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortBy {
    #[serde(default)]
    pub property: Option<String>,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortBy {
    pub fn property(name: impl Into<String>, order: SortOrder) -> Self {
        Self {
            property: Some(name.into()),
            order,
        }
    }

    pub fn natural(order: SortOrder) -> Self {
        Self {
            property: None,
            order,
        }
    }
}

/// Position of a paged read within a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub session: String,
    pub start_index: usize,
}

/// One read against a layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureQuery {
    pub predicate: Predicate,
    #[serde(default)]
    pub native: Option<NativeOverride>,
    /// Properties to return; all used attributes when absent
    #[serde(default)]
    pub properties: Option<Vec<String>>,
    #[serde(default)]
    pub sort: Vec<SortBy>,
    /// Hit cap; also the page size when paging
    #[serde(default)]
    pub max_features: Option<usize>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

impl FeatureQuery {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            native: None,
            properties: None,
            sort: Vec::new(),
            max_features: None,
            paging: None,
        }
    }

    pub fn with_native(mut self, native: NativeOverride) -> Self {
        self.native = Some(native);
        self
    }

    pub fn with_properties(mut self, properties: &[&str]) -> Self {
        self.properties = Some(properties.iter().map(|p| p.to_string()).collect());
        self
    }

    pub fn sorted_by(mut self, sort: SortBy) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn limit(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Read the page at `start_index` of `session`, `count` hits per page
    pub fn page(mut self, session: impl Into<String>, start_index: usize, count: usize) -> Self {
        self.paging = Some(Paging {
            session: session.into(),
            start_index,
        });
        self.max_features = Some(count);
        self
    }

    pub fn is_paging(&self) -> bool {
        self.paging.is_some()
    }

    pub fn is_sorted(&self) -> bool {
        !self.sort.is_empty()
    }

    /// Identity of the predicate and override, used to bind pagers
    pub fn query_key(&self, type_name: &str) -> String {
        let (q, a) = self
            .native
            .as_ref()
            .map(|n| (n.q.as_deref().unwrap_or(""), n.a.as_deref().unwrap_or("")))
            .unwrap_or(("", ""));
        format!("{}|{}|{}|{}", type_name, self.predicate, q, a)
    }
}
