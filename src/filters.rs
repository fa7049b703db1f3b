//! Filter normalization.
//!
//! Filters arrive as sparse key/value selections. They leave in one of two shapes,
//! depending on the endpoint family:
//!
//! - **GET list endpoints** take flat query parameters; multi-select lists are joined
//!   with `,` ([`join_for_query`]).
//! - **POST/PUT/DELETE action endpoints** take a JSON `filter` object whose ID-style
//!   fields are arrays; free-text comma lists are split and trimmed ([`split_for_body`]).
//!
//! Both directions drop unset values the same way: empty strings, empty lists, nulls
//! and `false` (every boolean filter here means "only if true").

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Key exempt from comma splitting in body filters.
pub const QUERY_KEY: &str = "query";

/// Reserved query keys set by the paginator.
pub const LIMIT_KEY: &str = "limit";
pub const CURSOR_KEY: &str = "cursor";

/// A raw filter value as selected by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<String>),
    Null,
    /// Anything else (mixed arrays, objects). Forwarded as received.
    Other(serde_json::Value),
}

impl FilterValue {
    /// Whether this value counts as "not selected".
    pub fn is_unset(&self) -> bool {
        match self {
            FilterValue::Null => true,
            FilterValue::Bool(b) => !b,
            FilterValue::Text(s) => s.is_empty(),
            FilterValue::List(items) => items.is_empty(),
            FilterValue::Number(_) => false,
            FilterValue::Other(serde_json::Value::Array(items)) => items.is_empty(),
            FilterValue::Other(_) => false,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<u32> for FilterValue {
    fn from(value: u32) -> Self {
        FilterValue::Number(value.into())
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Number(value.into())
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(value: Vec<String>) -> Self {
        FilterValue::List(value)
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(value: Vec<&str>) -> Self {
        FilterValue::List(value.into_iter().map(str::to_string).collect())
    }
}

/// Sparse filter selection keyed by API filter name (e.g. `siteIds`, `osTypes`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSpec(BTreeMap<String, FilterValue>);

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FilterValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries that survive the emptiness rules.
    fn selected(&self) -> impl Iterator<Item = (&String, &FilterValue)> {
        self.0.iter().filter(|(_, value)| !value.is_unset())
    }
}

impl<K: Into<String>, V: Into<FilterValue>> FromIterator<(K, V)> for FilterSpec {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A single query-string value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Text(s) => f.write_str(s),
            QueryValue::Number(n) => write!(f, "{n}"),
            QueryValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Text(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Text(value)
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        QueryValue::Number(value.into())
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Bool(value)
    }
}

/// Flat query mapping for GET list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedQuery(BTreeMap<String, QueryValue>);

impl NormalizedQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.0.get(key)
    }

    pub fn set_limit(&mut self, limit: u32) {
        self.insert(LIMIT_KEY, limit);
    }

    pub fn set_cursor(&mut self, cursor: impl Into<String>) {
        self.insert(CURSOR_KEY, cursor.into());
    }

    pub fn limit(&self) -> Option<&QueryValue> {
        self.get(LIMIT_KEY)
    }

    pub fn cursor(&self) -> Option<&str> {
        match self.get(CURSOR_KEY) {
            Some(QueryValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &QueryValue)> {
        self.0.iter()
    }

    /// String pairs for `reqwest::RequestBuilder::query`.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }
}

/// JSON `filter` object for mutation bodies.
pub type BodyFilter = serde_json::Map<String, serde_json::Value>;

/// Query-string direction: drop unset entries, join lists with `,`.
///
/// List elements are joined as-is; no trimming is applied.
pub fn join_for_query(raw: &FilterSpec) -> NormalizedQuery {
    let mut query = NormalizedQuery::new();
    for (key, value) in raw.selected() {
        let joined = match value {
            FilterValue::List(items) => QueryValue::Text(items.join(",")),
            FilterValue::Text(s) => QueryValue::Text(s.clone()),
            FilterValue::Number(n) => QueryValue::Number(n.clone()),
            FilterValue::Bool(b) => QueryValue::Bool(*b),
            FilterValue::Other(serde_json::Value::Array(items)) => QueryValue::Text(
                items.iter().map(scalar_text).collect::<Vec<_>>().join(","),
            ),
            FilterValue::Other(other) => QueryValue::Text(scalar_text(other)),
            FilterValue::Null => continue,
        };
        query.0.insert(key.clone(), joined);
    }
    query
}

/// Body direction: drop unset entries, split free-text strings into trimmed arrays.
///
/// `query` stays a plain string. Lists pass through as arrays.
pub fn split_for_body(raw: &FilterSpec) -> BodyFilter {
    let mut filter = BodyFilter::new();
    for (key, value) in raw.selected() {
        let shaped = match value {
            FilterValue::Text(s) if key != QUERY_KEY => string_array(split_ids(s)),
            FilterValue::Text(s) => serde_json::Value::String(s.clone()),
            FilterValue::List(items) => string_array(items.clone()),
            FilterValue::Number(n) => serde_json::Value::Number(n.clone()),
            FilterValue::Bool(b) => serde_json::Value::Bool(*b),
            FilterValue::Other(other) => other.clone(),
            FilterValue::Null => continue,
        };
        filter.insert(key.clone(), shaped);
    }
    filter
}

/// Splits a free-text comma list and trims each element.
///
/// Empty elements are kept: `"a,,b"` yields `["a", "", "b"]`.
pub fn split_ids(raw: &str) -> Vec<String> {
    raw.split(',').map(|s| s.trim().to_string()).collect()
}

/// Strings as-is, everything else as JSON text.
fn scalar_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn string_array(items: Vec<String>) -> serde_json::Value {
    serde_json::Value::Array(items.into_iter().map(serde_json::Value::String).collect())
}

/// How a mutation selects the records it acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Comma-separated ID list, as typed by the user.
    Ids(String),
    /// Filter criteria.
    Filter(FilterSpec),
}

impl Target {
    pub fn ids(raw: impl Into<String>) -> Self {
        Target::Ids(raw.into())
    }

    /// The `filter` member of the request body.
    pub fn body_filter(&self) -> BodyFilter {
        match self {
            Target::Ids(raw) => {
                let mut filter = BodyFilter::new();
                filter.insert("ids".to_string(), string_array(split_ids(raw)));
                filter
            }
            Target::Filter(spec) => split_for_body(spec),
        }
    }
}
