//! Cursor pagination for list endpoints.
//!
//! Every list endpoint answers `{"data": [...], "pagination": {"nextCursor": ...}}`.
//! [`Paginator::fetch_all`] either fetches a single limited page or drains the cursor
//! with the maximum page size.

use std::{future::Future, pin::Pin};

use serde::{Deserialize, Serialize};

use crate::{
    errors::{Error, Result, ValidationError},
    filters::NormalizedQuery,
    MAX_PAGE_SIZE,
};

/// One workflow item.
pub type Record = serde_json::Value;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Pagination block of a list response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,
}

/// Body of a list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub data: Option<Vec<Record>>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

impl ListResponse {
    pub fn new(data: Vec<Record>) -> Self {
        Self {
            data: Some(data),
            pagination: None,
        }
    }

    pub fn with_next_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.pagination
            .get_or_insert_with(Pagination::default)
            .next_cursor = Some(cursor.into());
        self
    }

    /// The cursor for the next page; empty cursors count as absent.
    pub fn next_cursor(&self) -> Option<&str> {
        self.pagination
            .as_ref()
            .and_then(|p| p.next_cursor.as_deref())
            .filter(|c| !c.is_empty())
    }

    pub fn into_records(self) -> Vec<Record> {
        self.data.unwrap_or_default()
    }
}

/// Issues a single list request. Implemented by the HTTP client and by test doubles.
pub trait PageSource: Send + Sync {
    fn fetch_page<'a>(
        &'a self,
        endpoint: &'a str,
        query: &'a NormalizedQuery,
    ) -> BoxFuture<'a, Result<ListResponse>>;
}

/// Whether to drain every page or fetch one page of a given size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMode {
    All,
    /// One page only, cursor is not followed. Limit must be in `1..=1000`.
    Limited(u32),
}

impl PageMode {
    pub fn limited(limit: u32) -> Result<Self> {
        let mode = PageMode::Limited(limit);
        mode.validate()?;
        Ok(mode)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            PageMode::Limited(limit) if *limit == 0 || *limit > MAX_PAGE_SIZE => {
                Err(Error::Validation(
                    ValidationError::new(format!("must be between 1 and {MAX_PAGE_SIZE}"))
                        .with_field("limit"),
                ))
            }
            _ => Ok(()),
        }
    }
}

impl Default for PageMode {
    fn default() -> Self {
        PageMode::Limited(crate::DEFAULT_LIMIT)
    }
}

struct PageRequestState {
    records: Vec<Record>,
    page_size: u32,
    pages: usize,
}

impl PageRequestState {
    fn new(page_size: u32) -> Self {
        Self {
            records: Vec::new(),
            page_size,
            pages: 0,
        }
    }
}

/// Drives a [`PageSource`] through a list endpoint.
///
/// Without a ceiling the loop runs for as long as the endpoint keeps returning a
/// cursor. With [`Paginator::with_max_pages`] it fails with
/// [`Error::PageLimitExceeded`] instead of fetching past the ceiling.
#[derive(Debug, Clone, Copy, Default)]
pub struct Paginator {
    max_pages: Option<usize>,
}

impl Paginator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    pub fn max_pages(&self) -> Option<usize> {
        self.max_pages
    }

    pub async fn fetch_all<S>(
        &self,
        source: &S,
        endpoint: &str,
        base_query: NormalizedQuery,
        mode: PageMode,
    ) -> Result<Vec<Record>>
    where
        S: PageSource + ?Sized,
    {
        mode.validate()?;
        let mut query = base_query;
        match mode {
            PageMode::Limited(limit) => {
                query.set_limit(limit);
                let page = source.fetch_page(endpoint, &query).await?;
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    endpoint,
                    limit,
                    has_more = page.next_cursor().is_some(),
                    "fetched limited page"
                );
                Ok(page.into_records())
            }
            PageMode::All => {
                let mut state = PageRequestState::new(MAX_PAGE_SIZE);
                query.set_limit(state.page_size);
                loop {
                    if let Some(max_pages) = self.max_pages {
                        if state.pages >= max_pages {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(endpoint, max_pages, "page ceiling reached");
                            return Err(Error::PageLimitExceeded {
                                endpoint: endpoint.to_string(),
                                max_pages,
                            });
                        }
                    }
                    let page = source.fetch_page(endpoint, &query).await?;
                    state.pages += 1;
                    let next = page.next_cursor().map(str::to_string);
                    let records = page.into_records();
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        endpoint,
                        page = state.pages,
                        records = records.len(),
                        has_more = next.is_some(),
                        "fetched page"
                    );
                    state.records.extend(records);
                    match next {
                        Some(cursor) => query.set_cursor(cursor),
                        None => break,
                    }
                }
                Ok(state.records)
            }
        }
    }
}

/// [`Paginator::fetch_all`] without a page ceiling.
pub async fn fetch_all<S>(
    source: &S,
    endpoint: &str,
    base_query: NormalizedQuery,
    mode: PageMode,
) -> Result<Vec<Record>>
where
    S: PageSource + ?Sized,
{
    Paginator::new()
        .fetch_all(source, endpoint, base_query, mode)
        .await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{errors::APIError, filters::QueryValue, mock::MockPageSource};

    fn page(ids: &[u32]) -> ListResponse {
        ListResponse::new(ids.iter().map(|id| json!({ "id": id })).collect())
    }

    #[tokio::test]
    async fn limited_mode_fetches_one_page_and_ignores_cursor() {
        let source = MockPageSource::new()
            .with_page(page(&[1, 2]).with_next_cursor("more"))
            .with_page(page(&[3]));

        let records = fetch_all(&source, "/agents", NormalizedQuery::new(), PageMode::Limited(50))
            .await
            .unwrap();

        assert_eq!(records, vec![json!({"id": 1}), json!({"id": 2})]);
        let calls = source.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].endpoint, "/agents");
        assert_eq!(calls[0].query.limit(), Some(&QueryValue::from(50u32)));
        assert_eq!(calls[0].query.cursor(), None);
    }

    #[tokio::test]
    async fn all_mode_follows_cursor_until_exhausted() {
        let source = MockPageSource::new()
            .with_page(page(&[1, 2]).with_next_cursor("c1"))
            .with_page(page(&[3]).with_next_cursor("c2"))
            .with_page(page(&[4, 5]));

        let base = NormalizedQuery::new().with("siteIds", "9");
        let records = fetch_all(&source, "/threats", base, PageMode::All)
            .await
            .unwrap();

        let ids: Vec<u64> = records.iter().map(|r| r["id"].as_u64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        let calls = source.calls();
        assert_eq!(calls.len(), 3);
        for call in &calls {
            assert_eq!(call.query.limit(), Some(&QueryValue::from(1000u32)));
            assert_eq!(call.query.get("siteIds"), Some(&QueryValue::from("9")));
        }
        assert_eq!(calls[0].query.cursor(), None);
        assert_eq!(calls[1].query.cursor(), Some("c1"));
        assert_eq!(calls[2].query.cursor(), Some("c2"));
    }

    #[tokio::test]
    async fn missing_data_counts_as_empty_page() {
        let source = MockPageSource::new()
            .with_page(ListResponse::default().with_next_cursor("c1"))
            .with_page(page(&[7]));

        let records = fetch_all(&source, "/agents/tags", NormalizedQuery::new(), PageMode::All)
            .await
            .unwrap();
        assert_eq!(records, vec![json!({"id": 7})]);
    }

    #[tokio::test]
    async fn empty_cursor_is_terminal() {
        let source = MockPageSource::new()
            .with_page(page(&[1]).with_next_cursor(""))
            .with_page(page(&[2]));

        let records = fetch_all(&source, "/agents", NormalizedQuery::new(), PageMode::All)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn duplicates_are_kept_in_page_order() {
        let source = MockPageSource::new()
            .with_page(page(&[1, 2]).with_next_cursor("c1"))
            .with_page(page(&[2, 1]));

        let records = fetch_all(&source, "/agents", NormalizedQuery::new(), PageMode::All)
            .await
            .unwrap();
        let ids: Vec<u64> = records.iter().map(|r| r["id"].as_u64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 2, 1]);
    }

    #[tokio::test]
    async fn page_ceiling_surfaces_distinct_error() {
        let source = MockPageSource::new()
            .with_page(page(&[1]).with_next_cursor("c1"))
            .with_page(page(&[2]).with_next_cursor("c2"))
            .with_page(page(&[3]).with_next_cursor("c3"));

        let err = Paginator::new()
            .with_max_pages(2)
            .fetch_all(&source, "/agents", NormalizedQuery::new(), PageMode::All)
            .await
            .unwrap_err();
        match err {
            Error::PageLimitExceeded {
                endpoint,
                max_pages,
            } => {
                assert_eq!(endpoint, "/agents");
                assert_eq!(max_pages, 2);
            }
            other => panic!("expected page limit error, got {other:?}"),
        }
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn page_ceiling_allows_exactly_max_pages() {
        let source = MockPageSource::new()
            .with_page(page(&[1]).with_next_cursor("c1"))
            .with_page(page(&[2]));

        let records = Paginator::new()
            .with_max_pages(2)
            .fetch_all(&source, "/agents", NormalizedQuery::new(), PageMode::All)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn transport_errors_propagate_unchanged() {
        let source = MockPageSource::new()
            .with_page(page(&[1]).with_next_cursor("c1"))
            .with_error(Error::Api(APIError::new(503, "Service Unavailable")));

        let err = fetch_all(&source, "/agents", NormalizedQuery::new(), PageMode::All)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn out_of_range_limit_is_rejected_before_fetching() {
        let source = MockPageSource::new().with_page(page(&[1]));

        for limit in [0, 5000] {
            let err = fetch_all(&source, "/agents", NormalizedQuery::new(), PageMode::Limited(limit))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
        assert!(source.calls().is_empty());
    }

    #[test]
    fn limited_mode_validates_range() {
        assert!(PageMode::limited(1).is_ok());
        assert!(PageMode::limited(1000).is_ok());
        assert!(matches!(PageMode::limited(0), Err(Error::Validation(_))));
        assert!(matches!(PageMode::limited(1001), Err(Error::Validation(_))));
        assert_eq!(PageMode::default(), PageMode::Limited(50));
    }

    #[test]
    fn list_response_parses_vendor_shape() {
        let resp: ListResponse = serde_json::from_value(json!({
            "data": [{"id": "1"}],
            "pagination": {"nextCursor": "abc", "totalItems": 10}
        }))
        .unwrap();
        assert_eq!(resp.next_cursor(), Some("abc"));
        assert_eq!(resp.pagination.as_ref().unwrap().total_items, Some(10));

        let resp: ListResponse = serde_json::from_value(json!({
            "data": null,
            "pagination": {"nextCursor": null}
        }))
        .unwrap();
        assert_eq!(resp.next_cursor(), None);
        assert!(resp.into_records().is_empty());
    }
}
