//! Scripted [`PageSource`] for offline tests.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use crate::{
    errors::{APIError, Error, Result},
    filters::NormalizedQuery,
    pagination::{BoxFuture, ListResponse, PageSource},
};

/// A request observed by [`MockPageSource`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub endpoint: String,
    pub query: NormalizedQuery,
}

/// Returns queued pages in order and records every query it receives.
///
/// Once the queue is drained it answers with a 500 API error.
#[derive(Clone, Default)]
pub struct MockPageSource {
    inner: Arc<MockInner>,
}

#[derive(Default)]
struct MockInner {
    responses: Mutex<VecDeque<Result<ListResponse>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockPageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, page: ListResponse) -> Self {
        self.push(Ok(page));
        self
    }

    pub fn with_error(self, err: Error) -> Self {
        self.push(Err(err));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner
            .calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn push(&self, response: Result<ListResponse>) {
        if let Ok(mut queue) = self.inner.responses.lock() {
            queue.push_back(response);
        }
    }

    fn next(&self, endpoint: &str, query: &NormalizedQuery) -> Result<ListResponse> {
        if let Ok(mut calls) = self.inner.calls.lock() {
            calls.push(RecordedCall {
                endpoint: endpoint.to_string(),
                query: query.clone(),
            });
        }
        self.inner
            .responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| {
                Err(Error::Api(APIError::new(
                    500,
                    "no more mock pages configured",
                )))
            })
    }
}

impl PageSource for MockPageSource {
    fn fetch_page<'a>(
        &'a self,
        endpoint: &'a str,
        query: &'a NormalizedQuery,
    ) -> BoxFuture<'a, Result<ListResponse>> {
        let response = self.next(endpoint, query);
        Box::pin(async move { response })
    }
}
