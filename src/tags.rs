//! Agent tags.

use std::sync::Arc;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    client::ClientInner,
    errors::Result,
    filters::{FilterSpec, Target},
    pagination::{PageMode, Record},
};

pub(crate) const TAGS_PATH: &str = "/agents/tags";
const MANAGE_TAGS_PATH: &str = "/agents/actions/manage-tags";

/// How `manage` applies tags to the selected agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagAction {
    /// Add tags not already present.
    #[default]
    Add,
    /// Remove tags that are present.
    Remove,
    /// Replace existing tags that share a key.
    Override,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Client for agent tag endpoints.
#[derive(Clone)]
pub struct TagsClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl TagsClient {
    pub async fn list(&self, filters: &FilterSpec, mode: PageMode) -> Result<Vec<Record>> {
        self.inner.list(TAGS_PATH, filters, mode).await
    }

    /// Add, remove or override tags on the agents selected by `target`.
    pub async fn manage(&self, action: TagAction, tags: &[Tag], target: &Target) -> Result<Record> {
        let body = json!({
            "filter": target.body_filter(),
            "data": {
                "type": action,
                "tags": tags,
            },
        });
        self.inner.mutate(Method::POST, MANAGE_TAGS_PATH, &body).await
    }
}
