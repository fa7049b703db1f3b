//! Agent inventory and remote agent actions.

use std::{fmt, str::FromStr, sync::Arc};

use reqwest::Method;
use serde_json::json;

use crate::{
    client::ClientInner,
    errors::{Error, Result, ValidationError},
    filters::{FilterSpec, NormalizedQuery, Target},
    http::RequestOptions,
    pagination::{ListResponse, PageMode, Record},
};

pub(crate) const AGENTS_PATH: &str = "/agents";
pub(crate) const APPLICATIONS_PATH: &str = "/agents/applications";
const ACTIONS_PATH: &str = "/agents/actions";

/// Remote action applied to every agent a [`Target`] selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentAction {
    Connect,
    Disconnect,
    InitiateScan,
    Restart,
    Shutdown,
    Uninstall,
}

impl AgentAction {
    pub const ALL: [AgentAction; 6] = [
        AgentAction::Connect,
        AgentAction::Disconnect,
        AgentAction::InitiateScan,
        AgentAction::Restart,
        AgentAction::Shutdown,
        AgentAction::Uninstall,
    ];

    /// Operation name, e.g. `initiateScan`.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentAction::Connect => "connect",
            AgentAction::Disconnect => "disconnect",
            AgentAction::InitiateScan => "initiateScan",
            AgentAction::Restart => "restart",
            AgentAction::Shutdown => "shutdown",
            AgentAction::Uninstall => "uninstall",
        }
    }

    /// Last path segment of the action endpoint.
    pub fn endpoint_segment(&self) -> &'static str {
        match self {
            AgentAction::Connect => "connect",
            AgentAction::Disconnect => "disconnect",
            AgentAction::InitiateScan => "initiate-scan",
            AgentAction::Restart => "restart-machine",
            AgentAction::Shutdown => "shutdown",
            AgentAction::Uninstall => "uninstall",
        }
    }

    pub(crate) fn path(&self) -> String {
        format!("{ACTIONS_PATH}/{}", self.endpoint_segment())
    }
}

impl fmt::Display for AgentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        AgentAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| {
                Error::Validation(
                    ValidationError::new(format!("unknown agent action {s:?}"))
                        .with_field("operation"),
                )
            })
    }
}

/// Client for `/agents` endpoints.
#[derive(Clone)]
pub struct AgentsClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl AgentsClient {
    /// List agents matching `filters`.
    pub async fn list(&self, filters: &FilterSpec, mode: PageMode) -> Result<Vec<Record>> {
        self.inner.list(AGENTS_PATH, filters, mode).await
    }

    /// Installed applications for a comma-separated list of agent IDs.
    ///
    /// The ID list is sent as typed, without splitting.
    pub async fn applications(&self, agent_ids: &str) -> Result<Vec<Record>> {
        if agent_ids.trim().is_empty() {
            return Err(Error::Validation(
                ValidationError::new("at least one agent id is required").with_field("agentIds"),
            ));
        }
        let query = NormalizedQuery::new().with("ids", agent_ids);
        let body = self
            .inner
            .send_json(
                Method::GET,
                APPLICATIONS_PATH,
                Some(&query),
                None,
                RequestOptions::default(),
            )
            .await?;
        let page: ListResponse = serde_json::from_value(body)?;
        Ok(page.into_records())
    }

    /// Run a remote action on the agents selected by `target`.
    pub async fn action(&self, action: AgentAction, target: &Target) -> Result<Record> {
        let body = json!({ "filter": target.body_filter() });
        self.inner.mutate(Method::POST, &action.path(), &body).await
    }
}
