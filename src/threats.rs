//! Threat listing and mitigation.

use std::{fmt, str::FromStr, sync::Arc};

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    client::ClientInner,
    errors::{Error, Result, ValidationError},
    filters::{FilterSpec, Target},
    pagination::{PageMode, Record},
};

pub(crate) const THREATS_PATH: &str = "/threats";
const MITIGATE_PATH: &str = "/threats/mitigate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MitigationAction {
    Kill,
    #[default]
    Quarantine,
    Remediate,
    RollbackRemediation,
    UnQuarantine,
    NetworkQuarantine,
}

impl MitigationAction {
    pub const ALL: [MitigationAction; 6] = [
        MitigationAction::Kill,
        MitigationAction::Quarantine,
        MitigationAction::Remediate,
        MitigationAction::RollbackRemediation,
        MitigationAction::UnQuarantine,
        MitigationAction::NetworkQuarantine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MitigationAction::Kill => "kill",
            MitigationAction::Quarantine => "quarantine",
            MitigationAction::Remediate => "remediate",
            MitigationAction::RollbackRemediation => "rollback-remediation",
            MitigationAction::UnQuarantine => "un-quarantine",
            MitigationAction::NetworkQuarantine => "network-quarantine",
        }
    }
}

impl fmt::Display for MitigationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MitigationAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        MitigationAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| {
                Error::Validation(
                    ValidationError::new(format!("unknown mitigation action {s:?}"))
                        .with_field("mitigationAction"),
                )
            })
    }
}

/// Client for `/threats` endpoints.
#[derive(Clone)]
pub struct ThreatsClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl ThreatsClient {
    pub async fn list(&self, filters: &FilterSpec, mode: PageMode) -> Result<Vec<Record>> {
        self.inner.list(THREATS_PATH, filters, mode).await
    }

    /// Apply a mitigation to the threats selected by `target`.
    pub async fn mitigate(&self, action: MitigationAction, target: &Target) -> Result<Record> {
        let path = format!("{MITIGATE_PATH}/{}", action.as_str());
        let body = json!({ "filter": target.body_filter() });
        self.inner.mutate(Method::POST, &path, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_names_match_path_segments() {
        for action in MitigationAction::ALL {
            let encoded = serde_json::to_value(action).unwrap();
            assert_eq!(encoded, serde_json::Value::String(action.as_str().into()));
            assert_eq!(action.as_str().parse::<MitigationAction>().unwrap(), action);
        }
        assert_eq!(MitigationAction::default(), MitigationAction::Quarantine);
    }

    #[test]
    fn rejects_unknown_action() {
        let err = "delete".parse::<MitigationAction>().unwrap_err();
        assert!(err.to_string().contains("mitigationAction"));
    }
}
