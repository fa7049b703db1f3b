//! Operation dispatch.
//!
//! An [`Operation`] is one resource call with its inputs already resolved.
//! [`Client::execute`] runs it and flattens the response into records: list
//! operations yield one record per listed item, mutations yield a single record.

use std::{fmt, str::FromStr};

use serde_json::json;

use crate::{
    agents::AgentAction,
    client::Client,
    device_control::{RuleDefinition, RuleUpdate},
    errors::{Error, Result, ValidationError},
    filters::{FilterSpec, Target},
    pagination::{PageMode, Record},
    tags::{Tag, TagAction},
    threats::MitigationAction,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Agent,
    Threat,
    DeviceControl,
    Tag,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Agent => "agent",
            Resource::Threat => "threat",
            Resource::DeviceControl => "deviceControl",
            Resource::Tag => "tag",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        [
            Resource::Agent,
            Resource::Threat,
            Resource::DeviceControl,
            Resource::Tag,
        ]
        .into_iter()
        .find(|r| r.as_str() == s)
        .ok_or_else(|| {
            Error::Validation(
                ValidationError::new(format!("unknown resource {s:?}")).with_field("resource"),
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentOperation {
    List { filters: FilterSpec, mode: PageMode },
    Applications { agent_ids: String },
    Action { action: AgentAction, target: Target },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ThreatOperation {
    List {
        filters: FilterSpec,
        mode: PageMode,
    },
    Mitigate {
        action: MitigationAction,
        target: Target,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceControlOperation {
    ListRules {
        filters: FilterSpec,
        mode: PageMode,
    },
    CreateRule(RuleDefinition),
    UpdateRule {
        rule_id: String,
        update: RuleUpdate,
    },
    DeleteRules {
        rule_ids: String,
    },
    ListEvents {
        filters: FilterSpec,
        mode: PageMode,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TagOperation {
    List {
        filters: FilterSpec,
        mode: PageMode,
    },
    Manage {
        action: TagAction,
        tags: Vec<Tag>,
        target: Target,
    },
}

/// One resource call with resolved inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Agent(AgentOperation),
    Threat(ThreatOperation),
    DeviceControl(DeviceControlOperation),
    Tag(TagOperation),
}

impl Operation {
    pub fn resource(&self) -> Resource {
        match self {
            Operation::Agent(_) => Resource::Agent,
            Operation::Threat(_) => Resource::Threat,
            Operation::DeviceControl(_) => Resource::DeviceControl,
            Operation::Tag(_) => Resource::Tag,
        }
    }

    /// Operation name within its resource, e.g. `getAgents`.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Agent(AgentOperation::List { .. }) => "getAgents",
            Operation::Agent(AgentOperation::Applications { .. }) => "getApplications",
            Operation::Agent(AgentOperation::Action { action, .. }) => action.as_str(),
            Operation::Threat(ThreatOperation::List { .. }) => "getThreats",
            Operation::Threat(ThreatOperation::Mitigate { .. }) => "mitigateThreat",
            Operation::DeviceControl(op) => match op {
                DeviceControlOperation::ListRules { .. } => "getDeviceRules",
                DeviceControlOperation::CreateRule(_) => "createRule",
                DeviceControlOperation::UpdateRule { .. } => "updateRule",
                DeviceControlOperation::DeleteRules { .. } => "deleteRules",
                DeviceControlOperation::ListEvents { .. } => "getDeviceEvents",
            },
            Operation::Tag(TagOperation::List { .. }) => "getTags",
            Operation::Tag(TagOperation::Manage { .. }) => "manageTags",
        }
    }
}

/// What a batch does when one item fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Stop at the first failure and return it.
    #[default]
    Abort,
    /// Record `{"error": "<message>"}` for the failed item and keep going.
    ContinueOnFail,
}

impl BatchPolicy {
    fn absorb(&self, outcome: Result<Vec<Record>>, out: &mut Vec<Record>) -> Result<()> {
        match outcome {
            Ok(records) => {
                out.extend(records);
                Ok(())
            }
            Err(err) => match self {
                BatchPolicy::Abort => Err(err),
                BatchPolicy::ContinueOnFail => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %err, "batch item failed; continuing");
                    out.push(json!({ "error": err.to_string() }));
                    Ok(())
                }
            },
        }
    }
}

impl Client {
    /// Run one operation and flatten its response into records.
    pub async fn execute(&self, op: &Operation) -> Result<Vec<Record>> {
        match op {
            Operation::Agent(op) => {
                let agents = self.agents();
                match op {
                    AgentOperation::List { filters, mode } => agents.list(filters, *mode).await,
                    AgentOperation::Applications { agent_ids } => {
                        agents.applications(agent_ids).await
                    }
                    AgentOperation::Action { action, target } => {
                        Ok(vec![agents.action(*action, target).await?])
                    }
                }
            }
            Operation::Threat(op) => {
                let threats = self.threats();
                match op {
                    ThreatOperation::List { filters, mode } => threats.list(filters, *mode).await,
                    ThreatOperation::Mitigate { action, target } => {
                        Ok(vec![threats.mitigate(*action, target).await?])
                    }
                }
            }
            Operation::DeviceControl(op) => {
                let device_control = self.device_control();
                match op {
                    DeviceControlOperation::ListRules { filters, mode } => {
                        device_control.list_rules(filters, *mode).await
                    }
                    DeviceControlOperation::CreateRule(rule) => {
                        Ok(vec![device_control.create_rule(rule).await?])
                    }
                    DeviceControlOperation::UpdateRule { rule_id, update } => {
                        Ok(vec![device_control.update_rule(rule_id, update).await?])
                    }
                    DeviceControlOperation::DeleteRules { rule_ids } => {
                        Ok(vec![device_control.delete_rules(rule_ids).await?])
                    }
                    DeviceControlOperation::ListEvents { filters, mode } => {
                        device_control.list_events(filters, *mode).await
                    }
                }
            }
            Operation::Tag(op) => {
                let tags = self.tags();
                match op {
                    TagOperation::List { filters, mode } => tags.list(filters, *mode).await,
                    TagOperation::Manage {
                        action,
                        tags: values,
                        target,
                    } => Ok(vec![tags.manage(*action, values, target).await?]),
                }
            }
        }
    }

    /// Run operations in order, concatenating their records.
    pub async fn execute_batch(
        &self,
        ops: &[Operation],
        policy: BatchPolicy,
    ) -> Result<Vec<Record>> {
        let mut out = Vec::new();
        for op in ops {
            #[cfg(feature = "tracing")]
            tracing::debug!(resource = %op.resource(), operation = op.name(), "executing");
            let outcome = self.execute(op).await;
            policy.absorb(outcome, &mut out)?;
        }
        Ok(out)
    }

    /// Resolve each parameter object into an operation and run it.
    ///
    /// Parameter errors are item failures and follow `policy` like request errors.
    pub async fn execute_items(
        &self,
        resource: &str,
        operation: &str,
        items: &[serde_json::Value],
        policy: BatchPolicy,
    ) -> Result<Vec<Record>> {
        let mut out = Vec::new();
        for params in items {
            let outcome = match Operation::from_parameters(resource, operation, params) {
                Ok(op) => self.execute(&op).await,
                Err(err) => Err(err),
            };
            policy.absorb(outcome, &mut out)?;
        }
        Ok(out)
    }
}
