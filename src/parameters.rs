//! Building [`Operation`]s from node-style parameter objects.
//!
//! Parameters are a flat JSON object keyed by parameter name (`returnAll`,
//! `limit`, `targetBy`, `filters`, ...). Missing parameters take their usual
//! defaults; present ones must have the right JSON type.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{
    agents::AgentAction,
    device_control::{
        DeviceClass, DeviceInterface, RuleAction, RuleDefinition, RuleMatch, RuleScope,
        RuleStatus, RuleUpdate,
    },
    errors::{Error, Result, ValidationError},
    filters::{FilterSpec, Target},
    operations::{
        AgentOperation, DeviceControlOperation, Operation, Resource, TagOperation,
        ThreatOperation,
    },
    pagination::PageMode,
    tags::{Tag, TagAction},
    threats::MitigationAction,
    DEFAULT_LIMIT,
};

const DEFAULT_BLUETOOTH_VERSION: &str = "4";

fn invalid(field: &str, message: impl Into<String>) -> Error {
    Error::Validation(ValidationError::new(message).with_field(field))
}

/// Typed lookups over one parameter object.
struct Params<'a> {
    values: Option<&'a Map<String, Value>>,
}

impl<'a> Params<'a> {
    fn new(raw: &'a Value) -> Result<Self> {
        match raw {
            Value::Null => Ok(Self { values: None }),
            Value::Object(map) => Ok(Self { values: Some(map) }),
            _ => Err(invalid("parameters", "must be an object")),
        }
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.values
            .and_then(|map| map.get(name))
            .filter(|v| !v.is_null())
    }

    fn str_or(&self, name: &str, default: &str) -> Result<String> {
        match self.get(name) {
            None => Ok(default.to_string()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(invalid(name, "must be a string")),
        }
    }

    fn required_str(&self, name: &str) -> Result<String> {
        let value = self.str_or(name, "")?;
        if value.trim().is_empty() {
            return Err(invalid(name, "is required"));
        }
        Ok(value)
    }

    fn bool_or(&self, name: &str, default: bool) -> Result<bool> {
        match self.get(name) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(invalid(name, "must be a boolean")),
        }
    }

    fn u32_or(&self, name: &str, default: u32) -> Result<u32> {
        match self.get(name) {
            None => Ok(default),
            Some(v) => v
                .as_u64()
                .or_else(|| whole_float(v))
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| invalid(name, "must be a positive integer")),
        }
    }

    /// An option-list parameter decoded through its serde name.
    fn choice_or<T: DeserializeOwned>(&self, name: &str, default: T) -> Result<T> {
        match self.get(name) {
            None => Ok(default),
            Some(v @ Value::String(s)) => serde_json::from_value(v.clone())
                .map_err(|_| invalid(name, format!("unsupported value {s:?}"))),
            Some(_) => Err(invalid(name, "must be a string")),
        }
    }

    fn filters(&self, name: &str) -> Result<FilterSpec> {
        match self.get(name) {
            None => Ok(FilterSpec::new()),
            Some(v @ Value::Object(_)) => serde_json::from_value(v.clone())
                .map_err(|err| invalid(name, format!("invalid filter: {err}"))),
            Some(_) => Err(invalid(name, "must be an object")),
        }
    }

    fn page_mode(&self) -> Result<PageMode> {
        if self.bool_or("returnAll", false)? {
            return Ok(PageMode::All);
        }
        PageMode::limited(self.u32_or("limit", DEFAULT_LIMIT)?)
    }

    fn target(&self, target_by: &str, ids: &str, filters: &str) -> Result<Target> {
        match self.str_or(target_by, "ids")?.as_str() {
            "ids" => Ok(Target::Ids(self.required_str(ids)?)),
            "filter" => Ok(Target::Filter(self.filters(filters)?)),
            other => Err(invalid(target_by, format!("unsupported value {other:?}"))),
        }
    }
}

/// Number inputs may arrive as `50.0`.
fn whole_float(value: &Value) -> Option<u64> {
    let f = value.as_f64()?;
    if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}

fn unknown_operation(resource: Resource, operation: &str) -> Error {
    invalid(
        "operation",
        format!("unknown operation {operation:?} for resource {resource}"),
    )
}

impl Operation {
    /// Resolve a (resource, operation) selection and its parameters.
    pub fn from_parameters(resource: &str, operation: &str, params: &Value) -> Result<Self> {
        let resource: Resource = resource.parse()?;
        let p = Params::new(params)?;
        match resource {
            Resource::Agent => agent_operation(operation, &p).map(Operation::Agent),
            Resource::Threat => threat_operation(operation, &p).map(Operation::Threat),
            Resource::DeviceControl => {
                device_control_operation(operation, &p).map(Operation::DeviceControl)
            }
            Resource::Tag => tag_operation(operation, &p).map(Operation::Tag),
        }
    }
}

fn agent_operation(operation: &str, p: &Params<'_>) -> Result<AgentOperation> {
    match operation {
        "getAgents" => Ok(AgentOperation::List {
            filters: p.filters("filters")?,
            mode: p.page_mode()?,
        }),
        "getApplications" => Ok(AgentOperation::Applications {
            agent_ids: p.required_str("agentIds")?,
        }),
        other => {
            let action: AgentAction = other
                .parse()
                .map_err(|_| unknown_operation(Resource::Agent, other))?;
            Ok(AgentOperation::Action {
                action,
                target: p.target("targetBy", "actionAgentIds", "actionFilters")?,
            })
        }
    }
}

fn threat_operation(operation: &str, p: &Params<'_>) -> Result<ThreatOperation> {
    match operation {
        "getThreats" => Ok(ThreatOperation::List {
            filters: p.filters("threatFilters")?,
            mode: p.page_mode()?,
        }),
        "mitigateThreat" => Ok(ThreatOperation::Mitigate {
            action: p.choice_or("mitigationAction", MitigationAction::default())?,
            target: p.target("threatTargetBy", "threatIds", "mitigationFilters")?,
        }),
        other => Err(unknown_operation(Resource::Threat, other)),
    }
}

fn device_control_operation(operation: &str, p: &Params<'_>) -> Result<DeviceControlOperation> {
    match operation {
        "getDeviceRules" => Ok(DeviceControlOperation::ListRules {
            filters: p.filters("deviceControlFilters")?,
            mode: p.page_mode()?,
        }),
        "createRule" => rule_definition(p).map(DeviceControlOperation::CreateRule),
        "updateRule" => Ok(DeviceControlOperation::UpdateRule {
            rule_id: p.required_str("updateRuleId")?,
            update: rule_update(p)?,
        }),
        "deleteRules" => Ok(DeviceControlOperation::DeleteRules {
            rule_ids: p.required_str("deleteRuleIds")?,
        }),
        "getDeviceEvents" => Ok(DeviceControlOperation::ListEvents {
            filters: p.filters("deviceEventFilters")?,
            mode: p.page_mode()?,
        }),
        other => Err(unknown_operation(Resource::DeviceControl, other)),
    }
}

fn rule_definition(p: &Params<'_>) -> Result<RuleDefinition> {
    let rule_match = match p.str_or("ruleType", "class")?.as_str() {
        "class" => RuleMatch::Class(p.choice_or("deviceClass", DeviceClass::default())?),
        "vendorId" => RuleMatch::VendorId {
            vendor_id: p.str_or("vendorId", "")?,
        },
        "productId" => RuleMatch::ProductId {
            vendor_id: p.str_or("vendorId", "")?,
            product_id: p.str_or("productId", "")?,
        },
        "deviceId" => RuleMatch::DeviceId {
            vendor_id: p.str_or("vendorId", "")?,
            product_id: p.str_or("productId", "")?,
        },
        "bluetoothVersion" => {
            RuleMatch::BluetoothVersion(p.str_or("bluetoothVersion", DEFAULT_BLUETOOTH_VERSION)?)
        }
        other => return Err(invalid("ruleType", format!("unsupported value {other:?}"))),
    };

    let scope = match p.str_or("ruleScope", "site")?.as_str() {
        "tenant" => RuleScope::Tenant,
        "account" => RuleScope::Account(p.str_or("createRuleAccountIds", "")?),
        "site" => RuleScope::Site(p.str_or("createRuleSiteIds", "")?),
        "group" => RuleScope::Group(p.str_or("createRuleGroupIds", "")?),
        other => return Err(invalid("ruleScope", format!("unsupported value {other:?}"))),
    };

    Ok(
        RuleDefinition::new(p.required_str("ruleName")?, rule_match, scope)
            .with_interface(p.choice_or("interface", DeviceInterface::default())?)
            .with_action(p.choice_or("ruleAction", RuleAction::default())?)
            .with_status(p.choice_or("ruleStatus", RuleStatus::default())?),
    )
}

fn rule_update(p: &Params<'_>) -> Result<RuleUpdate> {
    let Some(fields) = p.get("updateFields") else {
        return Ok(RuleUpdate::default());
    };
    let Value::Object(fields) = fields else {
        return Err(invalid("updateFields", "must be an object"));
    };
    let set: Map<String, Value> = fields
        .iter()
        .filter(|(_, v)| !v.is_null() && v.as_str() != Some(""))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    serde_json::from_value(Value::Object(set))
        .map_err(|err| invalid("updateFields", err.to_string()))
}

fn tag_operation(operation: &str, p: &Params<'_>) -> Result<TagOperation> {
    match operation {
        "getTags" => Ok(TagOperation::List {
            filters: p.filters("tagFilters")?,
            mode: p.page_mode()?,
        }),
        "manageTags" => Ok(TagOperation::Manage {
            action: p.choice_or("tagAction", TagAction::default())?,
            tags: tag_values(p)?,
            target: p.target("tagTargetBy", "tagAgentIds", "tagActionFilters")?,
        }),
        other => Err(unknown_operation(Resource::Tag, other)),
    }
}

/// `tags.tagValues`, a fixed collection of `{key, value}` rows.
fn tag_values(p: &Params<'_>) -> Result<Vec<Tag>> {
    match p.get("tags").and_then(|tags| tags.get("tagValues")) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(rows) => serde_json::from_value(rows.clone())
            .map_err(|err| invalid("tags", format!("invalid tag values: {err}"))),
    }
}
