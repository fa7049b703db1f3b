//! Device-control rules and events.
//!
//! Rules match peripherals on an interface (USB, Bluetooth, ...) by device class,
//! vendor/product IDs or Bluetooth version, and allow or block them within a scope.

use std::sync::Arc;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    client::ClientInner,
    errors::{Error, Result, ValidationError},
    filters::{split_ids, BodyFilter, FilterSpec},
    pagination::{PageMode, Record},
};

pub(crate) const RULES_PATH: &str = "/device-control";
pub(crate) const EVENTS_PATH: &str = "/device-control/events";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceInterface {
    #[default]
    #[serde(rename = "USB")]
    Usb,
    Bluetooth,
    Thunderbolt,
    #[serde(rename = "eSATA")]
    Esata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RuleAction {
    Allow,
    #[default]
    Block,
    #[serde(rename = "Read-Only")]
    ReadOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceClass {
    Any,
    #[default]
    #[serde(rename = "Mass Storage")]
    MassStorage,
    Printer,
    #[serde(rename = "Portable Device")]
    PortableDevice,
    Communication,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RuleStatus {
    #[default]
    Enabled,
    Disabled,
}

/// What a rule matches on. Each variant carries the fields its `ruleType` needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleMatch {
    Class(DeviceClass),
    VendorId {
        vendor_id: String,
    },
    ProductId {
        vendor_id: String,
        product_id: String,
    },
    DeviceId {
        vendor_id: String,
        product_id: String,
    },
    /// Version as the console expects it, `"1"` to `"5"`.
    BluetoothVersion(String),
}

impl Default for RuleMatch {
    fn default() -> Self {
        RuleMatch::Class(DeviceClass::default())
    }
}

impl RuleMatch {
    /// The `ruleType` value sent to the console.
    pub fn rule_type(&self) -> &'static str {
        match self {
            RuleMatch::Class(_) => "class",
            RuleMatch::VendorId { .. } => "vendorId",
            RuleMatch::ProductId { .. } => "productId",
            RuleMatch::DeviceId { .. } => "deviceId",
            RuleMatch::BluetoothVersion(_) => "bluetoothVersion",
        }
    }

    fn write_fields(&self, data: &mut serde_json::Map<String, Value>) {
        match self {
            RuleMatch::Class(class) => {
                data.insert("deviceClass".to_string(), json!(class));
            }
            RuleMatch::VendorId { vendor_id } => put_if_set(data, "vendorId", vendor_id),
            RuleMatch::ProductId {
                vendor_id,
                product_id,
            }
            | RuleMatch::DeviceId {
                vendor_id,
                product_id,
            } => {
                put_if_set(data, "vendorId", vendor_id);
                put_if_set(data, "productId", product_id);
            }
            RuleMatch::BluetoothVersion(version) => {
                data.insert("bluetoothVersion".to_string(), json!(version));
            }
        }
    }
}

fn put_if_set(data: &mut serde_json::Map<String, Value>, key: &str, value: &str) {
    if !value.is_empty() {
        data.insert(key.to_string(), Value::String(value.to_string()));
    }
}

/// Where a new rule applies. ID lists are comma-separated, as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleScope {
    Tenant,
    Account(String),
    Site(String),
    Group(String),
}

impl Default for RuleScope {
    fn default() -> Self {
        RuleScope::Site(String::new())
    }
}

impl RuleScope {
    /// The `filter` member of a create request.
    ///
    /// An empty ID list leaves the filter empty rather than sending `[""]`.
    pub fn body_filter(&self) -> BodyFilter {
        let mut filter = BodyFilter::new();
        let (key, raw) = match self {
            RuleScope::Tenant => {
                filter.insert("tenant".to_string(), Value::Bool(true));
                return filter;
            }
            RuleScope::Account(ids) => ("accountIds", ids),
            RuleScope::Site(ids) => ("siteIds", ids),
            RuleScope::Group(ids) => ("groupIds", ids),
        };
        if !raw.is_empty() {
            filter.insert(key.to_string(), json!(split_ids(raw)));
        }
        filter
    }
}

/// A device-control rule to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDefinition {
    pub name: String,
    pub interface: DeviceInterface,
    pub action: RuleAction,
    pub rule_match: RuleMatch,
    pub scope: RuleScope,
    pub status: RuleStatus,
}

impl RuleDefinition {
    pub fn new(name: impl Into<String>, rule_match: RuleMatch, scope: RuleScope) -> Self {
        Self {
            name: name.into(),
            interface: DeviceInterface::default(),
            action: RuleAction::default(),
            rule_match,
            scope,
            status: RuleStatus::default(),
        }
    }

    pub fn with_interface(mut self, interface: DeviceInterface) -> Self {
        self.interface = interface;
        self
    }

    pub fn with_action(mut self, action: RuleAction) -> Self {
        self.action = action;
        self
    }

    pub fn with_status(mut self, status: RuleStatus) -> Self {
        self.status = status;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation(
                ValidationError::new("rule name is required").with_field("ruleName"),
            ));
        }
        Ok(())
    }

    /// The `data` member of a create request.
    pub fn data(&self) -> Value {
        let mut data = serde_json::Map::new();
        data.insert("ruleName".to_string(), json!(self.name));
        data.insert("interface".to_string(), json!(self.interface));
        data.insert("action".to_string(), json!(self.action));
        data.insert("ruleType".to_string(), json!(self.rule_match.rule_type()));
        data.insert("status".to_string(), json!(self.status));
        self.rule_match.write_fields(&mut data);
        Value::Object(data)
    }
}

/// Partial update of an existing rule. Unset and blank fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RuleAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RuleStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_class: Option<DeviceClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
}

impl RuleUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule_name(mut self, name: impl Into<String>) -> Self {
        self.rule_name = Some(name.into());
        self
    }

    pub fn action(mut self, action: RuleAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn status(mut self, status: RuleStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn device_class(mut self, class: DeviceClass) -> Self {
        self.device_class = Some(class);
        self
    }

    pub fn vendor_id(mut self, id: impl Into<String>) -> Self {
        self.vendor_id = Some(id.into());
        self
    }

    pub fn product_id(mut self, id: impl Into<String>) -> Self {
        self.product_id = Some(id.into());
        self
    }

    /// The `data` member of an update request.
    pub fn data(&self) -> Result<Value> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(fields) = &mut value {
            fields.retain(|_, v| v.as_str() != Some(""));
        }
        Ok(value)
    }
}

/// Client for `/device-control` endpoints.
#[derive(Clone)]
pub struct DeviceControlClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl DeviceControlClient {
    pub async fn list_rules(&self, filters: &FilterSpec, mode: PageMode) -> Result<Vec<Record>> {
        self.inner.list(RULES_PATH, filters, mode).await
    }

    pub async fn create_rule(&self, rule: &RuleDefinition) -> Result<Record> {
        rule.validate()?;
        let body = json!({
            "data": rule.data(),
            "filter": rule.scope.body_filter(),
        });
        self.inner.mutate(Method::POST, RULES_PATH, &body).await
    }

    pub async fn update_rule(&self, rule_id: &str, update: &RuleUpdate) -> Result<Record> {
        let rule_id = rule_id.trim();
        if rule_id.is_empty() {
            return Err(Error::Validation(
                ValidationError::new("rule id is required").with_field("updateRuleId"),
            ));
        }
        let body = json!({ "data": update.data()? });
        let path = format!("{RULES_PATH}/{rule_id}");
        self.inner.mutate(Method::PUT, &path, &body).await
    }

    /// Delete rules by a comma-separated ID list.
    pub async fn delete_rules(&self, rule_ids: &str) -> Result<Record> {
        if rule_ids.trim().is_empty() {
            return Err(Error::Validation(
                ValidationError::new("at least one rule id is required")
                    .with_field("deleteRuleIds"),
            ));
        }
        let body = json!({ "filter": { "ids": split_ids(rule_ids) } });
        self.inner.mutate(Method::DELETE, RULES_PATH, &body).await
    }

    pub async fn list_events(&self, filters: &FilterSpec, mode: PageMode) -> Result<Vec<Record>> {
        self.inner.list(EVENTS_PATH, filters, mode).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_rule_data() {
        let rule = RuleDefinition::new(
            "block usb storage",
            RuleMatch::Class(DeviceClass::MassStorage),
            RuleScope::Site("s1, s2".into()),
        );
        assert_eq!(
            rule.data(),
            json!({
                "ruleName": "block usb storage",
                "interface": "USB",
                "action": "Block",
                "ruleType": "class",
                "status": "Enabled",
                "deviceClass": "Mass Storage"
            })
        );
        assert_eq!(
            Value::Object(rule.scope.body_filter()),
            json!({"siteIds": ["s1", "s2"]})
        );
    }

    #[test]
    fn id_rules_skip_blank_ids() {
        let rule = RuleDefinition::new(
            "allow vendor",
            RuleMatch::ProductId {
                vendor_id: "0x1234".into(),
                product_id: String::new(),
            },
            RuleScope::Tenant,
        )
        .with_action(RuleAction::ReadOnly)
        .with_interface(DeviceInterface::Esata);
        let data = rule.data();
        assert_eq!(data["ruleType"], "productId");
        assert_eq!(data["vendorId"], "0x1234");
        assert_eq!(data["action"], "Read-Only");
        assert_eq!(data["interface"], "eSATA");
        assert!(data.get("productId").is_none());
        assert_eq!(
            Value::Object(rule.scope.body_filter()),
            json!({"tenant": true})
        );
    }

    #[test]
    fn bluetooth_rule_carries_version() {
        let rule = RuleDefinition::new(
            "bt",
            RuleMatch::BluetoothVersion("4".into()),
            RuleScope::Group(String::new()),
        )
        .with_interface(DeviceInterface::Bluetooth)
        .with_status(RuleStatus::Disabled);
        let data = rule.data();
        assert_eq!(data["bluetoothVersion"], "4");
        assert_eq!(data["status"], "Disabled");
        assert!(rule.scope.body_filter().is_empty());
    }

    #[test]
    fn update_data_drops_unset_and_blank_fields() {
        let update = RuleUpdate::new()
            .rule_name("renamed")
            .vendor_id("")
            .device_class(DeviceClass::Any);
        assert_eq!(
            update.data().unwrap(),
            json!({"ruleName": "renamed", "deviceClass": "Any"})
        );
        assert_eq!(RuleUpdate::new().data().unwrap(), json!({}));
    }

    #[test]
    fn blank_rule_name_is_rejected() {
        let rule = RuleDefinition::new(" ", RuleMatch::default(), RuleScope::default());
        assert!(matches!(rule.validate(), Err(Error::Validation(_))));
    }
}
