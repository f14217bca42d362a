//! Criteria trees: parsing, validation and matching predicates.
//!
//! A criteria tree is a JSON object. Top-level keys combine with AND; an
//! empty object matches every entity of the model.
//!
//! ```text
//! tube | spin_column                     order
//! ├── uuid: "…" | ["…", …]               ├── uuid: "…" | ["…", …]
//! ├── label: {type?, value?, name?}      ├── status | pipeline | cost_code
//! └── order                              ├── user_uuid | study_uuid
//!     ├── uuid | status | pipeline …     ├── item: {uuid?, role?, status?}
//!     └── item: {role?, status?}         └── resource: {label: {…}}
//! ```
//!
//! Every rejection carries the JSON-pointer path of the offending node.

use lom_orders::{Item, ItemStatus, Order, OrderStatus};
use lom_registry::{LabelMatch, Resource, ResourceKind};
use serde_json::{Map, Value};

use crate::model::Model;
use crate::search::SearchError;

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criteria {
    Resource {
        kind: ResourceKind,
        criteria: ResourceCriteria,
    },
    Order(OrderCriteria),
}

/// Constraints on an order's own attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFields {
    pub uuids: Option<Vec<String>>,
    pub status: Option<OrderStatus>,
    pub pipeline: Option<String>,
    pub cost_code: Option<String>,
    pub user_uuid: Option<String>,
    pub study_uuid: Option<String>,
}

impl OrderFields {
    pub fn matches(&self, order: &Order) -> bool {
        self.uuids
            .as_ref()
            .map_or(true, |ids| ids.iter().any(|id| id == order.uuid()))
            && self.status.map_or(true, |s| s == order.status())
            && eq_opt(&self.pipeline, order.pipeline())
            && eq_opt(&self.cost_code, order.cost_code())
            && eq_opt(&self.user_uuid, order.user_uuid())
            && eq_opt(&self.study_uuid, order.study_uuid())
    }
}

/// Constraints on a single item. All present keys must hold for the same item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemMatch {
    /// Identifier of the item's resource.
    pub uuids: Option<Vec<String>>,
    pub role: Option<String>,
    pub status: Option<ItemStatus>,
}

impl ItemMatch {
    pub fn matches(&self, item: &Item) -> bool {
        self.uuids
            .as_ref()
            .map_or(true, |ids| ids.iter().any(|id| *id == item.resource))
            && eq_opt(&self.role, &item.role)
            && self.status.map_or(true, |s| s == item.status)
    }
}

/// `order` sub-criteria of a resource search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceOrderCriteria {
    pub fields: OrderFields,
    /// Applies to the searched resource's own item in that order.
    pub item: Option<ItemMatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceCriteria {
    pub uuids: Option<Vec<String>>,
    pub label: Option<LabelMatch>,
    pub order: Option<ResourceOrderCriteria>,
}

impl ResourceCriteria {
    pub fn matches(&self, resource: &Resource, orders: &[Order]) -> bool {
        if let Some(ids) = &self.uuids {
            if !ids.iter().any(|id| *id == resource.uuid) {
                return false;
            }
        }
        if let Some(label) = &self.label {
            if !resource.has_label(label) {
                return false;
            }
        }
        match &self.order {
            None => true,
            Some(oc) => orders.iter().any(|order| {
                oc.fields.matches(order)
                    && order
                        .items_for(&resource.uuid)
                        .any(|item| oc.item.as_ref().map_or(true, |im| im.matches(item)))
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderCriteria {
    pub fields: OrderFields,
    pub item: Option<ItemMatch>,
    /// Some item's resource carries a matching label.
    pub resource_label: Option<LabelMatch>,
}

impl OrderCriteria {
    /// `resource_of` resolves an item's resource identifier.
    pub fn matches<'r, F>(&self, order: &Order, resource_of: F) -> bool
    where
        F: Fn(&str) -> Option<&'r Resource>,
    {
        if !self.fields.matches(order) {
            return false;
        }
        if let Some(im) = &self.item {
            if !order.items().iter().any(|i| im.matches(i)) {
                return false;
            }
        }
        match &self.resource_label {
            None => true,
            Some(label) => order
                .items()
                .iter()
                .filter_map(|i| resource_of(&i.resource))
                .any(|r| r.has_label(label)),
        }
    }
}

fn eq_opt(want: &Option<String>, have: &str) -> bool {
    want.as_deref().map_or(true, |w| w == have)
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse and validate `criteria` for `model`. `null` is the empty tree.
pub fn parse(model: Model, criteria: &Value) -> Result<Criteria, SearchError> {
    let empty = Map::new();
    let root = match criteria {
        Value::Null => &empty,
        other => object(other, "")?,
    };

    match model.resource_kind() {
        Some(kind) => Ok(Criteria::Resource {
            kind,
            criteria: parse_resource(root)?,
        }),
        None => Ok(Criteria::Order(parse_order(root)?)),
    }
}

fn parse_resource(root: &Map<String, Value>) -> Result<ResourceCriteria, SearchError> {
    let mut out = ResourceCriteria::default();
    for (key, value) in root {
        let path = pointer("", key);
        match key.as_str() {
            "uuid" => out.uuids = Some(string_or_list(value, &path)?),
            "label" => out.label = Some(label(value, &path)?),
            "order" => {
                let obj = object(value, &path)?;
                let mut oc = ResourceOrderCriteria::default();
                for (k, v) in obj {
                    let p = pointer(&path, k);
                    if k == "item" {
                        oc.item = Some(item(v, &p, &["role", "status"])?);
                    } else if !order_field(&mut oc.fields, k, v, &p)? {
                        return Err(unknown_key(&path, k));
                    }
                }
                out.order = Some(oc);
            }
            _ => return Err(unknown_key("", key)),
        }
    }
    Ok(out)
}

fn parse_order(root: &Map<String, Value>) -> Result<OrderCriteria, SearchError> {
    let mut out = OrderCriteria::default();
    for (key, value) in root {
        let path = pointer("", key);
        match key.as_str() {
            "item" => out.item = Some(item(value, &path, &["uuid", "role", "status"])?),
            "resource" => {
                let obj = object(value, &path)?;
                if obj.is_empty() {
                    return Err(invalid(&path, "expected at least one key"));
                }
                for (k, v) in obj {
                    match k.as_str() {
                        "label" => out.resource_label = Some(label(v, &pointer(&path, k))?),
                        _ => return Err(unknown_key(&path, k)),
                    }
                }
            }
            _ => {
                if !order_field(&mut out.fields, key, value, &path)? {
                    return Err(unknown_key("", key));
                }
            }
        }
    }
    Ok(out)
}

/// Returns `Ok(false)` when `key` is not an order attribute.
fn order_field(
    fields: &mut OrderFields,
    key: &str,
    value: &Value,
    path: &str,
) -> Result<bool, SearchError> {
    match key {
        "uuid" => fields.uuids = Some(string_or_list(value, path)?),
        "status" => {
            let s = string(value, path)?;
            fields.status = Some(
                OrderStatus::parse(&s)
                    .ok_or_else(|| invalid(path, &format!("unknown order status '{s}'")))?,
            );
        }
        "pipeline" => fields.pipeline = Some(string(value, path)?),
        "cost_code" => fields.cost_code = Some(string(value, path)?),
        "user_uuid" => fields.user_uuid = Some(string(value, path)?),
        "study_uuid" => fields.study_uuid = Some(string(value, path)?),
        _ => return Ok(false),
    }
    Ok(true)
}

fn item(value: &Value, path: &str, allowed: &[&str]) -> Result<ItemMatch, SearchError> {
    let obj = object(value, path)?;
    if obj.is_empty() {
        return Err(invalid(path, "expected at least one key"));
    }
    let mut out = ItemMatch::default();
    for (k, v) in obj {
        let p = pointer(path, k);
        if !allowed.contains(&k.as_str()) {
            return Err(unknown_key(path, k));
        }
        match k.as_str() {
            "uuid" => out.uuids = Some(string_or_list(v, &p)?),
            "role" => out.role = Some(string(v, &p)?),
            "status" => {
                let s = string(v, &p)?;
                out.status = Some(
                    ItemStatus::parse(&s)
                        .ok_or_else(|| invalid(&p, &format!("unknown item status '{s}'")))?,
                );
            }
            _ => return Err(unknown_key(path, k)),
        }
    }
    Ok(out)
}

fn label(value: &Value, path: &str) -> Result<LabelMatch, SearchError> {
    let obj = object(value, path)?;
    let mut out = LabelMatch::default();
    for (k, v) in obj {
        let p = pointer(path, k);
        match k.as_str() {
            "type" => out.label_type = Some(string(v, &p)?),
            "value" => out.value = Some(string(v, &p)?),
            "name" => out.name = Some(string(v, &p)?),
            _ => return Err(unknown_key(path, k)),
        }
    }
    if out.is_empty() {
        return Err(invalid(path, "expected at least one of type, value, name"));
    }
    Ok(out)
}

fn object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, SearchError> {
    value
        .as_object()
        .ok_or_else(|| invalid(path, "expected an object"))
}

fn string(value: &Value, path: &str) -> Result<String, SearchError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(path, "expected a string"))
}

fn string_or_list(value: &Value, path: &str) -> Result<Vec<String>, SearchError> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) if !items.is_empty() => items
            .iter()
            .enumerate()
            .map(|(i, v)| string(v, &pointer(path, &i.to_string())))
            .collect(),
        Value::Array(_) => Err(invalid(path, "expected a non-empty list")),
        _ => Err(invalid(path, "expected a string or a list of strings")),
    }
}

/// Append one reference token to a JSON pointer (RFC 6901 escaping).
fn pointer(base: &str, token: &str) -> String {
    format!("{base}/{}", token.replace('~', "~0").replace('/', "~1"))
}

fn invalid(path: &str, reason: &str) -> SearchError {
    SearchError::InvalidCriteria {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

fn unknown_key(parent: &str, key: &str) -> SearchError {
    SearchError::InvalidCriteria {
        path: pointer(parent, key),
        reason: format!("unknown key '{key}'"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
