//! JSON wire shapes of the lab order API.
//!
//! Shared by the daemon (which serves them) and the client (which sends and
//! decodes them). Plain `Serialize + Deserialize` data; no domain logic.
//! Statuses travel as their snake_case wire names.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Resources: POST /tubes, POST /spin_columns, GET /<uuid>
// ---------------------------------------------------------------------------

/// Creation attributes of a container. Currently none: `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewResourceBody {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTubeRequest {
    pub tube: NewResourceBody,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSpinColumnRequest {
    pub spin_column: NewResourceBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelView {
    pub name: String,
    #[serde(rename = "type")]
    pub label_type: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceView {
    pub uuid: String,
    #[serde(default)]
    pub labels: Vec<LabelView>,
    pub created_at: DateTime<Utc>,
}

/// A resource wrapped under its kind: `{"tube": {...}}` / `{"spin_column": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceEnvelope {
    Tube(ResourceView),
    SpinColumn(ResourceView),
}

impl ResourceEnvelope {
    pub fn view(&self) -> &ResourceView {
        match self {
            Self::Tube(v) | Self::SpinColumn(v) => v,
        }
    }

    pub fn uuid(&self) -> &str {
        &self.view().uuid
    }
}

// ---------------------------------------------------------------------------
// Labels: POST /labellables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelBody {
    pub value: String,
    #[serde(rename = "type")]
    pub label_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabellableBody {
    /// Identifier of the labelled resource.
    pub name: String,
    /// What `name` refers to. Only `"resource"` is accepted.
    #[serde(rename = "type")]
    pub target_type: String,
    /// Label name → `{value, type}`.
    pub labels: BTreeMap<String, LabelBody>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabellableRequest {
    pub labellable: LabellableBody,
}

/// Echo of the labelled resource after the labels were applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabellableResponse {
    pub labellable: LabellableBody,
}

// ---------------------------------------------------------------------------
// Orders: POST /orders, POST /<order_uuid>, GET /<order_uuid>
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UuidRef {
    pub uuid: String,
}

impl UuidRef {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self { uuid: uuid.into() }
    }
}

/// Role name → referenced resources.
pub type RoleRefs = BTreeMap<String, Vec<UuidRef>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBody {
    pub user_uuid: String,
    pub study_uuid: String,
    pub pipeline: String,
    pub cost_code: String,
    #[serde(default)]
    pub sources: RoleRefs,
    #[serde(default)]
    pub targets: RoleRefs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub order: OrderBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEventBody {
    pub event: String,
}

/// Role → resource uuid → event.
pub type ItemEvents = BTreeMap<String, BTreeMap<String, ItemEventBody>>;

/// `{event}`, `{items}` or both. The order event is applied first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemEvents>,
}

impl OrderUpdateRequest {
    pub fn event(name: impl Into<String>) -> Self {
        Self {
            event: Some(name.into()),
            items: None,
        }
    }

    pub fn items<I, R, U, E>(events: I) -> Self
    where
        I: IntoIterator<Item = (R, U, E)>,
        R: Into<String>,
        U: Into<String>,
        E: Into<String>,
    {
        let mut items = ItemEvents::new();
        for (role, uuid, event) in events {
            items.entry(role.into()).or_default().insert(
                uuid.into(),
                ItemEventBody {
                    event: event.into(),
                },
            );
        }
        Self {
            event: None,
            items: Some(items),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemView {
    pub uuid: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub uuid: String,
    pub user_uuid: String,
    pub study_uuid: String,
    pub pipeline: String,
    pub cost_code: String,
    pub status: String,
    pub sources: RoleRefs,
    pub targets: RoleRefs,
    /// Role → items under that role.
    pub items: BTreeMap<String, Vec<ItemView>>,
    pub created_at: DateTime<Utc>,
}

impl OrderView {
    pub fn item_status(&self, role: &str, uuid: &str) -> Option<&str> {
        self.items
            .get(role)?
            .iter()
            .find(|i| i.uuid == uuid)
            .map(|i| i.status.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order: OrderView,
}

// ---------------------------------------------------------------------------
// Transfers: POST /actions/transfer_tubes_to_tubes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferBody {
    pub source_uuid: String,
    pub target_uuid: String,
    pub fraction: f64,
    pub aliquot_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferBatchBody {
    pub transfers: Vec<TransferBody>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub transfer_tubes_to_tubes: TransferBatchBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferView {
    pub seq: u64,
    pub source_uuid: String,
    pub target_uuid: String,
    pub fraction: f64,
    pub aliquot_type: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferResultBody {
    pub transfers: Vec<TransferView>,
    /// Source uuid → fraction left after the batch.
    pub remaining: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferResponse {
    pub transfer_tubes_to_tubes: TransferResultBody,
}

// ---------------------------------------------------------------------------
// Searches: POST /searches, GET /<search_uuid>, GET /<search_uuid>/page=<n>
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchBody {
    #[serde(default)]
    pub description: String,
    pub model: String,
    #[serde(default)]
    pub criteria: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub search: SearchBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchActions {
    pub read: String,
    pub first: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchView {
    pub uuid: String,
    pub description: String,
    pub model: String,
    pub criteria: Value,
    pub actions: SearchActions,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub search: SearchView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageActions {
    pub read: String,
    pub first: String,
    pub last: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// One page of search results: `{size, <plural model>: [{<model>: {...}}], actions}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsPage {
    /// Total hits across all pages.
    pub size: usize,
    #[serde(flatten)]
    pub results: BTreeMap<String, Vec<Value>>,
    pub actions: PageActions,
}

impl ResultsPage {
    /// Entries under `plural` (`"tubes"`, `"orders"`, …).
    pub fn entries(&self, plural: &str) -> &[Value] {
        self.results.get(plural).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Identifiers of every entry on this page, whatever the model.
    pub fn uuids(&self) -> Vec<String> {
        self.results
            .values()
            .flatten()
            .filter_map(|entry| entry.as_object()?.values().next()?.get("uuid")?.as_str())
            .map(str::to_string)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Errors and health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable SCREAMING_SNAKE identifier, e.g. `INSUFFICIENT_SOURCE`.
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_envelope_is_keyed_by_kind() {
        let env = ResourceEnvelope::SpinColumn(ResourceView {
            uuid: "u1".into(),
            labels: vec![],
            created_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        });
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["spin_column"]["uuid"], "u1");

        let back: ResourceEnvelope = serde_json::from_value(v).unwrap();
        assert_eq!(back.uuid(), "u1");
    }

    #[test]
    fn create_tube_body_is_empty_object() {
        let v = serde_json::to_value(CreateTubeRequest::default()).unwrap();
        assert_eq!(v, json!({"tube": {}}));
    }

    #[test]
    fn update_request_omits_absent_parts() {
        let v = serde_json::to_value(OrderUpdateRequest::event("build")).unwrap();
        assert_eq!(v, json!({"event": "build"}));

        let v = serde_json::to_value(OrderUpdateRequest::items([
            ("Spin", "c", "start"),
            ("TubeOut", "b", "start"),
        ]))
        .unwrap();
        assert_eq!(
            v,
            json!({"items": {
                "Spin": {"c": {"event": "start"}},
                "TubeOut": {"b": {"event": "start"}}
            }})
        );
    }

    #[test]
    fn labellable_uses_type_keys() {
        let body: LabellableRequest = serde_json::from_value(json!({
            "labellable": {
                "name": "u1",
                "type": "resource",
                "labels": {"front barcode": {"value": "ABC1234", "type": "sanger-barcode"}}
            }
        }))
        .unwrap();
        assert_eq!(body.labellable.target_type, "resource");
        assert_eq!(
            body.labellable.labels["front barcode"].label_type,
            "sanger-barcode"
        );
    }

    #[test]
    fn results_page_flattens_plural_key() {
        let page: ResultsPage = serde_json::from_value(json!({
            "size": 1,
            "tubes": [{"tube": {"uuid": "t1"}}],
            "actions": {"read": "/s", "first": "/s/page=1", "last": "/s/page=1"}
        }))
        .unwrap();
        assert_eq!(page.entries("tubes").len(), 1);
        assert_eq!(page.uuids(), vec!["t1"]);
        assert!(page.actions.next.is_none());

        let v = serde_json::to_value(&page).unwrap();
        assert_eq!(v["tubes"][0]["tube"]["uuid"], "t1");
        assert!(v["actions"].get("previous").is_none());
    }

    #[test]
    fn search_body_criteria_defaults_to_null() {
        let body: SearchBody = serde_json::from_value(json!({"model": "tube"})).unwrap();
        assert_eq!(body.criteria, Value::Null);
        assert_eq!(body.description, "");
    }
}
