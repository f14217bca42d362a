//! Conversions between engine values and the JSON wire shapes in
//! `lom-schemas`, plus the HTTP error mapping.
//!
//! Handlers in `routes.rs` stay thin: decode, call the [`Laboratory`],
//! convert with the functions here.
//!
//! [`Laboratory`]: lom_engine::Laboratory

use std::collections::BTreeMap;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lom_engine::{
    Entity, ErrorClass, ItemEventSpec, LabError, NewOrder, Order, Resource, ResourceKind,
    ResultPage, RoleMap, Search, TransferOutcome, TransferRecord, TransferRequest,
};
use lom_schemas::{
    ErrorResponse, ItemEvents, ItemView, LabelView, OrderBody, OrderView, PageActions,
    ResourceEnvelope, ResourceView, ResultsPage, RoleRefs, SearchActions, SearchView,
    TransferBody, TransferResultBody, TransferView, UuidRef,
};
use serde_json::{json, Map, Value};

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

pub fn resource_view(r: &Resource) -> ResourceView {
    ResourceView {
        uuid: r.uuid.clone(),
        labels: r
            .labels()
            .iter()
            .map(|l| LabelView {
                name: l.name.clone(),
                label_type: l.label_type.clone(),
                value: l.value.clone(),
            })
            .collect(),
        created_at: r.created_at,
    }
}

/// `{"tube": {...}}` or `{"spin_column": {...}}`.
pub fn resource_envelope(r: &Resource) -> ResourceEnvelope {
    match r.kind {
        ResourceKind::Tube => ResourceEnvelope::Tube(resource_view(r)),
        ResourceKind::SpinColumn => ResourceEnvelope::SpinColumn(resource_view(r)),
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

fn role_refs(map: &RoleMap) -> RoleRefs {
    map.iter()
        .map(|(role, ids)| (role.clone(), ids.iter().map(UuidRef::new).collect()))
        .collect()
}

fn role_map(refs: RoleRefs) -> RoleMap {
    refs.into_iter()
        .map(|(role, ids)| (role, ids.into_iter().map(|r| r.uuid).collect()))
        .collect()
}

pub fn new_order(body: OrderBody) -> NewOrder {
    NewOrder {
        user_uuid: body.user_uuid,
        study_uuid: body.study_uuid,
        pipeline: body.pipeline,
        cost_code: body.cost_code,
        sources: role_map(body.sources),
        targets: role_map(body.targets),
    }
}

/// Flatten `{role: {uuid: {event}}}` into a batch.
pub fn item_events(items: ItemEvents) -> Vec<ItemEventSpec> {
    items
        .into_iter()
        .flat_map(|(role, by_uuid)| {
            by_uuid
                .into_iter()
                .map(move |(uuid, body)| ItemEventSpec::new(role.clone(), uuid, body.event))
        })
        .collect()
}

pub fn order_view(o: &Order) -> OrderView {
    let mut items: BTreeMap<String, Vec<ItemView>> = BTreeMap::new();
    for item in o.items() {
        items.entry(item.role.clone()).or_default().push(ItemView {
            uuid: item.resource.clone(),
            status: item.status.as_str().to_string(),
        });
    }
    OrderView {
        uuid: o.uuid().to_string(),
        user_uuid: o.user_uuid().to_string(),
        study_uuid: o.study_uuid().to_string(),
        pipeline: o.pipeline().to_string(),
        cost_code: o.cost_code().to_string(),
        status: o.status().as_str().to_string(),
        sources: role_refs(o.sources()),
        targets: role_refs(o.targets()),
        items,
        created_at: o.created_at(),
    }
}

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

pub fn transfer_requests(bodies: Vec<TransferBody>) -> Vec<TransferRequest> {
    bodies
        .into_iter()
        .map(|b| TransferRequest {
            source: b.source_uuid,
            target: b.target_uuid,
            fraction: b.fraction,
            aliquot_type: b.aliquot_type,
        })
        .collect()
}

pub fn transfer_view(rec: &TransferRecord) -> TransferView {
    TransferView {
        seq: rec.seq,
        source_uuid: rec.source.clone(),
        target_uuid: rec.target.clone(),
        fraction: rec.fraction.to_f64(),
        aliquot_type: rec.aliquot_type.clone(),
        recorded_at: rec.recorded_at,
    }
}

pub fn transfer_result(outcome: &TransferOutcome) -> TransferResultBody {
    TransferResultBody {
        transfers: outcome.records.iter().map(transfer_view).collect(),
        remaining: outcome
            .remaining
            .iter()
            .map(|(source, f)| (source.clone(), f.to_f64()))
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Searches
// ---------------------------------------------------------------------------

/// Links are relative to the API root.
pub fn search_link(uuid: &str) -> String {
    format!("/{uuid}")
}

pub fn page_link(uuid: &str, page: usize) -> String {
    format!("/{uuid}/page={page}")
}

pub fn search_view(s: &Search) -> SearchView {
    SearchView {
        uuid: s.uuid().to_string(),
        description: s.description().to_string(),
        model: s.model().as_str().to_string(),
        criteria: s.raw_criteria().clone(),
        actions: SearchActions {
            read: search_link(s.uuid()),
            first: page_link(s.uuid(), 1),
        },
        created_at: s.created_at(),
    }
}

fn entity_json(e: &Entity) -> Value {
    let (key, body) = match e {
        Entity::Resource(r) => (r.kind.as_str(), json!(resource_view(r))),
        Entity::Order(o) => ("order", json!(order_view(o))),
    };
    let mut map = Map::new();
    map.insert(key.to_string(), body);
    Value::Object(map)
}

/// `{size, <plural>: [{<model>: {...}}], actions}`; `size` is the total hit count.
pub fn results_page(page: &ResultPage) -> ResultsPage {
    let uuid = page.search.uuid();
    let info = &page.info;

    let mut results = BTreeMap::new();
    results.insert(
        page.search.model().plural().to_string(),
        page.entities.iter().map(entity_json).collect(),
    );

    ResultsPage {
        size: info.total,
        results,
        actions: PageActions {
            read: page_link(uuid, info.number),
            first: page_link(uuid, 1),
            last: page_link(uuid, info.last),
            previous: info.previous().map(|n| page_link(uuid, n)),
            next: info.next().map(|n| page_link(uuid, n)),
        },
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Every failure a handler can return. Body is always [`ErrorResponse`].
#[derive(Debug)]
pub enum ApiError {
    Lab(LabError),
    /// Path does not name anything.
    NotFound(String),
    /// Body is not JSON or does not have the expected shape.
    BadRequest(String),
}

impl From<LabError> for ApiError {
    fn from(e: LabError) -> Self {
        Self::Lab(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rej: JsonRejection) -> Self {
        Self::BadRequest(rej.body_text())
    }
}

fn status_for(class: ErrorClass) -> StatusCode {
    match class {
        ErrorClass::NotFound => StatusCode::NOT_FOUND,
        ErrorClass::Conflict => StatusCode::CONFLICT,
        ErrorClass::Invalid => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, error) = match self {
            Self::Lab(e) => (status_for(e.class()), e.code(), e.to_string()),
            Self::NotFound(path) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{path} not found"),
            ),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "MALFORMED_BODY", msg),
        };
        (
            status,
            Json(ErrorResponse {
                error,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}
