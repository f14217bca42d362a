//! Axum router and all HTTP handlers for lom-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Scenario tests in `tests/` compose the bare router.
//!
//! | Method | Path                                | Effect                      |
//! |--------|-------------------------------------|-----------------------------|
//! | GET    | `/health`                           | liveness                    |
//! | GET    | `/events`                           | SSE change feed             |
//! | POST   | `/tubes`, `/spin_columns`           | create a container          |
//! | POST   | `/labellables`                      | attach labels               |
//! | POST   | `/orders`                           | create an order             |
//! | POST   | `/actions/transfer_tubes_to_tubes`  | record a transfer batch     |
//! | POST   | `/searches`                         | store a search              |
//! | POST   | `/<order uuid>`                     | order event and/or items    |
//! | GET    | `/<uuid>`                           | resource, order or search   |
//! | GET    | `/<search uuid>/page=<n>`           | one page of results         |

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use lom_engine::{Label, LabError, LabEvent, Located};
use lom_schemas::{
    CreateOrderRequest, CreateSpinColumnRequest, CreateTubeRequest, HealthResponse,
    LabellableRequest, LabellableResponse, OrderResponse, OrderUpdateRequest, SearchRequest,
    SearchResponse, TransferRequest, TransferResponse,
};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::{
    api_types::{
        item_events, new_order, order_view, resource_envelope, results_page, search_view,
        transfer_requests, transfer_result, ApiError,
    },
    state::AppState,
};

/// The only `type` a labellable may carry.
const LABELLABLE_RESOURCE: &str = "resource";

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/events", get(events))
        .route("/tubes", post(create_tube))
        .route("/spin_columns", post(create_spin_column))
        .route("/labellables", post(create_labellable))
        .route("/orders", post(create_order))
        .route("/actions/transfer_tubes_to_tubes", post(transfer_tubes_to_tubes))
        .route("/searches", post(create_search))
        .route("/:uuid", get(read_entity).post(update_order))
        .route("/:uuid/:page", get(read_page))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

pub(crate) async fn create_tube(
    State(st): State<Arc<AppState>>,
    body: Result<Json<CreateTubeRequest>, JsonRejection>,
) -> ApiResult<lom_schemas::ResourceEnvelope> {
    body?;
    let resource = st.lab.create_resource("tube").await?;
    Ok(Json(resource_envelope(&resource)))
}

pub(crate) async fn create_spin_column(
    State(st): State<Arc<AppState>>,
    body: Result<Json<CreateSpinColumnRequest>, JsonRejection>,
) -> ApiResult<lom_schemas::ResourceEnvelope> {
    body?;
    let resource = st.lab.create_resource("spin_column").await?;
    Ok(Json(resource_envelope(&resource)))
}

pub(crate) async fn create_labellable(
    State(st): State<Arc<AppState>>,
    body: Result<Json<LabellableRequest>, JsonRejection>,
) -> ApiResult<LabellableResponse> {
    let Json(LabellableRequest { labellable }) = body?;
    if labellable.target_type != LABELLABLE_RESOURCE {
        return Err(LabError::InvalidLabel {
            uuid: labellable.name,
            reason: format!(
                "labellable type must be '{LABELLABLE_RESOURCE}', got '{}'",
                labellable.target_type
            ),
        }
        .into());
    }

    let labels = labellable
        .labels
        .iter()
        .map(|(name, body)| {
            Label::new(
                name.as_str(),
                body.label_type.as_str(),
                body.value.as_str(),
            )
        })
        .collect();
    st.lab.attach_labels(&labellable.name, labels).await?;
    Ok(Json(LabellableResponse { labellable }))
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

pub(crate) async fn create_order(
    State(st): State<Arc<AppState>>,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> ApiResult<OrderResponse> {
    let Json(CreateOrderRequest { order }) = body?;
    let order = st.lab.create_order(new_order(order)).await?;
    Ok(Json(OrderResponse {
        order: order_view(&order),
    }))
}

/// `{event}` applies an order event, `{items}` a batch of item events;
/// both together are applied event first, all-or-nothing.
pub(crate) async fn update_order(
    State(st): State<Arc<AppState>>,
    Path(uuid): Path<String>,
    body: Result<Json<OrderUpdateRequest>, JsonRejection>,
) -> ApiResult<OrderResponse> {
    let Json(update) = body?;
    if update.event.is_none() && update.items.is_none() {
        return Err(LabError::InvalidOrder {
            reason: "update carries neither 'event' nor 'items'".to_string(),
        }
        .into());
    }

    let batch = update.items.map(item_events).unwrap_or_default();
    let order = st
        .lab
        .update_order(&uuid, update.event.as_deref(), &batch)
        .await?;
    Ok(Json(OrderResponse {
        order: order_view(&order),
    }))
}

// ---------------------------------------------------------------------------
// POST /actions/transfer_tubes_to_tubes
// ---------------------------------------------------------------------------

pub(crate) async fn transfer_tubes_to_tubes(
    State(st): State<Arc<AppState>>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> ApiResult<TransferResponse> {
    let Json(req) = body?;
    let outcome = st
        .lab
        .transfer_all(transfer_requests(req.transfer_tubes_to_tubes.transfers))
        .await?;
    Ok(Json(TransferResponse {
        transfer_tubes_to_tubes: transfer_result(&outcome),
    }))
}

// ---------------------------------------------------------------------------
// Searches
// ---------------------------------------------------------------------------

pub(crate) async fn create_search(
    State(st): State<Arc<AppState>>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<SearchResponse> {
    let Json(SearchRequest { search }) = body?;
    let stored = st
        .lab
        .create_search(&search.model, &search.description, search.criteria)
        .await?;
    Ok(Json(SearchResponse {
        search: search_view(&stored),
    }))
}

pub(crate) async fn read_page(
    State(st): State<Arc<AppState>>,
    Path((uuid, segment)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let Some(page) = lom_engine::parse_page_segment(&segment) else {
        return Err(ApiError::NotFound(format!("/{uuid}/{segment}")));
    };
    let results = st.lab.fetch_results(&uuid, page).await?;
    Ok(Json(results_page(&results)).into_response())
}

// ---------------------------------------------------------------------------
// GET /<uuid>
// ---------------------------------------------------------------------------

pub(crate) async fn read_entity(
    State(st): State<Arc<AppState>>,
    Path(uuid): Path<String>,
) -> Result<Response, ApiError> {
    let resp = match st.lab.locate(&uuid).await {
        Some(Located::Resource(r)) => Json(resource_envelope(&r)).into_response(),
        Some(Located::Order(o)) => Json(OrderResponse {
            order: order_view(&o),
        })
        .into_response(),
        Some(Located::Search(s)) => Json(SearchResponse {
            search: search_view(&s),
        })
        .into_response(),
        None => return Err(ApiError::NotFound(format!("/{uuid}"))),
    };
    Ok(resp)
}

// ---------------------------------------------------------------------------
// GET /events  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn events(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.lab.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<LabEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(ev) => {
                let data = serde_json::to_string(&ev).ok()?;
                Some(Ok(Event::default().event(ev.name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
