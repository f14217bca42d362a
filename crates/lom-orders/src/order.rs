//! Order aggregate: declared sources/targets, derived items, and the
//! event-application boundary.
//!
//! # Invariants
//!
//! 1. `sources` and `targets` are fixed at creation. Only the order status
//!    and item statuses mutate afterwards.
//! 2. One item exists per `(role, resource)` pair; the pair is unique across
//!    sources and targets.
//! 3. [`Order::apply_update`] is all-or-nothing: the order event and every
//!    item event are applied to a working copy that replaces the live state
//!    only when all of them succeed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state_machine::{ItemEvent, ItemStatus, OrderEvent, OrderStatus};

/// Role name → referenced resource identifiers.
pub type RoleMap = BTreeMap<String, Vec<String>>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// The order event is not legal from the order's current status.
    InvalidTransition {
        order: String,
        from: OrderStatus,
        event: String,
    },
    /// The item event is not legal from the item's current status.
    InvalidItemTransition {
        order: String,
        role: String,
        resource: String,
        from: ItemStatus,
        event: String,
    },
    /// The order's status does not permit this item event.
    OrderNotReady {
        order: String,
        status: OrderStatus,
        event: String,
    },
    /// No item is declared under this `(role, resource)` pair.
    ItemNotFound {
        order: String,
        role: String,
        resource: String,
    },
    /// The creation request is malformed.
    InvalidOrder { reason: String },
}

impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTransition { order, from, event } => {
                write!(f, "order {order}: illegal transition {from} + {event}")
            }
            Self::InvalidItemTransition {
                order,
                role,
                resource,
                from,
                event,
            } => write!(
                f,
                "order {order}: item {role}/{resource} illegal transition {from} + {event}"
            ),
            Self::OrderNotReady {
                order,
                status,
                event,
            } => write!(
                f,
                "order {order} is {status}; item event '{event}' not permitted"
            ),
            Self::ItemNotFound {
                order,
                role,
                resource,
            } => write!(f, "order {order}: no item {role}/{resource}"),
            Self::InvalidOrder { reason } => write!(f, "invalid order: {reason}"),
        }
    }
}

impl std::error::Error for OrderError {}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemSide {
    Source,
    Target,
}

/// One resource playing one role within one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub role: String,
    pub resource: String,
    pub side: ItemSide,
    pub status: ItemStatus,
}

/// A single requested item event, as carried by a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemEventSpec {
    pub role: String,
    pub resource: String,
    pub event: String,
}

impl ItemEventSpec {
    pub fn new(
        role: impl Into<String>,
        resource: impl Into<String>,
        event: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            resource: resource.into(),
            event: event.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemChange {
    pub role: String,
    pub resource: String,
    pub from: ItemStatus,
    pub to: ItemStatus,
}

/// Committed effect of one [`Order::apply_update`] call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderUpdate {
    /// `(from, to)` when an order event was applied.
    pub order_change: Option<(OrderStatus, OrderStatus)>,
    pub item_changes: Vec<ItemChange>,
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// Creation request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewOrder {
    pub user_uuid: String,
    pub study_uuid: String,
    pub pipeline: String,
    pub cost_code: String,
    pub sources: RoleMap,
    pub targets: RoleMap,
}

impl NewOrder {
    /// Every `(role, resource)` pair, sources first, in role order.
    pub fn declared_pairs(&self) -> impl Iterator<Item = (ItemSide, &str, &str)> {
        let src = self.sources.iter().flat_map(|(role, ids)| {
            ids.iter()
                .map(move |id| (ItemSide::Source, role.as_str(), id.as_str()))
        });
        let tgt = self.targets.iter().flat_map(|(role, ids)| {
            ids.iter()
                .map(move |id| (ItemSide::Target, role.as_str(), id.as_str()))
        });
        src.chain(tgt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    uuid: String,
    user_uuid: String,
    study_uuid: String,
    pipeline: String,
    cost_code: String,
    sources: RoleMap,
    targets: RoleMap,
    status: OrderStatus,
    items: Vec<Item>,
    seq: u64,
    created_at: DateTime<Utc>,
}

impl Order {
    /// Validate the request and build a `draft` order with all items `pending`.
    ///
    /// Resource existence is the caller's concern; this only checks shape.
    pub fn create(
        uuid: impl Into<String>,
        seq: u64,
        created_at: DateTime<Utc>,
        req: NewOrder,
    ) -> Result<Self, OrderError> {
        if req.pipeline.trim().is_empty() {
            return Err(OrderError::InvalidOrder {
                reason: "pipeline must not be empty".to_string(),
            });
        }

        let mut items: Vec<Item> = Vec::new();
        for (side, role, resource) in req.declared_pairs() {
            if role.trim().is_empty() {
                return Err(OrderError::InvalidOrder {
                    reason: "role name must not be empty".to_string(),
                });
            }
            if items.iter().any(|i| i.role == role && i.resource == resource) {
                return Err(OrderError::InvalidOrder {
                    reason: format!("resource {resource} declared twice under role {role}"),
                });
            }
            items.push(Item {
                role: role.to_string(),
                resource: resource.to_string(),
                side,
                status: ItemStatus::Pending,
            });
        }

        Ok(Self {
            uuid: uuid.into(),
            user_uuid: req.user_uuid,
            study_uuid: req.study_uuid,
            pipeline: req.pipeline,
            cost_code: req.cost_code,
            sources: req.sources,
            targets: req.targets,
            status: OrderStatus::Draft,
            items,
            seq,
            created_at,
        })
    }

    // -----------------------------------------------------------------------
    // Read surface
    // -----------------------------------------------------------------------

    pub fn uuid(&self) -> &str {
        &self.uuid
    }
    pub fn user_uuid(&self) -> &str {
        &self.user_uuid
    }
    pub fn study_uuid(&self) -> &str {
        &self.study_uuid
    }
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }
    pub fn cost_code(&self) -> &str {
        &self.cost_code
    }
    pub fn sources(&self) -> &RoleMap {
        &self.sources
    }
    pub fn targets(&self) -> &RoleMap {
        &self.targets
    }
    pub fn status(&self) -> OrderStatus {
        self.status
    }
    pub fn items(&self) -> &[Item] {
        &self.items
    }
    pub fn seq(&self) -> u64 {
        self.seq
    }
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn item(&self, role: &str, resource: &str) -> Option<&Item> {
        self.items
            .iter()
            .find(|i| i.role == role && i.resource == resource)
    }

    /// Items (any role) referencing `resource`.
    pub fn items_for<'a>(&'a self, resource: &'a str) -> impl Iterator<Item = &'a Item> + 'a {
        self.items.iter().filter(move |i| i.resource == resource)
    }

    pub fn involves(&self, resource: &str) -> bool {
        self.items.iter().any(|i| i.resource == resource)
    }

    // -----------------------------------------------------------------------
    // Write surface
    // -----------------------------------------------------------------------

    /// Apply a named order event. Unknown names are illegal from every state.
    pub fn apply_event(&mut self, event: &str) -> Result<OrderStatus, OrderError> {
        let update = self.apply_update(Some(event), &[])?;
        Ok(update
            .order_change
            .map(|(_, to)| to)
            .unwrap_or(self.status))
    }

    /// Apply a batch of item events atomically.
    pub fn apply_item_events(
        &mut self,
        batch: &[ItemEventSpec],
    ) -> Result<Vec<ItemChange>, OrderError> {
        Ok(self.apply_update(None, batch)?.item_changes)
    }

    /// Apply an optional order event followed by an item batch, all-or-nothing.
    ///
    /// On error `self` is left exactly as it was.
    pub fn apply_update(
        &mut self,
        event: Option<&str>,
        batch: &[ItemEventSpec],
    ) -> Result<OrderUpdate, OrderError> {
        let mut work_status = self.status;
        let mut work_items = self.items.clone();
        let mut update = OrderUpdate::default();

        if let Some(name) = event {
            let next = OrderEvent::parse(name)
                .ok_or(())
                .and_then(|ev| work_status.on(ev).map_err(|_| ()))
                .map_err(|_| OrderError::InvalidTransition {
                    order: self.uuid.clone(),
                    from: work_status,
                    event: name.to_string(),
                })?;
            update.order_change = Some((work_status, next));
            work_status = next;
        }

        for spec in batch {
            let change = self.step_item(work_status, &mut work_items, spec)?;
            update.item_changes.push(change);
        }

        self.status = work_status;
        self.items = work_items;
        Ok(update)
    }

    fn step_item(
        &self,
        order_status: OrderStatus,
        items: &mut [Item],
        spec: &ItemEventSpec,
    ) -> Result<ItemChange, OrderError> {
        let item = items
            .iter_mut()
            .find(|i| i.role == spec.role && i.resource == spec.resource)
            .ok_or_else(|| OrderError::ItemNotFound {
                order: self.uuid.clone(),
                role: spec.role.clone(),
                resource: spec.resource.clone(),
            })?;

        let illegal = || OrderError::InvalidItemTransition {
            order: self.uuid.clone(),
            role: spec.role.clone(),
            resource: spec.resource.clone(),
            from: item.status,
            event: spec.event.clone(),
        };

        let Some(event) = ItemEvent::parse(&spec.event) else {
            return Err(illegal());
        };

        if !event.permitted_by(order_status) {
            return Err(OrderError::OrderNotReady {
                order: self.uuid.clone(),
                status: order_status,
                event: spec.event.clone(),
            });
        }

        let next = item.status.on(event).map_err(|_| illegal())?;
        let change = ItemChange {
            role: spec.role.clone(),
            resource: spec.resource.clone(),
            from: item.status,
            to: next,
        };
        item.status = next;
        Ok(change)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
