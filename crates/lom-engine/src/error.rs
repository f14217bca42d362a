//! Unified error taxonomy.
//!
//! Every domain crate keeps its own small error enum; `LabError` is what
//! callers of the [`Laboratory`](crate::Laboratory) see. Each variant carries
//! the entity reference and the attempted event or value. Nothing here is
//! retried: every error is either bad input or a genuine conflict.

use lom_orders::OrderError;
use lom_registry::RegistryError;
use lom_search::SearchError;
use lom_transfer::{FractionError, LedgerError};

/// Coarse grouping used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The referenced entity does not exist.
    NotFound,
    /// The request is well-formed but conflicts with current state.
    Conflict,
    /// The request itself is malformed.
    Invalid,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LabError {
    /// `entity` is `order <uuid>` or `item <role>/<resource> of order <uuid>`.
    InvalidTransition {
        entity: String,
        from: String,
        event: String,
    },
    OrderNotReady {
        order: String,
        status: String,
        event: String,
    },
    ItemNotFound {
        order: String,
        role: String,
        resource: String,
    },
    InsufficientSource {
        source: String,
        withdrawn: f64,
        requested: f64,
    },
    UnsupportedModel {
        model: String,
    },
    InvalidCriteria {
        path: String,
        reason: String,
    },
    ResourceNotFound {
        uuid: String,
    },
    UnknownResourceKind {
        kind: String,
    },
    DuplicateResource {
        uuid: String,
    },
    OrderNotFound {
        uuid: String,
    },
    SearchNotFound {
        uuid: String,
    },
    InvalidFraction {
        source: String,
        target: String,
        reason: String,
    },
    InvalidTransfer {
        reason: String,
    },
    InvalidOrder {
        reason: String,
    },
    InvalidLabel {
        uuid: String,
        reason: String,
    },
}

impl LabError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::OrderNotReady { .. } => "ORDER_NOT_READY",
            Self::ItemNotFound { .. } => "ITEM_NOT_FOUND",
            Self::InsufficientSource { .. } => "INSUFFICIENT_SOURCE",
            Self::UnsupportedModel { .. } => "UNSUPPORTED_MODEL",
            Self::InvalidCriteria { .. } => "INVALID_CRITERIA",
            Self::ResourceNotFound { .. } => "RESOURCE_NOT_FOUND",
            Self::UnknownResourceKind { .. } => "UNKNOWN_RESOURCE_KIND",
            Self::DuplicateResource { .. } => "DUPLICATE_RESOURCE",
            Self::OrderNotFound { .. } => "ORDER_NOT_FOUND",
            Self::SearchNotFound { .. } => "SEARCH_NOT_FOUND",
            Self::InvalidFraction { .. } => "INVALID_FRACTION",
            Self::InvalidTransfer { .. } => "INVALID_TRANSFER",
            Self::InvalidOrder { .. } => "INVALID_ORDER",
            Self::InvalidLabel { .. } => "INVALID_LABEL",
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ItemNotFound { .. }
            | Self::ResourceNotFound { .. }
            | Self::OrderNotFound { .. }
            | Self::SearchNotFound { .. } => ErrorClass::NotFound,
            Self::InvalidTransition { .. }
            | Self::OrderNotReady { .. }
            | Self::InsufficientSource { .. }
            | Self::DuplicateResource { .. } => ErrorClass::Conflict,
            Self::UnsupportedModel { .. }
            | Self::InvalidCriteria { .. }
            | Self::UnknownResourceKind { .. }
            | Self::InvalidFraction { .. }
            | Self::InvalidTransfer { .. }
            | Self::InvalidOrder { .. }
            | Self::InvalidLabel { .. } => ErrorClass::Invalid,
        }
    }
}

impl std::fmt::Display for LabError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTransition {
                entity,
                from,
                event,
            } => write!(f, "{entity}: event '{event}' is not legal from {from}"),
            Self::OrderNotReady {
                order,
                status,
                event,
            } => write!(f, "order {order} is {status}; '{event}' not permitted"),
            Self::ItemNotFound {
                order,
                role,
                resource,
            } => write!(f, "order {order} has no item {role}/{resource}"),
            Self::InsufficientSource {
                source,
                withdrawn,
                requested,
            } => write!(
                f,
                "source {source} has {withdrawn} withdrawn; {requested} more exceeds its content"
            ),
            Self::UnsupportedModel { model } => write!(f, "unsupported search model '{model}'"),
            Self::InvalidCriteria { path, reason } => {
                let at = if path.is_empty() { "/" } else { path };
                write!(f, "invalid criteria at {at}: {reason}")
            }
            Self::ResourceNotFound { uuid } => write!(f, "resource {uuid} not found"),
            Self::UnknownResourceKind { kind } => write!(f, "unknown resource kind '{kind}'"),
            Self::DuplicateResource { uuid } => write!(f, "resource {uuid} already exists"),
            Self::OrderNotFound { uuid } => write!(f, "order {uuid} not found"),
            Self::SearchNotFound { uuid } => write!(f, "search {uuid} not found"),
            Self::InvalidFraction {
                source,
                target,
                reason,
            } => write!(f, "transfer {source} -> {target}: {reason}"),
            Self::InvalidTransfer { reason } => write!(f, "invalid transfer: {reason}"),
            Self::InvalidOrder { reason } => write!(f, "invalid order: {reason}"),
            Self::InvalidLabel { uuid, reason } => {
                write!(f, "invalid label for resource {uuid}: {reason}")
            }
        }
    }
}

impl std::error::Error for LabError {}

// ---------------------------------------------------------------------------
// Conversions from domain errors
// ---------------------------------------------------------------------------

impl From<RegistryError> for LabError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::UnknownResourceKind { kind } => Self::UnknownResourceKind { kind },
            RegistryError::ResourceNotFound { uuid } => Self::ResourceNotFound { uuid },
            RegistryError::DuplicateResource { uuid } => Self::DuplicateResource { uuid },
            RegistryError::InvalidLabel { uuid, reason } => Self::InvalidLabel { uuid, reason },
        }
    }
}

impl From<OrderError> for LabError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::InvalidTransition { order, from, event } => Self::InvalidTransition {
                entity: format!("order {order}"),
                from: from.to_string(),
                event,
            },
            OrderError::InvalidItemTransition {
                order,
                role,
                resource,
                from,
                event,
            } => Self::InvalidTransition {
                entity: format!("item {role}/{resource} of order {order}"),
                from: from.to_string(),
                event,
            },
            OrderError::OrderNotReady {
                order,
                status,
                event,
            } => Self::OrderNotReady {
                order,
                status: status.to_string(),
                event,
            },
            OrderError::ItemNotFound {
                order,
                role,
                resource,
            } => Self::ItemNotFound {
                order,
                role,
                resource,
            },
            OrderError::InvalidOrder { reason } => Self::InvalidOrder { reason },
        }
    }
}

impl From<SearchError> for LabError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::UnsupportedModel { model } => Self::UnsupportedModel { model },
            SearchError::InvalidCriteria { path, reason } => Self::InvalidCriteria { path, reason },
        }
    }
}

impl From<LedgerError> for LabError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InsufficientSource {
                source,
                withdrawn,
                requested,
            } => Self::InsufficientSource {
                source,
                withdrawn: withdrawn.to_f64(),
                requested: requested.to_f64(),
            },
            other => Self::InvalidTransfer {
                reason: other.to_string(),
            },
        }
    }
}

impl LabError {
    pub(crate) fn fraction(source: &str, target: &str, e: FractionError) -> Self {
        Self::InvalidFraction {
            source: source.to_string(),
            target: target.to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lom_orders::OrderStatus;

    #[test]
    fn item_transition_keeps_entity_and_event() {
        let e: LabError = OrderError::InvalidItemTransition {
            order: "o1".into(),
            role: "Spin".into(),
            resource: "c".into(),
            from: lom_orders::ItemStatus::Unused,
            event: "start".into(),
        }
        .into();
        assert_eq!(e.code(), "INVALID_TRANSITION");
        assert_eq!(
            e.to_string(),
            "item Spin/c of order o1: event 'start' is not legal from unused"
        );
    }

    #[test]
    fn classes_follow_the_taxonomy() {
        let not_ready: LabError = OrderError::OrderNotReady {
            order: "o1".into(),
            status: OrderStatus::Draft,
            event: "start".into(),
        }
        .into();
        assert_eq!(not_ready.class(), ErrorClass::Conflict);
        assert_eq!(
            LabError::SearchNotFound { uuid: "s".into() }.class(),
            ErrorClass::NotFound
        );
        assert_eq!(
            LabError::InvalidCriteria {
                path: "/x".into(),
                reason: "unknown key 'x'".into()
            }
            .class(),
            ErrorClass::Invalid
        );
    }

    #[test]
    fn ledger_shape_errors_become_invalid_transfer() {
        let e: LabError = LedgerError::SelfTransfer {
            resource: "a".into(),
        }
        .into();
        assert_eq!(e.code(), "INVALID_TRANSFER");
    }
}
