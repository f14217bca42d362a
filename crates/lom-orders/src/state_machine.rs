//! Order and item state machines.
//!
//! # Design
//!
//! Two explicit state machines, one for the order as a whole and one for
//! each item (resource-within-role) of the order. Both are driven by named
//! events. Illegal events return [`TransitionError`] and leave the state
//! untouched.
//!
//! # Order lifecycle
//!
//! ```text
//!   build         start            complete
//!   draft ──► pending ──► in_progress ──► completed (term.)
//!     │          │            │
//!     └──────────┴────────────┴──── cancel ──► cancelled (term.)
//! ```
//!
//! # Item lifecycle
//!
//! ```text
//!            start                complete
//!   pending ──────► in_progress ───────► done
//!      │  └──────────── complete ─────────▲ │
//!      │                 │                  │
//!      └──── unused ─────┴──── unused ──────┴──► unused (absorbing)
//! ```
//!
//! `done → unused` releases a container whose content has since been moved
//! on. The order only *permits* item work; it never cascades into items.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// OrderStatus / OrderEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Pending,
    InProgress,
    /// **Terminal.**
    Completed,
    /// **Terminal.**
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Next status for `event`, or the illegal pair as an error.
    pub fn on(self, event: OrderEvent) -> Result<OrderStatus, TransitionError> {
        use OrderEvent::*;
        use OrderStatus::*;

        let next = match (self, event) {
            (Draft, Build) => Pending,
            (Pending, Start) => InProgress,
            (InProgress, Complete) => Completed,
            (Draft | Pending | InProgress, Cancel) => Cancelled,
            (from, ev) => {
                return Err(TransitionError {
                    from: from.as_str(),
                    event: ev.as_str().to_string(),
                })
            }
        };
        Ok(next)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderEvent {
    Build,
    Start,
    Complete,
    Cancel,
}

impl OrderEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "build" => Some(Self::Build),
            "start" => Some(Self::Start),
            "complete" => Some(Self::Complete),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ItemStatus / ItemEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    InProgress,
    Done,
    /// Absorbing.
    Unused,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Unused => "unused",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            "unused" => Some(Self::Unused),
            _ => None,
        }
    }

    pub fn on(self, event: ItemEvent) -> Result<ItemStatus, TransitionError> {
        use ItemEvent::*;
        use ItemStatus::*;

        let next = match (self, event) {
            (Pending, Start) => InProgress,
            (Pending | InProgress, ItemEvent::Complete) => Done,
            (Pending | InProgress | Done, Unuse) => Unused,
            (from, ev) => {
                return Err(TransitionError {
                    from: from.as_str(),
                    event: ev.as_str().to_string(),
                })
            }
        };
        Ok(next)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemEvent {
    Start,
    Complete,
    /// Wire name `"unused"`.
    Unuse,
}

impl ItemEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Unuse => "unused",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "start" => Some(Self::Start),
            "complete" => Some(Self::Complete),
            "unused" => Some(Self::Unuse),
            _ => None,
        }
    }

    /// Whether the owning order's status allows this event.
    ///
    /// Work events need an `in_progress` order; `unused` is a set-up event
    /// that may also be recorded while the order is still `pending`.
    pub fn permitted_by(&self, order: OrderStatus) -> bool {
        match self {
            Self::Start | Self::Complete => order == OrderStatus::InProgress,
            Self::Unuse => matches!(order, OrderStatus::Pending | OrderStatus::InProgress),
        }
    }
}

// ---------------------------------------------------------------------------
// TransitionError
// ---------------------------------------------------------------------------

/// An event that is not legal from the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    /// Wire name of the state the entity was in.
    pub from: &'static str,
    /// The rejected event name, verbatim.
    pub event: String,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "illegal transition: {} + {}", self.from, self.event)
    }
}

impl std::error::Error for TransitionError {}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_then_start_reaches_in_progress() {
        let s = OrderStatus::Draft.on(OrderEvent::Build).unwrap();
        assert_eq!(s, OrderStatus::Pending);
        let s = s.on(OrderEvent::Start).unwrap();
        assert_eq!(s, OrderStatus::InProgress);
    }

    #[test]
    fn only_build_and_cancel_leave_draft() {
        for ev in [OrderEvent::Start, OrderEvent::Complete] {
            let err = OrderStatus::Draft.on(ev).unwrap_err();
            assert_eq!(err.from, "draft");
            assert_eq!(err.event, ev.as_str());
        }
        assert_eq!(
            OrderStatus::Draft.on(OrderEvent::Cancel),
            Ok(OrderStatus::Cancelled)
        );
    }

    #[test]
    fn terminal_orders_accept_nothing() {
        for s in [OrderStatus::Completed, OrderStatus::Cancelled] {
            assert!(s.is_terminal());
            for ev in [
                OrderEvent::Build,
                OrderEvent::Start,
                OrderEvent::Complete,
                OrderEvent::Cancel,
            ] {
                assert!(s.on(ev).is_err(), "{s} + {} must be illegal", ev.as_str());
            }
        }
    }

    #[test]
    fn complete_requires_in_progress() {
        assert!(OrderStatus::Pending.on(OrderEvent::Complete).is_err());
        assert_eq!(
            OrderStatus::InProgress.on(OrderEvent::Complete),
            Ok(OrderStatus::Completed)
        );
    }

    #[test]
    fn item_start_then_complete() {
        let s = ItemStatus::Pending.on(ItemEvent::Start).unwrap();
        assert_eq!(s, ItemStatus::InProgress);
        assert_eq!(s.on(ItemEvent::Complete), Ok(ItemStatus::Done));
    }

    #[test]
    fn item_complete_directly_from_pending() {
        assert_eq!(
            ItemStatus::Pending.on(ItemEvent::Complete),
            Ok(ItemStatus::Done)
        );
    }

    #[test]
    fn done_item_can_be_released_as_unused() {
        assert_eq!(ItemStatus::Done.on(ItemEvent::Unuse), Ok(ItemStatus::Unused));
    }

    #[test]
    fn unused_is_absorbing() {
        for ev in [ItemEvent::Start, ItemEvent::Complete, ItemEvent::Unuse] {
            assert!(ItemStatus::Unused.on(ev).is_err());
        }
    }

    #[test]
    fn done_item_cannot_restart() {
        let err = ItemStatus::Done.on(ItemEvent::Start).unwrap_err();
        assert_eq!(err.from, "done");
        assert_eq!(err.to_string(), "illegal transition: done + start");
    }

    #[test]
    fn order_gate_for_item_events() {
        assert!(ItemEvent::Start.permitted_by(OrderStatus::InProgress));
        assert!(!ItemEvent::Start.permitted_by(OrderStatus::Pending));
        assert!(!ItemEvent::Complete.permitted_by(OrderStatus::Draft));
        assert!(ItemEvent::Unuse.permitted_by(OrderStatus::Pending));
        assert!(!ItemEvent::Unuse.permitted_by(OrderStatus::Draft));
        assert!(!ItemEvent::Unuse.permitted_by(OrderStatus::Completed));
    }

    #[test]
    fn wire_names_parse() {
        assert_eq!(OrderEvent::parse("build"), Some(OrderEvent::Build));
        assert_eq!(ItemEvent::parse("unused"), Some(ItemEvent::Unuse));
        assert_eq!(ItemStatus::parse("in_progress"), Some(ItemStatus::InProgress));
        assert_eq!(OrderStatus::parse("archived"), None);
    }
}
