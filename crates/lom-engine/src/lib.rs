//! Concurrent lab state: resources, orders, transfers and searches behind
//! one [`Laboratory`] handle.
//!
//! The domain crates are single-threaded and pure; this crate owns every
//! lock, mints identifiers and timestamps, logs, and publishes [`LabEvent`]s.

mod error;
mod events;
mod lab;

pub use error::{ErrorClass, LabError};
pub use events::LabEvent;
pub use lab::{
    Entity, LabConfig, Laboratory, Located, ResultPage, TransferOutcome, TransferRequest,
};

pub use lom_orders::{ItemEventSpec, ItemStatus, NewOrder, Order, OrderStatus, RoleMap};
pub use lom_registry::{Label, LabelMatch, Resource, ResourceKind};
pub use lom_search::{parse_page_segment, Model, PageInfo, Search, DEFAULT_PAGE_SIZE};
pub use lom_transfer::{Fraction, TransferRecord};
