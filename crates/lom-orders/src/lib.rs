//! lom-orders
//!
//! Order workflow engine:
//! - Order state machine (draft → pending → in_progress → completed | cancelled)
//! - Item state machine (pending → in_progress → done | unused)
//! - The order status gates which item events are legal
//! - Batched item events are all-or-nothing
//! - Pure deterministic logic (no IO, no clock, no locks)

pub mod order;
pub mod state_machine;

pub use order::{
    Item, ItemChange, ItemEventSpec, ItemSide, NewOrder, Order, OrderError, OrderUpdate, RoleMap,
};
pub use state_machine::{ItemEvent, ItemStatus, OrderEvent, OrderStatus, TransitionError};
