//! Change feed: one message per committed state change.
//!
//! Published on a `tokio::sync::broadcast` bus once the change is visible,
//! while the order or source guard that committed it is still held. For any
//! one order or source the feed is therefore in commit order.
//! Nobody listening is not an error, and a lagging subscriber simply misses
//! messages.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LabEvent {
    ResourceCreated {
        uuid: String,
        kind: String,
    },
    LabelsAttached {
        uuid: String,
        /// `type:name` keys that were set.
        labels: Vec<String>,
    },
    OrderCreated {
        uuid: String,
        pipeline: String,
    },
    OrderStatusChanged {
        order: String,
        from: String,
        to: String,
    },
    ItemStatusChanged {
        order: String,
        role: String,
        resource: String,
        from: String,
        to: String,
    },
    TransferRecorded {
        seq: u64,
        source: String,
        target: String,
        fraction: f64,
        aliquot_type: String,
    },
    SearchCreated {
        uuid: String,
        model: String,
    },
}

impl LabEvent {
    /// snake_case variant name, used as the SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ResourceCreated { .. } => "resource_created",
            Self::LabelsAttached { .. } => "labels_attached",
            Self::OrderCreated { .. } => "order_created",
            Self::OrderStatusChanged { .. } => "order_status_changed",
            Self::ItemStatusChanged { .. } => "item_status_changed",
            Self::TransferRecorded { .. } => "transfer_recorded",
            Self::SearchCreated { .. } => "search_created",
        }
    }
}
