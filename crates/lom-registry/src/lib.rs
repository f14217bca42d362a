//! lom-registry
//!
//! Resource Registry: addressable lab containers and their identifying labels.
//!
//! - Resources are created once and never merged or deleted
//! - Labels are keyed by `(type, name)`; re-attaching replaces the value
//! - Pure deterministic logic (no IO, no clock, no randomness): identifiers
//!   and timestamps are supplied by the caller

mod registry;
mod types;

pub use registry::{Registry, RegistryError};
pub use types::{Label, LabelMatch, Resource, ResourceKind};
