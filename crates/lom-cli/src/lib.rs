//! `lom` client: the scripted extraction workflow over the lab order API.
//!
//! The transport is a trait so the same [`Workflow`] drives a real server
//! over HTTP, an in-process router in tests, or nothing at all (dry mode).

pub mod transport;
pub mod workflow;

pub use transport::{ApiTransport, HttpTransport, TransportFailure};
pub use workflow::{SearchOutcome, Workflow, WorkflowReport, PLACEHOLDERS};
