//! Scene module - nodes shared between devices.
//!
//! - [`types`] - peer and node identifiers, node records
//! - [`registry`] - the per-session node container

pub mod registry;
pub mod types;

pub use registry::{NodeRegistry, UpdateOutcome};
pub use types::{Node, NodeKey, NodeKind, NodeOrigin, PeerId};
