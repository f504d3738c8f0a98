//! Plexus Node
//!
//! The compile-time node graph. Every configuration element (section,
//! function, flow, object, team, resource, ...) is a [`Node`] in a single
//! arena owned by the [`NodeContext`]. Nodes carry a kind tag, ordered
//! children created on first access, single-slot links and a lazily bound
//! state.
//!
//! Linking and auto-wiring never fail loudly: problems are reported through
//! the [`CompilerIssues`] sink injected into the context and the operation
//! simply yields no result.

mod auto_wire;
mod binder;
mod context;
mod issues;
mod link;
mod node;

pub use auto_wire::{AutoWireMatch, AutoWirer};
pub use binder::Binder;
pub use context::NodeContext;
pub use issues::{CompilerIssues, Issue, IssueTarget, RecordingIssues, TracingIssues};
pub use link::{FurthestTarget, LinkSlot};
pub use node::{Node, NodeId, NodeKind, NodeState};
pub use plexus_config::AutoWire;
