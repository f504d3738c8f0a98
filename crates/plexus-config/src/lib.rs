//! Plexus Config
//!
//! This crate contains the serializable office configuration types for plexus.
//! These types represent an office before it is loaded, linked and compiled
//! into immutable runtime metadata.
//!
//! Configuration is loaded from JSON files (via the CLI) or built in code by a
//! hosting layer. The compiler takes these types, loads the referenced types
//! through a type loader, links the named references and reports every
//! inconsistency as an issue.

mod auto_wire;
mod enums;
mod function;
mod link;
mod office;
mod property;
mod resource;
mod section;
mod team;

pub use auto_wire::AutoWire;
pub use enums::{InstigationStrategy, ResourceScope};
pub use function::{EscalationDef, FlowDef, FunctionDef, ObjectDef};
pub use link::LinkRef;
pub use office::{
  AdministrationDef, ExecutionStrategyDef, GovernanceDef, OfficeDef, OfficeEscalationDef,
  PropertyOverride,
};
pub use property::{Property, PropertyList};
pub use resource::{
  ResourceDef, ResourceDependencyDef, ResourceSourceDef, SourceFlowDef, SourceStrategyDef,
};
pub use section::{SectionDef, SectionInputDef, SectionOutputDef};
pub use team::{OversightDef, TeamDef};
