//! Plexus Office
//!
//! Immutable metadata produced by compiling an office. Every name is resolved:
//! flows point at qualified function names, objects at resources or the
//! invocation parameter, escalations at handler functions or the office, and
//! every function has exactly one responsible team.
//!
//! A hosting runtime consumes the metadata through [`OfficeMeta::build`],
//! which drives an [`OfficeBuilder`]. This is the only point where the
//! compiled graph is written into an execution substrate.

mod builder;
mod meta;

pub use builder::OfficeBuilder;
pub use meta::{
  AdministrationMeta, DependencyMeta, EscalationHandler, EscalationMeta, ExecutionStrategyMeta,
  FlowMeta, FlowTarget, FunctionMeta, GovernanceMeta, ObjectBinding, ObjectMeta,
  OfficeEscalationMeta, OfficeMeta, ResourceMeta, ResourceSourceMeta, ResponsibleTeam,
  SourceFlowMeta, SourceStrategyMeta, TeamMeta,
};
pub use plexus_config::{InstigationStrategy, PropertyList, ResourceScope};
