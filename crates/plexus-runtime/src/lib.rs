//! Plexus Runtime
//!
//! Executes a compiled [`OfficeMeta`](plexus_office::OfficeMeta). Logic is
//! registered with a [`RuntimeBuilder`] by type name and bound to the
//! metadata through the [`OfficeBuilder`](plexus_office::OfficeBuilder) seam.
//!
//! Each invocation of the resulting [`Office`] is a process: functions run on
//! their responsible team, flows are instigated sequentially, in parallel or
//! asynchronously, and escalations are handled by the function or office
//! handler compiled for them.

mod builder;
mod error;
mod escalation;
mod logic;
mod office;
mod source;
mod team;

pub use builder::RuntimeBuilder;
pub use error::{BuildError, RuntimeError};
pub use escalation::Escalation;
pub use logic::{
  Administration, AdministrationContext, AdministrationPhase, FunctionContext, Governance,
  Instance, ManagedFunction,
};
pub use office::{InvokeResult, Office, ProcessOutput};
pub use source::{ExecutionStrategy, FlowInvoker, ResourceSource, SourceContext, SourceRequest};
pub use team::{
  FixedTeam, Job, JobEvent, JobEventKind, JobFailure, Oversight, PassiveTeam, SpawnTeam, Team,
  TeamFactory,
};
