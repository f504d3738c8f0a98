//! Plexus Type Loader
//!
//! Resolves a type name to the capabilities it declares (flows, objects,
//! escalations, execution strategy slots, required properties) without
//! executing any logic. The compiler loads every type referenced by an office
//! through a [`TypeLoader`] before linking.

mod builtin;
mod error;
mod fs_loader;
mod loader;
mod manifest;
mod memory;

pub use builtin::{
  ANY_TYPE, FIXED_TEAM, PASSIVE_TEAM, RECYCLE_PARAMETER_TYPE, SPAWN_TEAM, builtin_type,
  is_assignable,
};
pub use error::LoadError;
pub use fs_loader::FsTypeLoader;
pub use loader::TypeLoader;
pub use manifest::{
  AdministrationType, DependencyType, EscalationType, FlowType, FunctionType, GovernanceType,
  ObjectType, ResourceSourceType, SourceFunctionType, TeamType, TypeManifest,
};
pub use memory::InMemoryTypeLoader;
