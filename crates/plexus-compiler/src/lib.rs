//! Plexus Compiler
//!
//! Compiles an [`OfficeDef`](plexus_config::OfficeDef) into immutable
//! [`OfficeMeta`](plexus_office::OfficeMeta):
//!
//! 1. Load every referenced type through the type loader
//! 2. Declare the configuration as a node tree (duplicates are reported)
//! 3. Link named references within their scopes
//! 4. Validate teams and office-wide elements
//! 5. Phase one of resource binding: resources wait on their source
//! 6. Compile functions: flows, objects, escalations, governance, team
//! 7. Phase two of resource binding: recycle function, strategies, flows
//!
//! Problems never abort the compile. They are reported to the issue sink and
//! the affected function or binding is left out of the metadata.

mod compiler;
mod declare;
mod error;
mod function;
mod office;
mod resource;
mod types;

pub use compiler::Compiler;
pub use error::CompileError;
