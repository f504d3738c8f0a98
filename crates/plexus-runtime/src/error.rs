//! Runtime error types.

/// Errors populating the runtime from compiled metadata.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
  /// No logic registered for the type.
  #[error("no {kind} registered for type '{type_name}'")]
  UnregisteredType { kind: &'static str, type_name: String },

  /// Resource source does not provide a function it declared.
  #[error("resource source '{source_name}' does not provide function '{function}'")]
  MissingSourceFunction { source_name: String, function: String },

  /// Metadata refers to something not built yet.
  #[error("{kind} '{name}' referenced before it was built")]
  UnknownReference { kind: &'static str, name: String },

  /// Team could not be created from its metadata.
  #[error("invalid team '{team}': {message}")]
  InvalidTeam { team: String, message: String },
}

/// Errors that can occur while executing an office.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
  /// Office has been closed.
  #[error("office closed")]
  Closed,

  /// Invoked name is neither an entry point nor a function.
  #[error("unknown function '{name}'")]
  UnknownFunction { name: String },

  /// Function requested a flow its type does not declare.
  #[error("function '{function}' has no flow '{flow}'")]
  UnknownFlow { function: String, flow: String },

  /// Escalation reached the office with no office handler.
  #[error("escalation '{error_type}' not handled: {message}")]
  Escalated {
    error_type: String,
    message: String,
    payload: serde_json::Value,
  },

  /// Escalation type not compiled for the function.
  #[error("function '{function}' raised escalation '{error_type}' it does not declare")]
  UnhandledEscalation { function: String, error_type: String },

  /// Sourcing the resource took longer than its source allows.
  #[error("timed out sourcing resource '{resource}' after {timeout_ms}ms")]
  ResourceTimeout { resource: String, timeout_ms: u64 },

  /// Resource source failed to provide an instance.
  #[error("failed to source resource '{resource}': {message}")]
  ResourceFailed { resource: String, message: String },

  /// Input resource required but not supplied by its source.
  #[error("input resource '{resource}' not supplied")]
  InputResourceMissing { resource: String },

  /// Job of a team did not complete.
  #[error("job for function '{function}' failed: {message}")]
  JobFailed { function: String, message: String },

  /// Parallel flow of the process did not complete.
  #[error("parallel flow failed: {message}")]
  ParallelFailed { message: String },
}
