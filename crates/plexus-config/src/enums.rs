use serde::{Deserialize, Serialize};

/// How a flow is instigated relative to the thread of control that requested it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstigationStrategy {
  /// Continues on the instigating thread of control.
  #[default]
  Sequential,
  /// New concurrent thread of control within the same process.
  Parallel,
  /// New process, decoupled from the instigating one.
  Asynchronous,
}

/// Lifetime of a resource instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceScope {
  #[default]
  Process,
  Function,
}
