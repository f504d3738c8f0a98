use serde::{Deserialize, Serialize};

/// A named reference to a link target, resolved within a scope.
///
/// Links configured on a function resolve within the function's section.
/// Links configured on a section output resolve within the parent scope (the
/// enclosing section, or the office for top-level sections).
///
/// ```json
/// { "function": "validate" }
/// { "output": "failed" }
/// { "input": { "section": "billing", "input": "charge" } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkRef {
  /// A function of the scope's section.
  Function(String),
  /// An output of the scope's section.
  Output(String),
  /// An input of a child section of the scope.
  Input { section: String, input: String },
}
