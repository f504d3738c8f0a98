use serde::{Deserialize, Serialize};

use crate::enums::InstigationStrategy;
use crate::link::LinkRef;
use crate::property::PropertyList;

/// A function within a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
  pub name: String,
  /// Type name loaded through the type loader, e.g. "billing.Charge"
  pub function_type: String,
  /// Explicit responsible team. Auto-wired or defaulted when absent.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub team: Option<String>,
  #[serde(default)]
  pub flows: Vec<FlowDef>,
  /// Function to continue with once this function (and its sequential flows) complete.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub next: Option<LinkRef>,
  #[serde(default)]
  pub objects: Vec<ObjectDef>,
  #[serde(default)]
  pub escalations: Vec<EscalationDef>,
  #[serde(default)]
  pub governances: Vec<String>,
  #[serde(default)]
  pub pre_administration: Vec<String>,
  #[serde(default)]
  pub post_administration: Vec<String>,
  #[serde(default, skip_serializing_if = "PropertyList::is_empty")]
  pub properties: PropertyList,
}

impl FunctionDef {
  /// Function of the given type with nothing else configured.
  pub fn new(name: impl Into<String>, function_type: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      function_type: function_type.into(),
      team: None,
      flows: Vec::new(),
      next: None,
      objects: Vec::new(),
      escalations: Vec::new(),
      governances: Vec::new(),
      pre_administration: Vec::new(),
      post_administration: Vec::new(),
      properties: PropertyList::new(),
    }
  }
}

/// Configuration of a flow declared by the function's type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDef {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target: Option<LinkRef>,
  #[serde(default)]
  pub strategy: InstigationStrategy,
}

/// Configuration of an object (dependency) declared by the function's type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDef {
  pub name: String,
  /// Name of the office resource. Auto-wired when absent.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub resource: Option<String>,
}

/// Configuration of an escalation declared by the function's type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationDef {
  pub error_type: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target: Option<LinkRef>,
}
