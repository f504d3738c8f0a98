use serde::{Deserialize, Serialize};

use crate::auto_wire::AutoWire;
use crate::enums::ResourceScope;
use crate::link::LinkRef;
use crate::property::PropertyList;

/// A provider of managed resources.
///
/// A source may instigate flows of its own (pushing work into the office), in
/// which case it must name the input resource through which its instances are
/// visible to the processes it starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSourceDef {
  pub name: String,
  /// Type name loaded through the type loader, e.g. "http.Listener"
  pub source_type: String,
  #[serde(default)]
  pub flows: Vec<SourceFlowDef>,
  #[serde(default)]
  pub execution_strategies: Vec<SourceStrategyDef>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_resource: Option<String>,
  /// Maximum time to wait for an instance to be sourced.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
  #[serde(default, skip_serializing_if = "PropertyList::is_empty")]
  pub properties: PropertyList,
}

impl ResourceSourceDef {
  pub fn new(name: impl Into<String>, source_type: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      source_type: source_type.into(),
      flows: Vec::new(),
      execution_strategies: Vec::new(),
      input_resource: None,
      timeout_ms: None,
      properties: PropertyList::new(),
    }
  }
}

/// Configuration of a flow the source instigates.
///
/// The target resolves in the office scope (an input of a top-level section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFlowDef {
  pub name: String,
  pub target: LinkRef,
}

/// Assignment of an office execution strategy to a source's strategy slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStrategyDef {
  pub name: String,
  pub strategy: String,
}

/// A resource instance binding: what functions depend upon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDef {
  pub name: String,
  /// Name of the resource source providing instances.
  pub source: String,
  #[serde(default)]
  pub scope: ResourceScope,
  /// Instances are supplied by the source when it instigates a flow.
  #[serde(default)]
  pub input: bool,
  /// Additional types this resource satisfies when auto-wiring.
  #[serde(default)]
  pub type_qualifications: Vec<AutoWire>,
  #[serde(default)]
  pub dependencies: Vec<ResourceDependencyDef>,
}

impl ResourceDef {
  pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      source: source.into(),
      scope: ResourceScope::default(),
      input: false,
      type_qualifications: Vec::new(),
      dependencies: Vec::new(),
    }
  }
}

/// Configuration of a dependency declared by the resource source's type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDependencyDef {
  pub name: String,
  /// Name of the office resource. Auto-wired when absent.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub resource: Option<String>,
}
