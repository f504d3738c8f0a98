use serde::{Deserialize, Serialize};

use crate::auto_wire::AutoWire;
use crate::property::PropertyList;

/// A worker pool that executes the functions it is responsible for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamDef {
  pub name: String,
  /// Type name loaded through the type loader, e.g. "plexus.team.fixed"
  pub team_type: String,
  /// Number of workers. Required when the team type requires sizing.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub size: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub oversight: Option<String>,
  /// Dependency types this team is responsible for when auto-wiring.
  #[serde(default)]
  pub type_qualifications: Vec<AutoWire>,
  #[serde(default, skip_serializing_if = "PropertyList::is_empty")]
  pub properties: PropertyList,
}

impl TeamDef {
  pub fn new(name: impl Into<String>, team_type: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      team_type: team_type.into(),
      size: None,
      oversight: None,
      type_qualifications: Vec::new(),
      properties: PropertyList::new(),
    }
  }
}

/// Observer of the work assigned to the teams linked to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OversightDef {
  pub name: String,
}
