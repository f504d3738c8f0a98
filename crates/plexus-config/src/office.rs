use serde::{Deserialize, Serialize};

use crate::link::LinkRef;
use crate::property::PropertyList;
use crate::resource::{ResourceDef, ResourceSourceDef};
use crate::section::SectionDef;
use crate::team::{OversightDef, TeamDef};

/// Office definition - the unit that is compiled and executed.
///
/// Sections hold the functions. Teams, resources, governances, administrations
/// and execution strategies are office-wide and referenced by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfficeDef {
  pub name: String,
  #[serde(default)]
  pub sections: Vec<SectionDef>,
  #[serde(default)]
  pub teams: Vec<TeamDef>,
  #[serde(default)]
  pub oversights: Vec<OversightDef>,
  #[serde(default)]
  pub resource_sources: Vec<ResourceSourceDef>,
  #[serde(default)]
  pub resources: Vec<ResourceDef>,
  #[serde(default)]
  pub governances: Vec<GovernanceDef>,
  #[serde(default)]
  pub administrations: Vec<AdministrationDef>,
  #[serde(default)]
  pub execution_strategies: Vec<ExecutionStrategyDef>,
  /// Handlers for escalations propagated to the office boundary.
  #[serde(default)]
  pub escalations: Vec<OfficeEscalationDef>,
  /// Team responsible for functions that are neither linked nor auto-wired to a team.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default_team: Option<String>,
  #[serde(default)]
  pub auto_wire_objects: bool,
  #[serde(default)]
  pub auto_wire_teams: bool,
  #[serde(default)]
  pub property_overrides: Vec<PropertyOverride>,
}

impl OfficeDef {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Default::default()
    }
  }

  /// Properties overriding those of the node with the qualified name.
  ///
  /// Multiple overrides for the same node are merged in declared order.
  pub fn overrides_for(&self, qualified_name: &str) -> PropertyList {
    let mut merged = PropertyList::new();
    for property_override in self
      .property_overrides
      .iter()
      .filter(|o| o.qualified_name == qualified_name)
    {
      merged = merged.override_with(&property_override.properties);
    }
    merged
  }
}

/// Governance applied to functions (e.g. transactions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceDef {
  pub name: String,
  pub governance_type: String,
  #[serde(default, skip_serializing_if = "PropertyList::is_empty")]
  pub properties: PropertyList,
}

/// Administration run before/after functions over the resources it administers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdministrationDef {
  pub name: String,
  pub administration_type: String,
  /// Names of the office resources administered.
  #[serde(default)]
  pub administers: Vec<String>,
  #[serde(default, skip_serializing_if = "PropertyList::is_empty")]
  pub properties: PropertyList,
}

/// Named concurrency strategy used by resource sources for their own work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStrategyDef {
  pub name: String,
  #[serde(default = "default_threads")]
  pub threads: usize,
}

fn default_threads() -> usize {
  1
}

/// Office handler for an escalation reaching the office boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficeEscalationDef {
  pub error_type: String,
  /// Resolved in the office scope, so an input of a top-level section.
  pub target: LinkRef,
}

/// Property override for the node with the qualified name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyOverride {
  pub qualified_name: String,
  pub properties: PropertyList,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::enums::{InstigationStrategy, ResourceScope};

  const OFFICE_JSON: &str = r#"{
    "name": "shop",
    "sections": [
      {
        "name": "checkout",
        "inputs": [{ "name": "start", "function": "validate" }],
        "outputs": [{ "name": "failed", "escalation_only": true }],
        "functions": [
          {
            "name": "validate",
            "function_type": "shop.Validate",
            "next": { "function": "charge" },
            "escalations": [{ "error_type": "shop.Invalid", "target": { "output": "failed" } }]
          },
          {
            "name": "charge",
            "function_type": "shop.Charge",
            "team": "payments",
            "flows": [{ "name": "notify", "target": { "function": "validate" }, "strategy": "asynchronous" }],
            "objects": [{ "name": "db", "resource": "db" }]
          }
        ]
      }
    ],
    "teams": [{ "name": "payments", "team_type": "plexus.team.fixed", "size": 2 }],
    "resource_sources": [{ "name": "pool", "source_type": "db.Pool" }],
    "resources": [{ "name": "db", "source": "pool", "scope": "function" }],
    "execution_strategies": [{ "name": "io" }],
    "escalations": [{ "error_type": "shop.Invalid", "target": { "input": { "section": "checkout", "input": "start" } } }],
    "property_overrides": [
      { "qualified_name": "checkout.charge", "properties": [{ "name": "retries", "value": "3" }] }
    ]
  }"#;

  #[test]
  fn test_parse_office() {
    let office: OfficeDef = serde_json::from_str(OFFICE_JSON).unwrap();

    assert_eq!(office.name, "shop");
    assert!(!office.auto_wire_objects);

    let section = &office.sections[0];
    assert_eq!(section.functions.len(), 2);
    assert!(section.outputs[0].escalation_only);
    assert_eq!(section.outputs[0].target, None);

    let validate = &section.functions[0];
    assert_eq!(validate.next, Some(LinkRef::Function("charge".to_string())));
    assert_eq!(validate.team, None);

    let charge = &section.functions[1];
    assert_eq!(charge.flows[0].strategy, InstigationStrategy::Asynchronous);
    assert_eq!(charge.objects[0].resource.as_deref(), Some("db"));

    assert_eq!(office.resources[0].scope, ResourceScope::Function);
    assert_eq!(office.execution_strategies[0].threads, 1);
    assert_eq!(
      office.escalations[0].target,
      LinkRef::Input {
        section: "checkout".to_string(),
        input: "start".to_string()
      }
    );
  }

  #[test]
  fn test_overrides_for_merges_in_order() {
    let mut office = OfficeDef::new("shop");
    office.property_overrides.push(PropertyOverride {
      qualified_name: "checkout.charge".to_string(),
      properties: [("retries", "3"), ("currency", "EUR")].into_iter().collect(),
    });
    office.property_overrides.push(PropertyOverride {
      qualified_name: "checkout.charge".to_string(),
      properties: [("retries", "5")].into_iter().collect(),
    });

    let merged = office.overrides_for("checkout.charge");
    assert_eq!(merged.get("retries"), Some("5"));
    assert_eq!(merged.get("currency"), Some("EUR"));
    assert!(office.overrides_for("checkout.validate").is_empty());
  }
}
