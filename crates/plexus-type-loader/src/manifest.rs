use serde::{Deserialize, Serialize};

/// Declared capabilities of a loaded type.
///
/// ```json
/// { "kind": "function", "objects": [{ "name": "order", "type_name": "shop.Order", "is_parameter": true }] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeManifest {
  Function(FunctionType),
  ResourceSource(ResourceSourceType),
  Team(TeamType),
  Governance(GovernanceType),
  Administration(AdministrationType),
}

impl TypeManifest {
  /// Kind of the manifest, for reporting mismatches.
  pub fn kind(&self) -> &'static str {
    match self {
      TypeManifest::Function(_) => "function",
      TypeManifest::ResourceSource(_) => "resource source",
      TypeManifest::Team(_) => "team",
      TypeManifest::Governance(_) => "governance",
      TypeManifest::Administration(_) => "administration",
    }
  }
}

/// Capabilities of a function type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionType {
  #[serde(default)]
  pub flows: Vec<FlowType>,
  #[serde(default)]
  pub objects: Vec<ObjectType>,
  #[serde(default)]
  pub escalations: Vec<EscalationType>,
  #[serde(default)]
  pub required_properties: Vec<String>,
}

impl FunctionType {
  /// Type of the value the function accepts from the flow that invokes it.
  pub fn parameter_type(&self) -> Option<&str> {
    self
      .objects
      .iter()
      .find(|o| o.is_parameter)
      .map(|o| o.type_name.as_str())
  }

  pub fn flow(&self, name: &str) -> Option<&FlowType> {
    self.flows.iter().find(|f| f.name == name)
  }

  pub fn object(&self, name: &str) -> Option<&ObjectType> {
    self.objects.iter().find(|o| o.name == name)
  }
}

/// A flow the function may instigate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowType {
  pub name: String,
  /// Type of the argument passed along the flow.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub argument_type: Option<String>,
}

/// An object (dependency or parameter) the function requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectType {
  pub name: String,
  pub type_name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub qualifier: Option<String>,
  /// Value is supplied by the invoking flow rather than by a resource.
  #[serde(default)]
  pub is_parameter: bool,
}

/// An escalation the function may raise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationType {
  pub error_type: String,
}

/// Capabilities of a resource source type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSourceType {
  /// Type of the resource instances sourced.
  pub object_type: String,
  #[serde(default)]
  pub dependencies: Vec<DependencyType>,
  /// Flows the source instigates itself.
  #[serde(default)]
  pub flows: Vec<FlowType>,
  /// Names of the execution strategy slots the source requires.
  #[serde(default)]
  pub execution_strategies: Vec<String>,
  /// Name of the source-added function recycling instances.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub recycle_function: Option<String>,
  /// Functions added to the office by the source.
  #[serde(default)]
  pub functions: Vec<SourceFunctionType>,
  #[serde(default)]
  pub required_properties: Vec<String>,
}

impl ResourceSourceType {
  pub fn function(&self, name: &str) -> Option<&SourceFunctionType> {
    self.functions.iter().find(|f| f.name == name)
  }
}

/// A dependency of the resources sourced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyType {
  pub name: String,
  pub type_name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub qualifier: Option<String>,
}

/// A function added to the office by a resource source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFunctionType {
  pub name: String,
  #[serde(default)]
  pub function: FunctionType,
}

/// Capabilities of a team type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamType {
  /// Team must be configured with a size.
  #[serde(default)]
  pub requires_size: bool,
  #[serde(default)]
  pub required_properties: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GovernanceType {
  #[serde(default)]
  pub required_properties: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdministrationType {
  #[serde(default)]
  pub required_properties: Vec<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_deserialize_function_manifest() {
    let json = r#"{
      "kind": "function",
      "flows": [{ "name": "done", "argument_type": "shop.Receipt" }],
      "objects": [
        { "name": "order", "type_name": "shop.Order", "is_parameter": true },
        { "name": "db", "type_name": "db.Connection" }
      ],
      "escalations": [{ "error_type": "shop.Declined" }]
    }"#;

    let manifest: TypeManifest = serde_json::from_str(json).unwrap();
    let TypeManifest::Function(function) = manifest else {
      panic!("expected function manifest");
    };

    assert_eq!(function.parameter_type(), Some("shop.Order"));
    assert_eq!(
      function.flow("done").and_then(|f| f.argument_type.as_deref()),
      Some("shop.Receipt")
    );
    assert!(!function.object("db").unwrap().is_parameter);
    assert!(function.required_properties.is_empty());
  }

  #[test]
  fn test_deserialize_resource_source_manifest() {
    let json = r#"{
      "kind": "resource_source",
      "object_type": "http.Request",
      "flows": [{ "name": "service" }],
      "execution_strategies": ["accept"],
      "recycle_function": "close",
      "functions": [{ "name": "close", "function": { "objects": [
        { "name": "cleanup", "type_name": "plexus.RecycleParameter", "is_parameter": true }
      ] } }]
    }"#;

    let manifest: TypeManifest = serde_json::from_str(json).unwrap();
    assert_eq!(manifest.kind(), "resource source");
    let TypeManifest::ResourceSource(source) = manifest else {
      panic!("expected resource source manifest");
    };

    assert_eq!(source.execution_strategies, vec!["accept".to_string()]);
    assert_eq!(
      source.function("close").unwrap().function.parameter_type(),
      Some("plexus.RecycleParameter")
    );
  }
}
