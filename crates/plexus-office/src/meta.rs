use indexmap::IndexMap;
use plexus_config::{InstigationStrategy, PropertyList, ResourceScope};
use serde::{Deserialize, Serialize};

/// Compiled office.
///
/// Maps are keyed by qualified name and keep declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfficeMeta {
  pub name: String,
  pub execution_strategies: IndexMap<String, ExecutionStrategyMeta>,
  pub teams: IndexMap<String, TeamMeta>,
  pub governances: IndexMap<String, GovernanceMeta>,
  pub administrations: IndexMap<String, AdministrationMeta>,
  pub resource_sources: IndexMap<String, ResourceSourceMeta>,
  pub resources: IndexMap<String, ResourceMeta>,
  pub functions: IndexMap<String, FunctionMeta>,
  /// Entry points: "section.input" to the qualified name of the function it reaches.
  pub inputs: IndexMap<String, String>,
  pub escalations: Vec<OfficeEscalationMeta>,
}

impl OfficeMeta {
  pub fn function(&self, name: &str) -> Option<&FunctionMeta> {
    self.functions.get(name)
  }

  /// Function invoked for the name, either an entry point or a function.
  pub fn entry(&self, name: &str) -> Option<&FunctionMeta> {
    match self.inputs.get(name) {
      Some(function) => self.functions.get(function),
      None => self.functions.get(name),
    }
  }

  /// Office handler for the escalation type.
  pub fn escalation(&self, error_type: &str) -> Option<&OfficeEscalationMeta> {
    self.escalations.iter().find(|e| e.error_type == error_type)
  }
}

/// Named concurrency strategy for resource sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStrategyMeta {
  pub name: String,
  pub threads: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMeta {
  pub name: String,
  pub team_type: String,
  /// Validated to be 1 or more when present.
  pub size: Option<usize>,
  pub oversight: Option<String>,
  pub properties: PropertyList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceMeta {
  pub name: String,
  pub governance_type: String,
  pub properties: PropertyList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdministrationMeta {
  pub name: String,
  pub administration_type: String,
  /// Resources administered, in declared order.
  pub administers: Vec<String>,
  pub properties: PropertyList,
}

/// Bound resource source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSourceMeta {
  pub name: String,
  pub source_type: String,
  /// Type of the resource instances sourced.
  pub object_type: String,
  pub properties: PropertyList,
  pub timeout_ms: Option<u64>,
  /// Qualified name of the function recycling instances.
  pub recycle_function: Option<String>,
  /// Resource through which instances are visible to the processes the source starts.
  pub input_resource: Option<String>,
  pub flows: Vec<SourceFlowMeta>,
  pub execution_strategies: Vec<SourceStrategyMeta>,
}

/// Flow instigated by a resource source, in the order the source type declares them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFlowMeta {
  pub name: String,
  pub function: String,
  pub strategy: InstigationStrategy,
  pub argument_type: Option<String>,
}

/// Office execution strategy assigned to a source's strategy slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStrategyMeta {
  pub name: String,
  pub strategy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMeta {
  pub name: String,
  pub source: String,
  pub scope: ResourceScope,
  pub input: bool,
  pub dependencies: Vec<DependencyMeta>,
  /// Qualified name of the function recycling instances, from the source.
  pub recycle_function: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyMeta {
  pub name: String,
  pub resource: String,
}

/// Compiled function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionMeta {
  /// Qualified name, e.g. "checkout.payment.charge"
  pub name: String,
  pub function_type: String,
  /// Resource source that added the function, if any.
  pub source: Option<String>,
  pub team: ResponsibleTeam,
  pub parameter_type: Option<String>,
  pub flows: Vec<FlowMeta>,
  pub next: Option<FlowMeta>,
  pub objects: Vec<ObjectMeta>,
  pub escalations: Vec<EscalationMeta>,
  /// Inherited governance first, then local, without duplicates.
  pub governances: Vec<String>,
  pub pre_administration: Vec<String>,
  pub post_administration: Vec<String>,
  pub properties: PropertyList,
}

impl FunctionMeta {
  pub fn flow(&self, name: &str) -> Option<&FlowMeta> {
    self.flows.iter().find(|f| f.name == name)
  }

  pub fn object(&self, name: &str) -> Option<&ObjectMeta> {
    self.objects.iter().find(|o| o.name == name)
  }

  pub fn escalation(&self, error_type: &str) -> Option<&EscalationMeta> {
    self.escalations.iter().find(|e| e.error_type == error_type)
  }

  /// Names of the resources the function depends on, in object order.
  pub fn resources(&self) -> impl Iterator<Item = &str> {
    self.objects.iter().filter_map(|o| match &o.binding {
      ObjectBinding::Resource(resource) => Some(resource.as_str()),
      ObjectBinding::Parameter => None,
    })
  }

  /// Functions the flows, next flow and escalation handlers lead to.
  pub fn targets(&self) -> impl Iterator<Item = &str> {
    let flows = self
      .flows
      .iter()
      .chain(self.next.as_ref())
      .filter_map(|flow| match &flow.target {
        FlowTarget::Function(function) => Some(function.as_str()),
        FlowTarget::Output(_) => None,
      });
    let handlers = self.escalations.iter().filter_map(|e| match &e.handler {
      EscalationHandler::Function { function, .. } => Some(function.as_str()),
      EscalationHandler::Office => None,
    });
    flows.chain(handlers)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsibleTeam {
  Team(String),
  /// Runs on the thread of control assigning the function.
  Passive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowMeta {
  pub name: String,
  pub target: FlowTarget,
  pub strategy: InstigationStrategy,
  pub argument_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowTarget {
  /// Qualified function name.
  Function(String),
  /// Unlinked output of a top-level section, leaving the office.
  Output(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
  pub name: String,
  pub binding: ObjectBinding,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectBinding {
  /// Value supplied by the invoking flow.
  Parameter,
  Resource(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationMeta {
  pub error_type: String,
  pub handler: EscalationHandler,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationHandler {
  /// Handled by a function. Always instigated sequentially.
  Function {
    function: String,
    strategy: InstigationStrategy,
  },
  /// Propagated to the office boundary.
  Office,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficeEscalationMeta {
  pub error_type: String,
  pub function: String,
}
