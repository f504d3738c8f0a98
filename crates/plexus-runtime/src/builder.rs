//! Populating an [`Office`] from compiled metadata.

use std::collections::HashMap;
use std::sync::Arc;

use plexus_office::{
  AdministrationMeta, EscalationHandler, EscalationMeta, ExecutionStrategyMeta, FlowMeta,
  FlowTarget, FunctionMeta, GovernanceMeta, OfficeBuilder, OfficeEscalationMeta, OfficeMeta,
  ResourceMeta, ResourceSourceMeta, ResponsibleTeam, TeamMeta,
};
use plexus_type_loader::{FIXED_TEAM, PASSIVE_TEAM, SPAWN_TEAM};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::BuildError;
use crate::logic::{Administration, Governance, ManagedFunction};
use crate::office::{FunctionEntry, Office, OfficeInner, ResourceEntry, SourceEntry};
use crate::source::ResourceSource;
use crate::team::{self, Oversight, PassiveTeam, Team, TeamFactory};

const PASSIVE: &str = "passive";

/// Logic registered by type name, bound to compiled metadata by [`RuntimeBuilder::build`].
pub struct RuntimeBuilder {
  function_types: HashMap<String, Arc<dyn ManagedFunction>>,
  source_types: HashMap<String, Arc<dyn ResourceSource>>,
  team_types: HashMap<String, Arc<dyn TeamFactory>>,
  governance_types: HashMap<String, Arc<dyn Governance>>,
  administration_types: HashMap<String, Arc<dyn Administration>>,
  oversights: HashMap<String, Arc<dyn Oversight>>,

  strategies: HashMap<String, usize>,
  teams: HashMap<String, (Arc<dyn Team>, Option<Arc<dyn Oversight>>)>,
  passive: Arc<dyn Team>,
  governances: HashMap<String, Arc<dyn Governance>>,
  administrations: HashMap<String, (Arc<dyn Administration>, Vec<String>)>,
  sources: Vec<SourceEntry>,
  resources: HashMap<String, ResourceEntry>,
  functions: HashMap<String, FunctionEntry>,
  inputs: HashMap<String, String>,
  escalations: HashMap<String, String>,
}

impl Default for RuntimeBuilder {
  fn default() -> Self {
    Self::new()
  }
}

impl RuntimeBuilder {
  /// Builder with the built-in team types registered.
  pub fn new() -> Self {
    let mut builder = Self {
      function_types: HashMap::new(),
      source_types: HashMap::new(),
      team_types: HashMap::new(),
      governance_types: HashMap::new(),
      administration_types: HashMap::new(),
      oversights: HashMap::new(),
      strategies: HashMap::new(),
      teams: HashMap::new(),
      passive: Arc::new(PassiveTeam),
      governances: HashMap::new(),
      administrations: HashMap::new(),
      sources: Vec::new(),
      resources: HashMap::new(),
      functions: HashMap::new(),
      inputs: HashMap::new(),
      escalations: HashMap::new(),
    };
    builder
      .register_team_type(FIXED_TEAM, team::fixed_team)
      .register_team_type(SPAWN_TEAM, team::spawn_team)
      .register_team_type(PASSIVE_TEAM, team::passive_team);
    builder
  }

  pub fn register_function(
    &mut self,
    function_type: impl Into<String>,
    logic: impl ManagedFunction + 'static,
  ) -> &mut Self {
    self.function_types.insert(function_type.into(), Arc::new(logic));
    self
  }

  pub fn register_source(
    &mut self,
    source_type: impl Into<String>,
    logic: impl ResourceSource + 'static,
  ) -> &mut Self {
    self.source_types.insert(source_type.into(), Arc::new(logic));
    self
  }

  pub fn register_team_type(
    &mut self,
    team_type: impl Into<String>,
    factory: impl TeamFactory + 'static,
  ) -> &mut Self {
    self.team_types.insert(team_type.into(), Arc::new(factory));
    self
  }

  pub fn register_governance(
    &mut self,
    governance_type: impl Into<String>,
    logic: impl Governance + 'static,
  ) -> &mut Self {
    self
      .governance_types
      .insert(governance_type.into(), Arc::new(logic));
    self
  }

  pub fn register_administration(
    &mut self,
    administration_type: impl Into<String>,
    logic: impl Administration + 'static,
  ) -> &mut Self {
    self
      .administration_types
      .insert(administration_type.into(), Arc::new(logic));
    self
  }

  /// Oversight referred to by name from team configuration.
  pub fn register_oversight(
    &mut self,
    name: impl Into<String>,
    oversight: Arc<dyn Oversight>,
  ) -> &mut Self {
    self.oversights.insert(name.into(), oversight);
    self
  }

  /// Bind the registered logic to the office.
  pub fn build(mut self, meta: &OfficeMeta) -> Result<Office, BuildError> {
    meta.build(&mut self)?;
    info!(
      office = %meta.name,
      functions = self.functions.len(),
      resources = self.resources.len(),
      teams = self.teams.len(),
      "office_built"
    );

    Ok(Office::new(OfficeInner {
      name: meta.name.clone(),
      functions: self.functions,
      inputs: self.inputs,
      resources: self.resources,
      sources: self.sources,
      strategies: self.strategies,
      escalations: self.escalations,
      cancel: CancellationToken::new(),
    }))
  }

  fn source(&self, name: &str) -> Option<&SourceEntry> {
    self.sources.iter().find(|s| s.meta.name == name)
  }

  fn require_function(&self, name: &str) -> Result<(), BuildError> {
    if self.functions.contains_key(name) {
      Ok(())
    } else {
      Err(BuildError::UnknownReference {
        kind: "function",
        name: name.to_string(),
      })
    }
  }

  fn function_logic(&self, function: &FunctionMeta) -> Result<Arc<dyn ManagedFunction>, BuildError> {
    match &function.source {
      Some(source) => {
        let entry = self
          .source(source)
          .ok_or_else(|| BuildError::UnknownReference {
            kind: "resource source",
            name: source.clone(),
          })?;
        entry
          .logic
          .function(&function.function_type)
          .ok_or_else(|| BuildError::MissingSourceFunction {
            source_name: source.clone(),
            function: function.function_type.clone(),
          })
      }
      None => self
        .function_types
        .get(&function.function_type)
        .cloned()
        .ok_or_else(|| BuildError::UnregisteredType {
          kind: "function",
          type_name: function.function_type.clone(),
        }),
    }
  }

  fn administrations_for(
    &self,
    names: &[String],
  ) -> Result<Vec<(Arc<dyn Administration>, Vec<String>)>, BuildError> {
    names
      .iter()
      .map(|name| {
        self
          .administrations
          .get(name)
          .cloned()
          .ok_or_else(|| BuildError::UnknownReference {
            kind: "administration",
            name: name.clone(),
          })
      })
      .collect()
  }
}

impl OfficeBuilder for RuntimeBuilder {
  type Error = BuildError;

  fn build_execution_strategy(&mut self, strategy: &ExecutionStrategyMeta) -> Result<(), BuildError> {
    self
      .strategies
      .insert(strategy.name.clone(), strategy.threads.max(1));
    Ok(())
  }

  fn build_worker_pool(&mut self, team: &TeamMeta) -> Result<(), BuildError> {
    let factory = self
      .team_types
      .get(&team.team_type)
      .ok_or_else(|| BuildError::UnregisteredType {
        kind: "team",
        type_name: team.team_type.clone(),
      })?;
    let oversight = match &team.oversight {
      Some(name) => Some(self.oversights.get(name).cloned().ok_or_else(|| {
        BuildError::UnknownReference {
          kind: "oversight",
          name: name.clone(),
        }
      })?),
      None => None,
    };

    let worker_pool = factory.create(team)?;
    debug!(team = %team.name, team_type = %team.team_type, "worker_pool_built");
    self.teams.insert(team.name.clone(), (worker_pool, oversight));
    Ok(())
  }

  fn build_governance(&mut self, governance: &GovernanceMeta) -> Result<(), BuildError> {
    let logic = self
      .governance_types
      .get(&governance.governance_type)
      .cloned()
      .ok_or_else(|| BuildError::UnregisteredType {
        kind: "governance",
        type_name: governance.governance_type.clone(),
      })?;
    self.governances.insert(governance.name.clone(), logic);
    Ok(())
  }

  fn build_administration(&mut self, administration: &AdministrationMeta) -> Result<(), BuildError> {
    let logic = self
      .administration_types
      .get(&administration.administration_type)
      .cloned()
      .ok_or_else(|| BuildError::UnregisteredType {
        kind: "administration",
        type_name: administration.administration_type.clone(),
      })?;
    self.administrations.insert(
      administration.name.clone(),
      (logic, administration.administers.clone()),
    );
    Ok(())
  }

  fn build_resource_source(&mut self, source: &ResourceSourceMeta) -> Result<(), BuildError> {
    let logic = self
      .source_types
      .get(&source.source_type)
      .cloned()
      .ok_or_else(|| BuildError::UnregisteredType {
        kind: "resource source",
        type_name: source.source_type.clone(),
      })?;
    if let Some(slot) = source
      .execution_strategies
      .iter()
      .find(|slot| !self.strategies.contains_key(&slot.strategy))
    {
      return Err(BuildError::UnknownReference {
        kind: "execution strategy",
        name: slot.strategy.clone(),
      });
    }

    self.sources.push(SourceEntry {
      meta: source.clone(),
      logic,
    });
    Ok(())
  }

  fn build_resource(&mut self, resource: &ResourceMeta) -> Result<(), BuildError> {
    let source = self
      .source(&resource.source)
      .ok_or_else(|| BuildError::UnknownReference {
        kind: "resource source",
        name: resource.source.clone(),
      })?;
    let entry = ResourceEntry {
      meta: resource.clone(),
      source: source.logic.clone(),
      properties: source.meta.properties.clone(),
      timeout_ms: source.meta.timeout_ms,
    };
    self.resources.insert(resource.name.clone(), entry);
    Ok(())
  }

  fn build_function(&mut self, function: &FunctionMeta) -> Result<(), BuildError> {
    let logic = self.function_logic(function)?;

    let (team, team_name, oversight) = match &function.team {
      ResponsibleTeam::Team(name) => {
        let (team, oversight) =
          self
            .teams
            .get(name)
            .cloned()
            .ok_or_else(|| BuildError::UnknownReference {
              kind: "team",
              name: name.clone(),
            })?;
        (team, name.clone(), oversight)
      }
      ResponsibleTeam::Passive => (self.passive.clone(), PASSIVE.to_string(), None),
    };

    let governances = function
      .governances
      .iter()
      .map(|name| {
        self
          .governances
          .get(name)
          .cloned()
          .ok_or_else(|| BuildError::UnknownReference {
            kind: "governance",
            name: name.clone(),
          })
      })
      .collect::<Result<Vec<_>, _>>()?;

    if let Some(resource) = function
      .resources()
      .find(|resource| !self.resources.contains_key(*resource))
    {
      return Err(BuildError::UnknownReference {
        kind: "resource",
        name: resource.to_string(),
      });
    }

    let entry = FunctionEntry {
      meta: function.clone(),
      logic,
      team,
      team_name,
      oversight,
      governances,
      pre_administration: self.administrations_for(&function.pre_administration)?,
      post_administration: self.administrations_for(&function.post_administration)?,
    };
    debug!(function = %function.name, team = %entry.team_name, "function_built");
    self.functions.insert(function.name.clone(), entry);
    Ok(())
  }

  fn build_flow(&mut self, _function: &FunctionMeta, flow: &FlowMeta) -> Result<(), BuildError> {
    match &flow.target {
      FlowTarget::Function(target) => self.require_function(target),
      FlowTarget::Output(_) => Ok(()),
    }
  }

  fn build_escalation(
    &mut self,
    _function: &FunctionMeta,
    escalation: &EscalationMeta,
  ) -> Result<(), BuildError> {
    match &escalation.handler {
      EscalationHandler::Function { function, .. } => self.require_function(function),
      EscalationHandler::Office => Ok(()),
    }
  }

  fn build_office_escalation(&mut self, escalation: &OfficeEscalationMeta) -> Result<(), BuildError> {
    self.require_function(&escalation.function)?;
    self
      .escalations
      .insert(escalation.error_type.clone(), escalation.function.clone());
    Ok(())
  }

  fn build_input(&mut self, name: &str, function: &str) -> Result<(), BuildError> {
    self.require_function(function)?;
    self.inputs.insert(name.to_string(), function.to_string());
    Ok(())
  }
}
