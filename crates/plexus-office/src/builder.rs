use crate::meta::{
  AdministrationMeta, EscalationMeta, ExecutionStrategyMeta, FlowMeta, FunctionMeta,
  GovernanceMeta, OfficeEscalationMeta, OfficeMeta, ResourceMeta, ResourceSourceMeta, TeamMeta,
};

/// Execution substrate populated from compiled metadata.
///
/// Implemented by hosting runtimes. Calls arrive in dependency order: every
/// name a call refers to has been built by an earlier call.
pub trait OfficeBuilder {
  type Error;

  fn build_execution_strategy(&mut self, strategy: &ExecutionStrategyMeta) -> Result<(), Self::Error>;

  fn build_worker_pool(&mut self, team: &TeamMeta) -> Result<(), Self::Error>;

  fn build_governance(&mut self, governance: &GovernanceMeta) -> Result<(), Self::Error>;

  fn build_administration(&mut self, administration: &AdministrationMeta) -> Result<(), Self::Error>;

  fn build_resource_source(&mut self, source: &ResourceSourceMeta) -> Result<(), Self::Error>;

  fn build_resource(&mut self, resource: &ResourceMeta) -> Result<(), Self::Error>;

  fn build_function(&mut self, function: &FunctionMeta) -> Result<(), Self::Error>;

  /// Flow of a built function. The next flow is built last.
  fn build_flow(&mut self, function: &FunctionMeta, flow: &FlowMeta) -> Result<(), Self::Error>;

  fn build_escalation(
    &mut self,
    function: &FunctionMeta,
    escalation: &EscalationMeta,
  ) -> Result<(), Self::Error>;

  fn build_office_escalation(&mut self, escalation: &OfficeEscalationMeta) -> Result<(), Self::Error>;

  /// Entry point "section.input" reaching the function.
  fn build_input(&mut self, name: &str, function: &str) -> Result<(), Self::Error>;
}

impl OfficeMeta {
  /// Populate the builder from this office.
  ///
  /// Stops at the first error the builder returns.
  pub fn build<B: OfficeBuilder>(&self, builder: &mut B) -> Result<(), B::Error> {
    for strategy in self.execution_strategies.values() {
      builder.build_execution_strategy(strategy)?;
    }
    for team in self.teams.values() {
      builder.build_worker_pool(team)?;
    }
    for governance in self.governances.values() {
      builder.build_governance(governance)?;
    }
    for administration in self.administrations.values() {
      builder.build_administration(administration)?;
    }
    for source in self.resource_sources.values() {
      builder.build_resource_source(source)?;
    }
    for resource in self.resources.values() {
      builder.build_resource(resource)?;
    }

    // all functions exist before any flow refers to one
    for function in self.functions.values() {
      builder.build_function(function)?;
    }
    for function in self.functions.values() {
      for flow in function.flows.iter().chain(function.next.iter()) {
        builder.build_flow(function, flow)?;
      }
      for escalation in &function.escalations {
        builder.build_escalation(function, escalation)?;
      }
    }

    for escalation in &self.escalations {
      builder.build_office_escalation(escalation)?;
    }
    for (name, function) in &self.inputs {
      builder.build_input(name, function)?;
    }
    Ok(())
  }
}
