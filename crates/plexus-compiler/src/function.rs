use std::collections::{HashMap, HashSet};

use plexus_config::{AutoWire, EscalationDef, FunctionDef, OfficeDef, SectionOutputDef};
use plexus_node::{AutoWireMatch, AutoWirer, LinkSlot, NodeId, NodeKind};
use plexus_office::{
  EscalationHandler, EscalationMeta, FlowMeta, FlowTarget, FunctionMeta, InstigationStrategy,
  ObjectBinding, ObjectMeta, ResponsibleTeam,
};
use plexus_type_loader::{FunctionType, is_assignable};
use tracing::debug;

use crate::declare::{Context, Declared, check_declared, is_top_level};
use crate::office::is_declared;
use crate::resource::bind_resource;
use crate::types::{TypeCache, check_required_properties};

const FLOW_THROUGH: &[NodeKind] = &[NodeKind::SectionInput, NodeKind::SectionOutput];

/// Parameter type of the function the node represents.
pub(crate) fn parameter_type(ctx: &Context<'_>, types: &TypeCache, node: NodeId) -> Option<String> {
  let function_type = match ctx.state(node)? {
    Declared::Function(def) => types.peek_function_type(&def.function_type)?,
    Declared::SourceFunction(function_type) => function_type,
    _ => return None,
  };
  function_type.parameter_type().map(str::to_string)
}

/// First section output on the path that only carries escalations.
pub(crate) fn escalation_only_output(ctx: &Context<'_>, path: &[NodeId]) -> Option<NodeId> {
  path.iter().copied().find(|id| {
    matches!(ctx.state(*id), Some(Declared::SectionOutput(output)) if output.escalation_only)
  })
}

/// Compiles function nodes into [`FunctionMeta`].
///
/// Any issue with a function leaves that function out; the other functions
/// are still compiled.
pub(crate) struct FunctionCompiler<'a> {
  pub(crate) types: &'a TypeCache,
  pub(crate) def: &'a OfficeDef,
  pub(crate) office: NodeId,
  pub(crate) resources: &'a AutoWirer<String>,
  pub(crate) capabilities: &'a HashMap<String, Vec<AutoWire>>,
  pub(crate) teams: &'a AutoWirer<String>,
  /// Teams that passed validation.
  pub(crate) compiled_teams: &'a HashSet<String>,
}

impl FunctionCompiler<'_> {
  pub(crate) fn compile(&self, ctx: &mut Context<'_>, node: NodeId) -> Option<FunctionMeta> {
    let name = ctx.qualified_name(node);
    let (def, function_type, source) = match ctx.state(node).cloned()? {
      Declared::Function(def) => {
        let function_type = self
          .types
          .function_type(ctx, node, &def.function_type)?
          .clone();
        (def, function_type, None)
      }
      Declared::SourceFunction(function_type) => {
        let local = ctx.name(node).to_string();
        let source = ctx.parent(node).map(|p| ctx.name(p).to_string());
        (FunctionDef::new(local.clone(), local), function_type, source)
      }
      _ => return None,
    };

    let mut valid = true;

    let flows = self.flows(ctx, node, &def, &function_type, &mut valid);
    let next = match &def.next {
      Some(_) => match self.flow_target(ctx, node, None) {
        Some(target) => Some(FlowMeta {
          name: "next".to_string(),
          target,
          strategy: InstigationStrategy::Sequential,
          argument_type: None,
        }),
        None => {
          valid = false;
          None
        }
      },
      None => None,
    };
    let objects = self.objects(ctx, node, &def, &function_type, &mut valid);
    let escalations = self.escalations(ctx, node, &def, &function_type, &mut valid);
    let governances = self.governances(ctx, node, &def, &mut valid);
    let pre_administration = self.administrations(ctx, node, &def.pre_administration, &mut valid);
    let post_administration = self.administrations(ctx, node, &def.post_administration, &mut valid);
    let team = self.team(ctx, node, &objects, &mut valid);

    let properties = def.properties.override_with(&self.def.overrides_for(&name));
    if !check_required_properties(ctx, node, &function_type.required_properties, &properties) {
      valid = false;
    }

    let team = team?;
    if !valid {
      return None;
    }

    debug!(function = %name, team = ?team, "function_compiled");
    Some(FunctionMeta {
      name,
      function_type: def.function_type,
      source,
      team,
      parameter_type: function_type.parameter_type().map(str::to_string),
      flows,
      next,
      objects,
      escalations,
      governances,
      pre_administration,
      post_administration,
      properties,
    })
  }

  fn flows(
    &self,
    ctx: &mut Context<'_>,
    node: NodeId,
    def: &FunctionDef,
    function_type: &FunctionType,
    valid: &mut bool,
  ) -> Vec<FlowMeta> {
    let mut flows = Vec::new();
    for flow_type in &function_type.flows {
      let Some(flow) = ctx
        .find_child(node, NodeKind::Flow, &flow_type.name)
        .filter(|id| ctx.is_initialised(*id))
      else {
        ctx.add_issue(node, format!("Flow {} is not configured", flow_type.name));
        *valid = false;
        continue;
      };
      let strategy = match ctx.state(flow) {
        Some(Declared::Flow(flow_def)) => flow_def.strategy,
        _ => InstigationStrategy::Sequential,
      };

      match self.flow_target(ctx, flow, flow_type.argument_type.as_deref()) {
        Some(target) => flows.push(FlowMeta {
          name: flow_type.name.clone(),
          target,
          strategy,
          argument_type: flow_type.argument_type.clone(),
        }),
        None => *valid = false,
      }
    }

    for flow in &def.flows {
      if function_type.flow(&flow.name).is_none() {
        let message = format!(
          "Flow {} is not declared by type '{}'",
          flow.name, def.function_type
        );
        ctx.add_issue(node, message);
        *valid = false;
      }
    }
    flows
  }

  /// Resolve where the node's flow slot leads: a function, or out of the office.
  fn flow_target(
    &self,
    ctx: &mut Context<'_>,
    source: NodeId,
    argument_type: Option<&str>,
  ) -> Option<FlowTarget> {
    let furthest = ctx.find_furthest_target(source, LinkSlot::Flow, FLOW_THROUGH)?;
    if !check_declared(ctx, source, &furthest.path) {
      return None;
    }
    if let Some(output) = escalation_only_output(ctx, &furthest.path) {
      let message = format!(
        "Section Output {} only carries escalations",
        ctx.qualified_name(output)
      );
      ctx.add_issue(source, message);
      return None;
    }
    let target = furthest.target;

    match ctx.kind(target) {
      NodeKind::Function => {
        let parameter = parameter_type(ctx, self.types, target);
        if !is_assignable(argument_type, parameter.as_deref()) {
          let message = format!(
            "Argument type '{}' is incompatible with parameter type '{}' of Function {}",
            argument_type.unwrap_or_default(),
            parameter.as_deref().unwrap_or_default(),
            ctx.qualified_name(target)
          );
          ctx.add_issue(source, message);
          return None;
        }
        Some(FlowTarget::Function(ctx.qualified_name(target)))
      }
      NodeKind::SectionOutput
        if ctx.linked(target, LinkSlot::Flow).is_none() && is_top_level(ctx, target) =>
      {
        Some(FlowTarget::Output(ctx.qualified_name(target)))
      }
      kind => {
        let message = format!(
          "{} {} is not linked to a Function nor an Office output",
          kind,
          ctx.qualified_name(target)
        );
        ctx.add_issue(source, message);
        None
      }
    }
  }

  fn objects(
    &self,
    ctx: &mut Context<'_>,
    node: NodeId,
    def: &FunctionDef,
    function_type: &FunctionType,
    valid: &mut bool,
  ) -> Vec<ObjectMeta> {
    let mut objects = Vec::new();
    for object_type in &function_type.objects {
      if object_type.is_parameter {
        if def
          .objects
          .iter()
          .any(|o| o.name == object_type.name && o.resource.is_some())
        {
          let message = format!(
            "Object {} is a parameter and can not be linked to a Resource",
            object_type.name
          );
          ctx.add_issue(node, message);
          *valid = false;
        }
        objects.push(ObjectMeta {
          name: object_type.name.clone(),
          binding: ObjectBinding::Parameter,
        });
        continue;
      }

      let object = ctx.child(node, NodeKind::Object, &object_type.name);
      let required = AutoWire {
        qualifier: object_type.qualifier.clone(),
        type_name: object_type.type_name.clone(),
      };
      match bind_resource(
        ctx,
        self.office,
        object,
        &[required],
        self.def.auto_wire_objects,
        self.resources,
      ) {
        Some(resource) => objects.push(ObjectMeta {
          name: object_type.name.clone(),
          binding: ObjectBinding::Resource(resource),
        }),
        None => *valid = false,
      }
    }

    for object in &def.objects {
      if function_type.object(&object.name).is_none() {
        let message = format!(
          "Object {} is not declared by type '{}'",
          object.name, def.function_type
        );
        ctx.add_issue(node, message);
        *valid = false;
      }
    }
    objects
  }

  fn escalations(
    &self,
    ctx: &mut Context<'_>,
    node: NodeId,
    def: &FunctionDef,
    function_type: &FunctionType,
    valid: &mut bool,
  ) -> Vec<EscalationMeta> {
    let mut escalations = Vec::new();
    for escalation_type in &function_type.escalations {
      let error_type = &escalation_type.error_type;
      let escalation = ctx.child(node, NodeKind::Escalation, error_type);
      ctx.initialise(escalation, || {
        Declared::Escalation(EscalationDef {
          error_type: error_type.clone(),
          target: None,
        })
      });

      match self.escalation_handler(ctx, node, escalation, error_type) {
        Some(handler) => escalations.push(EscalationMeta {
          error_type: error_type.clone(),
          handler,
        }),
        None => *valid = false,
      }
    }

    for escalation in &def.escalations {
      if !function_type
        .escalations
        .iter()
        .any(|e| e.error_type == escalation.error_type)
      {
        let message = format!(
          "Escalation {} is not declared by type '{}'",
          escalation.error_type, def.function_type
        );
        ctx.add_issue(node, message);
        *valid = false;
      }
    }
    escalations
  }

  /// A linked function handles the escalation. Otherwise it must reach the
  /// office through an unlinked output of a top-level section.
  fn escalation_handler(
    &self,
    ctx: &mut Context<'_>,
    function: NodeId,
    escalation: NodeId,
    error_type: &str,
  ) -> Option<EscalationHandler> {
    let parent = ctx.parent(function)?;
    if ctx.linked(escalation, LinkSlot::Flow).is_none() {
      if ctx.kind(parent) != NodeKind::Section {
        // functions added by resource sources escalate straight to the office
        return Some(EscalationHandler::Office);
      }
      // unlinked escalations leave through the section output of the same name
      let output = ctx.child(parent, NodeKind::SectionOutput, error_type);
      ctx.initialise(output, || {
        Declared::SectionOutput(SectionOutputDef {
          name: error_type.to_string(),
          target: None,
          escalation_only: true,
        })
      });
      ctx.link(escalation, LinkSlot::Flow, output);
    }

    let furthest = ctx.find_furthest_target(escalation, LinkSlot::Flow, FLOW_THROUGH)?;
    if !check_declared(ctx, escalation, &furthest.path) {
      return None;
    }
    let target = furthest.target;

    match ctx.kind(target) {
      NodeKind::Function => {
        let parameter = parameter_type(ctx, self.types, target);
        if !is_assignable(Some(error_type), parameter.as_deref()) {
          let message = format!(
            "Escalation {} is incompatible with parameter type '{}' of Function {}",
            error_type,
            parameter.as_deref().unwrap_or_default(),
            ctx.qualified_name(target)
          );
          ctx.add_issue(escalation, message);
          return None;
        }
        Some(EscalationHandler::Function {
          function: ctx.qualified_name(target),
          strategy: InstigationStrategy::Sequential,
        })
      }
      NodeKind::SectionOutput
        if ctx.linked(target, LinkSlot::Flow).is_none() && is_top_level(ctx, target) =>
      {
        Some(EscalationHandler::Office)
      }
      _ => {
        let message = format!(
          "Escalation {} not handled by a Function nor propagated to the Office",
          error_type
        );
        ctx.add_issue(escalation, message);
        None
      }
    }
  }

  /// Inherited governance (outermost section first) then local, without duplicates.
  fn governances(
    &self,
    ctx: &mut Context<'_>,
    node: NodeId,
    def: &FunctionDef,
    valid: &mut bool,
  ) -> Vec<String> {
    let mut inherited = Vec::new();
    let mut current = ctx.parent(node);
    while let Some(section) = current {
      if let Some(Declared::Section { governances }) = ctx.state(section) {
        inherited.push(governances.clone());
      }
      current = ctx.parent(section);
    }

    let mut governances: Vec<String> = Vec::new();
    for name in inherited.into_iter().rev().flatten().chain(def.governances.iter().cloned()) {
      if !governances.contains(&name) {
        governances.push(name);
      }
    }

    for name in &governances {
      if !is_declared(ctx, self.office, NodeKind::Governance, name) {
        ctx.add_issue(node, format!("Governance {} is not declared", name));
        *valid = false;
      }
    }
    governances
  }

  fn administrations(
    &self,
    ctx: &mut Context<'_>,
    node: NodeId,
    names: &[String],
    valid: &mut bool,
  ) -> Vec<String> {
    for name in names {
      if !is_declared(ctx, self.office, NodeKind::Administration, name) {
        ctx.add_issue(node, format!("Administration {} is not declared", name));
        *valid = false;
      }
    }
    names.to_vec()
  }

  /// Explicit team, then auto-wired, then the office default, then passive.
  fn team(
    &self,
    ctx: &mut Context<'_>,
    node: NodeId,
    objects: &[ObjectMeta],
    valid: &mut bool,
  ) -> Option<ResponsibleTeam> {
    if let Some(target) = ctx.linked(node, LinkSlot::Team) {
      if !check_declared(ctx, node, &[target]) {
        *valid = false;
        return None;
      }
      let team = ctx.name(target).to_string();
      if !self.check_compiled_team(ctx, node, &team) {
        *valid = false;
        return None;
      }
      return Some(ResponsibleTeam::Team(team));
    }

    if self.def.auto_wire_teams {
      let mut required: Vec<AutoWire> = Vec::new();
      for object in objects {
        if let ObjectBinding::Resource(resource) = &object.binding
          && let Some(capabilities) = self.capabilities.get(resource)
        {
          for capability in capabilities {
            if !required.contains(capability) {
              required.push(capability.clone());
            }
          }
        }
      }

      match self.teams.find_match(&required) {
        AutoWireMatch::Single(team) => {
          let target = ctx.child(self.office, NodeKind::Team, &team);
          ctx.link(node, LinkSlot::Team, target);
          return Some(ResponsibleTeam::Team(team));
        }
        AutoWireMatch::Ambiguous(candidates) => {
          let message = format!("Ambiguous team auto-wire (teams {})", candidates.join(", "));
          ctx.add_issue(node, message);
          *valid = false;
          return None;
        }
        AutoWireMatch::None => {}
      }
    }

    if let Some(default_team) = &self.def.default_team
      && let Some(target) = ctx.find_child(self.office, NodeKind::Team, default_team)
      && ctx.is_initialised(target)
    {
      if !self.check_compiled_team(ctx, node, default_team) {
        *valid = false;
        return None;
      }
      ctx.link(node, LinkSlot::Team, target);
      return Some(ResponsibleTeam::Team(default_team.clone()));
    }

    Some(ResponsibleTeam::Passive)
  }
  fn check_compiled_team(&self, ctx: &mut Context<'_>, node: NodeId, team: &str) -> bool {
    if self.compiled_teams.contains(team) {
      return true;
    }
    ctx.add_issue(node, format!("Team {} is not compiled", team));
    false
  }
}
