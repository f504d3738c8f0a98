use plexus_config::OfficeDef;
use plexus_node::{LinkSlot, NodeId, NodeKind};
use plexus_office::{
  AdministrationMeta, ExecutionStrategyMeta, GovernanceMeta, OfficeEscalationMeta, OfficeMeta,
  TeamMeta,
};
use plexus_type_loader::is_assignable;
use tracing::debug;

use crate::declare::{Context, Declared, check_declared, declared_children};
use crate::types::{TypeCache, check_required_properties};

/// Whether the office-level node of the kind and name has been declared.
pub(crate) fn is_declared(ctx: &Context<'_>, office: NodeId, kind: NodeKind, name: &str) -> bool {
  ctx
    .find_child(office, kind, name)
    .is_some_and(|id| ctx.is_initialised(id))
}

pub(crate) fn compile_execution_strategies(ctx: &mut Context<'_>, office: NodeId, meta: &mut OfficeMeta) {
  for node in declared_children(ctx, office, NodeKind::ExecutionStrategy) {
    let Some(Declared::ExecutionStrategy(def)) = ctx.state(node).cloned() else {
      continue;
    };
    if def.threads < 1 {
      ctx.add_issue(node, "Execution strategy threads must be 1 or more");
      continue;
    }
    meta.execution_strategies.insert(
      def.name.clone(),
      ExecutionStrategyMeta {
        name: def.name,
        threads: def.threads,
      },
    );
  }
}

/// Validate the teams. Sizing is only checked here, once the office is
/// compiled for execution.
pub(crate) fn compile_teams(
  ctx: &mut Context<'_>,
  types: &TypeCache,
  def: &OfficeDef,
  office: NodeId,
  meta: &mut OfficeMeta,
) {
  for node in declared_children(ctx, office, NodeKind::Team) {
    let Some(Declared::Team(team)) = ctx.state(node).cloned() else {
      continue;
    };
    let Some(team_type) = types.team_type(ctx, node, &team.team_type).cloned() else {
      continue;
    };

    let properties = team.properties.override_with(&def.overrides_for(&team.name));
    let mut valid =
      check_required_properties(ctx, node, &team_type.required_properties, &properties);

    let size = match team.size {
      None => {
        if team_type.requires_size {
          ctx.add_issue(node, "Team size must be specified");
          valid = false;
        }
        None
      }
      Some(size) => match usize::try_from(size) {
        Ok(size) if size >= 1 => Some(size),
        _ => {
          ctx.add_issue(node, "Team size must be 1 or more");
          valid = false;
          None
        }
      },
    };

    let oversight = match ctx.linked(node, LinkSlot::Oversight) {
      Some(target) if check_declared(ctx, node, &[target]) => Some(ctx.name(target).to_string()),
      Some(_) => {
        valid = false;
        None
      }
      None => None,
    };

    if valid {
      debug!(team = %team.name, size = ?size, "team_compiled");
      meta.teams.insert(
        team.name.clone(),
        TeamMeta {
          name: team.name,
          team_type: team.team_type,
          size,
          oversight,
          properties,
        },
      );
    }
  }

  if let Some(default_team) = &def.default_team
    && !is_declared(ctx, office, NodeKind::Team, default_team)
  {
    ctx.add_issue(office, format!("Default team {} is not declared", default_team));
  }
}

pub(crate) fn compile_governances(
  ctx: &mut Context<'_>,
  types: &TypeCache,
  def: &OfficeDef,
  office: NodeId,
  meta: &mut OfficeMeta,
) {
  for node in declared_children(ctx, office, NodeKind::Governance) {
    let Some(Declared::Governance(governance)) = ctx.state(node).cloned() else {
      continue;
    };
    let Some(governance_type) = types
      .governance_type(ctx, node, &governance.governance_type)
      .cloned()
    else {
      continue;
    };
    let properties = governance
      .properties
      .override_with(&def.overrides_for(&governance.name));
    if !check_required_properties(ctx, node, &governance_type.required_properties, &properties) {
      continue;
    }
    meta.governances.insert(
      governance.name.clone(),
      GovernanceMeta {
        name: governance.name,
        governance_type: governance.governance_type,
        properties,
      },
    );
  }
}

pub(crate) fn compile_administrations(
  ctx: &mut Context<'_>,
  types: &TypeCache,
  def: &OfficeDef,
  office: NodeId,
  meta: &mut OfficeMeta,
) {
  for node in declared_children(ctx, office, NodeKind::Administration) {
    let Some(Declared::Administration(administration)) = ctx.state(node).cloned() else {
      continue;
    };
    let Some(administration_type) = types
      .administration_type(ctx, node, &administration.administration_type)
      .cloned()
    else {
      continue;
    };
    let properties = administration
      .properties
      .override_with(&def.overrides_for(&administration.name));
    let mut valid = check_required_properties(
      ctx,
      node,
      &administration_type.required_properties,
      &properties,
    );

    for resource in &administration.administers {
      if !is_declared(ctx, office, NodeKind::Resource, resource) {
        ctx.add_issue(node, format!("Resource {} is not declared", resource));
        valid = false;
      }
    }

    if valid {
      meta.administrations.insert(
        administration.name.clone(),
        AdministrationMeta {
          name: administration.name,
          administration_type: administration.administration_type,
          administers: administration.administers,
          properties,
        },
      );
    }
  }
}

/// Register every section input reaching a compiled function as an entry point.
pub(crate) fn compile_inputs(ctx: &mut Context<'_>, office: NodeId, meta: &mut OfficeMeta) {
  fn section_inputs(ctx: &mut Context<'_>, section: NodeId, meta: &mut OfficeMeta) {
    for input in declared_children(ctx, section, NodeKind::SectionInput) {
      let Some(target) = ctx.find_target(input, LinkSlot::Flow) else {
        continue;
      };
      if !check_declared(ctx, input, &[target]) {
        continue;
      }
      let function = ctx.qualified_name(target);
      if meta.functions.contains_key(&function) {
        meta.inputs.insert(ctx.qualified_name(input), function);
      }
    }
    for sub in declared_children(ctx, section, NodeKind::Section) {
      section_inputs(ctx, sub, meta);
    }
  }

  for section in declared_children(ctx, office, NodeKind::Section) {
    section_inputs(ctx, section, meta);
  }
}

/// Resolve the office handlers of escalations propagated to the office.
pub(crate) fn compile_office_escalations(ctx: &mut Context<'_>, office: NodeId, meta: &mut OfficeMeta) {
  for node in declared_children(ctx, office, NodeKind::OfficeEscalation) {
    let Some(Declared::OfficeEscalation(def)) = ctx.state(node).cloned() else {
      continue;
    };
    let Some(furthest) = ctx.find_furthest_target(node, LinkSlot::Flow, &[NodeKind::SectionInput])
    else {
      continue;
    };
    if !check_declared(ctx, node, &furthest.path) {
      continue;
    }
    if ctx.kind(furthest.target) != NodeKind::Function {
      ctx.add_issue(
        node,
        format!("Office escalation {} is not linked to a Function", def.error_type),
      );
      continue;
    }

    let function = ctx.qualified_name(furthest.target);
    let Some(handler) = meta.functions.get(&function) else {
      continue;
    };
    if !is_assignable(Some(&def.error_type), handler.parameter_type.as_deref()) {
      let message = format!(
        "Escalation {} is incompatible with parameter type '{}' of Function {}",
        def.error_type,
        handler.parameter_type.as_deref().unwrap_or_default(),
        function
      );
      ctx.add_issue(node, message);
      continue;
    }

    meta.escalations.push(OfficeEscalationMeta {
      error_type: def.error_type,
      function,
    });
  }
}
