use plexus_config::{
  AdministrationDef, EscalationDef, ExecutionStrategyDef, FlowDef, FunctionDef, GovernanceDef,
  LinkRef, ObjectDef, OfficeDef, OfficeEscalationDef, ResourceDef, ResourceDependencyDef,
  ResourceSourceDef, SectionDef, SectionOutputDef, SourceFlowDef, TeamDef,
};
use plexus_node::{LinkSlot, NodeContext, NodeId, NodeKind};
use plexus_type_loader::FunctionType;

/// State a node is bound with once declared.
#[derive(Debug, Clone)]
pub(crate) enum Declared {
  Office,
  Section { governances: Vec<String> },
  SectionInput { function: String },
  SectionOutput(SectionOutputDef),
  Function(FunctionDef),
  /// Function added by a resource source, typed inline by the source type.
  SourceFunction(FunctionType),
  Flow(FlowDef),
  Object(ObjectDef),
  Escalation(EscalationDef),
  Team(TeamDef),
  Oversight,
  Governance(GovernanceDef),
  Administration(AdministrationDef),
  ResourceSource(ResourceSourceDef),
  Resource(ResourceDef),
  Dependency(ResourceDependencyDef),
  SourceFlow(SourceFlowDef),
  ExecutionStrategy(ExecutionStrategyDef),
  OfficeEscalation(OfficeEscalationDef),
}

pub(crate) type Context<'i> = NodeContext<'i, Declared>;

/// Declare a node, reporting a duplicate declaration.
///
/// Returns None for a duplicate so that its children are not declared over
/// those of the first declaration.
pub(crate) fn declare(
  ctx: &mut Context<'_>,
  parent: NodeId,
  kind: NodeKind,
  name: &str,
  state: Declared,
) -> Option<NodeId> {
  let id = ctx.child(parent, kind, name);
  if ctx.is_initialised(id) {
    ctx.add_issue(id, format!("{} {} already added", kind, name));
    return None;
  }
  ctx.initialise(id, || state);
  Some(id)
}

/// Declared children of the kind, in declaration order.
pub(crate) fn declared_children(ctx: &Context<'_>, parent: NodeId, kind: NodeKind) -> Vec<NodeId> {
  ctx
    .children(parent, kind)
    .into_iter()
    .filter(|id| ctx.is_initialised(*id))
    .collect()
}

/// Report every node of the path that was referenced but never declared.
pub(crate) fn check_declared(ctx: &mut Context<'_>, origin: NodeId, path: &[NodeId]) -> bool {
  for id in path {
    if !ctx.is_initialised(*id) {
      let message = format!("{} {} is not declared", ctx.kind(*id), ctx.qualified_name(*id));
      ctx.add_issue(origin, message);
      return false;
    }
  }
  true
}

/// Whether the node sits directly within a top-level section.
pub(crate) fn is_top_level(ctx: &Context<'_>, id: NodeId) -> bool {
  ctx
    .parent(id)
    .and_then(|section| ctx.parent(section))
    .is_some_and(|scope| ctx.kind(scope) == NodeKind::Office)
}

/// Declare the office configuration as a node tree. Returns the office node.
pub(crate) fn declare_office(ctx: &mut Context<'_>, def: &OfficeDef) -> NodeId {
  let office = ctx.root(NodeKind::Office, def.name.clone());
  ctx.initialise(office, || Declared::Office);

  for section in &def.sections {
    declare_section(ctx, office, section);
  }
  for team in &def.teams {
    declare(ctx, office, NodeKind::Team, &team.name, Declared::Team(team.clone()));
  }
  for oversight in &def.oversights {
    declare(ctx, office, NodeKind::Oversight, &oversight.name, Declared::Oversight);
  }
  for governance in &def.governances {
    let state = Declared::Governance(governance.clone());
    declare(ctx, office, NodeKind::Governance, &governance.name, state);
  }
  for administration in &def.administrations {
    let state = Declared::Administration(administration.clone());
    declare(ctx, office, NodeKind::Administration, &administration.name, state);
  }
  for strategy in &def.execution_strategies {
    let state = Declared::ExecutionStrategy(strategy.clone());
    declare(ctx, office, NodeKind::ExecutionStrategy, &strategy.name, state);
  }
  for source in &def.resource_sources {
    let state = Declared::ResourceSource(source.clone());
    let Some(id) = declare(ctx, office, NodeKind::ResourceSource, &source.name, state) else {
      continue;
    };
    for flow in &source.flows {
      declare(ctx, id, NodeKind::SourceFlow, &flow.name, Declared::SourceFlow(flow.clone()));
    }
  }
  for resource in &def.resources {
    let state = Declared::Resource(resource.clone());
    let Some(id) = declare(ctx, office, NodeKind::Resource, &resource.name, state) else {
      continue;
    };
    for dependency in &resource.dependencies {
      let state = Declared::Dependency(dependency.clone());
      declare(ctx, id, NodeKind::Object, &dependency.name, state);
    }
  }
  for escalation in &def.escalations {
    let state = Declared::OfficeEscalation(escalation.clone());
    declare(ctx, office, NodeKind::OfficeEscalation, &escalation.error_type, state);
  }

  office
}

fn declare_section(ctx: &mut Context<'_>, parent: NodeId, def: &SectionDef) {
  let state = Declared::Section {
    governances: def.governances.clone(),
  };
  let Some(section) = declare(ctx, parent, NodeKind::Section, &def.name, state) else {
    return;
  };

  for input in &def.inputs {
    let state = Declared::SectionInput {
      function: input.function.clone(),
    };
    declare(ctx, section, NodeKind::SectionInput, &input.name, state);
  }
  for output in &def.outputs {
    let state = Declared::SectionOutput(output.clone());
    declare(ctx, section, NodeKind::SectionOutput, &output.name, state);
  }
  for function in &def.functions {
    let state = Declared::Function(function.clone());
    let Some(id) = declare(ctx, section, NodeKind::Function, &function.name, state) else {
      continue;
    };
    for flow in &function.flows {
      declare(ctx, id, NodeKind::Flow, &flow.name, Declared::Flow(flow.clone()));
    }
    for object in &function.objects {
      declare(ctx, id, NodeKind::Object, &object.name, Declared::Object(object.clone()));
    }
    for escalation in &function.escalations {
      let state = Declared::Escalation(escalation.clone());
      declare(ctx, id, NodeKind::Escalation, &escalation.error_type, state);
    }
  }
  for sub in &def.subsections {
    declare_section(ctx, section, sub);
  }
}

/// Resolve a link reference within the scope (a section, or the office).
///
/// Targets are created on access so that referencing an undeclared node is
/// reported once the link is followed.
pub(crate) fn resolve(
  ctx: &mut Context<'_>,
  scope: NodeId,
  link: &LinkRef,
  origin: NodeId,
) -> Option<NodeId> {
  let in_section = ctx.kind(scope) == NodeKind::Section;
  match link {
    LinkRef::Function(name) if in_section => Some(ctx.child(scope, NodeKind::Function, name)),
    LinkRef::Output(name) if in_section => Some(ctx.child(scope, NodeKind::SectionOutput, name)),
    LinkRef::Function(name) | LinkRef::Output(name) => {
      ctx.add_issue(
        origin,
        format!("'{}' can only be linked to a section input at office level", name),
      );
      None
    }
    LinkRef::Input { section, input } => {
      let section = ctx.child(scope, NodeKind::Section, section);
      Some(ctx.child(section, NodeKind::SectionInput, input))
    }
  }
}

fn resolve_and_link(
  ctx: &mut Context<'_>,
  scope: NodeId,
  source: NodeId,
  slot: LinkSlot,
  link: &LinkRef,
) {
  if let Some(target) = resolve(ctx, scope, link, source) {
    ctx.link(source, slot, target);
  }
}

/// Link the named references of the declared office.
pub(crate) fn link_office(ctx: &mut Context<'_>, office: NodeId) {
  for section in declared_children(ctx, office, NodeKind::Section) {
    link_section(ctx, office, office, section);
  }

  for team in declared_children(ctx, office, NodeKind::Team) {
    if let Some(Declared::Team(TeamDef {
      oversight: Some(oversight),
      ..
    })) = ctx.state(team).cloned()
    {
      let target = ctx.child(office, NodeKind::Oversight, &oversight);
      ctx.link(team, LinkSlot::Oversight, target);
    }
  }

  for source in declared_children(ctx, office, NodeKind::ResourceSource) {
    for flow in declared_children(ctx, source, NodeKind::SourceFlow) {
      if let Some(Declared::SourceFlow(def)) = ctx.state(flow).cloned() {
        resolve_and_link(ctx, office, flow, LinkSlot::Flow, &def.target);
      }
    }
  }

  for resource in declared_children(ctx, office, NodeKind::Resource) {
    for dependency in declared_children(ctx, resource, NodeKind::Object) {
      if let Some(Declared::Dependency(ResourceDependencyDef {
        resource: Some(name),
        ..
      })) = ctx.state(dependency).cloned()
      {
        let target = ctx.child(office, NodeKind::Resource, &name);
        ctx.link(dependency, LinkSlot::Object, target);
      }
    }
  }

  for escalation in declared_children(ctx, office, NodeKind::OfficeEscalation) {
    if let Some(Declared::OfficeEscalation(def)) = ctx.state(escalation).cloned() {
      resolve_and_link(ctx, office, escalation, LinkSlot::Flow, &def.target);
    }
  }
}

fn link_section(ctx: &mut Context<'_>, office: NodeId, scope: NodeId, section: NodeId) {
  for input in declared_children(ctx, section, NodeKind::SectionInput) {
    if let Some(Declared::SectionInput { function }) = ctx.state(input).cloned() {
      let target = ctx.child(section, NodeKind::Function, &function);
      ctx.link(input, LinkSlot::Flow, target);
    }
  }

  // outputs leave the section, so resolve in the enclosing scope
  for output in declared_children(ctx, section, NodeKind::SectionOutput) {
    if let Some(Declared::SectionOutput(SectionOutputDef {
      target: Some(target),
      ..
    })) = ctx.state(output).cloned()
    {
      resolve_and_link(ctx, scope, output, LinkSlot::Flow, &target);
    }
  }

  for function in declared_children(ctx, section, NodeKind::Function) {
    let Some(Declared::Function(def)) = ctx.state(function).cloned() else {
      continue;
    };

    for flow in declared_children(ctx, function, NodeKind::Flow) {
      if let Some(Declared::Flow(FlowDef {
        target: Some(target),
        ..
      })) = ctx.state(flow).cloned()
      {
        resolve_and_link(ctx, section, flow, LinkSlot::Flow, &target);
      }
    }
    if let Some(next) = &def.next {
      resolve_and_link(ctx, section, function, LinkSlot::Flow, next);
    }
    for escalation in declared_children(ctx, function, NodeKind::Escalation) {
      if let Some(Declared::Escalation(EscalationDef {
        target: Some(target),
        ..
      })) = ctx.state(escalation).cloned()
      {
        resolve_and_link(ctx, section, escalation, LinkSlot::Flow, &target);
      }
    }
    for object in declared_children(ctx, function, NodeKind::Object) {
      if let Some(Declared::Object(ObjectDef {
        resource: Some(name),
        ..
      })) = ctx.state(object).cloned()
      {
        let target = ctx.child(office, NodeKind::Resource, &name);
        ctx.link(object, LinkSlot::Object, target);
      }
    }
    if let Some(team) = &def.team {
      let target = ctx.child(office, NodeKind::Team, team);
      ctx.link(function, LinkSlot::Team, target);
    }
  }

  for sub in declared_children(ctx, section, NodeKind::Section) {
    link_section(ctx, office, section, sub);
  }
}
