//! Two-phase binding of resource sources.
//!
//! Resources (and functions added by their source) are declared before the
//! office is compiled, but can only be finished once their source is bound:
//! its recycle function resolved and its strategy and flow slots validated.
//! Each registers with the source's [`Binder`] and is completed when the
//! source binds. A source failing to bind leaves all of them out, along with
//! everything depending on them (see [`prune_unbound`]).

use std::collections::{HashMap, HashSet};

use plexus_config::{AutoWire, OfficeDef, ResourceSourceDef};
use plexus_node::{AutoWireMatch, AutoWirer, Binder, LinkSlot, NodeId, NodeKind};
use plexus_office::{
  DependencyMeta, FunctionMeta, InstigationStrategy, OfficeMeta, ResourceMeta, ResourceSourceMeta,
  SourceFlowMeta, SourceStrategyMeta,
};
use plexus_type_loader::{ANY_TYPE, RECYCLE_PARAMETER_TYPE, ResourceSourceType, is_assignable};
use tracing::{debug, warn};

use crate::declare::{Context, Declared, check_declared, declare, declared_children};
use crate::function::{escalation_only_output, parameter_type};
use crate::office::is_declared;
use crate::types::{TypeCache, check_required_properties};

/// Office context a source is bound with.
#[derive(Debug, Clone)]
pub(crate) struct BoundSource {
  name: String,
  recycle_function: Option<String>,
  input_resource: Option<String>,
}

pub(crate) enum Bound {
  Resource(ResourceMeta),
  Function(FunctionMeta),
}

struct SourceBinding {
  node: NodeId,
  def: ResourceSourceDef,
  source_type: ResourceSourceType,
  binder: Binder<'static, BoundSource, Bound>,
}

/// Resources awaiting the binding of their sources.
pub(crate) struct ResourceBinding {
  sources: Vec<SourceBinding>,
  wirer: AutoWirer<String>,
  capabilities: HashMap<String, Vec<AutoWire>>,
}

impl ResourceBinding {
  /// Phase one: type the sources and register their resources.
  pub(crate) fn prepare(
    ctx: &mut Context<'_>,
    types: &TypeCache,
    def: &OfficeDef,
    office: NodeId,
  ) -> Self {
    let mut binding = Self {
      sources: Vec::new(),
      wirer: AutoWirer::new(),
      capabilities: HashMap::new(),
    };

    for node in declared_children(ctx, office, NodeKind::ResourceSource) {
      let Some(Declared::ResourceSource(source)) = ctx.state(node).cloned() else {
        continue;
      };
      let Some(source_type) = types
        .resource_source_type(ctx, node, &source.source_type)
        .cloned()
      else {
        continue;
      };
      let properties = source.properties.override_with(&def.overrides_for(&source.name));
      if !check_required_properties(ctx, node, &source_type.required_properties, &properties) {
        continue;
      }

      for function in &source_type.functions {
        let state = Declared::SourceFunction(function.function.clone());
        declare(ctx, node, NodeKind::Function, &function.name, state);
      }

      binding.sources.push(SourceBinding {
        node,
        def: ResourceSourceDef {
          properties,
          ..source
        },
        source_type,
        binder: Binder::new(),
      });
    }

    // every resource is a candidate before any dependency is auto-wired
    let mut resources = Vec::new();
    for node in declared_children(ctx, office, NodeKind::Resource) {
      let Some(Declared::Resource(resource)) = ctx.state(node).cloned() else {
        continue;
      };
      let Some(index) = binding.source_index(&resource.source) else {
        if !is_declared(ctx, office, NodeKind::ResourceSource, &resource.source) {
          let message = format!("Resource Source {} is not declared", resource.source);
          ctx.add_issue(node, message);
        }
        continue;
      };

      let source_type = &binding.sources[index].source_type;
      let mut capabilities = vec![AutoWire::new(source_type.object_type.clone())];
      capabilities.extend(resource.type_qualifications.iter().cloned());
      binding
        .wirer
        .add_candidate(resource.name.clone(), capabilities.clone());
      binding
        .capabilities
        .insert(resource.name.clone(), capabilities);
      resources.push((node, index, resource));
    }

    let mut dependencies = HashMap::new();
    for (node, index, resource) in &resources {
      let source_type = binding.sources[*index].source_type.clone();
      let mut valid = true;
      let mut resolved = Vec::new();

      for dependency in &source_type.dependencies {
        let object = ctx.child(*node, NodeKind::Object, &dependency.name);
        let required = AutoWire {
          qualifier: dependency.qualifier.clone(),
          type_name: dependency.type_name.clone(),
        };
        match bind_resource(ctx, office, object, &[required], def.auto_wire_objects, &binding.wirer) {
          Some(name) => resolved.push(DependencyMeta {
            name: dependency.name.clone(),
            resource: name,
          }),
          None => valid = false,
        }
      }
      for object in declared_children(ctx, *node, NodeKind::Object) {
        let name = ctx.name(object).to_string();
        if !source_type.dependencies.iter().any(|d| d.name == name) {
          let message = format!(
            "Dependency {} is not declared by type '{}'",
            name, binding.sources[*index].def.source_type
          );
          ctx.add_issue(*node, message);
          valid = false;
        }
      }

      if valid {
        dependencies.insert(resource.name.clone(), resolved);
      }
    }

    for (node, index, resource) in resources {
      let Some(resolved) = dependencies.get(&resource.name) else {
        continue;
      };
      if has_cycle(&resource.name, &dependencies) {
        let message = format!("Resource {} has a cyclic dependency", resource.name);
        ctx.add_issue(node, message);
        continue;
      }

      let resolved = resolved.clone();
      binding.sources[index].binder.on_bound(move |bound| {
        let input = resource.input || bound.input_resource.as_deref() == Some(resource.name.as_str());
        Bound::Resource(ResourceMeta {
          name: resource.name,
          source: bound.name.clone(),
          scope: resource.scope,
          input,
          dependencies: resolved,
          recycle_function: bound.recycle_function.clone(),
        })
      });
    }

    binding
  }

  pub(crate) fn wirer(&self) -> &AutoWirer<String> {
    &self.wirer
  }

  /// Auto-wire capabilities of each resource.
  pub(crate) fn capabilities(&self) -> &HashMap<String, Vec<AutoWire>> {
    &self.capabilities
  }

  /// Function nodes added by the sources being bound.
  pub(crate) fn source_functions(&self, ctx: &Context<'_>) -> Vec<NodeId> {
    self
      .sources
      .iter()
      .flat_map(|source| declared_children(ctx, source.node, NodeKind::Function))
      .collect()
  }

  /// Register a compiled function added by the source.
  pub(crate) fn register_function(&mut self, ctx: &Context<'_>, node: NodeId, function: FunctionMeta) {
    let Some(source) = ctx.parent(node) else {
      return;
    };
    if let Some(binding) = self.sources.iter_mut().find(|s| s.node == source) {
      binding.binder.on_bound(move |bound| {
        Bound::Function(FunctionMeta {
          source: Some(bound.name.clone()),
          ..function
        })
      });
    }
  }

  fn source_index(&self, name: &str) -> Option<usize> {
    self.sources.iter().position(|s| s.def.name == name)
  }

  /// Phase two: bind each source now the office is compiled.
  pub(crate) fn bind(
    self,
    ctx: &mut Context<'_>,
    types: &TypeCache,
    office: NodeId,
    meta: &mut OfficeMeta,
  ) {
    for mut source in self.sources {
      let name = source.def.name.clone();

      let Some(recycle_function) = recycle_function(ctx, &source) else {
        warn!(source = %name, "resource_source_binding_aborted");
        continue;
      };

      let mut valid = true;
      let execution_strategies = execution_strategies(ctx, office, &source, &mut valid);
      let flows = source_flows(ctx, types, office, &source, &mut valid);
      if !valid {
        warn!(source = %name, "resource_source_binding_aborted");
        continue;
      }

      source.binder.bind(BoundSource {
        name: name.clone(),
        recycle_function: recycle_function.clone(),
        input_resource: source.def.input_resource.clone(),
      });

      meta.resource_sources.insert(
        name.clone(),
        ResourceSourceMeta {
          name: name.clone(),
          source_type: source.def.source_type.clone(),
          object_type: source.source_type.object_type.clone(),
          properties: source.def.properties.clone(),
          timeout_ms: source.def.timeout_ms,
          recycle_function,
          input_resource: source.def.input_resource.clone(),
          flows,
          execution_strategies,
        },
      );

      for bound in source.binder.into_completed() {
        match bound {
          Bound::Resource(resource) => {
            meta.resources.insert(resource.name.clone(), resource);
          }
          Bound::Function(function) => {
            meta.functions.insert(function.name.clone(), function);
          }
        }
      }
      debug!(source = %name, "resource_source_bound");
    }
  }
}

/// Drop every source, resource and function referring to something missing
/// from the metadata, until nothing is left dangling. Each dropped node gets
/// an issue naming what it was missing.
pub(crate) fn prune_unbound(
  ctx: &mut Context<'_>,
  office: NodeId,
  functions: &HashMap<String, NodeId>,
  meta: &mut OfficeMeta,
) {
  loop {
    let mut sources = Vec::new();
    for source in meta.resource_sources.values() {
      let missing = source
        .recycle_function
        .iter()
        .chain(source.flows.iter().map(|flow| &flow.function))
        .find(|function| !meta.functions.contains_key(function.as_str()));
      if let Some(function) = missing {
        sources.push((source.name.clone(), format!("Function {} is not compiled", function)));
      }
    }

    let mut resources = Vec::new();
    for resource in meta.resources.values() {
      let message = if !meta.resource_sources.contains_key(&resource.source) {
        format!("Resource Source {} is not bound", resource.source)
      } else if let Some(dependency) = resource
        .dependencies
        .iter()
        .find(|d| !meta.resources.contains_key(&d.resource))
      {
        format!("Resource {} is not bound", dependency.resource)
      } else {
        continue;
      };
      resources.push((resource.name.clone(), message));
    }

    let mut dropped = Vec::new();
    for function in meta.functions.values() {
      if let Some(message) = unbound_reference(function, meta) {
        dropped.push((function.name.clone(), message));
      }
    }

    if sources.is_empty() && resources.is_empty() && dropped.is_empty() {
      return;
    }

    for (name, message) in sources {
      meta.resource_sources.shift_remove(&name);
      let node = ctx.find_child(office, NodeKind::ResourceSource, &name);
      ctx.add_issue(node.unwrap_or(office), message);
      warn!(source = %name, "resource_source_binding_aborted");
    }
    for (name, message) in resources {
      meta.resources.shift_remove(&name);
      let node = ctx.find_child(office, NodeKind::Resource, &name);
      ctx.add_issue(node.unwrap_or(office), message);
    }
    for (name, message) in dropped {
      meta.functions.shift_remove(&name);
      let node = functions.get(&name).copied();
      ctx.add_issue(node.unwrap_or(office), message);
      debug!(function = %name, "function_pruned");
    }
  }
}

/// First reference of the function that is missing from the metadata.
fn unbound_reference(function: &FunctionMeta, meta: &OfficeMeta) -> Option<String> {
  if let Some(source) = &function.source
    && !meta.resource_sources.contains_key(source)
  {
    return Some(format!("Resource Source {} is not bound", source));
  }
  if let Some(resource) = function
    .resources()
    .find(|r| !meta.resources.contains_key(*r))
  {
    return Some(format!("Resource {} is not bound", resource));
  }
  if let Some(target) = function
    .targets()
    .find(|f| !meta.functions.contains_key(*f))
  {
    return Some(format!("Function {} is not compiled", target));
  }
  if let Some(governance) = function
    .governances
    .iter()
    .find(|g| !meta.governances.contains_key(*g))
  {
    return Some(format!("Governance {} is not compiled", governance));
  }
  function
    .pre_administration
    .iter()
    .chain(&function.post_administration)
    .find(|a| !meta.administrations.contains_key(*a))
    .map(|administration| format!("Administration {} is not compiled", administration))
}

/// Resolve the source's recycle function, if it declares one.
///
/// Returns None when binding must abort.
fn recycle_function(ctx: &mut Context<'_>, source: &SourceBinding) -> Option<Option<String>> {
  let Some(name) = &source.source_type.recycle_function else {
    return Some(None);
  };
  let Some(function) = source.source_type.function(name) else {
    let message = format!("Recycle function '{}' is not added by the resource source", name);
    ctx.add_issue(source.node, message);
    return None;
  };

  match function.function.parameter_type() {
    None | Some(ANY_TYPE) | Some(RECYCLE_PARAMETER_TYPE) => {}
    Some(other) => {
      let message = format!(
        "Incompatible parameter type for recycle function (parameter={}, required type={})",
        other, RECYCLE_PARAMETER_TYPE
      );
      ctx.add_issue(source.node, message);
      return None;
    }
  }

  let node = ctx.find_child(source.node, NodeKind::Function, name)?;
  Some(Some(ctx.qualified_name(node)))
}

/// Match configured execution strategies 1:1 to the slots the source requires.
fn execution_strategies(
  ctx: &mut Context<'_>,
  office: NodeId,
  source: &SourceBinding,
  valid: &mut bool,
) -> Vec<SourceStrategyMeta> {
  let required = &source.source_type.execution_strategies;
  let configured = &source.def.execution_strategies;
  let mut strategies = Vec::new();

  for (index, slot) in required.iter().enumerate() {
    let Some(strategy) = configured.iter().find(|s| &s.name == slot) else {
      let message = format!(
        "No execution strategy configured for execution strategy {} ({})",
        index, slot
      );
      ctx.add_issue(source.node, message);
      *valid = false;
      continue;
    };
    if !is_declared(ctx, office, NodeKind::ExecutionStrategy, &strategy.strategy) {
      let message = format!("Execution Strategy {} is not declared", strategy.strategy);
      ctx.add_issue(source.node, message);
      *valid = false;
      continue;
    }
    strategies.push(SourceStrategyMeta {
      name: slot.clone(),
      strategy: strategy.strategy.clone(),
    });
  }

  if configured.iter().any(|s| !required.contains(&s.name)) {
    let message = format!(
      "Extra execution strategies configured ({} configured, {} required)",
      configured.len(),
      required.len()
    );
    ctx.add_issue(source.node, message);
    *valid = false;
  }

  strategies
}

/// Match configured flows 1:1 to the flows the source instigates.
fn source_flows(
  ctx: &mut Context<'_>,
  types: &TypeCache,
  office: NodeId,
  source: &SourceBinding,
  valid: &mut bool,
) -> Vec<SourceFlowMeta> {
  let required = &source.source_type.flows;
  let configured = declared_children(ctx, source.node, NodeKind::SourceFlow);
  let mut flows = Vec::new();

  if !required.is_empty() {
    match &source.def.input_resource {
      None => {
        let message = format!("Resource Source {} must have an input resource", source.def.name);
        ctx.add_issue(source.node, message);
        *valid = false;
      }
      Some(input) => {
        let bound_to_source = ctx
          .find_child(office, NodeKind::Resource, input)
          .and_then(|id| ctx.state(id))
          .is_some_and(|state| {
            matches!(state, Declared::Resource(resource) if resource.source == source.def.name)
          });
        if !bound_to_source {
          let message = format!(
            "Input resource {} is not a resource of Resource Source {}",
            input, source.def.name
          );
          ctx.add_issue(source.node, message);
          *valid = false;
        }
      }
    }
  }

  for (index, flow_type) in required.iter().enumerate() {
    let Some(node) = configured
      .iter()
      .copied()
      .find(|id| ctx.name(*id) == flow_type.name)
    else {
      let message = format!("No flow configured for flow {} ({})", index, flow_type.name);
      ctx.add_issue(source.node, message);
      *valid = false;
      continue;
    };

    let Some(furthest) = ctx.find_furthest_target(
      node,
      LinkSlot::Flow,
      &[NodeKind::SectionInput, NodeKind::SectionOutput],
    ) else {
      *valid = false;
      continue;
    };
    if !check_declared(ctx, node, &furthest.path) {
      *valid = false;
      continue;
    }
    if let Some(output) = escalation_only_output(ctx, &furthest.path) {
      let message = format!(
        "Section Output {} only carries escalations",
        ctx.qualified_name(output)
      );
      ctx.add_issue(node, message);
      *valid = false;
      continue;
    }
    if ctx.kind(furthest.target) != NodeKind::Function {
      let message = format!("Source Flow {} is not linked to a Function", flow_type.name);
      ctx.add_issue(node, message);
      *valid = false;
      continue;
    }
    let parameter = parameter_type(ctx, types, furthest.target);
    if !is_assignable(flow_type.argument_type.as_deref(), parameter.as_deref()) {
      let message = format!(
        "Argument type '{}' of Source Flow {} is incompatible with parameter type '{}'",
        flow_type.argument_type.as_deref().unwrap_or_default(),
        flow_type.name,
        parameter.as_deref().unwrap_or_default()
      );
      ctx.add_issue(node, message);
      *valid = false;
      continue;
    }

    flows.push(SourceFlowMeta {
      name: flow_type.name.clone(),
      function: ctx.qualified_name(furthest.target),
      strategy: InstigationStrategy::Asynchronous,
      argument_type: flow_type.argument_type.clone(),
    });
  }

  let extra = configured
    .iter()
    .any(|id| !required.iter().any(|f| f.name == ctx.name(*id)));
  if extra {
    let message = format!(
      "Extra flows configured ({} configured, {} required)",
      configured.len(),
      required.len()
    );
    ctx.add_issue(source.node, message);
    *valid = false;
  }

  flows
}

/// Bind an object (or resource dependency) node to a resource: the explicit
/// link if configured, otherwise by auto-wiring when enabled.
pub(crate) fn bind_resource(
  ctx: &mut Context<'_>,
  office: NodeId,
  object: NodeId,
  required: &[AutoWire],
  auto_wire: bool,
  wirer: &AutoWirer<String>,
) -> Option<String> {
  if let Some(target) = ctx.linked(object, LinkSlot::Object) {
    if !check_declared(ctx, object, &[target]) {
      return None;
    }
    return Some(ctx.name(target).to_string());
  }

  let describe = || {
    required
      .iter()
      .map(|r| r.to_string())
      .collect::<Vec<_>>()
      .join(", ")
  };
  if !auto_wire {
    let message = format!("Object {} is not linked to a Resource", ctx.name(object));
    ctx.add_issue(object, message);
    return None;
  }

  match wirer.find_match(required) {
    AutoWireMatch::Single(resource) => {
      let target = ctx.child(office, NodeKind::Resource, &resource);
      ctx.link(object, LinkSlot::Object, target);
      Some(resource)
    }
    AutoWireMatch::None => {
      let message = format!("No Resource auto-wired for {}", describe());
      ctx.add_issue(object, message);
      None
    }
    AutoWireMatch::Ambiguous(candidates) => {
      let message = format!(
        "Ambiguous auto-wire for {} (resources {})",
        describe(),
        candidates.join(", ")
      );
      ctx.add_issue(object, message);
      None
    }
  }
}

fn has_cycle(start: &str, dependencies: &HashMap<String, Vec<DependencyMeta>>) -> bool {
  let mut visited = HashSet::new();
  let mut stack: Vec<&str> = dependencies
    .get(start)
    .map(|deps| deps.iter().map(|d| d.resource.as_str()).collect())
    .unwrap_or_default();

  while let Some(current) = stack.pop() {
    if current == start {
      return true;
    }
    if visited.insert(current)
      && let Some(deps) = dependencies.get(current)
    {
      stack.extend(deps.iter().map(|d| d.resource.as_str()));
    }
  }
  false
}

#[cfg(test)]
mod tests {
  use super::*;

  fn deps(pairs: &[(&str, &[&str])]) -> HashMap<String, Vec<DependencyMeta>> {
    pairs
      .iter()
      .map(|(name, targets)| {
        let targets = targets
          .iter()
          .map(|t| DependencyMeta {
            name: t.to_string(),
            resource: t.to_string(),
          })
          .collect();
        (name.to_string(), targets)
      })
      .collect()
  }

  #[test]
  fn test_has_cycle() {
    let dependencies = deps(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"]), ("d", &["a"])]);
    assert!(has_cycle("a", &dependencies));
    // d reaches the cycle but is not part of it
    assert!(!has_cycle("d", &dependencies));

    let dependencies = deps(&[("a", &["b", "c"]), ("b", &["c"]), ("c", &[])]);
    assert!(!has_cycle("a", &dependencies));
  }
}
