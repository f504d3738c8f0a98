use std::collections::{BTreeSet, HashMap};

use futures::future::join_all;
use plexus_config::{OfficeDef, PropertyList, SectionDef};
use plexus_node::{NodeContext, NodeId};
use plexus_type_loader::{
  AdministrationType, FunctionType, GovernanceType, ResourceSourceType, TeamType, TypeLoader,
  TypeManifest,
};
use tracing::debug;

/// Manifests of every type referenced by an office, loaded up front so the
/// rest of the compile is synchronous.
pub(crate) struct TypeCache {
  types: HashMap<String, Result<Option<TypeManifest>, String>>,
}

impl TypeCache {
  pub(crate) async fn load(loader: &dyn TypeLoader, office: &OfficeDef) -> Self {
    let names = referenced_types(office);
    let results = join_all(names.iter().map(|name| loader.load(name))).await;

    let types: HashMap<_, _> = names
      .into_iter()
      .zip(results)
      .map(|(name, result)| (name, result.map_err(|e| e.to_string())))
      .collect();

    debug!(office = %office.name, types = types.len(), "types_loaded");
    Self { types }
  }

  /// Function type if loaded, without reporting anything.
  pub(crate) fn peek_function_type(&self, type_name: &str) -> Option<&FunctionType> {
    match self.types.get(type_name) {
      Some(Ok(Some(TypeManifest::Function(function_type)))) => Some(function_type),
      _ => None,
    }
  }

  fn manifest<S>(
    &self,
    ctx: &mut NodeContext<'_, S>,
    node: NodeId,
    type_name: &str,
  ) -> Option<&TypeManifest> {
    match self.types.get(type_name) {
      Some(Ok(Some(manifest))) => Some(manifest),
      Some(Ok(None)) | None => {
        ctx.add_issue(node, format!("Unknown type '{}'", type_name));
        None
      }
      Some(Err(e)) => {
        ctx.add_issue(node, format!("Failed to load type '{}': {}", type_name, e));
        None
      }
    }
  }

  fn typed<'a, S, T>(
    &'a self,
    ctx: &mut NodeContext<'_, S>,
    node: NodeId,
    type_name: &str,
    expected: &str,
    extract: impl Fn(&'a TypeManifest) -> Option<&'a T>,
  ) -> Option<&'a T> {
    let manifest = self.manifest(ctx, node, type_name)?;
    let typed = extract(manifest);
    if typed.is_none() {
      ctx.add_issue(
        node,
        format!(
          "Type '{}' is a {} type, expected a {} type",
          type_name,
          manifest.kind(),
          expected
        ),
      );
    }
    typed
  }

  pub(crate) fn function_type<S>(
    &self,
    ctx: &mut NodeContext<'_, S>,
    node: NodeId,
    type_name: &str,
  ) -> Option<&FunctionType> {
    self.typed(ctx, node, type_name, "function", |m| match m {
      TypeManifest::Function(t) => Some(t),
      _ => None,
    })
  }

  pub(crate) fn resource_source_type<S>(
    &self,
    ctx: &mut NodeContext<'_, S>,
    node: NodeId,
    type_name: &str,
  ) -> Option<&ResourceSourceType> {
    self.typed(ctx, node, type_name, "resource source", |m| match m {
      TypeManifest::ResourceSource(t) => Some(t),
      _ => None,
    })
  }

  pub(crate) fn team_type<S>(
    &self,
    ctx: &mut NodeContext<'_, S>,
    node: NodeId,
    type_name: &str,
  ) -> Option<&TeamType> {
    self.typed(ctx, node, type_name, "team", |m| match m {
      TypeManifest::Team(t) => Some(t),
      _ => None,
    })
  }

  pub(crate) fn governance_type<S>(
    &self,
    ctx: &mut NodeContext<'_, S>,
    node: NodeId,
    type_name: &str,
  ) -> Option<&GovernanceType> {
    self.typed(ctx, node, type_name, "governance", |m| match m {
      TypeManifest::Governance(t) => Some(t),
      _ => None,
    })
  }

  pub(crate) fn administration_type<S>(
    &self,
    ctx: &mut NodeContext<'_, S>,
    node: NodeId,
    type_name: &str,
  ) -> Option<&AdministrationType> {
    self.typed(ctx, node, type_name, "administration", |m| match m {
      TypeManifest::Administration(t) => Some(t),
      _ => None,
    })
  }
}

/// Report every required property missing from the list.
pub(crate) fn check_required_properties<S>(
  ctx: &mut NodeContext<'_, S>,
  node: NodeId,
  required: &[String],
  properties: &PropertyList,
) -> bool {
  let mut satisfied = true;
  for name in required {
    if properties.get(name).is_none() {
      ctx.add_issue(node, format!("Must specify property '{}'", name));
      satisfied = false;
    }
  }
  satisfied
}

fn referenced_types(office: &OfficeDef) -> BTreeSet<String> {
  fn section_types(section: &SectionDef, names: &mut BTreeSet<String>) {
    for function in &section.functions {
      names.insert(function.function_type.clone());
    }
    for sub in &section.subsections {
      section_types(sub, names);
    }
  }

  let mut names = BTreeSet::new();
  for section in &office.sections {
    section_types(section, &mut names);
  }
  names.extend(office.teams.iter().map(|t| t.team_type.clone()));
  names.extend(office.resource_sources.iter().map(|s| s.source_type.clone()));
  names.extend(office.governances.iter().map(|g| g.governance_type.clone()));
  names.extend(
    office
      .administrations
      .iter()
      .map(|a| a.administration_type.clone()),
  );
  names
}
