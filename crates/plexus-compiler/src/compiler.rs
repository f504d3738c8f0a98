use std::collections::{HashMap, HashSet};

use plexus_config::OfficeDef;
use plexus_node::{AutoWirer, CompilerIssues, NodeId, NodeKind, RecordingIssues};
use plexus_office::OfficeMeta;
use plexus_type_loader::TypeLoader;
use tracing::{info, instrument};

use crate::declare::{Context, Declared, declare_office, declared_children, link_office};
use crate::error::CompileError;
use crate::function::FunctionCompiler;
use crate::office::{
  compile_administrations, compile_execution_strategies, compile_governances, compile_inputs,
  compile_office_escalations, compile_teams,
};
use crate::resource::{ResourceBinding, prune_unbound};
use crate::types::TypeCache;

/// Compiles office configuration into metadata.
pub struct Compiler {
  loader: Box<dyn TypeLoader>,
}

impl Compiler {
  pub fn new(loader: impl TypeLoader + 'static) -> Self {
    Self {
      loader: Box::new(loader),
    }
  }

  /// Compile the office, reporting every problem to `issues`.
  ///
  /// Always returns metadata. Functions and resources with issues are left
  /// out of it.
  #[instrument(name = "compile_office", skip_all, fields(office = %def.name))]
  pub async fn compile(&self, def: &OfficeDef, issues: &mut dyn CompilerIssues) -> OfficeMeta {
    let types = TypeCache::load(self.loader.as_ref(), def).await;

    let mut ctx = Context::new(issues);
    let mut meta = OfficeMeta {
      name: def.name.clone(),
      ..Default::default()
    };

    let office = declare_office(&mut ctx, def);
    link_office(&mut ctx, office);

    compile_execution_strategies(&mut ctx, office, &mut meta);
    compile_teams(&mut ctx, &types, def, office, &mut meta);
    compile_governances(&mut ctx, &types, def, office, &mut meta);
    compile_administrations(&mut ctx, &types, def, office, &mut meta);

    let mut resources = ResourceBinding::prepare(&mut ctx, &types, def, office);
    let teams = team_wirer(&ctx, office, &meta);

    let mut sections = Vec::new();
    for section in declared_children(&ctx, office, NodeKind::Section) {
      section_functions(&ctx, section, &mut sections);
    }
    let source_functions = resources.source_functions(&ctx);
    let nodes: HashMap<String, NodeId> = sections
      .iter()
      .chain(&source_functions)
      .map(|node| (ctx.qualified_name(*node), *node))
      .collect();
    let compiled_teams: HashSet<String> = meta.teams.keys().cloned().collect();

    let compiled = {
      let compiler = FunctionCompiler {
        types: &types,
        def,
        office,
        resources: resources.wirer(),
        capabilities: resources.capabilities(),
        teams: &teams,
        compiled_teams: &compiled_teams,
      };

      for node in sections {
        if let Some(function) = compiler.compile(&mut ctx, node) {
          meta.functions.insert(function.name.clone(), function);
        }
      }
      source_functions
        .into_iter()
        .filter_map(|node| compiler.compile(&mut ctx, node).map(|function| (node, function)))
        .collect::<Vec<_>>()
    };
    for (node, function) in compiled {
      resources.register_function(&ctx, node, function);
    }

    resources.bind(&mut ctx, &types, office, &mut meta);
    prune_unbound(&mut ctx, office, &nodes, &mut meta);
    compile_inputs(&mut ctx, office, &mut meta);
    compile_office_escalations(&mut ctx, office, &mut meta);

    info!(
      nodes = ctx.len(),
      functions = meta.functions.len(),
      resources = meta.resources.len(),
      teams = meta.teams.len(),
      "office_compiled"
    );
    meta
  }

  /// Compile the office, failing when any issue is reported.
  pub async fn compile_checked(&self, def: &OfficeDef) -> Result<OfficeMeta, CompileError> {
    let mut issues = RecordingIssues::new();
    let meta = self.compile(def, &mut issues).await;
    if issues.is_empty() {
      Ok(meta)
    } else {
      Err(CompileError::Issues {
        office: def.name.clone(),
        issues: issues.into_issues(),
      })
    }
  }
}

/// Function nodes of the section and its subsections, depth first.
fn section_functions(ctx: &Context<'_>, section: NodeId, functions: &mut Vec<NodeId>) {
  functions.extend(declared_children(ctx, section, NodeKind::Function));
  for sub in declared_children(ctx, section, NodeKind::Section) {
    section_functions(ctx, sub, functions);
  }
}

/// Candidate teams for auto-wiring, by the dependency types they qualify for.
fn team_wirer(ctx: &Context<'_>, office: NodeId, meta: &OfficeMeta) -> AutoWirer<String> {
  let mut wirer = AutoWirer::new();
  for node in declared_children(ctx, office, NodeKind::Team) {
    let Some(Declared::Team(team)) = ctx.state(node) else {
      continue;
    };
    if !meta.teams.contains_key(&team.name) || team.type_qualifications.is_empty() {
      continue;
    }
    wirer.add_candidate(team.name.clone(), team.type_qualifications.iter().cloned());
  }
  wirer
}
