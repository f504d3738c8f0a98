//! Executing a built office.
//!
//! Every invocation runs as a process. A function's resources are sourced,
//! its governance activated and its pre-administration run before its logic
//! is assigned to its team. Once the logic returns, the requested flows are
//! instigated in request order and the next flow last. Escalations follow the
//! chain compiled for the function.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use plexus_office::{
  EscalationHandler, FlowMeta, FlowTarget, FunctionMeta, InstigationStrategy, ObjectBinding,
  PropertyList, ResourceMeta, ResourceScope, ResourceSourceMeta,
};
use tokio::sync::{Mutex, OnceCell, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::RuntimeError;
use crate::escalation::Escalation;
use crate::logic::{
  Administration, AdministrationContext, AdministrationPhase, FunctionContext, Governance,
  Instance, ManagedFunction,
};
use crate::source::{ExecutionStrategy, FlowInvoker, ResourceSource, SourceContext, SourceRequest};
use crate::team::{JobEvent, JobEventKind, Oversight, Team};

/// Value of a flow that left the office through an output.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutput {
  /// Qualified name of the section output, e.g. "checkout.audited"
  pub output: String,
  pub argument: serde_json::Value,
}

/// Result of a completed process.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeResult {
  pub process_id: String,
  pub outputs: Vec<ProcessOutput>,
}

pub(crate) struct FunctionEntry {
  pub(crate) meta: FunctionMeta,
  pub(crate) logic: Arc<dyn ManagedFunction>,
  pub(crate) team: Arc<dyn Team>,
  pub(crate) team_name: String,
  pub(crate) oversight: Option<Arc<dyn Oversight>>,
  pub(crate) governances: Vec<Arc<dyn Governance>>,
  pub(crate) pre_administration: Vec<(Arc<dyn Administration>, Vec<String>)>,
  pub(crate) post_administration: Vec<(Arc<dyn Administration>, Vec<String>)>,
}

pub(crate) struct ResourceEntry {
  pub(crate) meta: ResourceMeta,
  pub(crate) source: Arc<dyn ResourceSource>,
  pub(crate) properties: PropertyList,
  pub(crate) timeout_ms: Option<u64>,
}

pub(crate) struct SourceEntry {
  pub(crate) meta: ResourceSourceMeta,
  pub(crate) logic: Arc<dyn ResourceSource>,
}

/// Immutable office structures shared by every process.
pub(crate) struct OfficeInner {
  pub(crate) name: String,
  pub(crate) functions: HashMap<String, FunctionEntry>,
  pub(crate) inputs: HashMap<String, String>,
  pub(crate) resources: HashMap<String, ResourceEntry>,
  pub(crate) sources: Vec<SourceEntry>,
  pub(crate) strategies: HashMap<String, usize>,
  pub(crate) escalations: HashMap<String, String>,
  pub(crate) cancel: CancellationToken,
}

/// A function to run within a process.
struct Invocation {
  function: String,
  argument: serde_json::Value,
  recycled: Option<Instance>,
}

impl Invocation {
  fn new(function: impl Into<String>, argument: serde_json::Value) -> Self {
    Self {
      function: function.into(),
      argument,
      recycled: None,
    }
  }
}

/// State of one invocation tree.
struct Process {
  id: String,
  inputs: HashMap<String, Instance>,
  resources: Mutex<HashMap<String, Arc<OnceCell<Instance>>>>,
  parallel: Mutex<Vec<JoinHandle<Result<(), RuntimeError>>>>,
  outputs: Mutex<Vec<ProcessOutput>>,
}

impl Process {
  fn new(inputs: HashMap<String, Instance>) -> Self {
    Self {
      id: uuid::Uuid::new_v4().to_string(),
      inputs,
      resources: Mutex::new(HashMap::new()),
      parallel: Mutex::new(Vec::new()),
      outputs: Mutex::new(Vec::new()),
    }
  }

  async fn cell(&self, resource: &str) -> Arc<OnceCell<Instance>> {
    let mut resources = self.resources.lock().await;
    resources
      .entry(resource.to_string())
      .or_insert_with(|| Arc::new(OnceCell::new()))
      .clone()
  }

  /// Wait for every parallel flow, including those they start.
  async fn join_parallel(&self) -> Result<(), RuntimeError> {
    let mut outcome = Ok(());
    loop {
      let handles = std::mem::take(&mut *self.parallel.lock().await);
      if handles.is_empty() {
        return outcome;
      }
      for joined in join_all(handles).await {
        let result = joined
          .map_err(|e| RuntimeError::ParallelFailed {
            message: e.to_string(),
          })
          .and_then(|result| result);
        if outcome.is_ok() {
          outcome = result;
        }
      }
    }
  }

  async fn sourced(&self) -> Vec<(String, Instance)> {
    let resources = self.resources.lock().await;
    resources
      .iter()
      .filter_map(|(name, cell)| cell.get().map(|instance| (name.clone(), instance.clone())))
      .collect()
  }
}

impl OfficeInner {
  pub(crate) async fn invoke_process(
    self: &Arc<Self>,
    name: &str,
    argument: serde_json::Value,
    inputs: HashMap<String, Instance>,
  ) -> Result<InvokeResult, RuntimeError> {
    if self.cancel.is_cancelled() {
      return Err(RuntimeError::Closed);
    }
    let function = self.inputs.get(name).map(String::as_str).unwrap_or(name);
    if !self.functions.contains_key(function) {
      return Err(RuntimeError::UnknownFunction {
        name: name.to_string(),
      });
    }

    let process = Arc::new(Process::new(inputs));
    info!(process_id = %process.id, function = %function, "process_started");

    let result = self.run(&process, Invocation::new(function, argument)).await;
    let joined = process.join_parallel().await;
    for (resource, instance) in process.sourced().await {
      self.recycle(&resource, instance);
    }

    match result.and(joined) {
      Ok(()) => {
        let outputs = std::mem::take(&mut *process.outputs.lock().await);
        info!(process_id = %process.id, outputs = outputs.len(), "process_completed");
        Ok(InvokeResult {
          process_id: process.id.clone(),
          outputs,
        })
      }
      Err(e) => {
        error!(process_id = %process.id, error = %e, "process_failed");
        Err(e)
      }
    }
  }

  fn run<'a>(
    self: &'a Arc<Self>,
    process: &'a Arc<Process>,
    invocation: Invocation,
  ) -> BoxFuture<'a, Result<(), RuntimeError>> {
    async move {
      let entry = self.functions.get(&invocation.function).ok_or_else(|| {
        RuntimeError::UnknownFunction {
          name: invocation.function.clone(),
        }
      })?;
      let name = entry.meta.name.as_str();
      debug!(process_id = %process.id, function = %name, "function_started");

      // instances of function scoped resources live for this invocation only
      let mut scoped = HashMap::new();
      let outcome = self.execute(process, entry, invocation, &mut scoped).await;
      for (resource, instance) in scoped {
        self.recycle(&resource, instance);
      }

      match outcome? {
        Ok(ctx) => {
          self.oversee(entry, process, JobEventKind::Completed);
          self.instigate(process, entry, ctx).await
        }
        Err(escalation) => {
          let kind = JobEventKind::Escalated(escalation.error_type.clone());
          self.oversee(entry, process, kind);
          self.escalate(process, entry, escalation).await
        }
      }
    }
    .boxed()
  }

  /// Source the objects, then run the logic on the function's team between
  /// its governance and administration.
  async fn execute(
    self: &Arc<Self>,
    process: &Arc<Process>,
    entry: &FunctionEntry,
    invocation: Invocation,
    scoped: &mut HashMap<String, Instance>,
  ) -> Result<Result<FunctionContext, Escalation>, RuntimeError> {
    let name = entry.meta.name.clone();

    let mut objects = HashMap::new();
    let mut bound = HashMap::new();
    for object in &entry.meta.objects {
      if let ObjectBinding::Resource(resource) = &object.binding {
        let instance = self.resource(process, resource, scoped).await?;
        objects.insert(object.name.clone(), instance.clone());
        bound.insert(resource.clone(), instance);
      }
    }

    let governances = entry.governances.as_slice();
    for (activated, governance) in governances.iter().enumerate() {
      if let Err(escalation) = governance.activate(&name).await {
        return Ok(Err(disregard(&governances[..activated], &name, escalation).await));
      }
    }
    let pre = administer(&entry.pre_administration, &name, AdministrationPhase::Pre, &bound);
    if let Err(escalation) = pre.await {
      return Ok(Err(disregard(governances, &name, escalation).await));
    }

    let mut ctx = FunctionContext::new(
      name.clone(),
      process.id.clone(),
      invocation.argument,
      entry.meta.properties.clone(),
    )
    .with_objects(objects)
    .with_recycled(invocation.recycled);

    let logic = entry.logic.clone();
    let (sender, receiver) = oneshot::channel();
    let job = async move {
      let result = logic.execute(&mut ctx).await;
      let _ = sender.send((ctx, result));
    };

    self.oversee(entry, process, JobEventKind::Started);
    entry
      .team
      .run(job.boxed())
      .await
      .map_err(|e| RuntimeError::JobFailed {
        function: name.clone(),
        message: e.0,
      })?;
    let (ctx, result) = receiver.await.map_err(|_| RuntimeError::JobFailed {
      function: name.clone(),
      message: "job dropped before completing".to_string(),
    })?;

    if let Err(escalation) = result {
      return Ok(Err(disregard(governances, &name, escalation).await));
    }
    let post = administer(&entry.post_administration, &name, AdministrationPhase::Post, &bound);
    if let Err(escalation) = post.await {
      return Ok(Err(disregard(governances, &name, escalation).await));
    }
    for (enforced, governance) in governances.iter().enumerate() {
      if let Err(escalation) = governance.enforce(&name).await {
        return Ok(Err(disregard(&governances[enforced..], &name, escalation).await));
      }
    }
    Ok(Ok(ctx))
  }

  async fn instigate(
    self: &Arc<Self>,
    process: &Arc<Process>,
    entry: &FunctionEntry,
    ctx: FunctionContext,
  ) -> Result<(), RuntimeError> {
    let (flows, next_argument) = ctx.into_flows();
    for (flow, argument) in flows {
      let meta = entry
        .meta
        .flow(&flow)
        .ok_or_else(|| RuntimeError::UnknownFlow {
          function: entry.meta.name.clone(),
          flow: flow.clone(),
        })?;
      self.instigate_flow(process, meta, argument).await?;
    }
    if let Some(next) = &entry.meta.next {
      self.instigate_flow(process, next, next_argument).await?;
    }
    Ok(())
  }

  async fn instigate_flow(
    self: &Arc<Self>,
    process: &Arc<Process>,
    flow: &FlowMeta,
    argument: serde_json::Value,
  ) -> Result<(), RuntimeError> {
    let function = match &flow.target {
      FlowTarget::Function(function) => function.clone(),
      FlowTarget::Output(output) => {
        debug!(process_id = %process.id, output = %output, "output_reached");
        process.outputs.lock().await.push(ProcessOutput {
          output: output.clone(),
          argument,
        });
        return Ok(());
      }
    };

    match flow.strategy {
      InstigationStrategy::Sequential => self.run(process, Invocation::new(function, argument)).await,
      InstigationStrategy::Parallel => {
        let office = self.clone();
        let joined = process.clone();
        let handle = tokio::spawn(async move {
          office
            .run(&joined, Invocation::new(function, argument))
            .await
        });
        process.parallel.lock().await.push(handle);
        Ok(())
      }
      InstigationStrategy::Asynchronous => {
        let office = self.clone();
        tokio::spawn(async move {
          if let Err(e) = office
            .invoke_process(&function, argument, HashMap::new())
            .await
          {
            warn!(function = %function, error = %e, "asynchronous_flow_failed");
          }
        });
        Ok(())
      }
    }
  }

  async fn escalate(
    self: &Arc<Self>,
    process: &Arc<Process>,
    entry: &FunctionEntry,
    escalation: Escalation,
  ) -> Result<(), RuntimeError> {
    let Some(meta) = entry.meta.escalation(&escalation.error_type) else {
      return Err(RuntimeError::UnhandledEscalation {
        function: entry.meta.name.clone(),
        error_type: escalation.error_type,
      });
    };
    info!(
      process_id = %process.id,
      function = %entry.meta.name,
      error_type = %escalation.error_type,
      "function_escalated"
    );

    let handler = match &meta.handler {
      EscalationHandler::Function { function, .. } => Some(function),
      EscalationHandler::Office => self.escalations.get(&escalation.error_type),
    };
    match handler {
      Some(function) => {
        let invocation = Invocation::new(function.clone(), escalation.to_parameter());
        self.run(process, invocation).await
      }
      None => Err(RuntimeError::Escalated {
        error_type: escalation.error_type,
        message: escalation.message,
        payload: escalation.payload,
      }),
    }
  }

  /// Instance of the resource for the process, sourcing it when needed.
  fn resource<'a>(
    self: &'a Arc<Self>,
    process: &'a Arc<Process>,
    name: &'a str,
    scoped: &'a mut HashMap<String, Instance>,
  ) -> BoxFuture<'a, Result<Instance, RuntimeError>> {
    async move {
      let entry = self
        .resources
        .get(name)
        .ok_or_else(|| RuntimeError::ResourceFailed {
          resource: name.to_string(),
          message: "resource not built".to_string(),
        })?;

      match entry.meta.scope {
        ResourceScope::Process if entry.meta.input => {
          process
            .inputs
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::InputResourceMissing {
              resource: name.to_string(),
            })
        }
        ResourceScope::Process => {
          let cell = process.cell(name).await;
          cell
            .get_or_try_init(move || self.source_instance(process, entry, scoped))
            .await
            .cloned()
        }
        ResourceScope::Function => {
          if let Some(instance) = scoped.get(name) {
            return Ok(instance.clone());
          }
          let instance = self.source_instance(process, entry, scoped).await?;
          scoped.insert(name.to_string(), instance.clone());
          Ok(instance)
        }
      }
    }
    .boxed()
  }

  async fn source_instance(
    self: &Arc<Self>,
    process: &Arc<Process>,
    entry: &ResourceEntry,
    scoped: &mut HashMap<String, Instance>,
  ) -> Result<Instance, RuntimeError> {
    let mut dependencies = HashMap::new();
    for dependency in &entry.meta.dependencies {
      let instance = self.resource(process, &dependency.resource, scoped).await?;
      dependencies.insert(dependency.name.clone(), instance);
    }

    let resource = entry.meta.name.as_str();
    let request = SourceRequest {
      resource,
      properties: &entry.properties,
      dependencies,
    };
    let sourced = match entry.timeout_ms {
      Some(timeout_ms) => {
        tokio::time::timeout(Duration::from_millis(timeout_ms), entry.source.source(request))
          .await
          .map_err(|_| RuntimeError::ResourceTimeout {
            resource: resource.to_string(),
            timeout_ms,
          })?
      }
      None => entry.source.source(request).await,
    };

    let instance = sourced.map_err(|message| RuntimeError::ResourceFailed {
      resource: resource.to_string(),
      message,
    })?;
    debug!(process_id = %process.id, resource = %resource, "resource_sourced");
    Ok(instance)
  }

  /// Hand the instance back to its source's recycle function, in a process of its own.
  fn recycle(self: &Arc<Self>, resource: &str, instance: Instance) {
    let Some(function) = self
      .resources
      .get(resource)
      .and_then(|entry| entry.meta.recycle_function.clone())
    else {
      return;
    };

    let office = self.clone();
    let resource = resource.to_string();
    tokio::spawn(async move {
      let process = Arc::new(Process::new(HashMap::new()));
      let invocation = Invocation {
        function,
        argument: serde_json::json!({ "resource": resource }),
        recycled: Some(instance),
      };
      let result = office.run(&process, invocation).await;
      if let Err(e) = result.and(process.join_parallel().await) {
        warn!(resource = %resource, error = %e, "recycle_failed");
      }
    });
  }

  fn oversee(&self, entry: &FunctionEntry, process: &Process, kind: JobEventKind) {
    if let Some(oversight) = &entry.oversight {
      oversight.observe(&JobEvent {
        team: entry.team_name.clone(),
        function: entry.meta.name.clone(),
        process_id: process.id.clone(),
        kind,
      });
    }
  }
}

/// Disregard the governances still active when the function escalated.
async fn disregard(
  governances: &[Arc<dyn Governance>],
  function: &str,
  escalation: Escalation,
) -> Escalation {
  for governance in governances {
    governance.disregard(function, &escalation).await;
  }
  escalation
}

async fn administer(
  administrations: &[(Arc<dyn Administration>, Vec<String>)],
  function: &str,
  phase: AdministrationPhase,
  bound: &HashMap<String, Instance>,
) -> Result<(), Escalation> {
  for (administration, administers) in administrations {
    let resources: HashMap<String, Instance> = bound
      .iter()
      .filter(|(name, _)| administers.contains(name))
      .map(|(name, instance)| (name.clone(), instance.clone()))
      .collect();
    let ctx = AdministrationContext {
      function,
      phase,
      resources: &resources,
    };
    administration.administer(&ctx).await?;
  }
  Ok(())
}

/// A built office, immutable apart from the processes running within it.
pub struct Office {
  inner: Arc<OfficeInner>,
  started: Mutex<Vec<JoinHandle<()>>>,
}

impl Office {
  pub(crate) fn new(inner: OfficeInner) -> Self {
    Self {
      inner: Arc::new(inner),
      started: Mutex::new(Vec::new()),
    }
  }

  pub fn name(&self) -> &str {
    &self.inner.name
  }

  /// Entry points, "section.input".
  pub fn inputs(&self) -> impl Iterator<Item = &str> {
    self.inner.inputs.keys().map(String::as_str)
  }

  /// Start the resource sources so they may instigate flows.
  #[instrument(name = "office_open", skip(self), fields(office = %self.inner.name))]
  pub async fn open(&self) -> Result<(), RuntimeError> {
    if self.inner.cancel.is_cancelled() {
      return Err(RuntimeError::Closed);
    }
    let mut started = self.started.lock().await;
    if !started.is_empty() {
      return Ok(());
    }

    for source in &self.inner.sources {
      let ctx = self.source_context(&source.meta);
      let logic = source.logic.clone();
      let cancel = ctx.cancel.clone();
      let name = source.meta.name.clone();

      started.push(tokio::spawn(async move {
        tokio::select! {
          result = logic.start(ctx) => {
            if let Err(message) = result {
              error!(source = %name, error = %message, "resource_source_failed");
            }
          }
          _ = cancel.cancelled() => {
            debug!(source = %name, "resource_source_stopped");
          }
        }
      }));
    }
    info!(sources = started.len(), "office_opened");
    Ok(())
  }

  fn source_context(&self, meta: &ResourceSourceMeta) -> SourceContext {
    let flows = meta
      .flows
      .iter()
      .map(|flow| {
        let invoker = FlowInvoker {
          office: Arc::downgrade(&self.inner),
          function: flow.function.clone(),
          input_resource: meta.input_resource.clone(),
        };
        (flow.name.clone(), invoker)
      })
      .collect();
    let strategies = meta
      .execution_strategies
      .iter()
      .map(|slot| {
        let threads = self.inner.strategies.get(&slot.strategy).copied().unwrap_or(1);
        (slot.name.clone(), ExecutionStrategy::new(slot.strategy.clone(), threads))
      })
      .collect();

    SourceContext {
      source: meta.name.clone(),
      properties: meta.properties.clone(),
      flows,
      strategies,
      cancel: self.inner.cancel.child_token(),
    }
  }

  /// Stop the resource sources. Later invocations fail with [`RuntimeError::Closed`].
  #[instrument(name = "office_close", skip(self), fields(office = %self.inner.name))]
  pub async fn close(&self) {
    self.inner.cancel.cancel();
    let started = std::mem::take(&mut *self.started.lock().await);
    for joined in join_all(started).await {
      if let Err(e) = joined {
        warn!(error = %e, "resource_source_join_failed");
      }
    }
    info!("office_closed");
  }

  /// Run the function (or the function an entry point reaches) in a new process.
  #[instrument(name = "office_invoke", skip(self, argument), fields(office = %self.inner.name))]
  pub async fn invoke(
    &self,
    name: &str,
    argument: serde_json::Value,
  ) -> Result<InvokeResult, RuntimeError> {
    self
      .inner
      .invoke_process(name, argument, HashMap::new())
      .await
  }
}
