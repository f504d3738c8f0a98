//! Logic registered with the runtime by type name.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use plexus_config::PropertyList;

use crate::escalation::Escalation;

/// A sourced resource instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Business logic behind a function type.
#[async_trait]
pub trait ManagedFunction: Send + Sync {
  /// Run the function. Flows requested through the context are instigated
  /// once it returns successfully.
  async fn execute(&self, ctx: &mut FunctionContext) -> Result<(), Escalation>;
}

/// What a function sees while it executes.
pub struct FunctionContext {
  function: String,
  process_id: String,
  parameter: serde_json::Value,
  properties: PropertyList,
  objects: HashMap<String, Instance>,
  recycled: Option<Instance>,
  flows: Vec<(String, serde_json::Value)>,
  next: serde_json::Value,
}

impl FunctionContext {
  pub(crate) fn new(
    function: String,
    process_id: String,
    parameter: serde_json::Value,
    properties: PropertyList,
  ) -> Self {
    Self {
      function,
      process_id,
      parameter,
      properties,
      objects: HashMap::new(),
      recycled: None,
      flows: Vec::new(),
      next: serde_json::Value::Null,
    }
  }

  pub(crate) fn with_objects(mut self, objects: HashMap<String, Instance>) -> Self {
    self.objects = objects;
    self
  }

  pub(crate) fn with_recycled(mut self, recycled: Option<Instance>) -> Self {
    self.recycled = recycled;
    self
  }

  /// Qualified name of the function.
  pub fn function(&self) -> &str {
    &self.function
  }

  pub fn process_id(&self) -> &str {
    &self.process_id
  }

  /// Argument of the flow that invoked the function.
  pub fn parameter(&self) -> &serde_json::Value {
    &self.parameter
  }

  pub fn property(&self, name: &str) -> Option<&str> {
    self.properties.get(name)
  }

  /// Resource bound to the object, downcast to its concrete type.
  pub fn object<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
    let instance = self.objects.get(name)?.clone();
    instance.downcast::<T>().ok()
  }

  /// Instance being recycled, when invoked as a recycle function.
  pub fn recycled<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
    self.recycled.clone()?.downcast::<T>().ok()
  }

  /// Request the named flow, instigated in request order after the function returns.
  pub fn do_flow(&mut self, name: impl Into<String>, argument: serde_json::Value) {
    self.flows.push((name.into(), argument));
  }

  /// Argument passed along the next flow.
  pub fn set_next(&mut self, argument: serde_json::Value) {
    self.next = argument;
  }

  pub(crate) fn into_flows(self) -> (Vec<(String, serde_json::Value)>, serde_json::Value) {
    (self.flows, self.next)
  }
}

/// Cross-cutting behaviour wrapped around the functions it governs.
#[async_trait]
pub trait Governance: Send + Sync {
  async fn activate(&self, function: &str) -> Result<(), Escalation>;

  /// Function completed successfully.
  async fn enforce(&self, function: &str) -> Result<(), Escalation>;

  /// Function escalated.
  async fn disregard(&self, function: &str, escalation: &Escalation);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdministrationPhase {
  Pre,
  Post,
}

/// Resources an administration works over, for one function invocation.
pub struct AdministrationContext<'a> {
  pub function: &'a str,
  pub phase: AdministrationPhase,
  pub resources: &'a HashMap<String, Instance>,
}

/// Duty run before or after functions over the resources it administers.
#[async_trait]
pub trait Administration: Send + Sync {
  async fn administer(&self, ctx: &AdministrationContext<'_>) -> Result<(), Escalation>;
}
