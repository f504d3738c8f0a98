//! Resource sources: sourcing instances, recycling them, and instigating
//! flows of their own.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures::future::BoxFuture;
use plexus_config::PropertyList;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::RuntimeError;
use crate::logic::{Instance, ManagedFunction};
use crate::office::{InvokeResult, OfficeInner};

/// Request for a resource instance.
pub struct SourceRequest<'a> {
  /// Name of the office resource being sourced.
  pub resource: &'a str,
  pub properties: &'a PropertyList,
  /// Instances of the resource's dependencies, by dependency name.
  pub dependencies: HashMap<String, Instance>,
}

impl SourceRequest<'_> {
  pub fn dependency<T: std::any::Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
    self.dependencies.get(name)?.clone().downcast::<T>().ok()
  }
}

/// Provider of resource instances.
#[async_trait]
pub trait ResourceSource: Send + Sync {
  async fn source(&self, request: SourceRequest<'_>) -> Result<Instance, String>;

  /// Logic of a function the source type adds to the office.
  fn function(&self, _name: &str) -> Option<Arc<dyn ManagedFunction>> {
    None
  }

  /// Start instigating flows. Runs until the office is closed.
  async fn start(&self, _ctx: SourceContext) -> Result<(), String> {
    Ok(())
  }
}

/// Office facilities available to a started source.
pub struct SourceContext {
  pub(crate) source: String,
  pub(crate) properties: PropertyList,
  pub(crate) flows: HashMap<String, FlowInvoker>,
  pub(crate) strategies: HashMap<String, ExecutionStrategy>,
  pub(crate) cancel: CancellationToken,
}

impl SourceContext {
  pub fn source(&self) -> &str {
    &self.source
  }

  pub fn property(&self, name: &str) -> Option<&str> {
    self.properties.get(name)
  }

  /// Invoker of the named flow.
  pub fn flow(&self, name: &str) -> Option<&FlowInvoker> {
    self.flows.get(name)
  }

  /// Execution strategy configured for the named slot.
  pub fn execution_strategy(&self, name: &str) -> Option<&ExecutionStrategy> {
    self.strategies.get(name)
  }

  /// Cancelled when the office closes.
  pub fn cancelled(&self) -> &CancellationToken {
    &self.cancel
  }
}

/// Starts a new process at the function a source flow reaches.
#[derive(Clone)]
pub struct FlowInvoker {
  pub(crate) office: Weak<OfficeInner>,
  pub(crate) function: String,
  pub(crate) input_resource: Option<String>,
}

impl FlowInvoker {
  /// Function the flow reaches.
  pub fn function(&self) -> &str {
    &self.function
  }

  /// Instigate the flow asynchronously. The instance becomes the source's
  /// input resource within the new process.
  pub fn invoke(
    &self,
    argument: serde_json::Value,
    instance: Option<Instance>,
  ) -> JoinHandle<Result<InvokeResult, RuntimeError>> {
    let office = self.office.clone();
    let function = self.function.clone();
    let inputs: HashMap<String, Instance> = match (&self.input_resource, instance) {
      (Some(resource), Some(instance)) => HashMap::from([(resource.clone(), instance)]),
      _ => HashMap::new(),
    };

    tokio::spawn(async move {
      let Some(office) = office.upgrade() else {
        return Err(RuntimeError::Closed);
      };
      office.invoke_process(&function, argument, inputs).await
    })
  }
}

/// Named concurrency strategy running a source's own work.
#[derive(Clone)]
pub struct ExecutionStrategy {
  name: String,
  threads: Arc<Semaphore>,
}

impl ExecutionStrategy {
  pub(crate) fn new(name: String, threads: usize) -> Self {
    Self {
      name,
      threads: Arc::new(Semaphore::new(threads)),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Run the work once one of the strategy's threads is free.
  pub fn execute(&self, work: BoxFuture<'static, ()>) -> JoinHandle<()> {
    let threads = self.threads.clone();
    let name = self.name.clone();
    tokio::spawn(async move {
      match threads.acquire_owned().await {
        Ok(_permit) => work.await,
        Err(e) => warn!(strategy = %name, error = %e, "execution_strategy_closed"),
      }
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  use futures::FutureExt;

  #[tokio::test]
  async fn test_execution_strategy_bounds_threads() {
    let strategy = ExecutionStrategy::new("io".to_string(), 1);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..3)
      .map(|_| {
        let running = running.clone();
        let peak = peak.clone();
        strategy.execute(
          async move {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            running.fetch_sub(1, Ordering::SeqCst);
          }
          .boxed(),
        )
      })
      .collect();
    for handle in handles {
      handle.await.unwrap();
    }

    assert_eq!(strategy.name(), "io");
    assert_eq!(peak.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_request_dependency_downcasts() {
    let properties = PropertyList::new();
    let request = SourceRequest {
      resource: "db",
      properties: &properties,
      dependencies: HashMap::from([("config".to_string(), Arc::new(42u32) as Instance)]),
    };

    assert_eq!(request.dependency::<u32>("config").as_deref(), Some(&42));
    assert!(request.dependency::<String>("config").is_none());
    assert!(request.dependency::<u32>("missing").is_none());
  }
}
