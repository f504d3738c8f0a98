use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use plexus_compiler::Compiler;
use plexus_config::{
  AdministrationDef, EscalationDef, FlowDef, FunctionDef, GovernanceDef, InstigationStrategy,
  LinkRef, ObjectDef, OfficeDef, OfficeEscalationDef, OversightDef, PropertyList, ResourceDef,
  ResourceScope, ResourceSourceDef, SectionDef, SectionInputDef, SectionOutputDef,
  SourceFlowDef, TeamDef,
};
use plexus_runtime::{
  Administration, AdministrationContext, Escalation, FunctionContext, Governance, Instance,
  JobEvent, JobEventKind, ManagedFunction, Office, Oversight, ProcessOutput, ResourceSource,
  RuntimeBuilder, RuntimeError, SourceContext, SourceRequest,
};
use plexus_type_loader::{
  AdministrationType, EscalationType, FlowType, FunctionType, GovernanceType,
  InMemoryTypeLoader, ObjectType, ResourceSourceType, SourceFunctionType, TypeManifest,
};
use serde_json::json;

// -- logic --------------------------------------------------------------------

#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
  fn record(&self, entry: impl Into<String>) {
    self.0.lock().unwrap().push(entry.into());
  }

  fn entries(&self) -> Vec<String> {
    self.0.lock().unwrap().clone()
  }

  /// Wait for work completing outside the invoking process.
  async fn wait_for(&self, entry: &str) -> bool {
    for _ in 0..100 {
      if self.entries().iter().any(|e| e == entry) {
        return true;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
  }
}

struct Connection {
  id: usize,
}

struct Request {
  path: String,
}

struct Validate(Journal);

#[async_trait]
impl ManagedFunction for Validate {
  async fn execute(&self, ctx: &mut FunctionContext) -> Result<(), Escalation> {
    let order = ctx.parameter().clone();
    if order["amount"].as_i64().unwrap_or(0) < 0 {
      return Err(Escalation::new("shop.Invalid", "negative amount").with_payload(order));
    }
    let db = ctx.object::<Connection>("db").unwrap();
    self.0.record(format!("validate:{}", db.id));
    ctx.do_flow("audited", order.clone());
    ctx.set_next(order);
    Ok(())
  }
}

struct Charge(Journal);

#[async_trait]
impl ManagedFunction for Charge {
  async fn execute(&self, ctx: &mut FunctionContext) -> Result<(), Escalation> {
    let db = ctx.object::<Connection>("db").unwrap();
    self.0.record(format!("charge:{}", db.id));
    Ok(())
  }
}

struct Audit(Journal);

#[async_trait]
impl ManagedFunction for Audit {
  async fn execute(&self, ctx: &mut FunctionContext) -> Result<(), Escalation> {
    self.0.record(format!("audit:{}", ctx.parameter()["amount"]));
    Ok(())
  }
}

struct Handle(Journal);

#[async_trait]
impl ManagedFunction for Handle {
  async fn execute(&self, ctx: &mut FunctionContext) -> Result<(), Escalation> {
    let escalation = ctx.parameter();
    self.0.record(format!(
      "handle:{}:{}",
      escalation["message"].as_str().unwrap_or_default(),
      escalation["payload"]["amount"]
    ));
    Ok(())
  }
}

struct Respond(Journal);

#[async_trait]
impl ManagedFunction for Respond {
  async fn execute(&self, ctx: &mut FunctionContext) -> Result<(), Escalation> {
    let request = ctx.object::<Request>("request").unwrap();
    self.0.record(format!("respond:{}", request.path));
    Ok(())
  }
}

struct Recycle(Journal);

#[async_trait]
impl ManagedFunction for Recycle {
  async fn execute(&self, ctx: &mut FunctionContext) -> Result<(), Escalation> {
    let connection = ctx.recycled::<Connection>().unwrap();
    self.0.record(format!("recycle:{}", connection.id));
    Ok(())
  }
}

#[derive(Clone, Default)]
struct Pool {
  journal: Journal,
  sourced: Arc<AtomicUsize>,
  delay: Option<Duration>,
}

#[async_trait]
impl ResourceSource for Pool {
  async fn source(&self, _request: SourceRequest<'_>) -> Result<Instance, String> {
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    let id = self.sourced.fetch_add(1, Ordering::SeqCst) + 1;
    Ok(Arc::new(Connection { id }))
  }

  fn function(&self, name: &str) -> Option<Arc<dyn ManagedFunction>> {
    (name == "recycle").then(|| Arc::new(Recycle(self.journal.clone())) as Arc<dyn ManagedFunction>)
  }
}

struct Listener(Journal);

#[async_trait]
impl ResourceSource for Listener {
  async fn source(&self, request: SourceRequest<'_>) -> Result<Instance, String> {
    Err(format!("{} is supplied by its listener", request.resource))
  }

  async fn start(&self, ctx: SourceContext) -> Result<(), String> {
    let flow = ctx
      .flow("request")
      .ok_or_else(|| "request flow not configured".to_string())?;
    let request = Arc::new(Request {
      path: "/orders".to_string(),
    });
    flow
      .invoke(json!(null), Some(request))
      .await
      .map_err(|e| e.to_string())?
      .map_err(|e| e.to_string())?;
    self.0.record("listener:served");

    ctx.cancelled().cancelled().await;
    self.0.record("listener:stopped");
    Ok(())
  }
}

struct Tracked(Journal);

#[async_trait]
impl Governance for Tracked {
  async fn activate(&self, function: &str) -> Result<(), Escalation> {
    self.0.record(format!("activate:{function}"));
    Ok(())
  }

  async fn enforce(&self, function: &str) -> Result<(), Escalation> {
    self.0.record(format!("enforce:{function}"));
    Ok(())
  }

  async fn disregard(&self, function: &str, escalation: &Escalation) {
    self
      .0
      .record(format!("disregard:{function}:{}", escalation.error_type));
  }
}

/// Refuses every function it governs.
struct Guard(Journal);

#[async_trait]
impl Governance for Guard {
  async fn activate(&self, _function: &str) -> Result<(), Escalation> {
    Err(Escalation::new("sec.Refused", "not permitted"))
  }

  async fn enforce(&self, _function: &str) -> Result<(), Escalation> {
    Ok(())
  }

  async fn disregard(&self, function: &str, _escalation: &Escalation) {
    self.0.record(format!("guard_disregard:{function}"));
  }
}

struct Logged(Journal);

#[async_trait]
impl Administration for Logged {
  async fn administer(&self, ctx: &AdministrationContext<'_>) -> Result<(), Escalation> {
    let mut resources: Vec<&String> = ctx.resources.keys().collect();
    resources.sort();
    self
      .0
      .record(format!("administer:{:?}:{:?}", ctx.phase, resources));
    Ok(())
  }
}

#[derive(Default)]
struct RecordingOversight(Mutex<Vec<JobEvent>>);

impl Oversight for RecordingOversight {
  fn observe(&self, event: &JobEvent) {
    self.0.lock().unwrap().push(event.clone());
  }
}

// -- office -------------------------------------------------------------------

fn object(name: &str, type_name: &str) -> ObjectType {
  ObjectType {
    name: name.to_string(),
    type_name: type_name.to_string(),
    qualifier: None,
    is_parameter: false,
  }
}

fn parameter(type_name: &str) -> ObjectType {
  ObjectType {
    name: "parameter".to_string(),
    type_name: type_name.to_string(),
    qualifier: None,
    is_parameter: true,
  }
}

fn function_type(objects: Vec<ObjectType>) -> TypeManifest {
  TypeManifest::Function(FunctionType {
    objects,
    ..Default::default()
  })
}

fn loader() -> InMemoryTypeLoader {
  InMemoryTypeLoader::new()
    .with(
      "shop.Validate",
      TypeManifest::Function(FunctionType {
        flows: vec![FlowType {
          name: "audited".to_string(),
          argument_type: Some("shop.Order".to_string()),
        }],
        objects: vec![parameter("shop.Order"), object("db", "db.Connection")],
        escalations: vec![EscalationType {
          error_type: "shop.Invalid".to_string(),
        }],
        ..Default::default()
      }),
    )
    .with(
      "shop.Charge",
      function_type(vec![parameter("shop.Order"), object("db", "db.Connection")]),
    )
    .with("shop.Audit", function_type(vec![parameter("shop.Order")]))
    .with("shop.Handle", function_type(vec![parameter("shop.Invalid")]))
    .with("http.Respond", function_type(vec![object("request", "http.Request")]))
    .with(
      "db.Pool",
      TypeManifest::ResourceSource(ResourceSourceType {
        object_type: "db.Connection".to_string(),
        recycle_function: Some("recycle".to_string()),
        functions: vec![SourceFunctionType {
          name: "recycle".to_string(),
          function: FunctionType {
            objects: vec![parameter("plexus.RecycleParameter")],
            ..Default::default()
          },
        }],
        ..Default::default()
      }),
    )
    .with(
      "http.Listener",
      TypeManifest::ResourceSource(ResourceSourceType {
        object_type: "http.Request".to_string(),
        flows: vec![FlowType {
          name: "request".to_string(),
          argument_type: None,
        }],
        ..Default::default()
      }),
    )
    .with(
      "tx.Transaction",
      TypeManifest::Governance(GovernanceType::default()),
    )
    .with(
      "sec.Guard",
      TypeManifest::Governance(GovernanceType::default()),
    )
    .with(
      "db.Log",
      TypeManifest::Administration(AdministrationType::default()),
    )
}

/// validate (flows "audited" out of the office, next) -> charge, sharing "db".
fn checkout_office() -> OfficeDef {
  let mut validate = FunctionDef::new("validate", "shop.Validate");
  validate.next = Some(LinkRef::Function("charge".to_string()));
  validate.flows.push(FlowDef {
    name: "audited".to_string(),
    target: Some(LinkRef::Output("audited".to_string())),
    strategy: InstigationStrategy::Sequential,
  });
  validate.objects.push(ObjectDef {
    name: "db".to_string(),
    resource: Some("db".to_string()),
  });

  let mut charge = FunctionDef::new("charge", "shop.Charge");
  charge.objects.push(ObjectDef {
    name: "db".to_string(),
    resource: Some("db".to_string()),
  });

  let mut section = SectionDef::new("checkout");
  section.functions.push(validate);
  section.functions.push(charge);
  section.inputs.push(SectionInputDef {
    name: "start".to_string(),
    function: "validate".to_string(),
  });
  section.outputs.push(SectionOutputDef {
    name: "audited".to_string(),
    target: None,
    escalation_only: false,
  });

  let mut office = OfficeDef::new("shop");
  office.sections.push(section);
  office
    .resource_sources
    .push(ResourceSourceDef::new("pool", "db.Pool"));
  office.resources.push(ResourceDef::new("db", "pool"));
  office
}

fn checkout(office: &mut OfficeDef) -> &mut SectionDef {
  &mut office.sections[0]
}

fn function<'a>(office: &'a mut OfficeDef, name: &str) -> &'a mut FunctionDef {
  checkout(office)
    .functions
    .iter_mut()
    .find(|f| f.name == name)
    .unwrap()
}

fn runtime(journal: &Journal, pool: Pool) -> RuntimeBuilder {
  let mut builder = RuntimeBuilder::new();
  builder
    .register_function("shop.Validate", Validate(journal.clone()))
    .register_function("shop.Charge", Charge(journal.clone()))
    .register_function("shop.Audit", Audit(journal.clone()))
    .register_function("shop.Handle", Handle(journal.clone()))
    .register_function("http.Respond", Respond(journal.clone()))
    .register_source("db.Pool", pool)
    .register_source("http.Listener", Listener(journal.clone()))
    .register_governance("tx.Transaction", Tracked(journal.clone()))
    .register_administration("db.Log", Logged(journal.clone()));
  builder
}

async fn build(office: &OfficeDef, builder: RuntimeBuilder) -> Office {
  let meta = Compiler::new(loader())
    .compile_checked(office)
    .await
    .unwrap();
  builder.build(&meta).unwrap()
}

// -- tests --------------------------------------------------------------------

#[tokio::test]
async fn test_process_shares_resource_along_next_flow() {
  let journal = Journal::default();
  let pool = Pool {
    journal: journal.clone(),
    ..Default::default()
  };
  let office = build(&checkout_office(), runtime(&journal, pool.clone())).await;

  let result = office
    .invoke("checkout.start", json!({ "amount": 10 }))
    .await
    .unwrap();

  assert_eq!(
    result.outputs,
    vec![ProcessOutput {
      output: "checkout.audited".to_string(),
      argument: json!({ "amount": 10 }),
    }]
  );
  assert_eq!(journal.entries()[..2], ["validate:1", "charge:1"]);
  assert_eq!(pool.sourced.load(Ordering::SeqCst), 1);
  assert!(journal.wait_for("recycle:1").await);

  // every process sources its own instance
  office
    .invoke("checkout.start", json!({ "amount": 5 }))
    .await
    .unwrap();
  assert_eq!(pool.sourced.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_function_scoped_resource() {
  let journal = Journal::default();
  let pool = Pool {
    journal: journal.clone(),
    ..Default::default()
  };
  let mut office = checkout_office();
  office.resources[0].scope = ResourceScope::Function;
  let office = build(&office, runtime(&journal, pool.clone())).await;

  office
    .invoke("checkout.start", json!({ "amount": 10 }))
    .await
    .unwrap();

  assert_eq!(pool.sourced.load(Ordering::SeqCst), 2);
  assert!(journal.entries().contains(&"validate:1".to_string()));
  assert!(journal.entries().contains(&"charge:2".to_string()));
  assert!(journal.wait_for("recycle:1").await);
  assert!(journal.wait_for("recycle:2").await);
}

#[tokio::test]
async fn test_unhandled_escalation_fails_process() {
  let journal = Journal::default();
  let office = build(&checkout_office(), runtime(&journal, Pool::default())).await;

  let err = office
    .invoke("checkout.start", json!({ "amount": -1 }))
    .await
    .unwrap_err();

  match err {
    RuntimeError::Escalated {
      error_type,
      message,
      payload,
    } => {
      assert_eq!(error_type, "shop.Invalid");
      assert_eq!(message, "negative amount");
      assert_eq!(payload, json!({ "amount": -1 }));
    }
    other => panic!("expected escalation, got {other:?}"),
  }
  assert!(!journal.entries().iter().any(|e| e.starts_with("charge")));
}

#[tokio::test]
async fn test_escalation_handled_by_function() {
  let journal = Journal::default();
  let mut office = checkout_office();
  function(&mut office, "validate").escalations.push(EscalationDef {
    error_type: "shop.Invalid".to_string(),
    target: Some(LinkRef::Function("handle".to_string())),
  });
  checkout(&mut office)
    .functions
    .push(FunctionDef::new("handle", "shop.Handle"));
  let office = build(&office, runtime(&journal, Pool::default())).await;

  let result = office
    .invoke("checkout.start", json!({ "amount": -3 }))
    .await
    .unwrap();

  assert!(result.outputs.is_empty());
  assert!(journal.entries().contains(&"handle:negative amount:-3".to_string()));
}

#[tokio::test]
async fn test_escalation_handled_by_office() {
  let journal = Journal::default();
  let mut office = checkout_office();
  checkout(&mut office)
    .functions
    .push(FunctionDef::new("handle", "shop.Handle"));
  checkout(&mut office).inputs.push(SectionInputDef {
    name: "failed".to_string(),
    function: "handle".to_string(),
  });
  office.escalations.push(OfficeEscalationDef {
    error_type: "shop.Invalid".to_string(),
    target: LinkRef::Input {
      section: "checkout".to_string(),
      input: "failed".to_string(),
    },
  });
  let office = build(&office, runtime(&journal, Pool::default())).await;

  office
    .invoke("checkout.start", json!({ "amount": -2 }))
    .await
    .unwrap();
  assert!(journal.entries().contains(&"handle:negative amount:-2".to_string()));
}

#[tokio::test]
async fn test_parallel_and_asynchronous_flows() {
  let audited = |strategy| {
    let mut office = checkout_office();
    function(&mut office, "validate").flows[0] = FlowDef {
      name: "audited".to_string(),
      target: Some(LinkRef::Function("audit".to_string())),
      strategy,
    };
    checkout(&mut office)
      .functions
      .push(FunctionDef::new("audit", "shop.Audit"));
    office
  };

  // parallel flows complete within the process
  let journal = Journal::default();
  let office = build(
    &audited(InstigationStrategy::Parallel),
    runtime(&journal, Pool::default()),
  )
  .await;
  let result = office
    .invoke("checkout.start", json!({ "amount": 7 }))
    .await
    .unwrap();
  assert!(result.outputs.is_empty());
  assert!(journal.entries().contains(&"audit:7".to_string()));
  assert!(journal.entries().contains(&"charge:1".to_string()));

  // asynchronous flows run in a process of their own
  let journal = Journal::default();
  let office = build(
    &audited(InstigationStrategy::Asynchronous),
    runtime(&journal, Pool::default()),
  )
  .await;
  office
    .invoke("checkout.start", json!({ "amount": 8 }))
    .await
    .unwrap();
  assert!(journal.wait_for("audit:8").await);
}

#[tokio::test]
async fn test_governance_and_administration_wrap_function() {
  let journal = Journal::default();
  let mut office = checkout_office();
  office.governances.push(GovernanceDef {
    name: "tx".to_string(),
    governance_type: "tx.Transaction".to_string(),
    properties: PropertyList::new(),
  });
  office.administrations.push(AdministrationDef {
    name: "log_db".to_string(),
    administration_type: "db.Log".to_string(),
    administers: vec!["db".to_string()],
    properties: PropertyList::new(),
  });
  function(&mut office, "validate").governances = vec!["tx".to_string()];
  let charge = function(&mut office, "charge");
  charge.governances = vec!["tx".to_string()];
  charge.pre_administration = vec!["log_db".to_string()];
  charge.post_administration = vec!["log_db".to_string()];
  let office = build(&office, runtime(&journal, Pool::default())).await;

  office
    .invoke("checkout.start", json!({ "amount": 1 }))
    .await
    .unwrap();
  let entries = journal.entries();
  assert_eq!(
    entries[..8],
    [
      "activate:checkout.validate",
      "validate:1",
      "enforce:checkout.validate",
      "activate:checkout.charge",
      "administer:Pre:[\"db\"]",
      "charge:1",
      "administer:Post:[\"db\"]",
      "enforce:checkout.charge",
    ]
  );

  // escalating functions disregard their governance
  let _ = office
    .invoke("checkout.start", json!({ "amount": -1 }))
    .await;
  assert!(
    journal
      .entries()
      .contains(&"disregard:checkout.validate:shop.Invalid".to_string())
  );
}

#[tokio::test]
async fn test_only_activated_governance_is_disregarded() {
  let mut office = checkout_office();
  for (name, governance_type) in [("tx", "tx.Transaction"), ("guard", "sec.Guard")] {
    office.governances.push(GovernanceDef {
      name: name.to_string(),
      governance_type: governance_type.to_string(),
      properties: PropertyList::new(),
    });
  }

  // guard refuses before tx is activated
  let journal = Journal::default();
  function(&mut office, "validate").governances = vec!["guard".to_string(), "tx".to_string()];
  let mut builder = runtime(&journal, Pool::default());
  builder.register_governance("sec.Guard", Guard(journal.clone()));
  let refused = build(&office, builder).await;
  let result = refused.invoke("checkout.start", json!({ "amount": 1 })).await;
  assert!(result.is_err());
  let entries = journal.entries();
  assert!(
    !entries
      .iter()
      .any(|e| e.starts_with("activate:") || e.contains("disregard")),
    "{:?}",
    entries
  );
  assert!(!entries.contains(&"validate:1".to_string()));

  // tx is active when guard refuses, guard itself never activated
  let journal = Journal::default();
  function(&mut office, "validate").governances = vec!["tx".to_string(), "guard".to_string()];
  let mut builder = runtime(&journal, Pool::default());
  builder.register_governance("sec.Guard", Guard(journal.clone()));
  let refused = build(&office, builder).await;
  let _ = refused.invoke("checkout.start", json!({ "amount": 1 })).await;
  let entries = journal.entries();
  assert_eq!(
    entries,
    vec![
      "activate:checkout.validate".to_string(),
      "disregard:checkout.validate:sec.Refused".to_string(),
    ]
  );
}

#[tokio::test]
async fn test_fixed_team_overseen() {
  let journal = Journal::default();
  let mut office = checkout_office();
  let mut payments = TeamDef::new("payments", "plexus.team.fixed");
  payments.size = Some(1);
  payments.oversight = Some("monitor".to_string());
  office.teams.push(payments);
  office.oversights.push(OversightDef {
    name: "monitor".to_string(),
  });
  function(&mut office, "charge").team = Some("payments".to_string());

  let oversight = Arc::new(RecordingOversight::default());
  let mut builder = runtime(&journal, Pool::default());
  builder.register_oversight("monitor", oversight.clone());
  let office = build(&office, builder).await;

  let result = office
    .invoke("checkout.start", json!({ "amount": 4 }))
    .await
    .unwrap();

  let events = oversight.0.lock().unwrap().clone();
  let kinds: Vec<_> = events.iter().map(|e| e.kind.clone()).collect();
  assert_eq!(kinds, vec![JobEventKind::Started, JobEventKind::Completed]);
  assert!(events.iter().all(|e| e.team == "payments"));
  assert!(events.iter().all(|e| e.function == "checkout.charge"));
  assert!(events.iter().all(|e| e.process_id == result.process_id));
}

#[tokio::test]
async fn test_resource_timeout() {
  let journal = Journal::default();
  let pool = Pool {
    delay: Some(Duration::from_millis(500)),
    ..Default::default()
  };
  let mut office = checkout_office();
  office.resource_sources[0].timeout_ms = Some(20);
  let office = build(&office, runtime(&journal, pool)).await;

  let err = office
    .invoke("checkout.start", json!({ "amount": 1 }))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    RuntimeError::ResourceTimeout { resource, timeout_ms: 20 } if resource == "db"
  ));
  assert!(journal.entries().is_empty());
}

#[tokio::test]
async fn test_source_instigates_flow_with_input_resource() {
  let journal = Journal::default();
  let mut office = checkout_office();
  let section = checkout(&mut office);
  let mut respond = FunctionDef::new("respond", "http.Respond");
  respond.objects.push(ObjectDef {
    name: "request".to_string(),
    resource: Some("request".to_string()),
  });
  section.functions.push(respond);
  section.inputs.push(SectionInputDef {
    name: "respond".to_string(),
    function: "respond".to_string(),
  });

  let mut listener = ResourceSourceDef::new("listener", "http.Listener");
  listener.input_resource = Some("request".to_string());
  listener.flows.push(SourceFlowDef {
    name: "request".to_string(),
    target: LinkRef::Input {
      section: "checkout".to_string(),
      input: "respond".to_string(),
    },
  });
  office.resource_sources.push(listener);
  let mut request = ResourceDef::new("request", "listener");
  request.input = true;
  office.resources.push(request);

  let office = build(&office, runtime(&journal, Pool::default())).await;
  office.open().await.unwrap();
  assert!(journal.wait_for("listener:served").await);
  assert!(journal.entries().contains(&"respond:/orders".to_string()));

  // input resources are never sourced
  let err = office
    .invoke("checkout.respond", json!(null))
    .await
    .unwrap_err();
  assert!(matches!(err, RuntimeError::InputResourceMissing { resource } if resource == "request"));

  office.close().await;
  let err = office
    .invoke("checkout.start", json!({ "amount": 1 }))
    .await
    .unwrap_err();
  assert!(matches!(err, RuntimeError::Closed));
}

#[tokio::test]
async fn test_unknown_function() {
  let journal = Journal::default();
  let office = build(&checkout_office(), runtime(&journal, Pool::default())).await;

  let err = office
    .invoke("checkout.missing", json!(null))
    .await
    .unwrap_err();
  assert!(matches!(err, RuntimeError::UnknownFunction { name } if name == "checkout.missing"));
}
