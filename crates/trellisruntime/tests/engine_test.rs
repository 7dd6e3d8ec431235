use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Barrier, Notify};
use tokio::time::sleep;
use trelliscore::{
    EngineError, ExecutionStatus, Item, Node, NodeConfig, NodeError, NodeExecutor, NodeOutput,
    RunStatus, Value, Workflow, WorkflowError,
};
use trellisruntime::{ExecutionEngine, NodeRegistry, RunObserver, RuntimeConfig};

/// Emits one item per entry in the config "values" array.
struct Source;

#[async_trait]
impl NodeExecutor for Source {
    fn node_type(&self) -> &str {
        "test.source"
    }

    async fn execute(
        &self,
        config: &NodeConfig,
        _inputs: Vec<Item>,
    ) -> Result<NodeOutput, NodeError> {
        let values = config.get("values").and_then(Value::as_array).unwrap_or(&[]);
        Ok(NodeOutput::single(
            values
                .iter()
                .map(|v| Item::new().with("value", v.clone()))
                .collect(),
        ))
    }
}

/// Marks each passing item with `config.key = true`.
struct Append;

#[async_trait]
impl NodeExecutor for Append {
    fn node_type(&self) -> &str {
        "test.append"
    }

    async fn execute(
        &self,
        config: &NodeConfig,
        inputs: Vec<Item>,
    ) -> Result<NodeOutput, NodeError> {
        let key = config
            .get("key")
            .and_then(Value::as_str)
            .unwrap_or("seen")
            .to_string();
        Ok(NodeOutput::single(
            inputs.into_iter().map(|i| i.with(key.clone(), true)).collect(),
        ))
    }
}

/// Always fails.
struct Fail;

#[async_trait]
impl NodeExecutor for Fail {
    fn node_type(&self) -> &str {
        "test.fail"
    }

    async fn execute(
        &self,
        _config: &NodeConfig,
        _inputs: Vec<Item>,
    ) -> Result<NodeOutput, NodeError> {
        Err(NodeError::ExecutionFailed("boom".to_string()))
    }
}

/// Records its inputs under the config "as" name, then passes through.
struct Capture {
    store: Arc<Mutex<HashMap<String, Vec<Item>>>>,
}

#[async_trait]
impl NodeExecutor for Capture {
    fn node_type(&self) -> &str {
        "test.capture"
    }

    async fn execute(
        &self,
        config: &NodeConfig,
        inputs: Vec<Item>,
    ) -> Result<NodeOutput, NodeError> {
        let name = config
            .get("as")
            .and_then(Value::as_str)
            .unwrap_or("default")
            .to_string();
        self.store
            .lock()
            .unwrap()
            .entry(name)
            .or_default()
            .extend(inputs.clone());
        Ok(NodeOutput::single(inputs))
    }
}

/// Waits on a shared barrier before finishing; used to prove sibling
/// nodes really run concurrently.
struct Block {
    barrier: Arc<Barrier>,
}

#[async_trait]
impl NodeExecutor for Block {
    fn node_type(&self) -> &str {
        "test.block"
    }

    async fn execute(
        &self,
        _config: &NodeConfig,
        inputs: Vec<Item>,
    ) -> Result<NodeOutput, NodeError> {
        self.barrier.wait().await;
        Ok(NodeOutput::single(inputs))
    }
}

/// Signals when it starts, then sleeps before finishing.
struct Slow {
    started: Arc<Notify>,
    delay_ms: u64,
}

#[async_trait]
impl NodeExecutor for Slow {
    fn node_type(&self) -> &str {
        "test.slow"
    }

    async fn execute(
        &self,
        _config: &NodeConfig,
        inputs: Vec<Item>,
    ) -> Result<NodeOutput, NodeError> {
        self.started.notify_one();
        sleep(Duration::from_millis(self.delay_ms)).await;
        Ok(NodeOutput::single(inputs))
    }
}

/// Splits items to slot 0 (value >= 3) or slot 1 (everything else).
struct Split;

#[async_trait]
impl NodeExecutor for Split {
    fn node_type(&self) -> &str {
        "test.split"
    }

    fn output_count(&self) -> usize {
        2
    }

    async fn execute(
        &self,
        _config: &NodeConfig,
        inputs: Vec<Item>,
    ) -> Result<NodeOutput, NodeError> {
        let (high, low) = inputs
            .into_iter()
            .partition(|i| i.get("value").and_then(Value::as_f64).unwrap_or(0.0) >= 3.0);
        Ok(NodeOutput::multi(vec![high, low]))
    }
}

fn base_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    registry.register(Arc::new(Source));
    registry.register(Arc::new(Append));
    registry.register(Arc::new(Fail));
    registry.register(Arc::new(Split));
    registry
}

fn engine() -> ExecutionEngine {
    ExecutionEngine::new(RuntimeConfig::default())
}

type StatusLog = Arc<Mutex<Vec<(String, ExecutionStatus)>>>;

fn recording_observer() -> (RunObserver, StatusLog) {
    let events: StatusLog = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let observer = RunObserver::new().on_status(move |node_id, status| {
        sink.lock().unwrap().push((node_id.to_string(), status));
    });
    (observer, events)
}

fn position(events: &[(String, ExecutionStatus)], node: &str, status: ExecutionStatus) -> usize {
    events
        .iter()
        .position(|(n, s)| n == node && *s == status)
        .unwrap_or_else(|| panic!("no {status:?} event for {node}"))
}

#[tokio::test]
async fn chain_executes_in_dependency_order() {
    let mut workflow = Workflow::new("wf", "chain");
    workflow.add_node(Node::new("a", "test.source").with_config("values", vec![Value::from(1.0)]));
    workflow.add_node(Node::new("b", "test.append").with_config("key", "b"));
    workflow.add_node(Node::new("c", "test.append").with_config("key", "c"));
    workflow.connect("a", "b");
    workflow.connect("b", "c");

    let (observer, events) = recording_observer();
    let summary = engine()
        .run(&workflow, &base_registry(), &observer)
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Success);
    for id in ["a", "b", "c"] {
        assert_eq!(summary.node_statuses[id], ExecutionStatus::Success);
    }

    let events = events.lock().unwrap();
    assert!(
        position(&events, "a", ExecutionStatus::Success)
            < position(&events, "b", ExecutionStatus::Executing)
    );
    assert!(
        position(&events, "b", ExecutionStatus::Success)
            < position(&events, "c", ExecutionStatus::Executing)
    );

    let item = &summary.outputs["c"].items(0)[0];
    assert_eq!(item.get("b"), Some(&Value::Bool(true)));
    assert_eq!(item.get("c"), Some(&Value::Bool(true)));
}

#[tokio::test]
async fn trigger_and_consumer_scenario() {
    // Minimal manual-trigger -> http-style consumer pair.
    struct ManualStub;

    #[async_trait]
    impl NodeExecutor for ManualStub {
        fn node_type(&self) -> &str {
            "manual"
        }

        async fn execute(
            &self,
            _config: &NodeConfig,
            _inputs: Vec<Item>,
        ) -> Result<NodeOutput, NodeError> {
            Ok(NodeOutput::single(vec![Item::new()]))
        }
    }

    struct CalledStub;

    #[async_trait]
    impl NodeExecutor for CalledStub {
        fn node_type(&self) -> &str {
            "http"
        }

        async fn execute(
            &self,
            _config: &NodeConfig,
            inputs: Vec<Item>,
        ) -> Result<NodeOutput, NodeError> {
            Ok(NodeOutput::single(
                inputs.into_iter().map(|i| i.with("called", true)).collect(),
            ))
        }
    }

    let mut registry = NodeRegistry::new();
    registry.register(Arc::new(ManualStub));
    registry.register(Arc::new(CalledStub));

    let mut workflow = Workflow::new("wf", "scenario");
    workflow.add_node(Node::new("t", "manual"));
    workflow.add_node(Node::new("h", "http"));
    workflow.connect("t", "h");

    let summary = engine()
        .run(&workflow, &registry, &RunObserver::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Success);
    assert_eq!(summary.node_statuses["t"], ExecutionStatus::Success);
    assert_eq!(summary.node_statuses["h"], ExecutionStatus::Success);
    assert_eq!(
        summary.outputs["h"].items(0).to_vec(),
        vec![Item::new().with("called", true)]
    );
}

#[tokio::test]
async fn fan_in_concatenates_in_declaration_order() {
    let store = Arc::new(Mutex::new(HashMap::new()));
    let mut registry = base_registry();
    registry.register(Arc::new(Capture {
        store: Arc::clone(&store),
    }));

    let mut workflow = Workflow::new("wf", "fan-in");
    workflow.add_node(Node::new("b", "test.source").with_config("values", vec![Value::from("b1")]));
    workflow.add_node(Node::new("c", "test.source").with_config(
        "values",
        vec![Value::from("c1"), Value::from("c2")],
    ));
    workflow.add_node(Node::new("d", "test.capture"));
    workflow.connect("b", "d");
    workflow.connect("c", "d");

    let summary = engine()
        .run(&workflow, &registry, &RunObserver::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Success);
    let seen = store.lock().unwrap();
    let combined: Vec<&str> = seen["default"]
        .iter()
        .map(|i| i.get("value").and_then(Value::as_str).unwrap())
        .collect();
    assert_eq!(combined, ["b1", "c1", "c2"]);
}

#[tokio::test]
async fn fan_out_runs_siblings_concurrently() {
    let barrier = Arc::new(Barrier::new(2));
    let mut registry = base_registry();
    registry.register(Arc::new(Block {
        barrier: Arc::clone(&barrier),
    }));

    let mut workflow = Workflow::new("wf", "fan-out");
    workflow.add_node(Node::new("a", "test.source").with_config("values", vec![Value::from(1.0)]));
    workflow.add_node(Node::new("b", "test.block"));
    workflow.add_node(Node::new("c", "test.block"));
    workflow.connect("a", "b");
    workflow.connect("a", "c");

    // If b and c were serialized, the first would wait on the barrier
    // forever and this would time out.
    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        engine().run(&workflow, &registry, &RunObserver::new()),
    )
    .await
    .expect("siblings did not run concurrently")
    .unwrap();

    assert_eq!(summary.status, RunStatus::Success);
    assert_eq!(summary.node_statuses["b"], ExecutionStatus::Success);
    assert_eq!(summary.node_statuses["c"], ExecutionStatus::Success);
}

#[tokio::test]
async fn failure_does_not_affect_sibling_branch() {
    let mut workflow = Workflow::new("wf", "isolation");
    workflow.add_node(Node::new("a", "test.source").with_config("values", vec![Value::from(1.0)]));
    workflow.add_node(Node::new("b", "test.fail"));
    workflow.add_node(Node::new("c", "test.append"));
    workflow.connect("a", "b");
    workflow.connect("a", "c");

    let summary = engine()
        .run(&workflow, &base_registry(), &RunObserver::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Error);
    assert_eq!(summary.node_statuses["b"], ExecutionStatus::Error);
    assert_eq!(summary.node_statuses["c"], ExecutionStatus::Success);
}

#[tokio::test]
async fn failed_dependency_skips_downstream() {
    let mut workflow = Workflow::new("wf", "skip");
    workflow.add_node(Node::new("a", "test.source").with_config("values", vec![Value::from(1.0)]));
    workflow.add_node(Node::new("b", "test.fail"));
    workflow.add_node(Node::new("c", "test.append"));
    workflow.connect("a", "b");
    workflow.connect("b", "c");

    let summary = engine()
        .run(&workflow, &base_registry(), &RunObserver::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Error);
    assert_eq!(summary.node_statuses["b"], ExecutionStatus::Error);
    assert_eq!(summary.node_statuses["c"], ExecutionStatus::Skipped);
}

#[tokio::test]
async fn workflow_without_entry_nodes_rejects() {
    let mut workflow = Workflow::new("wf", "no-entry");
    workflow.add_node(Node::new("a", "test.append"));
    workflow.add_node(Node::new("b", "test.append"));
    workflow.connect("a", "b");
    workflow.connect("b", "a");

    let (observer, events) = recording_observer();
    let result = engine().run(&workflow, &base_registry(), &observer).await;

    assert!(matches!(
        result,
        Err(EngineError::Workflow(WorkflowError::NoEntryPoint))
    ));
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_node_type_fails_only_its_branch() {
    let mut workflow = Workflow::new("wf", "unknown");
    workflow.add_node(Node::new("x", "no.such.type"));
    workflow.add_node(Node::new("a", "test.source").with_config("values", vec![Value::from(1.0)]));
    workflow.add_node(Node::new("d", "test.append"));
    workflow.connect("a", "d");

    let summary = engine()
        .run(&workflow, &base_registry(), &RunObserver::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Error);
    assert_eq!(summary.node_statuses["x"], ExecutionStatus::Error);
    assert_eq!(summary.node_statuses["a"], ExecutionStatus::Success);
    assert_eq!(summary.node_statuses["d"], ExecutionStatus::Success);
}

#[tokio::test]
async fn out_of_range_slot_rejects() {
    let mut workflow = Workflow::new("wf", "bad-slot");
    workflow.add_node(Node::new("a", "test.source"));
    workflow.add_node(Node::new("b", "test.append"));
    workflow.connect_slots("a", 1, "b", 0);

    let (observer, events) = recording_observer();
    let result = engine().run(&workflow, &base_registry(), &observer).await;

    assert!(matches!(
        result,
        Err(EngineError::Workflow(WorkflowError::InvalidConnection(_)))
    ));
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn stop_lets_running_node_finish_and_skips_dependents() {
    let started = Arc::new(Notify::new());
    let mut registry = base_registry();
    registry.register(Arc::new(Slow {
        started: Arc::clone(&started),
        delay_ms: 150,
    }));

    let mut workflow = Workflow::new("wf", "cancel");
    workflow.add_node(Node::new("a", "test.slow"));
    workflow.add_node(Node::new("b", "test.append"));
    workflow.connect("a", "b");

    let engine = Arc::new(engine());
    let registry = Arc::new(registry);
    let workflow = Arc::new(workflow);

    let handle = {
        let engine = Arc::clone(&engine);
        let registry = Arc::clone(&registry);
        let workflow = Arc::clone(&workflow);
        tokio::spawn(async move { engine.run(&workflow, &registry, &RunObserver::new()).await })
    };

    started.notified().await;
    engine.stop();

    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.status, RunStatus::Cancelled);
    assert_eq!(summary.node_statuses["a"], ExecutionStatus::Success);
    assert_eq!(summary.node_statuses["b"], ExecutionStatus::Skipped);
}

#[tokio::test]
async fn concurrent_run_on_busy_engine_rejects() {
    let started = Arc::new(Notify::new());
    let mut registry = base_registry();
    registry.register(Arc::new(Slow {
        started: Arc::clone(&started),
        delay_ms: 100,
    }));

    let mut workflow = Workflow::new("wf", "reentrant");
    workflow.add_node(Node::new("a", "test.slow"));

    let engine = Arc::new(engine());
    let registry = Arc::new(registry);
    let workflow = Arc::new(workflow);

    let handle = {
        let engine = Arc::clone(&engine);
        let registry = Arc::clone(&registry);
        let workflow = Arc::clone(&workflow);
        tokio::spawn(async move { engine.run(&workflow, &registry, &RunObserver::new()).await })
    };

    started.notified().await;
    let second = engine.run(&workflow, &registry, &RunObserver::new()).await;
    assert!(matches!(second, Err(EngineError::AlreadyRunning)));

    // The first run is untouched by the rejected call.
    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.status, RunStatus::Success);
    assert_eq!(summary.node_statuses["a"], ExecutionStatus::Success);
}

#[tokio::test]
async fn downstream_cycle_surfaces_as_error() {
    let mut workflow = Workflow::new("wf", "cycle");
    workflow.add_node(Node::new("a", "test.source").with_config("values", vec![Value::from(1.0)]));
    workflow.add_node(Node::new("b", "test.append"));
    workflow.add_node(Node::new("c", "test.append"));
    workflow.connect("a", "b");
    workflow.connect("b", "c");
    workflow.connect("c", "b");

    let summary = engine()
        .run(&workflow, &base_registry(), &RunObserver::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Error);
    assert_eq!(summary.node_statuses["a"], ExecutionStatus::Success);
    assert_eq!(summary.node_statuses["b"], ExecutionStatus::Error);
    assert_eq!(summary.node_statuses["c"], ExecutionStatus::Error);
}

#[tokio::test]
async fn multi_output_routes_items_by_slot() {
    let store = Arc::new(Mutex::new(HashMap::new()));
    let mut registry = base_registry();
    registry.register(Arc::new(Capture {
        store: Arc::clone(&store),
    }));

    let mut workflow = Workflow::new("wf", "split");
    workflow.add_node(Node::new("a", "test.source").with_config(
        "values",
        vec![Value::from(1.0), Value::from(5.0)],
    ));
    workflow.add_node(Node::new("r", "test.split"));
    workflow.add_node(Node::new("high", "test.capture").with_config("as", "high"));
    workflow.add_node(Node::new("low", "test.capture").with_config("as", "low"));
    workflow.connect("a", "r");
    workflow.connect_slots("r", 0, "high", 0);
    workflow.connect_slots("r", 1, "low", 0);

    let summary = engine()
        .run(&workflow, &registry, &RunObserver::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Success);
    let seen = store.lock().unwrap();
    let values = |name: &str| -> Vec<f64> {
        seen[name]
            .iter()
            .map(|i| i.get("value").and_then(Value::as_f64).unwrap())
            .collect()
    };
    assert_eq!(values("high"), [5.0]);
    assert_eq!(values("low"), [1.0]);
}

#[tokio::test]
async fn empty_producer_yields_one_empty_item() {
    let store = Arc::new(Mutex::new(HashMap::new()));
    let mut registry = base_registry();
    registry.register(Arc::new(Capture {
        store: Arc::clone(&store),
    }));

    let mut workflow = Workflow::new("wf", "empty");
    workflow.add_node(Node::new("a", "test.source"));
    workflow.add_node(Node::new("d", "test.capture"));
    workflow.connect("a", "d");

    let summary = engine()
        .run(&workflow, &registry, &RunObserver::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Success);
    let seen = store.lock().unwrap();
    assert_eq!(seen["default"], vec![Item::new()]);
}
