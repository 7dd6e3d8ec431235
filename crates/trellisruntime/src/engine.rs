use crate::graph::ExecutionGraph;
use crate::registry::NodeRegistry;
use crate::session::RunState;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use trelliscore::{
    EngineError, ExecutionEvent, ExecutionStatus, Item, LogEntry, LogLevel, NodeError,
    NodeExecutor, NodeId, RunStatus, RunSummary, Workflow, WorkflowError,
};

type StatusFn = dyn Fn(&str, ExecutionStatus) + Send + Sync;
type LogFn = dyn Fn(&LogEntry) + Send + Sync;
type EventFn = dyn Fn(&ExecutionEvent) + Send + Sync;

/// Callbacks fired synchronously as run state changes.
///
/// `on_status` and `on_log` follow the host contract; `on_event`
/// additionally receives every `ExecutionEvent`, which is how the run
/// session feeds its broadcast bus.
#[derive(Clone, Default)]
pub struct RunObserver {
    on_status: Option<Arc<StatusFn>>,
    on_log: Option<Arc<LogFn>>,
    on_event: Option<Arc<EventFn>>,
}

impl RunObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_status(mut self, f: impl Fn(&str, ExecutionStatus) + Send + Sync + 'static) -> Self {
        self.on_status = Some(Arc::new(f));
        self
    }

    pub fn on_log(mut self, f: impl Fn(&LogEntry) + Send + Sync + 'static) -> Self {
        self.on_log = Some(Arc::new(f));
        self
    }

    pub fn on_event(mut self, f: impl Fn(&ExecutionEvent) + Send + Sync + 'static) -> Self {
        self.on_event = Some(Arc::new(f));
        self
    }

    pub(crate) fn notify_status(&self, node_id: &str, status: ExecutionStatus) {
        if let Some(f) = &self.on_status {
            f(node_id, status);
        }
    }

    pub(crate) fn notify_log(&self, entry: &LogEntry) {
        if let Some(f) = &self.on_log {
            f(entry);
        }
    }

    pub(crate) fn notify_event(&self, event: &ExecutionEvent) {
        if let Some(f) = &self.on_event {
            f(event);
        }
    }
}

/// Configuration for the execution engine.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub max_parallel_nodes: usize,
    pub node_timeout_ms: Option<u64>,
    pub event_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 10,
            node_timeout_ms: None,
            event_buffer_size: 1000,
        }
    }
}

/// Executes one workflow run to completion or failure, with observable
/// progress.
///
/// Nodes execute in data-dependency order: a node starts only after all
/// of its producers reached `success`. Eligible siblings run
/// concurrently on spawned tasks; a node failure halts only its own
/// branch. One engine drives one run at a time.
pub struct ExecutionEngine {
    config: RuntimeConfig,
    running: AtomicBool,
    cancel: Mutex<CancellationToken>,
}

impl ExecutionEngine {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            running: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request cancellation of the active run. Checked before each node
    /// start; in-flight executors are left to finish.
    pub fn stop(&self) {
        let slot = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
        slot.cancel();
    }

    /// Execute a workflow run.
    ///
    /// Rejects immediately on structural problems (no entry nodes,
    /// invalid connection slots, malformed workflow) and when a run is
    /// already active. Node-level failures never reject: they surface
    /// as `error`/`skipped` statuses on the returned summary.
    pub async fn run(
        &self,
        workflow: &Workflow,
        registry: &NodeRegistry,
        observer: &RunObserver,
    ) -> Result<RunSummary, EngineError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(EngineError::AlreadyRunning);
        }
        let _active = ActiveRunGuard(&self.running);

        let cancel = {
            let mut slot = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
            *slot = CancellationToken::new();
            slot.clone()
        };

        workflow.validate()?;
        let graph = ExecutionGraph::new(workflow)?;
        if graph.entry_nodes().is_empty() {
            return Err(WorkflowError::NoEntryPoint.into());
        }

        // Resolve every node's executor up front. Unresolved types and
        // rejected configs fail that node (and its branch), not the run.
        let mut executors: HashMap<NodeId, Arc<dyn NodeExecutor>> = HashMap::new();
        let mut preflight_failures: Vec<(NodeId, String)> = Vec::new();
        for node in &workflow.nodes {
            match registry.get(&node.node_type) {
                Some(executor) => {
                    if let Err(e) = executor.validate_config(&node.config) {
                        preflight_failures.push((node.id.clone(), format!("{e}")));
                    } else {
                        executors.insert(node.id.clone(), executor);
                    }
                }
                None => preflight_failures.push((
                    node.id.clone(),
                    format!("{}", WorkflowError::UnknownNodeType(node.node_type.clone())),
                )),
            }
        }

        // Slot indices outside a node's declared arity are configuration
        // errors: reject before anything executes.
        for conn in &workflow.connections {
            if let Some(source) = executors.get(&conn.source) {
                if conn.source_output >= source.output_count() {
                    return Err(WorkflowError::InvalidConnection(format!(
                        "connection {} references output {} of node {}, which declares {} output(s)",
                        conn.id, conn.source_output, conn.source, source.output_count()
                    ))
                    .into());
                }
            }
            if let Some(target) = executors.get(&conn.target) {
                if conn.target_input >= target.input_count() {
                    return Err(WorkflowError::InvalidConnection(format!(
                        "connection {} references input {} of node {}, which declares {} input(s)",
                        conn.id, conn.target_input, conn.target, target.input_count()
                    ))
                    .into());
                }
            }
        }

        let started_at = Utc::now();
        let start = Instant::now();
        let mut state = RunState::new(workflow);

        tracing::info!(workflow_id = %workflow.id, run_id = %state.run_id, "Starting workflow execution");
        observer.notify_event(&ExecutionEvent::RunStarted {
            run_id: state.run_id,
            workflow_id: workflow.id.clone(),
            timestamp: started_at,
        });
        state.push_log(
            LogLevel::Info,
            "workflow",
            "Starting workflow execution",
            observer,
        );

        let labels: HashMap<&str, &str> = workflow
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), n.label()))
            .collect();

        for (node_id, message) in &preflight_failures {
            let label = labels.get(node_id.as_str()).copied().unwrap_or(node_id);
            state.set_status(node_id, ExecutionStatus::Error, observer);
            state.push_log(LogLevel::Error, label, message.clone(), observer);
        }

        self.execute_graph(
            workflow, &graph, &executors, &labels, &mut state, observer, &cancel,
        )
        .await;

        let cancelled = cancel.is_cancelled();
        self.conclude(workflow, &graph, &mut state, observer, cancelled);

        let status = if cancelled {
            RunStatus::Cancelled
        } else if state
            .statuses
            .values()
            .any(|s| matches!(s, ExecutionStatus::Error))
        {
            RunStatus::Error
        } else {
            RunStatus::Success
        };

        match status {
            RunStatus::Success => state.push_log(
                LogLevel::Success,
                "workflow",
                "Workflow execution completed successfully",
                observer,
            ),
            RunStatus::Error => state.push_log(
                LogLevel::Error,
                "workflow",
                "Workflow execution finished with errors",
                observer,
            ),
            RunStatus::Cancelled => {}
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(run_id = %state.run_id, ?status, duration_ms, "Workflow execution finished");
        observer.notify_event(&ExecutionEvent::RunFinished {
            run_id: state.run_id,
            status,
            duration_ms,
            timestamp: Utc::now(),
        });

        Ok(RunSummary {
            run_id: state.run_id,
            status,
            started_at,
            ended_at: Utc::now(),
            node_statuses: state.statuses,
            outputs: state.outputs,
        })
    }

    /// Dependency-ordered traversal: in-degree countdown over distinct
    /// producers, spawned executor tasks drained through
    /// `FuturesUnordered`.
    #[allow(clippy::too_many_arguments)]
    async fn execute_graph(
        &self,
        workflow: &Workflow,
        graph: &ExecutionGraph<'_>,
        executors: &HashMap<NodeId, Arc<dyn NodeExecutor>>,
        labels: &HashMap<&str, &str>,
        state: &mut RunState,
        observer: &RunObserver,
        cancel: &CancellationToken,
    ) {
        let mut remaining: HashMap<NodeId, usize> = workflow
            .nodes
            .iter()
            .map(|n| (n.id.clone(), graph.dependency_count(&n.id)))
            .collect();

        let mut ready: VecDeque<NodeId> = workflow
            .nodes
            .iter()
            .filter(|n| {
                remaining.get(n.id.as_str()) == Some(&0)
                    && state.status(&n.id) == ExecutionStatus::Pending
            })
            .map(|n| n.id.clone())
            .collect();

        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < self.config.max_parallel_nodes && !cancel.is_cancelled() {
                let Some(node_id) = ready.pop_front() else {
                    break;
                };
                // A node runs at most once; anything not pending has
                // already been scheduled or failed preflight.
                if state.status(&node_id) != ExecutionStatus::Pending {
                    continue;
                }
                let Some(executor) = executors.get(&node_id).cloned() else {
                    continue;
                };
                let Some(node) = workflow.find_node(&node_id) else {
                    continue;
                };

                let inputs = collect_inputs(graph, state, &node_id, executor.input_count());

                let label = labels.get(node_id.as_str()).copied().unwrap_or(&node_id);
                state.set_status(&node_id, ExecutionStatus::Executing, observer);
                state.push_log(LogLevel::Info, label, "Starting node execution", observer);
                tracing::debug!(node_id = %node_id, node_type = %node.node_type, "Node started");

                let config = node.config.clone();
                let timeout_ms = self.config.node_timeout_ms;
                let id = node_id.clone();
                in_flight.push(tokio::spawn(async move {
                    let started = Instant::now();
                    let work = async {
                        match timeout_ms {
                            Some(ms) => {
                                match timeout(
                                    Duration::from_millis(ms),
                                    executor.execute(&config, inputs),
                                )
                                .await
                                {
                                    Ok(result) => result,
                                    Err(_) => Err(NodeError::Timeout { seconds: ms / 1000 }),
                                }
                            }
                            None => executor.execute(&config, inputs).await,
                        }
                    };
                    let result = AssertUnwindSafe(work).catch_unwind().await.unwrap_or_else(
                        |_| Err(NodeError::ExecutionFailed("executor panicked".to_string())),
                    );
                    (id, result, started.elapsed().as_millis() as u64)
                }));
            }

            if in_flight.is_empty() {
                break;
            }

            let Some(joined) = in_flight.next().await else {
                break;
            };
            let (node_id, result, duration_ms) = match joined {
                Ok(completed) => completed,
                Err(e) => {
                    tracing::error!("Node execution task failed to join: {}", e);
                    state.push_log(
                        LogLevel::Error,
                        "workflow",
                        format!("Node execution task failed: {e}"),
                        observer,
                    );
                    continue;
                }
            };
            let label = labels.get(node_id.as_str()).copied().unwrap_or(&node_id);

            match result {
                Ok(output) => {
                    tracing::debug!(node_id = %node_id, duration_ms, "Node completed");
                    let summary = match output.total_items() {
                        1 => "1 item".to_string(),
                        n => format!("{n} items"),
                    };
                    state.outputs.insert(node_id.clone(), output);
                    state.set_status(&node_id, ExecutionStatus::Success, observer);
                    state.push_log(
                        LogLevel::Success,
                        label,
                        format!("Node executed successfully ({summary} in {duration_ms}ms)"),
                        observer,
                    );

                    for succ in graph.successors(&node_id) {
                        let now_ready = match remaining.get_mut(succ.as_str()) {
                            Some(count) => {
                                *count = count.saturating_sub(1);
                                *count == 0
                            }
                            None => false,
                        };
                        if now_ready && state.status(succ) == ExecutionStatus::Pending {
                            ready.push_back(succ.clone());
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(node_id = %node_id, error = %e, "Node failed");
                    state.set_status(&node_id, ExecutionStatus::Error, observer);
                    state.push_log(
                        LogLevel::Error,
                        label,
                        format!("Node execution failed: {e}"),
                        observer,
                    );
                    // Dependents stay pending and are skipped at
                    // conclusion; unrelated branches keep running.
                }
            }
        }
    }

    /// Settle every non-terminal node once traversal stops.
    fn conclude(
        &self,
        workflow: &Workflow,
        graph: &ExecutionGraph<'_>,
        state: &mut RunState,
        observer: &RunObserver,
        cancelled: bool,
    ) {
        if cancelled {
            let mut skipped = 0usize;
            for node in &workflow.nodes {
                if !state.status(&node.id).is_terminal() {
                    state.set_status(&node.id, ExecutionStatus::Skipped, observer);
                    skipped += 1;
                }
            }
            state.push_log(
                LogLevel::Warning,
                "workflow",
                format!("Workflow execution stopped by user ({skipped} node(s) skipped)"),
                observer,
            );
            return;
        }

        // Nodes stuck inside a dependency cycle can never become
        // eligible; surface them as errors instead of leaving the graph
        // silently unfinished.
        let cyclic = graph.cyclic_nodes();
        for node in &workflow.nodes {
            if state.status(&node.id) == ExecutionStatus::Pending && cyclic.contains(&node.id) {
                state.set_status(&node.id, ExecutionStatus::Error, observer);
                state.push_log(
                    LogLevel::Error,
                    node.label(),
                    "Node never became eligible: dependency cycle",
                    observer,
                );
            }
        }

        // Skip everything downstream of a failed or skipped producer.
        loop {
            let mut changed = false;
            for node in &workflow.nodes {
                if state.status(&node.id) != ExecutionStatus::Pending {
                    continue;
                }
                let blocked = graph.producers_of(&node.id).into_iter().any(|p| {
                    matches!(
                        state.status(p),
                        ExecutionStatus::Error | ExecutionStatus::Skipped
                    )
                });
                if blocked {
                    state.set_status(&node.id, ExecutionStatus::Skipped, observer);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        // Every node must end terminal: anything left executing lost its
        // task, anything left pending has an unsatisfiable dependency.
        for node in &workflow.nodes {
            match state.status(&node.id) {
                ExecutionStatus::Executing => {
                    state.set_status(&node.id, ExecutionStatus::Error, observer);
                }
                ExecutionStatus::Pending => {
                    state.set_status(&node.id, ExecutionStatus::Skipped, observer);
                }
                _ => {}
            }
        }
    }
}

struct ActiveRunGuard<'a>(&'a AtomicBool);

impl Drop for ActiveRunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Assemble a node's combined input: slots in index order, connections
/// within a slot in declaration order, items concatenated from each
/// producer's stored output. Entry nodes (and producers that emitted
/// nothing) yield one empty item.
fn collect_inputs(
    graph: &ExecutionGraph<'_>,
    state: &RunState,
    node_id: &str,
    input_count: usize,
) -> Vec<Item> {
    let inbound = graph.inbound_connections_of(node_id);
    if inbound.is_empty() {
        return vec![Item::new()];
    }

    let mut combined = Vec::new();
    for slot in 0..input_count.max(1) {
        for conn in inbound.iter().filter(|c| c.target_input == slot) {
            if let Some(output) = state.outputs.get(&conn.source) {
                combined.extend_from_slice(output.items(conn.source_output));
            }
        }
    }
    if combined.is_empty() {
        combined.push(Item::new());
    }
    combined
}
