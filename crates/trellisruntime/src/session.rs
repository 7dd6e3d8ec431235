use crate::engine::{ExecutionEngine, RunObserver, RuntimeConfig};
use crate::registry::NodeRegistry;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use trelliscore::{
    EngineError, EventBus, ExecutionEvent, ExecutionStatus, LogEntry, LogLevel, NodeId,
    NodeOutput, RunId, RunSummary, Workflow,
};
use uuid::Uuid;

/// Mutable state of one run: statuses, stored outputs, and the log
/// stream.
///
/// Owned exclusively by the engine for the run's duration and mutated
/// only through the step methods below, which also fire the observer
/// callbacks so state changes and notifications cannot drift apart.
pub struct RunState {
    pub run_id: RunId,
    pub statuses: HashMap<NodeId, ExecutionStatus>,
    pub outputs: HashMap<NodeId, NodeOutput>,
    pub log: Vec<LogEntry>,
}

impl RunState {
    pub fn new(workflow: &Workflow) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            statuses: workflow
                .nodes
                .iter()
                .map(|n| (n.id.clone(), ExecutionStatus::Pending))
                .collect(),
            outputs: HashMap::new(),
            log: Vec::new(),
        }
    }

    pub fn status(&self, node_id: &str) -> ExecutionStatus {
        self.statuses
            .get(node_id)
            .copied()
            .unwrap_or(ExecutionStatus::Pending)
    }

    pub(crate) fn set_status(
        &mut self,
        node_id: &str,
        status: ExecutionStatus,
        observer: &RunObserver,
    ) {
        self.statuses.insert(node_id.to_string(), status);
        observer.notify_status(node_id, status);
        observer.notify_event(&ExecutionEvent::NodeStatusChanged {
            run_id: self.run_id,
            node_id: node_id.to_string(),
            status,
            timestamp: Utc::now(),
        });
    }

    pub(crate) fn push_log(
        &mut self,
        level: LogLevel,
        source: &str,
        message: impl Into<String>,
        observer: &RunObserver,
    ) {
        let entry = LogEntry::new(level, source, message);
        observer.notify_log(&entry);
        observer.notify_event(&ExecutionEvent::LogAppended {
            run_id: self.run_id,
            entry: entry.clone(),
        });
        self.log.push(entry);
    }
}

/// Host-side holder for workflow runs: owns an engine, relays its
/// status and log events onto a broadcast bus, and exposes
/// cancellation. One session drives one run at a time.
pub struct RunSession {
    registry: Arc<NodeRegistry>,
    engine: Arc<ExecutionEngine>,
    bus: Arc<EventBus>,
}

impl RunSession {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self::with_config(registry, RuntimeConfig::default())
    }

    pub fn with_config(registry: Arc<NodeRegistry>, config: RuntimeConfig) -> Self {
        let bus = Arc::new(EventBus::new(config.event_buffer_size));
        let engine = Arc::new(ExecutionEngine::new(config));
        Self {
            registry,
            engine,
            bus,
        }
    }

    /// Subscribe to the session's execution events.
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.bus.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    /// Request cancellation of the active run. Nodes already executing
    /// finish; nothing new starts.
    pub fn stop(&self) {
        self.engine.stop();
    }

    /// Execute a workflow, relaying engine events to subscribers.
    pub async fn run(&self, workflow: &Workflow) -> Result<RunSummary, EngineError> {
        let bus = Arc::clone(&self.bus);
        let observer = RunObserver::new().on_event(move |event| bus.emit(event.clone()));
        self.engine.run(workflow, &self.registry, &observer).await
    }
}
