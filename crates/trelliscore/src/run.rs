use crate::{Item, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub type RunId = Uuid;

/// Per-node status within one run.
///
/// Transitions are monotonic: `Pending -> Executing -> Success | Error`,
/// or `Pending -> Skipped` when an upstream dependency failed or the
/// run was cancelled before the node became eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Executing,
    Success,
    Error,
    Skipped,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Success | ExecutionStatus::Error | ExecutionStatus::Skipped
        )
    }
}

/// Severity of a run log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Error,
    Warning,
}

/// One entry in a run's append-only log stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub level: LogLevel,
    pub source: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(level: LogLevel, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            level,
            source: source.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Per-node execution result: items indexed by output slot.
///
/// Written once when the node finishes, read (never mutated) by
/// downstream consumers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeOutput {
    slots: Vec<Vec<Item>>,
}

impl NodeOutput {
    /// Output of a single-output node: everything on slot 0.
    pub fn single(items: Vec<Item>) -> Self {
        Self { slots: vec![items] }
    }

    /// Output of a multi-output node, indexed by output slot.
    pub fn multi(slots: Vec<Vec<Item>>) -> Self {
        Self { slots }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Items on the given output slot; empty for unknown slots.
    pub fn items(&self, slot: usize) -> &[Item] {
        self.slots.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn total_items(&self) -> usize {
        self.slots.iter().map(Vec::len).sum()
    }
}

/// Overall outcome of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
    Cancelled,
}

/// Final report of one run, returned once the engine resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub node_statuses: HashMap<NodeId, ExecutionStatus>,
    pub outputs: HashMap<NodeId, NodeOutput>,
}
