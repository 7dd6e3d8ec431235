use crate::{Value, WorkflowError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub type WorkflowId = String;
pub type NodeId = String;
pub type ConnectionId = String;

/// Complete workflow definition: the read-only snapshot the engine
/// receives per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,
}

impl Workflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Connect two nodes on the default slots (output 0 -> input 0).
    pub fn connect(&mut self, source: impl Into<NodeId>, target: impl Into<NodeId>) {
        let source = source.into();
        let target = target.into();
        let id = format!("c{}", self.connections.len() + 1);
        self.connections.push(Connection {
            id,
            source,
            target,
            source_output: 0,
            target_input: 0,
        });
    }

    /// Connect two nodes on explicit output/input slots.
    pub fn connect_slots(
        &mut self,
        source: impl Into<NodeId>,
        source_output: usize,
        target: impl Into<NodeId>,
        target_input: usize,
    ) {
        let id = format!("c{}", self.connections.len() + 1);
        self.connections.push(Connection {
            id,
            source: source.into(),
            target: target.into(),
            source_output,
            target_input,
        });
    }

    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Check the structural invariants: unique node ids, connection
    /// endpoints present, no self-loops.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(WorkflowError::DuplicateNodeId(node.id.clone()));
            }
        }

        for conn in &self.connections {
            if !seen.contains(conn.source.as_str()) {
                return Err(WorkflowError::NodeNotFound(conn.source.clone()));
            }
            if !seen.contains(conn.target.as_str()) {
                return Err(WorkflowError::NodeNotFound(conn.target.clone()));
            }
            if conn.source == conn.target {
                return Err(WorkflowError::SelfLoop(conn.id.clone(), conn.source.clone()));
            }
        }

        Ok(())
    }
}

/// A configured unit of work, typed by its registry entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub config: HashMap<String, Value>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            name: None,
            config: HashMap::new(),
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Display label for logs: canvas name when present, id otherwise.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Directed, slot-addressed edge carrying items between nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, alias = "sourceOutput")]
    pub source_output: usize,
    #[serde(default, alias = "targetInput")]
    pub target_input: usize,
}
