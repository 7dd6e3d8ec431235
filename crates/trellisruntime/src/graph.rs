use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};
use trelliscore::{Connection, NodeId, Workflow, WorkflowError};

/// Pure query layer over a workflow's nodes and connections.
///
/// Built once per run from the workflow snapshot. Answers "who feeds
/// node X" and "who consumes node X" without any execution state.
pub struct ExecutionGraph<'a> {
    workflow: &'a Workflow,
    graph: DiGraph<NodeId, usize>,
    indices: HashMap<NodeId, NodeIndex>,
}

impl<'a> ExecutionGraph<'a> {
    pub fn new(workflow: &'a Workflow) -> Result<Self, WorkflowError> {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::new();

        for node in &workflow.nodes {
            let idx = graph.add_node(node.id.clone());
            indices.insert(node.id.clone(), idx);
        }

        // Edge weight is the connection's declaration index, so
        // slot-order queries can restore declaration order.
        for (pos, conn) in workflow.connections.iter().enumerate() {
            let from = indices
                .get(&conn.source)
                .ok_or_else(|| WorkflowError::NodeNotFound(conn.source.clone()))?;
            let to = indices
                .get(&conn.target)
                .ok_or_else(|| WorkflowError::NodeNotFound(conn.target.clone()))?;
            graph.add_edge(*from, *to, pos);
        }

        Ok(Self {
            workflow,
            graph,
            indices,
        })
    }

    /// Nodes with no inbound connection, in declaration order. These
    /// are the run's starting points.
    pub fn entry_nodes(&self) -> Vec<&NodeId> {
        self.workflow
            .nodes
            .iter()
            .filter(|n| {
                let idx = self.indices[&n.id];
                self.graph
                    .neighbors_directed(idx, petgraph::Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|n| &n.id)
            .collect()
    }

    /// Inbound connections of a node, in declaration order.
    pub fn inbound_connections_of(&self, node_id: &str) -> Vec<&Connection> {
        let Some(idx) = self.indices.get(node_id) else {
            return Vec::new();
        };
        let mut positions: Vec<usize> = self
            .graph
            .edges_directed(*idx, petgraph::Direction::Incoming)
            .map(|e| *e.weight())
            .collect();
        positions.sort_unstable();
        positions
            .into_iter()
            .map(|pos| &self.workflow.connections[pos])
            .collect()
    }

    /// `(target, target_input)` pairs of a node's outbound connections,
    /// in declaration order.
    pub fn downstream_of(&self, node_id: &str) -> Vec<(&NodeId, usize)> {
        let Some(idx) = self.indices.get(node_id) else {
            return Vec::new();
        };
        let mut positions: Vec<usize> = self
            .graph
            .edges_directed(*idx, petgraph::Direction::Outgoing)
            .map(|e| *e.weight())
            .collect();
        positions.sort_unstable();
        positions
            .into_iter()
            .map(|pos| {
                let conn = &self.workflow.connections[pos];
                (&conn.target, conn.target_input)
            })
            .collect()
    }

    /// Distinct downstream consumers of a node.
    pub fn successors(&self, node_id: &str) -> Vec<&NodeId> {
        let mut seen = HashSet::new();
        self.downstream_of(node_id)
            .into_iter()
            .filter_map(|(target, _)| seen.insert(target.as_str()).then_some(target))
            .collect()
    }

    /// Distinct upstream producers of a node.
    pub fn producers_of(&self, node_id: &str) -> Vec<&NodeId> {
        let mut seen = HashSet::new();
        self.inbound_connections_of(node_id)
            .into_iter()
            .filter_map(|conn| seen.insert(conn.source.as_str()).then_some(&conn.source))
            .collect()
    }

    /// Number of distinct producers a node waits on.
    pub fn dependency_count(&self, node_id: &str) -> usize {
        self.producers_of(node_id).len()
    }

    /// Nodes belonging to a dependency cycle. Consulted at run
    /// conclusion to surface malformed graphs deterministically; never
    /// used to pre-reject a workflow.
    pub fn cyclic_nodes(&self) -> HashSet<&NodeId> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .flatten()
            .map(|idx| &self.graph[idx])
            .collect()
    }
}
