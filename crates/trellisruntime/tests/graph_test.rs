use trelliscore::{Node, Workflow};
use trellisruntime::ExecutionGraph;

fn diamond() -> Workflow {
    let mut workflow = Workflow::new("wf", "diamond");
    for id in ["a", "b", "c", "d"] {
        workflow.add_node(Node::new(id, "x"));
    }
    workflow.connect("a", "b");
    workflow.connect("a", "c");
    workflow.connect("b", "d");
    workflow.connect("c", "d");
    workflow
}

#[test]
fn entry_nodes_are_nodes_without_inbound_connections() {
    let workflow = diamond();
    let graph = ExecutionGraph::new(&workflow).unwrap();
    let entries: Vec<&str> = graph.entry_nodes().iter().map(|id| id.as_str()).collect();
    assert_eq!(entries, ["a"]);
}

#[test]
fn inbound_connections_keep_declaration_order() {
    let workflow = diamond();
    let graph = ExecutionGraph::new(&workflow).unwrap();
    let inbound: Vec<&str> = graph
        .inbound_connections_of("d")
        .iter()
        .map(|c| c.source.as_str())
        .collect();
    assert_eq!(inbound, ["b", "c"]);
}

#[test]
fn downstream_and_successors() {
    let workflow = diamond();
    let graph = ExecutionGraph::new(&workflow).unwrap();

    let downstream: Vec<(&str, usize)> = graph
        .downstream_of("a")
        .into_iter()
        .map(|(id, slot)| (id.as_str(), slot))
        .collect();
    assert_eq!(downstream, [("b", 0), ("c", 0)]);

    let successors: Vec<&str> = graph.successors("a").iter().map(|id| id.as_str()).collect();
    assert_eq!(successors, ["b", "c"]);
}

#[test]
fn producers_are_distinct() {
    let mut workflow = Workflow::new("wf", "dup-edges");
    workflow.add_node(Node::new("a", "x"));
    workflow.add_node(Node::new("b", "x"));
    // Two parallel connections from the same producer.
    workflow.connect("a", "b");
    workflow.connect("a", "b");

    let graph = ExecutionGraph::new(&workflow).unwrap();
    assert_eq!(graph.inbound_connections_of("b").len(), 2);
    assert_eq!(graph.producers_of("b").len(), 1);
    assert_eq!(graph.dependency_count("b"), 1);
    assert_eq!(graph.successors("a").len(), 1);
}

#[test]
fn cyclic_nodes_finds_strongly_connected_members() {
    let workflow = diamond();
    let graph = ExecutionGraph::new(&workflow).unwrap();
    assert!(graph.cyclic_nodes().is_empty());

    let mut cyclic = Workflow::new("wf", "cycle");
    for id in ["a", "b", "c"] {
        cyclic.add_node(Node::new(id, "x"));
    }
    cyclic.connect("a", "b");
    cyclic.connect("b", "c");
    cyclic.connect("c", "b");

    let graph = ExecutionGraph::new(&cyclic).unwrap();
    let members = graph.cyclic_nodes();
    assert_eq!(members.len(), 2);
    assert!(members.iter().any(|id| id.as_str() == "b"));
    assert!(members.iter().any(|id| id.as_str() == "c"));
}
