//! Workflow execution runtime
//!
//! This crate provides the execution engine that runs workflows:
//! dependency-ordered graph traversal with parallel node execution,
//! the node registry, and the host-facing run session.

mod engine;
mod graph;
mod registry;
mod session;

pub use engine::{ExecutionEngine, RunObserver, RuntimeConfig};
pub use graph::ExecutionGraph;
pub use registry::NodeRegistry;
pub use session::{RunSession, RunState};
