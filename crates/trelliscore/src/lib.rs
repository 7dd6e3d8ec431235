//! Core abstractions for the trellis workflow engine
//!
//! This crate provides the fundamental types that all other components
//! depend on: the workflow data model, the value/item types flowing
//! along connections, the executor contract, and the event types.
//! It contains no execution logic.

mod error;
pub mod events;
mod executor;
mod run;
mod value;
mod workflow;

pub use error::{EngineError, NodeError, WorkflowError};
pub use executor::{NodeConfig, NodeExecutor, NodeMetadata};
pub use run::{ExecutionStatus, LogEntry, LogLevel, NodeOutput, RunId, RunStatus, RunSummary};
pub use value::{Item, Value};
pub use workflow::{Connection, ConnectionId, Node, NodeId, Workflow, WorkflowId};
pub use events::{EventBus, ExecutionEvent};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
