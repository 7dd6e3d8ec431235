use crate::{Item, NodeError, NodeOutput, Value};
use async_trait::async_trait;
use std::collections::HashMap;

/// Static configuration map attached to a node, passed through to the
/// executor verbatim.
pub type NodeConfig = HashMap<String, Value>;

/// Contract every node type implements.
///
/// Executors are stateless: one shared instance serves every node of
/// its type across all runs. The engine hands each invocation the
/// node's config and its combined input items.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Unique type identifier (e.g., "http.request", "transform.set")
    fn node_type(&self) -> &str;

    /// Number of input slots this node type declares.
    fn input_count(&self) -> usize {
        1
    }

    /// Number of output slots this node type declares.
    fn output_count(&self) -> usize {
        1
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::default()
    }

    /// Optional: validate configuration before the run starts.
    fn validate_config(&self, _config: &NodeConfig) -> Result<(), NodeError> {
        Ok(())
    }

    /// Execute the node: consume the combined input items, produce the
    /// items for each declared output slot.
    async fn execute(&self, config: &NodeConfig, inputs: Vec<Item>)
        -> Result<NodeOutput, NodeError>;
}

/// Descriptive metadata about a node type, used for catalog listings.
#[derive(Debug, Clone)]
pub struct NodeMetadata {
    pub description: String,
    pub category: String,
}

impl Default for NodeMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
        }
    }
}
