use async_trait::async_trait;
use trelliscore::{Item, NodeConfig, NodeError, NodeExecutor, NodeMetadata, NodeOutput};

/// Debug node: logs every passing item, then forwards it unchanged.
pub struct DebugNode;

#[async_trait]
impl NodeExecutor for DebugNode {
    fn node_type(&self) -> &str {
        "debug.log"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Log passing items for inspection".to_string(),
            category: "debug".to_string(),
        }
    }

    async fn execute(
        &self,
        _config: &NodeConfig,
        inputs: Vec<Item>,
    ) -> Result<NodeOutput, NodeError> {
        for (index, item) in inputs.iter().enumerate() {
            match serde_json::to_string(item) {
                Ok(json) => tracing::info!(index, "DEBUG: {json}"),
                Err(e) => tracing::warn!(index, "DEBUG: unserializable item: {e}"),
            }
        }

        Ok(NodeOutput::single(inputs))
    }
}
