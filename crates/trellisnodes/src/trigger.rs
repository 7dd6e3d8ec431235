use async_trait::async_trait;
use chrono::Utc;
use trelliscore::{Item, NodeConfig, NodeError, NodeExecutor, NodeMetadata, NodeOutput};

/// Manual trigger: starts a run by hand, emitting a single item that
/// marks the trigger source and fire time.
pub struct ManualTriggerNode;

#[async_trait]
impl NodeExecutor for ManualTriggerNode {
    fn node_type(&self) -> &str {
        "trigger.manual"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Start the workflow manually".to_string(),
            category: "trigger".to_string(),
        }
    }

    async fn execute(
        &self,
        _config: &NodeConfig,
        _inputs: Vec<Item>,
    ) -> Result<NodeOutput, NodeError> {
        Ok(NodeOutput::single(vec![Item::new()
            .with("trigger", "manual")
            .with("fired_at", Utc::now().to_rfc3339())]))
    }
}
