use async_trait::async_trait;
use tokio::time::{sleep, Duration};
use trelliscore::{Item, NodeConfig, NodeError, NodeExecutor, NodeMetadata, NodeOutput, Value};

/// Delay node: sleeps for `delay_ms` milliseconds, then passes its
/// input items through unchanged.
pub struct DelayNode;

#[async_trait]
impl NodeExecutor for DelayNode {
    fn node_type(&self) -> &str {
        "time.delay"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Delay execution for specified milliseconds".to_string(),
            category: "time".to_string(),
        }
    }

    async fn execute(
        &self,
        config: &NodeConfig,
        inputs: Vec<Item>,
    ) -> Result<NodeOutput, NodeError> {
        let delay_ms = config
            .get("delay_ms")
            .and_then(Value::as_f64)
            .unwrap_or(1000.0) as u64;

        sleep(Duration::from_millis(delay_ms)).await;

        Ok(NodeOutput::single(inputs))
    }
}
