use async_trait::async_trait;
use trelliscore::{Item, NodeConfig, NodeError, NodeExecutor, NodeMetadata, NodeOutput, Value};

const OPERATORS: &[&str] = &[
    "equals",
    "not_equals",
    "contains",
    "exists",
    "greater_than",
    "less_than",
];

/// Routes each item to the true (slot 0) or false (slot 1) output by
/// evaluating one field comparison.
///
/// Config: `field` — the item field to test; `operator` — one of
/// equals, not_equals, contains, exists, greater_than, less_than
/// (default equals); `value` — the comparison operand.
pub struct IfNode;

#[async_trait]
impl NodeExecutor for IfNode {
    fn node_type(&self) -> &str {
        "logic.if"
    }

    fn output_count(&self) -> usize {
        2
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Route items by a field condition".to_string(),
            category: "logic".to_string(),
        }
    }

    fn validate_config(&self, config: &NodeConfig) -> Result<(), NodeError> {
        if config.get("field").and_then(Value::as_str).is_none() {
            return Err(NodeError::Configuration(
                "'field' must be a string".to_string(),
            ));
        }
        if let Some(op) = config.get("operator").and_then(Value::as_str) {
            if !OPERATORS.contains(&op) {
                return Err(NodeError::Configuration(format!("Unknown operator: {op}")));
            }
        }
        Ok(())
    }

    async fn execute(
        &self,
        config: &NodeConfig,
        inputs: Vec<Item>,
    ) -> Result<NodeOutput, NodeError> {
        let field = config
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| NodeError::Configuration("'field' must be a string".to_string()))?;
        let operator = config
            .get("operator")
            .and_then(Value::as_str)
            .unwrap_or("equals");
        let expected = config.get("value").cloned().unwrap_or(Value::Null);

        let mut matched = Vec::new();
        let mut rest = Vec::new();
        for item in inputs {
            if evaluate(item.get(field), operator, &expected)? {
                matched.push(item);
            } else {
                rest.push(item);
            }
        }

        Ok(NodeOutput::multi(vec![matched, rest]))
    }
}

fn evaluate(actual: Option<&Value>, operator: &str, expected: &Value) -> Result<bool, NodeError> {
    let result = match operator {
        "exists" => actual.is_some(),
        "equals" => actual == Some(expected),
        "not_equals" => actual != Some(expected),
        "contains" => match (actual, expected) {
            (Some(Value::String(haystack)), Value::String(needle)) => haystack.contains(needle),
            (Some(Value::Array(items)), needle) => items.contains(needle),
            _ => false,
        },
        "greater_than" => match (actual.and_then(Value::as_f64), expected.as_f64()) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        },
        "less_than" => match (actual.and_then(Value::as_f64), expected.as_f64()) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        },
        other => {
            return Err(NodeError::Configuration(format!("Unknown operator: {other}")));
        }
    };
    Ok(result)
}
