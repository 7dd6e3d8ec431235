use async_trait::async_trait;
use trelliscore::{Item, NodeConfig, NodeError, NodeExecutor, NodeMetadata, NodeOutput, Value};

/// Writes configured key/value pairs onto every item passing through.
///
/// Config: `values` — array of `{key, value}` objects; `keep_only_set`
/// — when true the output items contain only the configured keys.
pub struct SetNode;

#[async_trait]
impl NodeExecutor for SetNode {
    fn node_type(&self) -> &str {
        "transform.set"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Set fields on passing items".to_string(),
            category: "transform".to_string(),
        }
    }

    fn validate_config(&self, config: &NodeConfig) -> Result<(), NodeError> {
        match config.get("values") {
            None | Some(Value::Array(_)) => Ok(()),
            Some(_) => Err(NodeError::Configuration(
                "'values' must be an array of {key, value} objects".to_string(),
            )),
        }
    }

    async fn execute(
        &self,
        config: &NodeConfig,
        inputs: Vec<Item>,
    ) -> Result<NodeOutput, NodeError> {
        let values = match config.get("values") {
            Some(Value::Array(vs)) => vs.as_slice(),
            _ => &[],
        };
        let keep_only_set = config
            .get("keep_only_set")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let out = inputs
            .into_iter()
            .map(|item| {
                let mut base = if keep_only_set { Item::new() } else { item };
                for entry in values {
                    if let Value::Object(pair) = entry {
                        if let (Some(Value::String(key)), Some(value)) =
                            (pair.get("key"), pair.get("value"))
                        {
                            base.insert(key.clone(), value.clone());
                        }
                    }
                }
                base
            })
            .collect();

        Ok(NodeOutput::single(out))
    }
}

/// Parse a JSON string field into a structured value.
///
/// Config: `field` — the string field to parse (default "json");
/// `target` — where to store the result (default "parsed").
pub struct JsonParseNode;

#[async_trait]
impl NodeExecutor for JsonParseNode {
    fn node_type(&self) -> &str {
        "transform.json_parse"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Parse a JSON string field".to_string(),
            category: "transform".to_string(),
        }
    }

    async fn execute(
        &self,
        config: &NodeConfig,
        inputs: Vec<Item>,
    ) -> Result<NodeOutput, NodeError> {
        let field = config.get("field").and_then(Value::as_str).unwrap_or("json");
        let target = config
            .get("target")
            .and_then(Value::as_str)
            .unwrap_or("parsed");

        let mut out = Vec::with_capacity(inputs.len());
        for mut item in inputs {
            let text = item.get(field).and_then(Value::as_str).ok_or_else(|| {
                NodeError::InvalidInputType {
                    field: field.to_string(),
                    expected: "string".to_string(),
                    actual: "other".to_string(),
                }
            })?;
            let parsed: serde_json::Value = serde_json::from_str(text)
                .map_err(|e| NodeError::ExecutionFailed(format!("JSON parse error: {e}")))?;
            item.insert(target, Value::from_json(parsed));
            out.push(item);
        }

        Ok(NodeOutput::single(out))
    }
}

/// Serialize each item to a JSON string.
///
/// Config: `field` — serialize only this field when set, the whole
/// item otherwise; `target` — where to store the string (default
/// "json").
pub struct JsonStringifyNode;

#[async_trait]
impl NodeExecutor for JsonStringifyNode {
    fn node_type(&self) -> &str {
        "transform.json_stringify"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Serialize items to JSON strings".to_string(),
            category: "transform".to_string(),
        }
    }

    async fn execute(
        &self,
        config: &NodeConfig,
        inputs: Vec<Item>,
    ) -> Result<NodeOutput, NodeError> {
        let field = config.get("field").and_then(Value::as_str);
        let target = config.get("target").and_then(Value::as_str).unwrap_or("json");

        let mut out = Vec::with_capacity(inputs.len());
        for mut item in inputs {
            let json = match field {
                Some(name) => {
                    let value = item.get(name).ok_or_else(|| {
                        NodeError::MissingInput(name.to_string())
                    })?;
                    value.to_json()
                }
                None => item.to_json(),
            };
            let text = serde_json::to_string_pretty(&json)
                .map_err(|e| NodeError::ExecutionFailed(format!("JSON stringify error: {e}")))?;
            item.insert(target, text);
            out.push(item);
        }

        Ok(NodeOutput::single(out))
    }
}
