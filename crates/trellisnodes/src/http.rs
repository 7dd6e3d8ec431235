use async_trait::async_trait;
use std::collections::HashMap;
use trelliscore::{Item, NodeConfig, NodeError, NodeExecutor, NodeMetadata, NodeOutput, Value};

const SUPPORTED_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE"];

/// HTTP request node: one request per input item.
///
/// The URL comes from the node config, overridable per item via a
/// `url` field. POST/PUT bodies come from the item's `body` field.
pub struct HttpRequestNode {
    client: reqwest::Client,
}

impl HttpRequestNode {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRequestNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeExecutor for HttpRequestNode {
    fn node_type(&self) -> &str {
        "http.request"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Make HTTP requests".to_string(),
            category: "http".to_string(),
        }
    }

    fn validate_config(&self, config: &NodeConfig) -> Result<(), NodeError> {
        if let Some(method) = config.get("method").and_then(Value::as_str) {
            if !SUPPORTED_METHODS.contains(&method.to_uppercase().as_str()) {
                return Err(NodeError::Configuration(format!(
                    "Unsupported method: {method}"
                )));
            }
        }
        Ok(())
    }

    async fn execute(
        &self,
        config: &NodeConfig,
        inputs: Vec<Item>,
    ) -> Result<NodeOutput, NodeError> {
        let method = config
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_uppercase();

        let mut out = Vec::with_capacity(inputs.len());
        for item in &inputs {
            let url = item
                .get("url")
                .and_then(Value::as_str)
                .or_else(|| config.get("url").and_then(Value::as_str))
                .ok_or_else(|| {
                    NodeError::Configuration("Missing 'url' in config or input item".to_string())
                })?;

            let mut request = match method.as_str() {
                "GET" => self.client.get(url),
                "POST" => self.client.post(url),
                "PUT" => self.client.put(url),
                "DELETE" => self.client.delete(url),
                other => {
                    return Err(NodeError::Configuration(format!(
                        "Unsupported method: {other}"
                    )))
                }
            };

            if let Some(Value::Object(headers)) = config.get("headers") {
                for (key, value) in headers {
                    if let Some(v) = value.as_str() {
                        request = request.header(key.as_str(), v);
                    }
                }
            }

            if matches!(method.as_str(), "POST" | "PUT") {
                if let Some(body) = item.get("body") {
                    request = match body {
                        Value::String(text) => request.body(text.clone()),
                        other => request.json(&other.to_json()),
                    };
                }
            }

            let response = request
                .send()
                .await
                .map_err(|e| NodeError::ExecutionFailed(format!("HTTP request failed: {e}")))?;

            let status = response.status().as_u16();
            let headers: HashMap<String, Value> = response
                .headers()
                .iter()
                .map(|(k, v)| {
                    (
                        k.to_string(),
                        Value::String(v.to_str().unwrap_or_default().to_string()),
                    )
                })
                .collect();

            let text = response
                .text()
                .await
                .map_err(|e| NodeError::ExecutionFailed(format!("Failed to read response: {e}")))?;
            let body = match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(json) => Value::from_json(json),
                Err(_) => Value::String(text),
            };

            out.push(
                Item::new()
                    .with("status", status as f64)
                    .with("body", body)
                    .with("headers", Value::Object(headers)),
            );
        }

        Ok(NodeOutput::single(out))
    }
}
