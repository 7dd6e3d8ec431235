//! Built-in node executors
//!
//! Each module implements one category of node behind the
//! `NodeExecutor` contract. All logic here is genuine: the HTTP node
//! makes real requests, the if node evaluates real comparisons.

mod debug;
mod http;
mod logic;
mod time;
mod transform;
mod trigger;

pub use debug::DebugNode;
pub use http::HttpRequestNode;
pub use logic::IfNode;
pub use time::DelayNode;
pub use transform::{JsonParseNode, JsonStringifyNode, SetNode};
pub use trigger::ManualTriggerNode;

use std::sync::Arc;
use trellisruntime::NodeRegistry;

/// Register every built-in node type.
pub fn register_all(registry: &mut NodeRegistry) {
    registry.register(Arc::new(ManualTriggerNode));
    registry.register(Arc::new(HttpRequestNode::new()));
    registry.register(Arc::new(SetNode));
    registry.register(Arc::new(JsonParseNode));
    registry.register(Arc::new(JsonStringifyNode));
    registry.register(Arc::new(IfNode));
    registry.register(Arc::new(DelayNode));
    registry.register(Arc::new(DebugNode));
}
