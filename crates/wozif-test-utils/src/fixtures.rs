use serde_json::Value;

use wozif_core::types::{ExecutionContext, NodeId, WorkflowNode};

/// A node whose config is `config` serialized to a JSON string, the way
/// the front end submits it.
pub fn node(id: impl Into<NodeId>, node_type: &str, config: Value) -> WorkflowNode {
    WorkflowNode::new(id, node_type, config.to_string())
}

/// A node with no config blob at all.
pub fn bare_node(id: impl Into<NodeId>, node_type: &str) -> WorkflowNode {
    WorkflowNode {
        config: None,
        ..WorkflowNode::new(id, node_type, "")
    }
}

/// Context from a JSON object literal. Panics on anything else.
pub fn context(value: Value) -> ExecutionContext {
    match value {
        Value::Object(map) => ExecutionContext::from_map(map),
        other => panic!("context fixture must be an object, got {}", other),
    }
}

/// Analysis reply in the shape `gpt_analyze` asks the model for.
pub fn analysis_reply(intent: &str, sentiment: &str, urgency: u8) -> Value {
    serde_json::json!({
        "intent": intent,
        "intent_confidence": 0.92,
        "sentiment": sentiment,
        "sentiment_score": -0.6,
        "urgency": urgency,
        "emotions": ["frustration"],
        "auto_resolvable": false,
        "keywords": ["commande", "retard"],
        "suggested_action": "Escalader au support",
        "response_tone": "empathique"
    })
}
