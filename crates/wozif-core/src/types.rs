use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, WozifError};

/// Caller-supplied node identifier. Unique within one run only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Int(i64),
    Str(String),
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<i64> for NodeId {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for NodeId {
    fn from(n: i32) -> Self {
        Self::Int(n.into())
    }
}

/// A workflow node as submitted by the caller.
///
/// `config` is the raw configuration blob: usually a JSON document encoded
/// as a string, but an inline object is accepted too.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub config: Option<Value>,
}

impl WorkflowNode {
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<String>, config: impl Into<String>) -> Self {
        let node_type = node_type.into();
        Self {
            id: id.into(),
            name: node_type.clone(),
            node_type,
            config: Some(Value::String(config.into())),
        }
    }

    /// Decode the configuration blob into a JSON object.
    ///
    /// Absent, null and empty-string blobs decode to an empty object.
    pub fn config_object(&self) -> Result<Map<String, Value>> {
        let parsed = match &self.config {
            None | Some(Value::Null) => return Ok(Map::new()),
            Some(Value::String(raw)) if raw.trim().is_empty() => return Ok(Map::new()),
            Some(Value::String(raw)) => {
                serde_json::from_str::<Value>(raw).map_err(|e| WozifError::ConfigParse {
                    node: self.id.to_string(),
                    message: e.to_string(),
                })?
            }
            Some(other) => other.clone(),
        };

        match parsed {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(WozifError::ConfigParse {
                node: self.id.to_string(),
                message: format!("expected a JSON object, got {}", json_kind(&other)),
            }),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Mutable state shared by every node of one run.
///
/// Keys are conventions only (`lastUserMessage`, `intent`, ...): any node
/// may overwrite any key. Keys keep their insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContext {
    data: Map<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(data: Map<String, Value>) -> Self {
        Self { data }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Get a value as a string, if it's a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// The latest inbound user message, or an empty string.
    pub fn last_user_message(&self) -> String {
        self.get_str(keys::LAST_USER_MESSAGE)
            .unwrap_or_default()
            .to_string()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    pub fn set_str(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), Value::String(value.into()));
    }

    /// Merge every entry of `other` into the context (overwrites on conflict).
    pub fn merge(&mut self, other: &Map<String, Value>) {
        for (k, v) in other {
            self.data.insert(k.clone(), v.clone());
        }
    }

    /// Replace the whole content.
    pub fn replace(&mut self, data: Map<String, Value>) {
        self.data = data;
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }
}

/// Well-known context keys.
pub mod keys {
    pub const LAST_USER_MESSAGE: &str = "lastUserMessage";
    pub const AI_ANSWER: &str = "aiAnswer";
    pub const INTENT: &str = "intent";
    pub const INTENT_ALIAS: &str = "type";
    pub const USER_ID: &str = "userId";
    pub const SELECTED_DATE: &str = "selected_date";
    pub const IS_NEGATIVE_SENTIMENT: &str = "is_negative_sentiment";
}

/// Outcome of one node execution. Never mutated after it is returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    pub id: NodeId,
    pub success: bool,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// UI pacing hint in milliseconds.
    #[serde(
        rename = "waitDelay",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub wait_delay_ms: Option<u64>,
}

impl NodeResult {
    pub fn success(id: NodeId, message: impl Into<String>) -> Self {
        Self {
            id,
            success: true,
            data: Map::new(),
            message: message.into(),
            error: None,
            wait_delay_ms: None,
        }
    }

    pub fn failure(id: NodeId, error: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            data: Map::new(),
            message: String::new(),
            error: Some(error.into()),
            wait_delay_ms: None,
        }
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn with_wait_delay(mut self, ms: u64) -> Self {
        self.wait_delay_ms = Some(ms);
        self
    }
}

/// Everything a run hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub results: Vec<NodeResult>,
    pub final_context: ExecutionContext,
}

/// Role in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A chat message sent to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }
}

/// Stop reason from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
}

/// A streaming delta from the LLM.
#[derive(Debug, Clone)]
pub enum StreamDelta {
    /// A chunk of text content.
    TextDelta(String),

    /// The response is complete.
    Stop(StopReason),

    /// Usage information.
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },
}

/// Remote tool advertised by a tool endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "inputSchema")]
    pub parameters: Value,
}

/// Extra sources an `ai_agent` node may ground its answer on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRequest {
    pub instructions: String,
    pub urls: Vec<String>,
    pub files: Vec<String>,
    pub tool_endpoints: Vec<String>,
}
