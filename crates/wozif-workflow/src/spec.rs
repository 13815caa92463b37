use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use wozif_core::error::{Result, WozifError};
use wozif_core::types::{NodeId, WorkflowNode};

/// A validated workflow node: the caller's node with its config blob
/// decoded into the typed configuration of its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    SendText(SendTextConfig),
    AiAgent(AiAgentConfig),
    SwitchRouter(SwitchRouterConfig),
    GptAnalyze(AnalyzeConfig),
    Sentiment(SentimentConfig),
    RagKnowledge(RagKnowledgeConfig),
    PythonScript(PythonScriptConfig),
    LongTermMemory(MemoryConfig),
    CheckAvailability(AvailabilityConfig),
    BookAppointment(BookingConfig),
    CancelAppointment(CancellationConfig),
    /// Unrecognized tag; executes as a successful no-op.
    Unknown { tag: String },
}

impl NodeKind {
    /// The type tag this kind is dispatched from.
    pub fn tag(&self) -> &str {
        match self {
            Self::SendText(_) => "send_text",
            Self::AiAgent(_) => "ai_agent",
            Self::SwitchRouter(_) => "switch_router",
            Self::GptAnalyze(_) => "gpt_analyze",
            Self::Sentiment(_) => "sentiment",
            Self::RagKnowledge(_) => "rag_knowledge",
            Self::PythonScript(_) => "python_script",
            Self::LongTermMemory(_) => "long_term_memory",
            Self::CheckAvailability(_) => "check_availability",
            Self::BookAppointment(_) => "book_appointment",
            Self::CancelAppointment(_) => "cancel_appointment",
            Self::Unknown { tag } => tag,
        }
    }
}

impl NodeSpec {
    /// Validate a caller node. Fails with `ConfigParse` naming the node when
    /// the blob is not a JSON object or a field has the wrong type.
    /// Null-valued fields take their defaults.
    pub fn from_node(node: &WorkflowNode) -> Result<Self> {
        let mut config = node.config_object()?;
        config.retain(|_, v| !v.is_null());

        let kind = match node.node_type.as_str() {
            "send_text" => NodeKind::SendText(parse(node, config)?),
            "ai_agent" => NodeKind::AiAgent(parse(node, config)?),
            "switch_router" => NodeKind::SwitchRouter(parse(node, config)?),
            "gpt_analyze" => NodeKind::GptAnalyze(parse(node, config)?),
            "sentiment" => NodeKind::Sentiment(parse(node, config)?),
            "rag_knowledge" => NodeKind::RagKnowledge(parse(node, config)?),
            "python_script" => NodeKind::PythonScript(parse(node, config)?),
            "long_term_memory" => NodeKind::LongTermMemory(parse(node, config)?),
            "check_availability" => NodeKind::CheckAvailability(parse(node, config)?),
            "book_appointment" => NodeKind::BookAppointment(parse(node, config)?),
            "cancel_appointment" => NodeKind::CancelAppointment(parse(node, config)?),
            other => NodeKind::Unknown {
                tag: other.to_string(),
            },
        };

        Ok(Self {
            id: node.id.clone(),
            name: node.name.clone(),
            kind,
        })
    }
}

fn parse<T: DeserializeOwned>(node: &WorkflowNode, config: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(config)).map_err(|e| WozifError::ConfigParse {
        node: node.id.to_string(),
        message: format!("{} config: {}", node.node_type, e),
    })
}

/// Accept either `"a|b"` or `["a", "b"]`.
fn string_or_list<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Options {
        Text(String),
        List(Vec<String>),
    }
    Ok(match Options::deserialize(deserializer)? {
        Options::Text(s) => s,
        Options::List(items) => items.join("|"),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SendTextConfig {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiAgentConfig {
    pub instructions: String,
    pub data_sources: DataSources,
}

impl Default for AiAgentConfig {
    fn default() -> Self {
        Self {
            instructions: "Tu es un assistant utile.".to_string(),
            data_sources: DataSources::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataSources {
    pub urls: Vec<String>,
    pub files: Vec<String>,
    /// Remote tool endpoint base URLs.
    pub mcp_providers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SwitchRouterConfig {
    pub field: String,
    pub cases: Vec<SwitchCase>,
}

impl Default for SwitchRouterConfig {
    fn default() -> Self {
        Self {
            field: "intent".to_string(),
            cases: vec![],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SwitchCase {
    /// Compared by its lowercased string form.
    pub value: Value,
}

pub const DEFAULT_INTENTS: &str =
    "salutation|question_prix|demande_produit|plainte|remerciement|demande_aide|commande|annulation|autre";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzeConfig {
    #[serde(deserialize_with = "string_or_list")]
    pub categories: String,
    #[serde(deserialize_with = "string_or_list")]
    pub type_values: String,
    pub use_custom_intents: bool,
    /// One intent per line.
    pub custom_intents: String,
    pub ai_instructions: String,
}

impl AnalyzeConfig {
    /// The `|`-separated intent options offered to the model: custom
    /// intents when enabled and non-empty, else the configured categories,
    /// else the built-in list.
    pub fn intent_options(&self) -> String {
        if self.use_custom_intents {
            let custom: Vec<&str> = self
                .custom_intents
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect();
            if !custom.is_empty() {
                return custom.join("|");
            }
        }
        if !self.categories.is_empty() {
            return self.categories.clone();
        }
        if !self.type_values.is_empty() {
            return self.type_values.clone();
        }
        DEFAULT_INTENTS.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    /// Scores strictly below this flag the message as negative.
    pub threshold: f64,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self { threshold: -0.5 }
    }
}

/// Knowledge base id selecting the caller-supplied content.
pub const MANUAL_KNOWLEDGE_BASE: &str = "manual";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RagKnowledgeConfig {
    pub knowledge_base_id: String,
    pub knowledge_content: String,
}

impl Default for RagKnowledgeConfig {
    fn default() -> Self {
        Self {
            knowledge_base_id: "default".to_string(),
            knowledge_content: String::new(),
        }
    }
}

impl RagKnowledgeConfig {
    /// Custom content to answer from, when this node uses the manual base.
    pub fn custom_content(&self) -> Option<&str> {
        (self.knowledge_base_id == MANUAL_KNOWLEDGE_BASE && !self.knowledge_content.is_empty())
            .then_some(self.knowledge_content.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PythonScriptConfig {
    pub script: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// `store`, anything else loads.
    pub action: String,
    pub key: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            action: "load".to_string(),
            key: "default_key".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AvailabilityConfig {
    /// Minutes.
    pub duration: u32,
    pub timezone: String,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            duration: 30,
            timezone: "Africa/Abidjan".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    pub title: String,
    pub calendar_id: String,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            title: "Rendez-vous".to_string(),
            calendar_id: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CancellationConfig {
    pub booking_id: String,
}

impl Default for CancellationConfig {
    fn default() -> Self {
        Self {
            booking_id: "BK-9988".to_string(),
        }
    }
}
