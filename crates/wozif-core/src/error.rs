use thiserror::Error;

#[derive(Debug, Error)]
pub enum WozifError {
    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM streaming error: {0}")]
    LlmStream(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    // Knowledge errors
    #[error("Embedding request failed: {0}")]
    Embedding(String),

    #[error("Knowledge index error: {0}")]
    Index(String),

    #[error("Source load failed: {source_ref}: {message}")]
    SourceLoad { source_ref: String, message: String },

    #[error("Tool endpoint error: {endpoint}: {message}")]
    ToolEndpoint { endpoint: String, message: String },

    // Workflow errors
    #[error("Invalid config for node {node}: {message}")]
    ConfigParse { node: String, message: String },

    #[error("Script sandbox error: {0}")]
    Sandbox(String),

    #[error("Script timed out after {0}s")]
    SandboxTimeout(u64),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    // Gateway errors
    #[error("Gateway error: {0}")]
    Gateway(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WozifError {
    /// Whether this error comes from the caller's node definitions rather
    /// than from a collaborator service.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigParse { .. })
    }
}

pub type Result<T> = std::result::Result<T, WozifError>;
