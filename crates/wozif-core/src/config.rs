use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WozifError};

/// Top-level Wozif configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub fallback_models: Vec<ModelConfig>,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            retry: None,
        }
    }
}

fn default_provider() -> String { "openai".to_string() }
fn default_model_id() -> String { "gpt-4o-mini".to_string() }
fn default_max_tokens() -> u32 { 2048 }
fn default_temperature() -> f32 { 0.0 }

/// Retry configuration for LLM requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

/// Embedding provider configuration (any OpenAI-compatible `/embeddings` API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Falls back to `model.api_key` when unset.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            base_url: None,
            api_key: None,
        }
    }
}

fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }

/// Knowledge base configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Static knowledge file, split on blank lines.
    #[serde(default = "default_knowledge_file")]
    pub knowledge_file: String,
    /// Chunks retrieved per question from the static index.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Chunks retrieved per question from a per-request index.
    #[serde(default = "default_custom_top_k")]
    pub custom_top_k: usize,
    /// Custom knowledge shorter than this (in chars) is inlined in the prompt.
    #[serde(default = "default_inline_threshold")]
    pub inline_threshold_chars: usize,
    #[serde(default = "default_max_source_chars")]
    pub max_source_chars: usize,
    /// Source budget when remote tools are advertised.
    #[serde(default = "default_max_source_chars_with_tools")]
    pub max_source_chars_with_tools: usize,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
    /// SQLite embedding cache. Default: ~/.wozif/embeddings.db
    #[serde(default)]
    pub cache_db: Option<String>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            knowledge_file: default_knowledge_file(),
            top_k: default_top_k(),
            custom_top_k: default_custom_top_k(),
            inline_threshold_chars: default_inline_threshold(),
            max_source_chars: default_max_source_chars(),
            max_source_chars_with_tools: default_max_source_chars_with_tools(),
            fetch_timeout_secs: default_fetch_timeout(),
            tool_timeout_secs: default_tool_timeout(),
            cache_db: None,
        }
    }
}

impl KnowledgeConfig {
    /// Resolve the embedding cache path (expand ~).
    pub fn cache_db_path(&self) -> PathBuf {
        match &self.cache_db {
            Some(path) => expand_home(path),
            None => expand_home("~/.wozif/embeddings.db"),
        }
    }
}

fn default_knowledge_file() -> String { "knowledge.txt".to_string() }
fn default_top_k() -> usize { 2 }
fn default_custom_top_k() -> usize { 3 }
fn default_inline_threshold() -> usize { 2000 }
fn default_max_source_chars() -> usize { 8000 }
fn default_max_source_chars_with_tools() -> usize { 10000 }
fn default_fetch_timeout() -> u64 { 30 }
fn default_tool_timeout() -> u64 { 30 }

/// How `python_script` nodes are executed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SandboxMode {
    /// Isolated `python3` child process.
    #[default]
    Process,
    /// Throwaway Docker container.
    Docker,
    /// Every script fails.
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default)]
    pub mode: SandboxMode,
    #[serde(default = "default_python")]
    pub python: String,
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default = "default_memory_mb")]
    pub memory_mb: u64,
    #[serde(default = "default_sandbox_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            mode: SandboxMode::default(),
            python: default_python(),
            image: default_image(),
            memory_mb: default_memory_mb(),
            timeout_secs: default_sandbox_timeout(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

fn default_python() -> String { "python3".to_string() }
fn default_image() -> String { "python:3.12-slim".to_string() }
fn default_memory_mb() -> u64 { 256 }
fn default_sandbox_timeout() -> u64 { 10 }
fn default_max_output_bytes() -> usize { 1024 * 1024 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub api_keys: Vec<ApiKeyConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_keys: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyConfig {
    pub name: String,
    pub key: String,
    #[serde(default)]
    pub role: ApiKeyRole,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyRole {
    /// Health only
    Viewer,
    /// Execute workflows
    #[default]
    Operator,
    /// Full access, including knowledge reload
    Admin,
}

fn default_bind() -> String { "127.0.0.1:8000".to_string() }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| WozifError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| WozifError::Config(e.to_string()))
    }

    /// Minimal config built from `OPENAI_API_KEY`, used when no file exists.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            WozifError::Config("no config file found and OPENAI_API_KEY is not set".into())
        })?;
        Ok(Self {
            model: ModelConfig {
                api_key: Some(api_key),
                ..ModelConfig::default()
            },
            fallback_models: vec![],
            embedding: EmbeddingConfig::default(),
            knowledge: KnowledgeConfig::default(),
            sandbox: SandboxConfig::default(),
            gateway: GatewayConfig::default(),
        })
    }

    /// Candidate config locations, most specific first.
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("wozif.toml")];
        if let Some(home) = dirs_home() {
            paths.push(home.join(".wozif").join("config.toml"));
        }
        paths
    }

    /// Load from an explicit path, else the first existing default path,
    /// else the environment.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_paths().into_iter().find(|p| p.exists()) {
            Some(path) => Self::load(&path),
            None => Self::from_env(),
        }
    }

    /// API key for the embedding provider.
    pub fn embedding_api_key(&self) -> Option<String> {
        self.embedding
            .api_key
            .clone()
            .or_else(|| self.model.api_key.clone())
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
