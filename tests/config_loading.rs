use std::io::Write;

use wozif_core::config::{ApiKeyRole, AppConfig, SandboxMode};

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[model]
provider = "openai"
model_id = "gpt-4o"
api_key = "sk-test-key"
base_url = "http://localhost:11434/v1"
max_tokens = 4096
temperature = 0.2

[model.retry]
max_retries = 5

[[fallback_models]]
model_id = "gpt-4o-mini"

[embedding]
model = "nomic-embed-text"
base_url = "http://localhost:11434/v1"

[knowledge]
knowledge_file = "/srv/wozif/knowledge.txt"
top_k = 4
inline_threshold_chars = 500
cache_db = "/tmp/wozif-embeddings.db"

[sandbox]
mode = "docker"
image = "python:3.11-slim"
memory_mb = 128
timeout_secs = 5

[gateway]
bind = "0.0.0.0:9999"

[[gateway.api_keys]]
name = "ci"
key = "wz_ci_key"
role = "admin"

[[gateway.api_keys]]
name = "front"
key = "wz_front"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.model_id, "gpt-4o");
    assert_eq!(config.model.api_key, Some("sk-test-key".to_string()));
    assert_eq!(config.model.max_tokens, 4096);
    let retry = config.model.retry.as_ref().expect("retry present");
    assert_eq!(retry.max_retries, 5);
    assert_eq!(retry.initial_backoff_ms, 1000);
    assert_eq!(config.fallback_models.len(), 1);
    assert_eq!(config.fallback_models[0].provider, "openai");

    assert_eq!(config.embedding.model, "nomic-embed-text");
    assert_eq!(config.embedding_api_key(), Some("sk-test-key".to_string()));

    assert_eq!(config.knowledge.top_k, 4);
    assert_eq!(config.knowledge.custom_top_k, 3);
    assert_eq!(config.knowledge.inline_threshold_chars, 500);
    assert_eq!(
        config.knowledge.cache_db_path().display().to_string(),
        "/tmp/wozif-embeddings.db"
    );

    assert_eq!(config.sandbox.mode, SandboxMode::Docker);
    assert_eq!(config.sandbox.memory_mb, 128);
    assert_eq!(config.sandbox.python, "python3");

    assert_eq!(config.gateway.bind, "0.0.0.0:9999");
    assert_eq!(config.gateway.api_keys.len(), 2);
    assert_eq!(config.gateway.api_keys[0].role, ApiKeyRole::Admin);
    assert_eq!(config.gateway.api_keys[1].role, ApiKeyRole::Operator);
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("WOZIF_TEST_API_KEY", "expanded-key-value");

    let toml_content = r#"
[model]
api_key = "${WOZIF_TEST_API_KEY}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.model.api_key, Some("expanded-key-value".to_string()));

    std::env::remove_var("WOZIF_TEST_API_KEY");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let toml_content = r#"
[model]
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.model_id, "gpt-4o-mini");
    assert_eq!(config.model.temperature, 0.0);
    assert!(config.model.retry.is_none());
    assert!(config.fallback_models.is_empty());
    assert_eq!(config.knowledge.knowledge_file, "knowledge.txt");
    assert_eq!(config.knowledge.top_k, 2);
    assert_eq!(config.knowledge.max_source_chars, 8000);
    assert_eq!(config.knowledge.max_source_chars_with_tools, 10000);
    assert_eq!(config.sandbox.mode, SandboxMode::Process);
    assert_eq!(config.sandbox.timeout_secs, 10);
    assert_eq!(config.gateway.bind, "127.0.0.1:8000");
    assert!(config.gateway.api_keys.is_empty());
}

#[test]
fn test_missing_config_file() {
    let err = AppConfig::load(std::path::Path::new("/nonexistent/wozif.toml")).unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_invalid_sandbox_mode_rejected() {
    let toml_content = r#"
[model]

[sandbox]
mode = "chroot"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    assert!(AppConfig::load(tmp.path()).is_err());
}
