use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use wozif_core::config::AppConfig;
use wozif_core::error::{Result, WozifError};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Trait for embedding providers (OpenAI-compatible APIs).
pub trait EmbeddingProvider: Send + Sync + 'static {
    /// Embed a batch of texts into vectors, one per input, in order.
    fn embed(&self, texts: &[String]) -> BoxFuture<'_, Result<Vec<Vec<f32>>>>;
    /// Model identifier, part of the embedding cache key.
    fn model(&self) -> &str;
}

/// HTTP-based embedding provider compatible with OpenAI, Ollama, etc.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpEmbeddingProvider {
    pub fn new(base_url: &str, api_key: Option<&str>, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(String::from),
            model: model.to_string(),
        }
    }
}

/// Build the embedding provider described by `[embedding]`.
pub fn create_embedder(config: &AppConfig) -> HttpEmbeddingProvider {
    let base_url = config
        .embedding
        .base_url
        .as_deref()
        .unwrap_or(OPENAI_API_BASE);
    HttpEmbeddingProvider::new(
        base_url,
        config.embedding_api_key().as_deref(),
        &config.embedding.model,
    )
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl EmbeddingProvider for HttpEmbeddingProvider {
    fn embed(&self, texts: &[String]) -> BoxFuture<'_, Result<Vec<Vec<f32>>>> {
        let texts = texts.to_vec();
        Box::pin(async move {
            if texts.is_empty() {
                return Ok(vec![]);
            }
            let url = format!("{}/embeddings", self.base_url);

            let mut req = self.client.post(&url).json(&EmbeddingRequest {
                model: &self.model,
                input: &texts,
            });

            if let Some(ref key) = self.api_key {
                req = req.bearer_auth(key);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| WozifError::Embedding(format!("request failed: {}", e)))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(WozifError::Embedding(format!("API error {}: {}", status, body)));
            }

            let body: EmbeddingResponse = resp
                .json()
                .await
                .map_err(|e| WozifError::Embedding(format!("failed to parse response: {}", e)))?;

            let mut data = body.data;
            if data.len() != texts.len() {
                return Err(WozifError::Embedding(format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    data.len()
                )));
            }
            data.sort_by_key(|d| d.index);
            Ok(data.into_iter().map(|d| d.embedding).collect())
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// Cache key for an embedding: SHA-256 of model and text, hex encoded.
pub fn content_hash(model: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &a);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_mismatched_or_empty() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_content_hash_depends_on_model_and_text() {
        let a = content_hash("m1", "Bonjour");
        assert_eq!(a.len(), 64);
        assert_eq!(a, content_hash("m1", "Bonjour"));
        assert_ne!(a, content_hash("m2", "Bonjour"));
        assert_ne!(a, content_hash("m1", "Bonsoir"));
    }

    #[test]
    fn test_create_embedder_uses_model_key() {
        let mut config: AppConfig = toml::from_str("[model]\napi_key = \"sk-x\"\n").unwrap();
        config.embedding.base_url = Some("http://localhost:11434/v1/".into());
        let embedder = create_embedder(&config);
        assert_eq!(embedder.base_url, "http://localhost:11434/v1");
        assert_eq!(embedder.api_key.as_deref(), Some("sk-x"));
        assert_eq!(embedder.model(), "text-embedding-3-small");
    }
}
