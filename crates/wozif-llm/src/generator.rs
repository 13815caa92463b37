use futures::future::BoxFuture;
use futures::StreamExt;
use serde_json::Value;
use tracing::debug;

use wozif_core::config::{AppConfig, ModelConfig};
use wozif_core::error::{Result, WozifError};
use wozif_core::prompt::{self, PromptVars};
use wozif_core::traits::{LlmClient, TextGenerator};
use wozif_core::types::*;

use crate::openai::OpenAiClient;
use crate::retry::RetryPolicy;

struct Model {
    config: ModelConfig,
    client: Box<dyn LlmClient>,
}

impl Model {
    /// Send `messages` and concatenate every text delta of the reply.
    async fn collect(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let mut stream = self.client.chat_stream(&self.config, messages).await?;
        let mut text = String::new();

        while let Some(delta) = stream.next().await {
            match delta? {
                StreamDelta::TextDelta(chunk) => text.push_str(&chunk),
                StreamDelta::Usage {
                    input_tokens,
                    output_tokens,
                } => debug!(input_tokens, output_tokens, "LLM usage"),
                StreamDelta::Stop(StopReason::MaxTokens) => {
                    debug!(model = %self.config.model_id, "LLM reply truncated at max_tokens");
                }
                StreamDelta::Stop(StopReason::EndTurn) => {}
            }
        }
        Ok(text)
    }
}

/// `TextGenerator` over streaming chat clients: renders the template into
/// a single user message and collects the streamed reply. Failed
/// generations go through the retry policy, then the fallback models.
pub struct ChatGenerator {
    models: Vec<Model>,
    policy: RetryPolicy,
}

impl ChatGenerator {
    pub fn new(client: Box<dyn LlmClient>, config: ModelConfig) -> Self {
        Self {
            models: vec![Model { config, client }],
            policy: RetryPolicy::once(),
        }
    }

    /// Generator for the configured model and its fallbacks, all served
    /// by OpenAI-compatible clients.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut generator = Self::new(Box::new(OpenAiClient::new()), config.model.clone());
        if let Some(retry) = &config.model.retry {
            generator = generator.with_retry(RetryPolicy::new(retry.clone()));
        }
        for fallback in &config.fallback_models {
            generator = generator.with_fallback(Box::new(OpenAiClient::new()), fallback.clone());
        }
        generator
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Add a model tried once the ones before it are exhausted.
    pub fn with_fallback(mut self, client: Box<dyn LlmClient>, config: ModelConfig) -> Self {
        self.models.push(Model { config, client });
        self
    }

    pub async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        self.policy
            .run(&self.models, |model| model.collect(messages.clone()))
            .await
    }

    /// Like `complete`, but an attempt only succeeds once the reply parses
    /// to a JSON object.
    pub async fn complete_json(&self, messages: Vec<ChatMessage>) -> Result<Value> {
        self.policy
            .run(&self.models, |model| {
                let messages = messages.clone();
                async move { parse_json_object(&model.collect(messages).await?) }
            })
            .await
    }
}

impl TextGenerator for ChatGenerator {
    fn generate<'a>(
        &'a self,
        template: &'a str,
        vars: &'a PromptVars,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let rendered = prompt::render(template, vars);
            self.complete(vec![ChatMessage::user(rendered)]).await
        })
    }

    fn generate_json<'a>(
        &'a self,
        template: &'a str,
        vars: &'a PromptVars,
    ) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            let rendered = prompt::render(template, vars);
            self.complete_json(vec![ChatMessage::user(rendered)]).await
        })
    }
}

/// Parse the JSON object embedded in a model reply.
pub fn parse_json_object(text: &str) -> Result<Value> {
    let json = prompt::extract_json(text);
    let value: Value = serde_json::from_str(json)
        .map_err(|e| WozifError::LlmParse(format!("{}: {}", e, prompt::truncate_chars(text, 200))))?;
    if !value.is_object() {
        return Err(WozifError::LlmParse(format!(
            "expected a JSON object, got: {}",
            prompt::truncate_chars(text, 200)
        )));
    }
    Ok(value)
}
