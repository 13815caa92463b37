use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::prompt::PromptVars;
use crate::types::*;

/// LLM client: streaming chat completion.
pub trait LlmClient: Send + Sync + 'static {
    /// Send a chat request and receive a stream of deltas.
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>>;
}

/// Text Generation Service used by the analysis nodes.
pub trait TextGenerator: Send + Sync + 'static {
    /// Render `template` with `vars` and return the model's full text reply.
    fn generate<'a>(&'a self, template: &'a str, vars: &'a PromptVars)
        -> BoxFuture<'a, Result<String>>;

    /// Like `generate`, but the reply must contain a JSON object.
    fn generate_json<'a>(
        &'a self,
        template: &'a str,
        vars: &'a PromptVars,
    ) -> BoxFuture<'a, Result<Value>>;
}

/// Knowledge Retrieval Service used by `ai_agent` and `rag_knowledge`.
pub trait KnowledgeRetriever: Send + Sync + 'static {
    /// Answer from the static knowledge index.
    fn answer<'a>(&'a self, question: &'a str) -> BoxFuture<'a, Result<String>>;

    /// Answer from ad-hoc URLs, files and remote tools.
    fn answer_with_sources<'a>(
        &'a self,
        question: &'a str,
        request: &'a SourceRequest,
    ) -> BoxFuture<'a, Result<String>>;

    /// Answer from caller-supplied knowledge text.
    fn answer_with_custom_knowledge<'a>(
        &'a self,
        question: &'a str,
        content: &'a str,
    ) -> BoxFuture<'a, Result<String>>;
}

/// What a sandboxed script run hands back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptOutcome {
    /// The context as the script left it, including mutations made before
    /// a failure.
    pub context: serde_json::Map<String, Value>,
    /// Entries the script put into `results`.
    pub results: serde_json::Map<String, Value>,
    /// Script error message, if the script raised or hit a limit.
    pub error: Option<String>,
}

/// Isolated executor for `python_script` nodes.
pub trait ScriptSandbox: Send + Sync + 'static {
    /// Run `script` against a copy of `context`. `Err` means the sandbox
    /// itself could not run the script.
    fn run<'a>(
        &'a self,
        script: &'a str,
        context: &'a serde_json::Map<String, Value>,
    ) -> BoxFuture<'a, Result<ScriptOutcome>>;
}
