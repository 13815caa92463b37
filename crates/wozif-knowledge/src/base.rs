use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use wozif_core::config::{AppConfig, KnowledgeConfig};
use wozif_core::error::Result;
use wozif_core::prompt::{self, vars};
use wozif_core::traits::{KnowledgeRetriever, TextGenerator};
use wozif_core::types::{SourceRequest, ToolDefinition};

use crate::embeddings::{create_embedder, EmbeddingProvider};
use crate::index::{split_paragraphs, VectorIndex};
use crate::prompts;
use crate::sources::SourceLoader;
use crate::store::EmbeddingCache;
use crate::tools::{parse_tool_call, ToolEndpointClient};

/// The shared knowledge retrieval service.
///
/// Built once at startup and shared behind an `Arc`. Queries take the
/// index read lock; `reload` swaps the index under the write lock.
pub struct KnowledgeBase {
    generator: Arc<dyn TextGenerator>,
    embedder: Arc<dyn EmbeddingProvider>,
    cache: Option<EmbeddingCache>,
    loader: SourceLoader,
    tools: ToolEndpointClient,
    config: KnowledgeConfig,
    index: RwLock<Option<VectorIndex>>,
}

impl KnowledgeBase {
    /// Assemble a knowledge base from its parts. The static index is empty
    /// until `reload` runs.
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        embedder: Arc<dyn EmbeddingProvider>,
        cache: Option<EmbeddingCache>,
        config: KnowledgeConfig,
    ) -> Self {
        Self {
            generator,
            embedder,
            loader: SourceLoader::new(config.fetch_timeout_secs),
            tools: ToolEndpointClient::new(config.tool_timeout_secs),
            cache,
            config,
            index: RwLock::new(None),
        }
    }

    /// Build the service from configuration and index the knowledge file.
    pub async fn build(config: &AppConfig, generator: Arc<dyn TextGenerator>) -> Result<Self> {
        let cache_path = config.knowledge.cache_db_path();
        let cache = match EmbeddingCache::open(&cache_path) {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(path = %cache_path.display(), error = %e, "Embedding cache unavailable");
                None
            }
        };
        let kb = Self::new(
            generator,
            Arc::new(create_embedder(config)),
            cache,
            config.knowledge.clone(),
        );
        kb.reload().await?;
        Ok(kb)
    }

    /// Rebuild the static index from the knowledge file.
    ///
    /// A missing file leaves the service "not ready". Returns the number of
    /// indexed chunks.
    pub async fn reload(&self) -> Result<usize> {
        let path = Path::new(&self.config.knowledge_file);
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Knowledge file not found");
                *self.index.write().await = None;
                return Ok(0);
            }
        };

        let index = VectorIndex::build(
            split_paragraphs(&content),
            self.embedder.as_ref(),
            self.cache.as_ref(),
        )
        .await?;
        let chunks = index.len();

        *self.index.write().await = Some(index);
        info!(path = %path.display(), chunks, "Knowledge base indexed");
        Ok(chunks)
    }

    /// Whether the static index is available.
    pub async fn is_ready(&self) -> bool {
        self.index.read().await.is_some()
    }

    /// Release the embedding cache.
    pub fn close(&self) -> Result<()> {
        match &self.cache {
            Some(cache) => cache.close(),
            None => Ok(()),
        }
    }

    async fn answer_from_index(&self, question: &str) -> Result<String> {
        let chunks = {
            let guard = self.index.read().await;
            let Some(index) = guard.as_ref() else {
                return Ok(prompts::NOT_READY_ANSWER.to_string());
            };
            index
                .retrieve(question, self.embedder.as_ref(), self.config.top_k)
                .await?
        };

        let v = vars([
            ("context", chunks.join("\n\n")),
            ("question", question.to_string()),
        ]);
        self.generator.generate(prompts::KNOWLEDGE_ANSWER, &v).await
    }

    async fn answer_from_custom(&self, question: &str, content: &str) -> Result<String> {
        if content.is_empty() {
            return self.answer_from_index(question).await;
        }

        if content.chars().count() < self.config.inline_threshold_chars {
            let v = vars([("context", content), ("question", question)]);
            return self.generator.generate(prompts::INLINE_KNOWLEDGE, &v).await;
        }

        // Large content gets a throwaway index for this request
        let index = VectorIndex::build(
            split_paragraphs(content),
            self.embedder.as_ref(),
            self.cache.as_ref(),
        )
        .await?;
        let chunks = index
            .retrieve(question, self.embedder.as_ref(), self.config.custom_top_k)
            .await?;
        debug!(chunks = chunks.len(), "Retrieved from custom knowledge");

        let v = vars([
            ("context", chunks.join("\n\n")),
            ("question", question.to_string()),
        ]);
        self.generator.generate(prompts::RETRIEVED_KNOWLEDGE, &v).await
    }

    /// Gather URL and file contents. Unloadable sources are skipped.
    async fn gather_sources(&self, request: &SourceRequest) -> String {
        let mut sources = String::new();

        if !request.urls.is_empty() {
            let mut pages = Vec::new();
            for url in &request.urls {
                match self.loader.load_url(url).await {
                    Ok(text) => pages.push(text),
                    Err(e) => warn!(error = %e, "Skipping source URL"),
                }
            }
            if !pages.is_empty() {
                sources.push_str("\n\n--- DONNÉES WEB ---\n");
                sources.push_str(&pages.join("\n\n"));
            }
        }

        for file in &request.files {
            let path = Path::new(file);
            if file.is_empty() || !path.exists() {
                continue;
            }
            match self.loader.load_file(path).await {
                Ok(text) => {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| file.clone());
                    sources.push_str(&format!("\n\n--- DOCUMENT: {} ---\n", name));
                    sources.push_str(&text);
                }
                Err(e) => warn!(error = %e, "Skipping source file"),
            }
        }

        sources
    }

    /// Tools advertised by the request's endpoints, keyed by name. A later
    /// endpoint wins on a name clash.
    async fn gather_tools(&self, request: &SourceRequest) -> BTreeMap<String, (String, ToolDefinition)> {
        let mut tools = BTreeMap::new();
        for endpoint in &request.tool_endpoints {
            match self.tools.list_tools(endpoint).await {
                Ok(list) => {
                    for tool in list {
                        tools.insert(tool.name.clone(), (endpoint.clone(), tool));
                    }
                }
                Err(e) => warn!(error = %e, "Skipping tool endpoint"),
            }
        }
        tools
    }

    async fn answer_from_sources(&self, question: &str, request: &SourceRequest) -> Result<String> {
        let sources = self.gather_sources(request).await;
        let tools = self.gather_tools(request).await;

        if tools.is_empty() {
            let v = vars([
                ("instructions", request.instructions.as_str()),
                ("sources", prompt::truncate_chars(&sources, self.config.max_source_chars)),
                ("question", question),
            ]);
            return self.generator.generate(prompts::SOURCES_ANSWER, &v).await;
        }

        let tools_info: String = tools
            .values()
            .map(|(_, t)| format!("- Outil: {} | Description: {}\n", t.name, t.description))
            .collect();
        let v = vars([
            ("instructions", request.instructions.as_str()),
            (
                "sources",
                prompt::truncate_chars(&sources, self.config.max_source_chars_with_tools),
            ),
            ("tools", tools_info.as_str()),
            ("question", question),
        ]);
        let reply = self.generator.generate(prompts::SOURCES_WITH_TOOLS, &v).await?;

        let call = match parse_tool_call(&reply) {
            None => return Ok(reply),
            Some(Ok(call)) => call,
            Some(Err(e)) => {
                warn!(error = %e, "Unusable tool call in model reply");
                return Ok(prompts::tool_failure_answer(&reply));
            }
        };

        let Some((endpoint, _)) = tools.get(&call.name) else {
            debug!(tool = %call.name, "Model asked for an unknown tool");
            return Ok(reply);
        };

        info!(tool = %call.name, endpoint = %endpoint, "Calling remote tool");
        let result = self.tools.call_tool(endpoint, &call.name, &call.arguments).await;
        let rendered = serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string());

        let v = vars([
            ("instructions", request.instructions.as_str()),
            ("tool", call.name.as_str()),
            ("result", rendered.as_str()),
            ("question", question),
        ]);
        self.generator.generate(prompts::TOOL_RESULT_ANSWER, &v).await
    }
}

impl KnowledgeRetriever for KnowledgeBase {
    fn answer<'a>(&'a self, question: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.answer_from_index(question))
    }

    fn answer_with_sources<'a>(
        &'a self,
        question: &'a str,
        request: &'a SourceRequest,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.answer_from_sources(question, request))
    }

    fn answer_with_custom_knowledge<'a>(
        &'a self,
        question: &'a str,
        content: &'a str,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.answer_from_custom(question, content))
    }
}
