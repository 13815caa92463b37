use serde_json::Value;
use tracing::debug;

use wozif_core::error::Result;
use wozif_core::traits::KnowledgeRetriever;
use wozif_core::types::{keys, ExecutionContext, NodeId, NodeResult, SourceRequest};

use crate::spec::AiAgentConfig;

/// Answer the latest user message from the node's URLs, files and tool
/// endpoints. Service errors propagate.
pub async fn ai_agent(
    id: NodeId,
    config: &AiAgentConfig,
    knowledge: &dyn KnowledgeRetriever,
    context: &mut ExecutionContext,
) -> Result<NodeResult> {
    let question = context.last_user_message();
    let sources = &config.data_sources;
    let request = SourceRequest {
        instructions: config.instructions.clone(),
        urls: sources.urls.clone(),
        files: sources.files.clone(),
        tool_endpoints: sources.mcp_providers.clone(),
    };
    debug!(
        urls = request.urls.len(),
        files = request.files.len(),
        tool_endpoints = request.tool_endpoints.len(),
        "Answering with sources"
    );

    let answer = knowledge.answer_with_sources(&question, &request).await?;
    context.set_str(keys::AI_ANSWER, answer.clone());

    Ok(NodeResult::success(
        id,
        format!("Agent IA a répondu en utilisant {} URLs.", request.urls.len()),
    )
    .with_field("answer", Value::String(answer)))
}
