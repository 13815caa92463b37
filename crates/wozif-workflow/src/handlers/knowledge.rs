use serde_json::Value;

use wozif_core::error::Result;
use wozif_core::traits::KnowledgeRetriever;
use wozif_core::types::{keys, ExecutionContext, NodeId, NodeResult};

use crate::spec::RagKnowledgeConfig;

pub async fn rag_knowledge(
    id: NodeId,
    config: &RagKnowledgeConfig,
    knowledge: &dyn KnowledgeRetriever,
    context: &mut ExecutionContext,
) -> Result<NodeResult> {
    let question = context.last_user_message();
    let answer = match config.custom_content() {
        Some(content) => {
            knowledge
                .answer_with_custom_knowledge(&question, content)
                .await?
        }
        None => knowledge.answer(&question).await?,
    };
    context.set_str(keys::AI_ANSWER, answer.clone());

    Ok(NodeResult::success(
        id,
        format!(
            "Réponse générée via base de connaissances ({}).",
            config.knowledge_base_id
        ),
    )
    .with_field("answer", Value::String(answer)))
}
