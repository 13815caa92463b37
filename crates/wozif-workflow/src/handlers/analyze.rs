use serde_json::{json, Map, Value};
use tracing::warn;

use wozif_core::error::{Result, WozifError};
use wozif_core::prompt::vars;
use wozif_core::traits::TextGenerator;
use wozif_core::types::{keys, ExecutionContext, NodeId, NodeResult};

use crate::prompts;
use crate::spec::{AnalyzeConfig, SentimentConfig};

const ANALYZE_DELAY_MS: u64 = 1000;
const SENTIMENT_DELAY_MS: u64 = 800;
const FALLBACK_INTENT: &str = "autre";

/// Display form of an analysis field for result messages.
fn shown(analysis: &Map<String, Value>, key: &str, missing: &str) -> String {
    match analysis.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => missing.to_string(),
        Some(other) => other.to_string(),
    }
}

fn failed(id: NodeId, what: &str, e: WozifError) -> NodeResult {
    warn!(node_id = %id, error = %e, "{} failed", what);
    NodeResult::failure(id, e.to_string()).with_wait_delay(0)
}

fn into_object(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(WozifError::LlmParse(format!("not a JSON object: {}", other))),
    }
}

/// Classify the latest user message. The whole analysis is merged into
/// the context, and `intent` plus its alias `type` are always set.
pub async fn gpt_analyze(
    id: NodeId,
    config: &AnalyzeConfig,
    generator: &dyn TextGenerator,
    context: &mut ExecutionContext,
) -> NodeResult {
    let prompt_vars = vars([
        ("message", context.last_user_message()),
        (
            "custom_instructions",
            prompts::extra_instructions(&config.ai_instructions),
        ),
        ("intent_options", config.intent_options()),
    ]);

    let analysis = match generator
        .generate_json(prompts::ANALYZE, &prompt_vars)
        .await
        .and_then(into_object)
    {
        Ok(analysis) => analysis,
        Err(e) => return failed(id, "Message analysis", e),
    };

    context.merge(&analysis);
    let intent = match analysis.get(keys::INTENT) {
        Some(Value::Null) | None => Value::String(FALLBACK_INTENT.to_string()),
        Some(v) => v.clone(),
    };
    context.set(keys::INTENT, intent.clone());
    context.set(keys::INTENT_ALIAS, intent);

    let message = format!(
        "Intent: {} | Sentiment: {} | Urgence: {}/5",
        shown(&analysis, "intent", FALLBACK_INTENT),
        shown(&analysis, "sentiment", "inconnu"),
        shown(&analysis, "urgency", "?"),
    );
    NodeResult::success(id, message)
        .with_data(analysis)
        .with_wait_delay(ANALYZE_DELAY_MS)
}

/// Score the sentiment of the latest user message and flag it as negative
/// when the score falls strictly below the node's threshold.
pub async fn sentiment(
    id: NodeId,
    config: &SentimentConfig,
    generator: &dyn TextGenerator,
    context: &mut ExecutionContext,
) -> NodeResult {
    let prompt_vars = vars([("message", context.last_user_message())]);

    let analysis = match generator
        .generate_json(prompts::SENTIMENT, &prompt_vars)
        .await
        .and_then(into_object)
    {
        Ok(analysis) => analysis,
        Err(e) => return failed(id, "Sentiment analysis", e),
    };

    let field = |key: &str, default: Value| match analysis.get(key) {
        Some(Value::Null) | None => default,
        Some(v) => v.clone(),
    };
    context.set("sentiment", field("sentiment", json!("neutre")));
    context.set(
        "sentiment_score",
        analysis.get("sentiment_score").cloned().unwrap_or(json!(0)),
    );
    context.set("emotions", field("emotions", json!([])));
    context.set("tone", field("tone", json!("neutre")));
    context.set("urgency", field("urgency", json!(3)));

    // The fields above stay in the context even when the score is unusable.
    let score = match analysis.get("sentiment_score") {
        Some(v) => match v.as_f64() {
            Some(score) => score,
            None => {
                let e = WozifError::LlmParse(format!("sentiment_score is not a number: {}", v));
                return failed(id, "Sentiment analysis", e);
            }
        },
        None => {
            context.set(keys::IS_NEGATIVE_SENTIMENT, json!(0.0 < config.threshold));
            let e = WozifError::LlmParse("sentiment_score missing from reply".into());
            return failed(id, "Sentiment analysis", e);
        }
    };
    context.set(keys::IS_NEGATIVE_SENTIMENT, json!(score < config.threshold));

    let emoji = if score > 0.0 {
        "😊"
    } else if score == 0.0 {
        "😐"
    } else {
        "😔"
    };
    let message = format!(
        "{} Sentiment: {} (score: {:.2})",
        emoji,
        shown(&analysis, "sentiment", "neutre"),
        score
    );
    NodeResult::success(id, message)
        .with_data(analysis)
        .with_wait_delay(SENTIMENT_DELAY_MS)
}
