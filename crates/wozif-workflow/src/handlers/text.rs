use serde_json::Value;

use wozif_core::prompt::truncate_chars;
use wozif_core::types::{ExecutionContext, NodeId, NodeResult};

use crate::spec::SendTextConfig;

/// Replace `{{key}}` with the context value of `key`. Only string values
/// are substituted; other placeholders stay as written.
pub fn interpolate(template: &str, context: &ExecutionContext) -> String {
    let mut text = template.to_string();
    for (key, value) in context.data() {
        if let Value::String(s) = value {
            text = text.replace(&format!("{{{{{}}}}}", key), s);
        }
    }
    text
}

pub fn send_text(id: NodeId, config: &SendTextConfig, context: &ExecutionContext) -> NodeResult {
    let text = interpolate(&config.text, context);
    NodeResult::success(id, format!("Message envoyé: {}...", truncate_chars(&text, 50)))
        .with_field("sent_text", Value::String(text))
}
