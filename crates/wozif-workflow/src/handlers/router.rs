use serde_json::{json, Value};

use wozif_core::types::{keys, ExecutionContext, NodeId, NodeResult};

use crate::spec::SwitchRouterConfig;

/// String form used for case comparison: strings as-is, null as `none`,
/// anything else as compact JSON.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "none".to_string(),
        other => other.to_string(),
    }
}

/// Pick the first case whose value equals the routed field,
/// case-insensitively. Falls back to `lastUserMessage` when the field is
/// absent from the context.
pub fn switch_router(id: NodeId, config: &SwitchRouterConfig, context: &ExecutionContext) -> NodeResult {
    let test_value = context
        .get(&config.field)
        .or_else(|| context.get(keys::LAST_USER_MESSAGE))
        .map(stringify)
        .unwrap_or_default()
        .to_lowercase();

    let matched = config
        .cases
        .iter()
        .position(|case| stringify(&case.value).to_lowercase() == test_value);

    let message = match matched {
        Some(i) => format!("Switch: Match branch {}", i),
        None => "Switch: Default branch".to_string(),
    };
    let index = matched.map(|i| i as i64).unwrap_or(-1);

    NodeResult::success(id, message)
        .with_field("matchedIndex", json!(index))
        .with_field("isDefault", json!(matched.is_none()))
}
