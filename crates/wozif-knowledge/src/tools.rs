//! Client for remote tool endpoints.
//!
//! An endpoint advertises its tools with `GET {endpoint}/tools` returning
//! `{"tools": [{name, description, inputSchema}]}` and runs one with
//! `POST {endpoint}/call` taking `{name, arguments}` and returning
//! `{"result": ...}`.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use wozif_core::error::{Result, WozifError};
use wozif_core::prompt;
use wozif_core::types::ToolDefinition;

/// Marker a model writes when it wants a tool to run.
pub const TOOL_CALL_MARKER: &str = "TOOL_CALL:";

#[derive(Deserialize)]
struct ToolList {
    #[serde(default)]
    tools: Vec<ToolDefinition>,
}

#[derive(Deserialize)]
struct CallResponse {
    #[serde(default)]
    result: Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

pub struct ToolEndpointClient {
    http: reqwest::Client,
    call_timeout: Duration,
}

impl ToolEndpointClient {
    pub fn new(call_timeout_secs: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            call_timeout: Duration::from_secs(call_timeout_secs),
        }
    }

    /// List the tools of one endpoint.
    pub async fn list_tools(&self, endpoint: &str) -> Result<Vec<ToolDefinition>> {
        let endpoint = endpoint.trim_end_matches('/');
        let fail = |message: String| WozifError::ToolEndpoint {
            endpoint: endpoint.to_string(),
            message,
        };

        let resp = self
            .http
            .get(format!("{}/tools", endpoint))
            .timeout(self.call_timeout)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(fail(format!("HTTP {}", resp.status().as_u16())));
        }
        let list: ToolList = resp.json().await.map_err(|e| fail(e.to_string()))?;
        debug!(endpoint, tools = list.tools.len(), "Listed remote tools");
        Ok(list.tools)
    }

    /// Invoke a tool. Failures come back as a readable message in place of
    /// the result so the model can still answer.
    pub async fn call_tool(&self, endpoint: &str, name: &str, arguments: &Value) -> Value {
        let endpoint = endpoint.trim_end_matches('/');
        let resp = self
            .http
            .post(format!("{}/call", endpoint))
            .timeout(self.call_timeout)
            .json(&json!({ "name": name, "arguments": arguments }))
            .send()
            .await;

        match resp {
            Ok(resp) if resp.status().is_success() => match resp.json::<CallResponse>().await {
                Ok(body) => body.result,
                Err(e) => {
                    warn!(endpoint, tool = name, error = %e, "Malformed tool response");
                    Value::String(format!("Erreur lors de l'appel à l'outil {}: {}", name, e))
                }
            },
            Ok(resp) => {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                Value::String(format!("Erreur outil ({}): {}", status, body))
            }
            Err(e) => {
                warn!(endpoint, tool = name, error = %e, "Tool call failed");
                Value::String(format!("Erreur lors de l'appel à l'outil {}: {}", name, e))
            }
        }
    }
}

/// Find a tool call in a model reply.
///
/// `None` when the reply has no marker; `Some(Err)` when the marker is
/// followed by something that is not a valid call.
pub fn parse_tool_call(reply: &str) -> Option<Result<ToolCall>> {
    let (_, rest) = reply.split_once(TOOL_CALL_MARKER)?;
    let json = prompt::extract_json(rest);
    Some(serde_json::from_str::<ToolCall>(json).map_err(|e| WozifError::LlmParse(e.to_string())))
}
