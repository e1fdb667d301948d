use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::time::Duration;

use crate::error::ProviderError;
use crate::providers::{
    body_head, parse_maybe_json, run_tool_calls, send_cancelable, ProviderAdapter, ProviderId,
    ProviderRequest, ProviderResponse, ToolCallTrace, ToolSpec, ToolUseCall,
};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2048;

/// Second backend: a list of role-tagged messages, tool results surfaced as a
/// single `user` message carrying `tool_result` blocks.
pub struct AnthropicAdapter {
    client: Client,
    base_url: String,
}

impl AnthropicAdapter {
    pub fn from_env_lazy() -> Self {
        let base_url = env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("reqwest client builder should not fail with no custom TLS config");
        Self { client, base_url }
    }

    fn endpoint(&self) -> String {
        format!("{}/messages", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    input_schema: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl From<&ToolSpec> for AnthropicTool {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            name: spec.name.clone(),
            input_schema: spec.input_schema.clone(),
            description: spec.description.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequestBody {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponseBody {
    #[serde(default)]
    content: Vec<Value>,
    #[serde(default)]
    usage: Option<Value>,
}

fn extract_tool_uses(content: &[Value]) -> Vec<ToolUseCall> {
    content
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("tool_use"))
        .filter_map(|block| {
            let id = block.get("id").and_then(Value::as_str)?;
            let name = block.get("name").and_then(Value::as_str)?;
            let args = block.get("input").cloned().unwrap_or(Value::Null);
            Some(ToolUseCall {
                id: id.to_string(),
                name: name.to_string(),
                args,
            })
        })
        .collect()
}

fn extract_text(content: &[Value]) -> String {
    content
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str).map(str::to_string))
        .collect::<Vec<_>>()
        .join("")
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    async fn invoke_with_tools(&self, req: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let api_key = env::var("ANTHROPIC_API_KEY").map_err(|_| ProviderError::MissingApiKey {
            provider: "Anthropic",
            var: "ANTHROPIC_API_KEY",
        })?;

        let input_text = match &req.input {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        let mut messages: Vec<Value> = vec![serde_json::json!({
            "role": "user",
            "content": input_text,
        })];

        let tools: Vec<AnthropicTool> = req.tools.iter().map(AnthropicTool::from).collect();
        let mut tool_calls_used = 0usize;
        let mut traces: Vec<ToolCallTrace> = Vec::new();
        let mut cancel = req.cancel;

        loop {
            let body = AnthropicRequestBody {
                model: req.model.clone(),
                max_tokens: MAX_TOKENS,
                system: req.prompt.clone(),
                messages: messages.clone(),
                tools: tools.clone(),
            };

            let response = send_cancelable(
                self.client
                    .post(self.endpoint())
                    .header("x-api-key", &api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&body)
                    .send(),
                cancel.as_mut(),
            )
            .await?;
            let status = response.status();
            let text = response.text().await?;

            if !status.is_success() {
                return Err(ProviderError::RequestFailed {
                    status: status.as_u16(),
                    body: body_head(&text, 400),
                });
            }

            let parsed: AnthropicResponseBody =
                serde_json::from_str(&text).map_err(|_| ProviderError::InvalidJson(body_head(&text, 400)))?;

            let calls = extract_tool_uses(&parsed.content);
            messages.push(serde_json::json!({
                "role": "assistant",
                "content": parsed.content,
            }));

            if calls.is_empty() {
                let final_text = extract_text(&parsed.content);
                return Ok(ProviderResponse {
                    final_output: parse_maybe_json(&final_text),
                    usage: parsed.usage,
                    raw_response: serde_json::from_str(&text).unwrap_or(Value::Null),
                    tool_trace: traces,
                });
            }

            let resolved = run_tool_calls(
                calls,
                &mut tool_calls_used,
                req.max_tool_calls,
                &req.invoke_tool,
                &mut traces,
            )
            .await?;

            let tool_result_blocks: Vec<Value> = resolved
                .into_iter()
                .map(|(call, result)| {
                    let content = match result {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    serde_json::json!({
                        "type": "tool_result",
                        "tool_use_id": call.id,
                        "content": content,
                    })
                })
                .collect();

            messages.push(serde_json::json!({
                "role": "user",
                "content": tool_result_blocks,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tool_uses_from_content_blocks() {
        let content = vec![serde_json::json!({
            "type": "tool_use",
            "id": "toolu_1",
            "name": "lookup",
            "input": {"q": "x"},
        })];
        let calls = extract_tool_uses(&content);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "toolu_1");
    }

    #[test]
    fn extracts_and_joins_text_blocks() {
        let content = vec![
            serde_json::json!({"type": "text", "text": "hello "}),
            serde_json::json!({"type": "text", "text": "world"}),
        ];
        assert_eq!(extract_text(&content), "hello world");
    }
}
