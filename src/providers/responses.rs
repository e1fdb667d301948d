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

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// First backend: a running list of "input items", tool results surfaced as
/// `function_call_output` items.
pub struct ResponsesAdapter {
    client: Client,
    base_url: String,
}

impl ResponsesAdapter {
    pub fn from_env_lazy() -> Self {
        let base_url = env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("reqwest client builder should not fail with no custom TLS config");
        Self { client, base_url }
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct ResponsesTool {
    #[serde(rename = "type")]
    kind: &'static str,
    name: String,
    parameters: Value,
    strict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl From<&ToolSpec> for ResponsesTool {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            kind: "function",
            name: spec.name.clone(),
            parameters: spec.input_schema.clone(),
            strict: spec.strict.unwrap_or(true),
            description: spec.description.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ResponsesRequestBody {
    model: String,
    instructions: String,
    input: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ResponsesTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parallel_tool_calls: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ResponsesResponseBody {
    #[serde(default)]
    output: Vec<Value>,
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    usage: Option<Value>,
}

fn extract_function_calls(output: &[Value]) -> Vec<ToolUseCall> {
    output
        .iter()
        .filter(|item| item.get("type").and_then(Value::as_str) == Some("function_call"))
        .filter_map(|item| {
            let id = item.get("call_id").or_else(|| item.get("id")).and_then(Value::as_str)?;
            let name = item.get("name").and_then(Value::as_str)?;
            let args_raw = item.get("arguments").and_then(Value::as_str).unwrap_or("{}");
            let args = serde_json::from_str(args_raw).unwrap_or(Value::Null);
            Some(ToolUseCall {
                id: id.to_string(),
                name: name.to_string(),
                args,
            })
        })
        .collect()
}

fn extract_final_text(output: &[Value], output_text: &Option<String>) -> String {
    if let Some(text) = output_text {
        if !text.is_empty() {
            return text.clone();
        }
    }
    output
        .iter()
        .filter(|item| item.get("type").and_then(Value::as_str) == Some("message"))
        .flat_map(|item| item.get("content").and_then(Value::as_array).cloned().unwrap_or_default())
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str).map(str::to_string))
        .collect::<Vec<_>>()
        .join("")
}

#[async_trait]
impl ProviderAdapter for ResponsesAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Responses
    }

    async fn invoke_with_tools(&self, req: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| ProviderError::MissingApiKey {
            provider: "OpenAI",
            var: "OPENAI_API_KEY",
        })?;

        let input_text = match &req.input {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        let mut conversation: Vec<Value> = vec![serde_json::json!({
            "role": "user",
            "content": input_text,
        })];

        let tools: Vec<ResponsesTool> = req.tools.iter().map(ResponsesTool::from).collect();
        let mut tool_calls_used = 0usize;
        let mut traces: Vec<ToolCallTrace> = Vec::new();
        let mut cancel = req.cancel;

        loop {
            let body = ResponsesRequestBody {
                model: req.model.clone(),
                instructions: req.prompt.clone(),
                input: conversation.clone(),
                tools: tools.clone(),
                tool_choice: req.tool_choice.clone(),
                parallel_tool_calls: req.parallel_tool_calls,
            };

            let response = send_cancelable(
                self.client.post(self.endpoint()).bearer_auth(&api_key).json(&body).send(),
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

            let parsed: ResponsesResponseBody =
                serde_json::from_str(&text).map_err(|_| ProviderError::InvalidJson(body_head(&text, 400)))?;

            let calls = extract_function_calls(&parsed.output);
            for item in &parsed.output {
                conversation.push(item.clone());
            }

            if calls.is_empty() {
                let final_text = extract_final_text(&parsed.output, &parsed.output_text);
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

            for (call, result) in resolved {
                let output = match result {
                    Value::String(ref s) => s.clone(),
                    other => other.to_string(),
                };
                conversation.push(serde_json::json!({
                    "type": "function_call_output",
                    "call_id": call.id,
                    "output": output,
                }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_final_text_prefers_output_text() {
        let output = vec![];
        let text = extract_final_text(&output, &Some("hello".to_string()));
        assert_eq!(text, "hello");
    }

    #[test]
    fn extracts_function_calls_from_output_items() {
        let output = vec![serde_json::json!({
            "type": "function_call",
            "call_id": "call_1",
            "name": "lookup",
            "arguments": "{\"q\":\"x\"}",
        })];
        let calls = extract_function_calls(&output);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "lookup");
        assert_eq!(calls[0].args, serde_json::json!({"q": "x"}));
    }
}
