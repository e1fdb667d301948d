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

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Third backend: a list of `{role, parts}` turns, function calls/responses
/// surfaced as paired `model`/`user` turns.
pub struct GeminiAdapter {
    client: Client,
    base_url: String,
}

impl GeminiAdapter {
    pub fn from_env_lazy() -> Self {
        let base_url = env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("reqwest client builder should not fail with no custom TLS config");
        Self { client, base_url }
    }

    fn endpoint(&self, model: &str, api_key: &str) -> String {
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        format!(
            "{}/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            model_path,
            api_key
        )
    }
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    parameters: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl From<&ToolSpec> for FunctionDeclaration {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            name: spec.name.clone(),
            parameters: spec.input_schema.clone(),
            description: spec.description.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiToolsWrapper {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct GeminiRequestBody {
    system_instruction: Value,
    contents: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiToolsWrapper>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseBody {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata", default)]
    usage_metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<Value>,
}

fn extract_function_calls(parts: &[Value]) -> Vec<ToolUseCall> {
    parts
        .iter()
        .filter_map(|part| part.get("functionCall"))
        .filter_map(|call| {
            let name = call.get("name").and_then(Value::as_str)?;
            let id = call
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| name.to_string());
            let args = call.get("args").cloned().unwrap_or(Value::Null);
            Some(ToolUseCall { id, name: name.to_string(), args })
        })
        .collect()
}

fn extract_text(parts: &[Value]) -> String {
    parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("")
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    async fn invoke_with_tools(&self, req: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let api_key = env::var("GEMINI_API_KEY")
            .or_else(|_| env::var("GOOGLE_API_KEY"))
            .map_err(|_| ProviderError::MissingApiKey {
                provider: "Gemini",
                var: "GEMINI_API_KEY",
            })?;

        let input_text = match &req.input {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        let mut contents: Vec<Value> = vec![serde_json::json!({
            "role": "user",
            "parts": [{"text": input_text}],
        })];

        let tools = if req.tools.is_empty() {
            Vec::new()
        } else {
            vec![GeminiToolsWrapper {
                function_declarations: req.tools.iter().map(FunctionDeclaration::from).collect(),
            }]
        };

        let mut tool_calls_used = 0usize;
        let mut traces: Vec<ToolCallTrace> = Vec::new();
        let mut cancel = req.cancel;

        loop {
            let body = GeminiRequestBody {
                system_instruction: serde_json::json!({"parts": [{"text": req.prompt.clone()}]}),
                contents: contents.clone(),
                tools: tools.clone(),
            };

            let response = send_cancelable(
                self.client.post(self.endpoint(&req.model, &api_key)).json(&body).send(),
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

            let parsed: GeminiResponseBody =
                serde_json::from_str(&text).map_err(|_| ProviderError::InvalidJson(body_head(&text, 400)))?;

            let parts = parsed
                .candidates
                .first()
                .and_then(|c| c.content.as_ref())
                .map(|c| c.parts.clone())
                .unwrap_or_default();

            let calls = extract_function_calls(&parts);

            if calls.is_empty() {
                let final_text = extract_text(&parts);
                return Ok(ProviderResponse {
                    final_output: parse_maybe_json(&final_text),
                    usage: parsed.usage_metadata,
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
                contents.push(serde_json::json!({
                    "role": "model",
                    "parts": [{"functionCall": {"id": call.id, "name": call.name, "args": call.args}}],
                }));
                contents.push(serde_json::json!({
                    "role": "user",
                    "parts": [{"functionResponse": {"name": call.name, "response": {"result": result}}}],
                }));
            }
        }
    }
}
