use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

use crate::error::{ProviderError, ToolRunnerError};

pub mod anthropic;
pub mod gemini;
pub mod responses;

mod registry;
pub use registry::{register_provider, resolve_provider, ProviderRegistry};

/// Closed tagged union of supported backends: a fixed enum plus a
/// single-method interface, not an open string-keyed registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Responses,
    Anthropic,
    Gemini,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Responses => "responses",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }
}

/// A single tool definition as surfaced to the model, independent of backend
/// wire shape.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
    pub strict: Option<bool>,
}

/// One model-initiated request to execute a named function.
#[derive(Debug, Clone)]
pub struct ToolUseCall {
    pub id: String,
    pub name: String,
    pub args: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Ok,
    Error,
}

/// One entry in a case's tool trace.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallTrace {
    pub id: String,
    pub name: String,
    pub args: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub latency_ms: u64,
    pub status: ToolCallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Invoked by a provider adapter's tool-calling loop once per model-requested
/// tool call; bound by the orchestrator to `ToolRunner::execute`. A trait
/// object rather than a closure so it can cross the `async_trait` boundary of
/// `ProviderAdapter::invoke_with_tools`.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, call: &ToolUseCall) -> Result<Value, ToolRunnerError>;
}

/// Cooperative cancellation signal for an in-flight provider request. A
/// caller holds the paired `watch::Sender` and flips it to `true` to ask the
/// adapter to abandon its current or next HTTP call.
pub type CancelSignal = watch::Receiver<bool>;

/// What an adapter is given to drive one case's tool-calling loop.
pub struct ProviderRequest {
    pub model: String,
    pub prompt: String,
    pub input: Value,
    pub tools: Vec<ToolSpec>,
    pub max_tool_calls: usize,
    pub invoke_tool: Arc<dyn ToolInvoker>,
    /// Backend-O-only: forwarded verbatim as `tool_choice` when present.
    pub tool_choice: Option<Value>,
    /// Backend-O-only: forwarded verbatim as `parallel_tool_calls` when present.
    pub parallel_tool_calls: Option<bool>,
    /// Checked before and raced against each HTTP call; a flip to `true`
    /// surfaces as `ProviderError::Cancelled`.
    pub cancel: Option<CancelSignal>,
}

/// What one case's tool-calling loop produces once no further tool calls are
/// requested.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub final_output: Value,
    pub usage: Option<Value>,
    pub raw_response: Value,
    pub tool_trace: Vec<ToolCallTrace>,
}

/// Per-backend tool-calling state machine. Each adapter owns its own wire
/// request/response shapes; nothing untyped crosses the HTTP boundary except
/// the final `serde_json::Value` handed back to the orchestrator.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn id(&self) -> ProviderId;

    async fn invoke_with_tools(&self, req: ProviderRequest) -> Result<ProviderResponse, ProviderError>;
}

/// Parses a model's raw textual output: JSON if parseable, else the trimmed
/// string, else an empty string.
pub(crate) fn parse_maybe_json(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::String(String::new());
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

/// Truncates an HTTP error body to a fixed head length for inclusion in a
/// `ProviderError::RequestFailed`/`InvalidJson` message.
pub(crate) fn body_head(body: &str, max_chars: usize) -> String {
    body.chars().take(max_chars).collect()
}

/// Races one HTTP call against an optional cancellation signal, returning
/// `ProviderError::Cancelled` as soon as the signal is (or becomes) `true`
/// instead of waiting out the request.
pub(crate) async fn send_cancelable<T>(
    request: impl Future<Output = Result<T, reqwest::Error>>,
    cancel: Option<&mut CancelSignal>,
) -> Result<T, ProviderError> {
    match cancel {
        Some(signal) if *signal.borrow() => Err(ProviderError::Cancelled),
        Some(signal) => {
            tokio::select! {
                result = request => result.map_err(ProviderError::Http),
                _ = signal.changed() => Err(ProviderError::Cancelled),
            }
        }
        None => request.await.map_err(ProviderError::Http),
    }
}

/// Sequentially executes the tool calls a provider turn requested, enforcing
/// `maxToolCalls` and recording one `ToolCallTrace` per call before
/// propagating the first failure. `traces` accumulates in call order so a
/// caller can surface whatever ran before a failure if it chooses to.
pub(crate) async fn run_tool_calls(
    calls: Vec<ToolUseCall>,
    tool_calls_used: &mut usize,
    max_tool_calls: usize,
    invoke_tool: &Arc<dyn ToolInvoker>,
    traces: &mut Vec<ToolCallTrace>,
) -> Result<Vec<(ToolUseCall, Value)>, ProviderError> {
    if *tool_calls_used + calls.len() > max_tool_calls {
        return Err(ProviderError::MaxToolCallsExceeded(max_tool_calls));
    }

    let mut resolved = Vec::with_capacity(calls.len());
    for call in calls {
        *tool_calls_used += 1;
        let started = Instant::now();
        match invoke_tool.invoke(&call).await {
            Ok(result) => {
                traces.push(ToolCallTrace {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    args: call.args.clone(),
                    result: Some(result.clone()),
                    latency_ms: started.elapsed().as_millis() as u64,
                    status: ToolCallStatus::Ok,
                    error_code: None,
                    error_message: None,
                });
                resolved.push((call, result));
            }
            Err(err) => {
                traces.push(ToolCallTrace {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    args: call.args.clone(),
                    result: None,
                    latency_ms: started.elapsed().as_millis() as u64,
                    status: ToolCallStatus::Error,
                    error_code: Some(err.code().to_string()),
                    error_message: Some(err.to_string()),
                });
                return Err(err.into());
            }
        }
    }
    Ok(resolved)
}
