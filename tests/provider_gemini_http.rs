use async_trait::async_trait;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use harnwerk::providers::gemini::GeminiAdapter;
use harnwerk::{ProviderAdapter, ProviderRequest};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

static ENV_GUARD: Mutex<()> = Mutex::new(());

struct StubInvoker;

#[async_trait]
impl harnwerk::providers::ToolInvoker for StubInvoker {
    async fn invoke(&self, _call: &harnwerk::providers::ToolUseCall) -> Result<Value, harnwerk::ToolRunnerError> {
        Ok(json!({"status": "ok"}))
    }
}

async fn handle_generate(State(turn): State<Arc<AtomicUsize>>, Json(_body): Json<Value>) -> Json<Value> {
    let turn_index = turn.fetch_add(1, Ordering::SeqCst);
    if turn_index == 0 {
        Json(json!({
            "candidates": [{
                "content": {"parts": [{"functionCall": {"name": "lookup", "args": {"q": "booking"}}}]},
            }],
        }))
    } else {
        Json(json!({
            "candidates": [{
                "content": {"parts": [{"text": "{\"booking_status\":\"confirmed\"}"}]},
            }],
        }))
    }
}

#[tokio::test]
async fn gemini_adapter_completes_a_tool_loop_against_a_mock_server() {
    let _guard = ENV_GUARD.lock().unwrap();

    let turn = Arc::new(AtomicUsize::new(0));
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let app = Router::new()
        .route("/models/{*rest}", post(handle_generate))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(turn);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    std::env::set_var("GEMINI_API_KEY", "test-key");
    std::env::set_var("GEMINI_BASE_URL", format!("http://{addr}"));

    let adapter = GeminiAdapter::from_env_lazy();
    let req = ProviderRequest {
        model: "gemini-test".to_string(),
        prompt: "system prompt".to_string(),
        input: json!({"subject": "Booking"}),
        tools: vec![harnwerk::ToolSpec {
            name: "lookup".to_string(),
            description: None,
            input_schema: json!({"type": "object"}),
            strict: None,
        }],
        max_tool_calls: 8,
        invoke_tool: Arc::new(StubInvoker),
        tool_choice: None,
        parallel_tool_calls: None,
        cancel: None,
    };

    let response = adapter.invoke_with_tools(req).await.unwrap();
    assert_eq!(response.final_output, json!({"booking_status": "confirmed"}));
    assert_eq!(response.tool_trace.len(), 1);

    std::env::remove_var("GEMINI_API_KEY");
    std::env::remove_var("GEMINI_BASE_URL");
}
