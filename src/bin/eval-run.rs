use clap::Parser;
use harnwerk::{
    AssertionOperator, AssertionSpec, EvalCase, FieldMatcher, PrivacyConfig, ProviderId, RunConfig,
    Suite, ToolRunner, ToolRunnerConfig,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Thin smoke-test binary for the core: runs one baked-in suite against a
/// live provider and prints the resulting run report. This is not the
/// command-line front-end (suite/config loading, scaffolding, and the
/// AI suggestion generator remain external collaborators) — it exists only
/// to exercise `harnwerk::orchestrator::run_suite` end to end.
#[derive(Parser, Debug)]
#[command(name = "eval-run", about = "Smoke-test runner for the harnwerk core")]
struct Cli {
    #[arg(long, value_enum, default_value = "responses")]
    provider: ProviderArg,

    #[arg(long)]
    model: Option<String>,

    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    #[arg(long, default_value = "./tools/demo-tools.js")]
    tools_module: String,
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum ProviderArg {
    Responses,
    Anthropic,
    Gemini,
}

impl From<ProviderArg> for ProviderId {
    fn from(value: ProviderArg) -> Self {
        match value {
            ProviderArg::Responses => ProviderId::Responses,
            ProviderArg::Anthropic => ProviderId::Anthropic,
            ProviderArg::Gemini => ProviderId::Gemini,
        }
    }
}

fn demo_suite(provider_id: ProviderId, model: Option<String>, tools_module_path: String) -> Suite {
    let mut field_matchers = HashMap::new();
    field_matchers.insert(
        "booking_status".to_string(),
        vec![FieldMatcher {
            op: AssertionOperator::OneOf,
            value: Some(serde_json::json!(["confirmed", "pending", "cancelled"])),
            expected_path: None,
        }],
    );

    let mut model_by_provider = HashMap::new();
    if let Some(model) = model {
        model_by_provider.insert(provider_id, model);
    }

    Suite {
        id: "demo-suite".to_string(),
        prompt: harnwerk::PromptRecord {
            prompt_id: "booking-confirmation".to_string(),
            version: "1".to_string(),
            body: "You confirm bookings. Reply with JSON {\"booking_status\": ...}.".to_string(),
        },
        cases: vec![EvalCase::new(
            "case-1",
            serde_json::json!({"subject": "Booking", "body": "Confirmed"}),
            serde_json::json!({"booking_status": "confirmed"}),
        )],
        schema: serde_json::json!({
            "type": "object",
            "properties": {"booking_status": {"type": "string"}},
            "required": ["booking_status"],
        }),
        assertions: AssertionSpec {
            required_keys: vec!["booking_status".to_string()],
            allow_additional_keys: false,
            variable_fields: Vec::new(),
            field_matchers,
        },
        tools_module_path,
        tool_definitions: Vec::new(),
        model_by_provider,
        tool_choice: None,
        parallel_tool_calls: None,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let provider_id: ProviderId = cli.provider.into();

    let suite = demo_suite(provider_id, cli.model, cli.tools_module.clone());
    let run_config = RunConfig {
        concurrency: Some(cli.concurrency),
        model: None,
        privacy: PrivacyConfig::default(),
    };

    let tool_runner = Arc::new(ToolRunner::new(
        ToolRunnerConfig {
            command: "node".to_string(),
            env_allowlist: Vec::new(),
            timeout_ms: 15_000,
            max_tool_calls_per_case: 8,
        },
        ".",
    )?);

    let report = harnwerk::run_suite(provider_id, &suite, &run_config, tool_runner).await?;
    println!("{}", report.to_json_string()?);

    Ok(())
}
