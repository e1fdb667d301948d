use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::assertion::evaluate;
use crate::case::EvalCase;
use crate::error::{EvalError, ToolRunnerError};
use crate::providers::{resolve_provider, ProviderId, ProviderRequest, ToolInvoker, ToolUseCall};
use crate::redact::redact;
use crate::report::{CaseResult, CaseStatus, PromptReference, RunReport, Summary};
use crate::schema::validate_schema;
use crate::suite::Suite;
use crate::tools::{ToolExecutionContext, ToolRunner};

/// Governs warning generation and whether case output gets redacted before
/// it lands in a report. Both default to `false`.
#[derive(Debug, Clone, Default)]
pub struct PrivacyConfig {
    pub allow_raw_production_fixtures: bool,
    pub redact_in_reports: bool,
}

/// Accepted by the orchestrator as a plain struct; loading it from a file is
/// an external front-end's job, not this crate's.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub concurrency: Option<usize>,
    pub model: Option<String>,
    pub privacy: PrivacyConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: None,
            model: None,
            privacy: PrivacyConfig::default(),
        }
    }
}

struct BoundToolInvoker {
    runner: Arc<ToolRunner>,
    tools_module_path: String,
    context: ToolExecutionContext,
}

#[async_trait]
impl ToolInvoker for BoundToolInvoker {
    async fn invoke(&self, call: &ToolUseCall) -> Result<Value, ToolRunnerError> {
        self.runner
            .execute(&call.name, &self.tools_module_path, call.args.clone(), &self.context)
            .await
    }
}

/// Drives one suite end to end: resolves the model, runs the bounded
/// concurrency pool over the dataset, and synthesizes the `RunReport`.
/// Provider registration is handled once per process by
/// `crate::providers::ProviderRegistry`; this function only looks adapters up.
#[instrument(skip(suite, run_config, tool_runner), fields(suite_id = %suite.id, provider = ?provider_id))]
pub async fn run_suite(
    provider_id: ProviderId,
    suite: &Suite,
    run_config: &RunConfig,
    tool_runner: Arc<ToolRunner>,
) -> Result<RunReport, EvalError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    let model = run_config
        .model
        .clone()
        .or_else(|| suite.model_by_provider.get(&provider_id).cloned())
        .ok_or(EvalError::MissingModel(provider_id))?;

    let adapter = resolve_provider(provider_id).ok_or(EvalError::UnknownProvider(provider_id))?;

    info!(cases = suite.cases.len(), "starting suite run");

    let concurrency = run_config.concurrency.unwrap_or(4).max(1);
    let tools: Vec<_> = suite.tool_definitions.iter().map(Into::into).collect();
    let max_tool_calls = tool_runner.max_tool_calls_per_case();

    let cases = suite.cases.clone();
    let len = cases.len();
    let cursor = Arc::new(AtomicUsize::new(0));
    let mut join_set = JoinSet::new();
    let worker_count = concurrency.min(len.max(1));

    for _ in 0..worker_count {
        let cursor = cursor.clone();
        let cases = cases.clone();
        let adapter = adapter.clone();
        let tool_runner = tool_runner.clone();
        let tools = tools.clone();
        let suite_id = suite.id.clone();
        let prompt_body = suite.prompt.body.clone();
        let model = model.clone();
        let schema = suite.schema.clone();
        let assertions = suite.assertions.clone();
        let tools_module_path = suite.tools_module_path.clone();
        let privacy = run_config.privacy.clone();
        let provider_str = provider_id.as_str().to_string();
        let tool_choice = suite.tool_choice.clone();
        let parallel_tool_calls = suite.parallel_tool_calls;

        join_set.spawn(async move {
            let mut local = Vec::new();
            loop {
                let index = cursor.fetch_add(1, Ordering::SeqCst);
                if index >= len {
                    break;
                }
                let case = &cases[index];
                let result = run_case(
                    &provider_str,
                    &model,
                    &suite_id,
                    &prompt_body,
                    case,
                    &schema,
                    &assertions,
                    &tools_module_path,
                    tools.clone(),
                    max_tool_calls,
                    tool_choice.clone(),
                    parallel_tool_calls,
                    &privacy,
                    adapter.clone(),
                    tool_runner.clone(),
                )
                .await;
                local.push((index, result));
            }
            local
        });
    }

    let mut indexed = Vec::with_capacity(len);
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(local) => indexed.extend(local),
            Err(join_err) => {
                // A worker panicking outside the per-case try/catch corrupts
                // the run; surface it loudly rather than silently dropping cases.
                panic!("orchestrator worker task failed: {join_err}");
            }
        }
    }
    indexed.sort_by_key(|(index, _)| *index);
    let cases: Vec<CaseResult> = indexed.into_iter().map(|(_, result)| result).collect();

    let ended_at = Utc::now();
    let duration_ms = start_instant.elapsed().as_millis() as u64;
    let summary = Summary::from_cases(&cases, duration_ms);
    let warnings = build_warnings(&run_config.privacy);

    info!(pass = summary.pass, fail = summary.fail, error = summary.error, "suite run complete");

    Ok(RunReport {
        version: RunReport::VERSION,
        suite_id: suite.id.clone(),
        provider: provider_id.as_str().to_string(),
        model,
        started_at,
        ended_at,
        summary,
        warnings,
        prompt: PromptReference {
            prompt_id: suite.prompt.prompt_id.clone(),
            version: suite.prompt.version.clone(),
        },
        cases,
    })
}

fn build_warnings(privacy: &PrivacyConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if privacy.allow_raw_production_fixtures {
        warnings.push(
            "allowRawProductionFixtures is enabled; ensure fixtures are cleared for this use".to_string(),
        );
    }
    if privacy.redact_in_reports {
        warnings.push("report payloads are redacted by default".to_string());
    }
    warnings
}

#[allow(clippy::too_many_arguments)]
async fn run_case(
    provider: &str,
    model: &str,
    suite_id: &str,
    prompt_body: &str,
    case: &EvalCase,
    schema: &Value,
    assertions: &crate::assertion::AssertionSpec,
    tools_module_path: &str,
    tools: Vec<crate::providers::ToolSpec>,
    max_tool_calls: usize,
    tool_choice: Option<Value>,
    parallel_tool_calls: Option<bool>,
    privacy: &PrivacyConfig,
    adapter: Arc<dyn crate::providers::ProviderAdapter>,
    tool_runner: Arc<ToolRunner>,
) -> CaseResult {
    let case_start = Instant::now();
    let hashed_case_id = case.hashed_case_id();

    debug!(hashed_case_id = %hashed_case_id, "starting case");

    let context = ToolExecutionContext {
        suite_id: suite_id.to_string(),
        hashed_case_id: hashed_case_id.clone(),
        raw_case_id: case.case_id.clone(),
        provider: provider.to_string(),
        model: model.to_string(),
    };

    let invoker = Arc::new(BoundToolInvoker {
        runner: tool_runner,
        tools_module_path: tools_module_path.to_string(),
        context,
    }) as Arc<dyn ToolInvoker>;

    let req = ProviderRequest {
        model: model.to_string(),
        prompt: prompt_body.to_string(),
        input: case.input.clone(),
        tools,
        max_tool_calls,
        invoke_tool: invoker,
        tool_choice,
        parallel_tool_calls,
        cancel: None,
    };

    match adapter.invoke_with_tools(req).await {
        Ok(response) => {
            let schema_result = validate_schema(schema, &response.final_output);
            let assertion_result = evaluate(&response.final_output, &case.expected, assertions);

            let mut errors: Vec<String> = schema_result.errors.clone();
            for check in &assertion_result.checks {
                if !check.passed {
                    errors.push(format!("{}:{:?}:{}", check.field, check.op, check.message));
                }
            }
            if !assertion_result.missing_keys.is_empty() {
                errors.push(format!("missing keys: {}", assertion_result.missing_keys.join(", ")));
            }
            if !assertion_result.unexpected_keys.is_empty() {
                errors.push(format!("unexpected keys: {}", assertion_result.unexpected_keys.join(", ")));
            }

            let passed = schema_result.valid && assertion_result.passed;
            let redacted_output = if privacy.redact_in_reports {
                redact(&response.final_output)
            } else {
                response.final_output.clone()
            };

            CaseResult {
                hashed_case_id,
                raw_case_id: CaseResult::RAW_CASE_ID_PLACEHOLDER,
                status: if passed { CaseStatus::Pass } else { CaseStatus::Fail },
                schema_valid: schema_result.valid,
                assertions_passed: assertion_result.passed,
                assertion_result: Some(assertion_result),
                errors,
                output: response.final_output,
                redacted_output,
                expected: case.expected.clone(),
                latency_ms: case_start.elapsed().as_millis() as u64,
                provider: provider.to_string(),
                model: model.to_string(),
                usage: response.usage,
                tool_trace: response.tool_trace,
                tags: case.tags.clone(),
            }
        }
        Err(err) => {
            let eval_err: EvalError = err.into();
            warn!(hashed_case_id = %hashed_case_id, error = %eval_err, "case failed");
            CaseResult {
                hashed_case_id,
                raw_case_id: CaseResult::RAW_CASE_ID_PLACEHOLDER,
                status: CaseStatus::Error,
                schema_valid: false,
                assertions_passed: false,
                assertion_result: None,
                errors: vec![format!("{}:{}", eval_err.case_error_code(), eval_err)],
                output: Value::Null,
                redacted_output: Value::Null,
                expected: case.expected.clone(),
                latency_ms: case_start.elapsed().as_millis() as u64,
                provider: provider.to_string(),
                model: model.to_string(),
                usage: None,
                tool_trace: Vec::new(),
                tags: case.tags.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::AssertionSpec;
    use crate::error::ProviderError;
    use crate::providers::{ProviderAdapter, ProviderResponse};
    use serde_json::json;
    use std::sync::Mutex;

    struct ScriptedAdapter {
        id: ProviderId,
        turns: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl ProviderAdapter for ScriptedAdapter {
        fn id(&self) -> ProviderId {
            self.id
        }

        async fn invoke_with_tools(
            &self,
            _req: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            let output = self.turns.lock().unwrap().remove(0);
            Ok(ProviderResponse {
                final_output: output,
                usage: None,
                raw_response: Value::Null,
                tool_trace: Vec::new(),
            })
        }
    }

    fn minimal_suite() -> Suite {
        Suite {
            id: "suite-1".to_string(),
            prompt: crate::suite::PromptRecord {
                prompt_id: "prompt-1".to_string(),
                version: "1".to_string(),
                body: "system instructions".to_string(),
            },
            cases: vec![EvalCase::new(
                "case-1",
                json!({"subject": "Booking", "body": "Confirmed"}),
                json!({"booking_status": "confirmed"}),
            )],
            schema: json!({
                "type": "object",
                "properties": {"booking_status": {"type": "string"}},
                "required": ["booking_status"],
            }),
            assertions: AssertionSpec {
                required_keys: vec!["booking_status".to_string()],
                allow_additional_keys: false,
                variable_fields: Vec::new(),
                field_matchers: {
                    let mut map = std::collections::HashMap::new();
                    map.insert(
                        "booking_status".to_string(),
                        vec![crate::assertion::FieldMatcher {
                            op: crate::assertion::AssertionOperator::OneOf,
                            value: Some(json!(["confirmed", "pending", "cancelled"])),
                            expected_path: None,
                        }],
                    );
                    map
                },
            },
            tools_module_path: "/tmp/tools.js".to_string(),
            tool_definitions: Vec::new(),
            model_by_provider: {
                let mut map = std::collections::HashMap::new();
                map.insert(ProviderId::Responses, "gpt-test".to_string());
                map
            },
            tool_choice: None,
            parallel_tool_calls: None,
        }
    }

    #[tokio::test]
    async fn happy_path_produces_a_passing_case() {
        crate::providers::register_provider(
            ProviderId::Responses,
            Arc::new(ScriptedAdapter {
                id: ProviderId::Responses,
                turns: Mutex::new(vec![json!({"booking_status": "confirmed"})]),
            }),
        );

        let suite = minimal_suite();
        let run_config = RunConfig::default();
        let tool_runner = Arc::new(
            ToolRunner::new(
                crate::tools::runner::ToolRunnerConfig {
                    command: "node".to_string(),
                    env_allowlist: Vec::new(),
                    timeout_ms: 5_000,
                    max_tool_calls_per_case: 8,
                },
                ".",
            )
            .unwrap(),
        );

        let report = run_suite(ProviderId::Responses, &suite, &run_config, tool_runner)
            .await
            .unwrap();

        assert_eq!(report.summary.total, 1);
        assert_eq!(report.summary.pass, 1);
        assert_eq!(report.summary.fail, 0);
        assert_eq!(report.summary.error, 0);
        assert_eq!(report.cases[0].hashed_case_id.len(), 16);
    }
}
