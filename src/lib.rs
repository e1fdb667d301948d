pub mod assertion;
pub mod case;
pub mod diff;
pub mod error;
pub mod orchestrator;
pub mod providers;
pub mod redact;
pub mod report;
pub mod schema;
pub mod suite;
pub mod tools;

pub use assertion::{evaluate, AssertionOperator, AssertionResult, AssertionSpec, FieldMatcher};
pub use case::{hash_case_id, reject_duplicate_case_ids, EvalCase};
pub use diff::{diff, DiffReport, StatusTransition};
pub use error::{EvalError, ProviderError, ToolRunnerError};
pub use orchestrator::{run_suite, PrivacyConfig, RunConfig};
pub use providers::{ProviderAdapter, ProviderId, ProviderRequest, ProviderResponse, ToolCallTrace, ToolSpec};
pub use redact::redact;
pub use report::{CaseResult, CaseStatus, PromptReference, RunReport, Summary};
pub use schema::{validate_schema, SchemaValidationResult};
pub use suite::{PromptRecord, Suite, ToolDefinition};
pub use tools::{ToolExecutionContext, ToolRunner, ToolRunnerConfig};

extern crate self as harnwerk;
