use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::assertion::AssertionResult;
use crate::providers::ToolCallTrace;

/// One case's outcome inside a `RunReport`. `rawCaseId` is always literally
/// `"[HASHED]"` in emitted form — the raw id never leaves the process.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseResult {
    pub hashed_case_id: String,
    pub raw_case_id: &'static str,
    pub status: CaseStatus,
    pub schema_valid: bool,
    pub assertions_passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_result: Option<AssertionResult>,
    pub errors: Vec<String>,
    pub output: Value,
    pub redacted_output: Value,
    pub expected: Value,
    pub latency_ms: u64,
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
    pub tool_trace: Vec<ToolCallTrace>,
    pub tags: Vec<String>,
}

impl CaseResult {
    pub const RAW_CASE_ID_PLACEHOLDER: &'static str = "[HASHED]";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Pass,
    Fail,
    Error,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub pass: usize,
    pub fail: usize,
    pub error: usize,
    pub duration_ms: u64,
}

impl Summary {
    pub fn from_cases(cases: &[CaseResult], duration_ms: u64) -> Self {
        let total = cases.len();
        let pass = cases.iter().filter(|c| c.status == CaseStatus::Pass).count();
        let fail = cases.iter().filter(|c| c.status == CaseStatus::Fail).count();
        let error = cases.iter().filter(|c| c.status == CaseStatus::Error).count();
        Self {
            total,
            pass,
            fail,
            error,
            duration_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptReference {
    pub prompt_id: String,
    pub version: String,
}

/// The JSON artifact produced by one orchestrator run: UTF-8, 2-space
/// indent, final newline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub version: &'static str,
    pub suite_id: String,
    pub provider: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub summary: Summary,
    pub warnings: Vec<String>,
    pub prompt: PromptReference,
    pub cases: Vec<CaseResult>,
}

impl RunReport {
    pub const VERSION: &'static str = "1";

    /// Serializes the report as 2-space-indented JSON with a trailing
    /// newline.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"  ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        serde::Serialize::serialize(self, &mut serializer)?;
        let mut out = String::from_utf8(buf).expect("serde_json only emits valid utf-8");
        out.push('\n');
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_case(status: CaseStatus) -> CaseResult {
        CaseResult {
            hashed_case_id: "abcdef0123456789".to_string(),
            raw_case_id: CaseResult::RAW_CASE_ID_PLACEHOLDER,
            status,
            schema_valid: status == CaseStatus::Pass,
            assertions_passed: status == CaseStatus::Pass,
            assertion_result: None,
            errors: Vec::new(),
            output: json!({}),
            redacted_output: json!({}),
            expected: json!({}),
            latency_ms: 10,
            provider: "responses".to_string(),
            model: "gpt".to_string(),
            usage: None,
            tool_trace: Vec::new(),
            tags: Vec::new(),
        }
    }

    #[test]
    fn summary_counts_match_cases() {
        let cases = vec![
            sample_case(CaseStatus::Pass),
            sample_case(CaseStatus::Fail),
            sample_case(CaseStatus::Error),
        ];
        let summary = Summary::from_cases(&cases, 42);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.pass + summary.fail + summary.error, summary.total);
    }

    #[test]
    fn json_string_ends_with_newline_and_is_valid() {
        let report = RunReport {
            version: RunReport::VERSION,
            suite_id: "suite-1".to_string(),
            provider: "responses".to_string(),
            model: "gpt".to_string(),
            started_at: Utc::now(),
            ended_at: Utc::now(),
            summary: Summary::from_cases(&[], 0),
            warnings: Vec::new(),
            prompt: PromptReference {
                prompt_id: "p1".to_string(),
                version: "1".to_string(),
            },
            cases: Vec::new(),
        };
        let serialized = report.to_json_string().unwrap();
        assert!(serialized.ends_with('\n'));
        let parsed: Value = serde_json::from_str(&serialized).unwrap();
        assert_eq!(parsed["version"], json!("1"));
        assert!(parsed["cases"].as_array().unwrap().is_empty());
    }
}
