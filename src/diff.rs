use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::report::{CaseStatus, RunReport};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTransition {
    pub hashed_case_id: String,
    pub baseline_status: CaseStatus,
    pub candidate_status: CaseStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffReport {
    pub baseline_suite_id: String,
    pub candidate_suite_id: String,
    pub compared_at: DateTime<Utc>,
    pub total_compared: usize,
    pub regressions: Vec<StatusTransition>,
    pub improvements: Vec<StatusTransition>,
    pub unchanged: usize,
}

fn rank(status: CaseStatus) -> u8 {
    match status {
        CaseStatus::Pass => 2,
        CaseStatus::Fail => 1,
        CaseStatus::Error => 0,
    }
}

/// Index a report by `hashedCaseId`, last-wins on duplicates.
fn index_by_hashed_case_id(report: &RunReport) -> HashMap<&str, CaseStatus> {
    let mut index = HashMap::with_capacity(report.cases.len());
    for case in &report.cases {
        index.insert(case.hashed_case_id.as_str(), case.status);
    }
    index
}

/// Compares two run reports and classifies every case-level status
/// transition as a regression, improvement, or unchanged. Never panics on
/// empty or mismatched case sets — ids present on only one side are
/// silently ignored, counting as neither a regression nor an improvement.
pub fn diff(baseline: &RunReport, candidate: &RunReport, compared_at: DateTime<Utc>) -> DiffReport {
    let baseline_index = index_by_hashed_case_id(baseline);
    let candidate_index = index_by_hashed_case_id(candidate);

    let mut ids: std::collections::HashSet<&str> = std::collections::HashSet::new();
    ids.extend(baseline_index.keys());
    ids.extend(candidate_index.keys());

    let mut regressions = Vec::new();
    let mut improvements = Vec::new();
    let mut unchanged = 0usize;

    for id in &ids {
        let (Some(&baseline_status), Some(&candidate_status)) =
            (baseline_index.get(id), candidate_index.get(id))
        else {
            continue;
        };

        if baseline_status == candidate_status {
            unchanged += 1;
            continue;
        }

        let transition = StatusTransition {
            hashed_case_id: id.to_string(),
            baseline_status,
            candidate_status,
        };

        if rank(baseline_status) > rank(candidate_status) {
            regressions.push(transition);
        } else {
            improvements.push(transition);
        }
    }

    DiffReport {
        baseline_suite_id: baseline.suite_id.clone(),
        candidate_suite_id: candidate.suite_id.clone(),
        compared_at,
        total_compared: ids.len(),
        regressions,
        improvements,
        unchanged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{CaseResult, PromptReference, Summary};
    use serde_json::json;

    fn report(suite_id: &str, cases: Vec<(&str, CaseStatus)>) -> RunReport {
        let cases: Vec<CaseResult> = cases
            .into_iter()
            .map(|(id, status)| CaseResult {
                hashed_case_id: id.to_string(),
                raw_case_id: CaseResult::RAW_CASE_ID_PLACEHOLDER,
                status,
                schema_valid: status == CaseStatus::Pass,
                assertions_passed: status == CaseStatus::Pass,
                assertion_result: None,
                errors: Vec::new(),
                output: json!({}),
                redacted_output: json!({}),
                expected: json!({}),
                latency_ms: 1,
                provider: "responses".to_string(),
                model: "gpt".to_string(),
                usage: None,
                tool_trace: Vec::new(),
                tags: Vec::new(),
            })
            .collect();
        RunReport {
            version: RunReport::VERSION,
            suite_id: suite_id.to_string(),
            provider: "responses".to_string(),
            model: "gpt".to_string(),
            started_at: Utc::now(),
            ended_at: Utc::now(),
            summary: Summary::from_cases(&cases, 0),
            warnings: Vec::new(),
            prompt: PromptReference {
                prompt_id: "p1".to_string(),
                version: "1".to_string(),
            },
            cases,
        }
    }

    #[test]
    fn diff_against_self_is_all_unchanged() {
        let a = report(
            "suite",
            vec![("a", CaseStatus::Pass), ("b", CaseStatus::Fail), ("c", CaseStatus::Error)],
        );
        let result = diff(&a, &a, Utc::now());
        assert!(result.regressions.is_empty());
        assert!(result.improvements.is_empty());
        assert_eq!(result.unchanged, a.cases.len());
    }

    #[test]
    fn classifies_regression_and_improvement() {
        let baseline = report(
            "suite",
            vec![("a", CaseStatus::Pass), ("b", CaseStatus::Fail), ("c", CaseStatus::Error)],
        );
        let candidate = report(
            "suite",
            vec![("a", CaseStatus::Fail), ("b", CaseStatus::Pass), ("c", CaseStatus::Error)],
        );
        let result = diff(&baseline, &candidate, Utc::now());
        assert_eq!(result.regressions.len(), 1);
        assert_eq!(result.regressions[0].hashed_case_id, "a");
        assert_eq!(result.improvements.len(), 1);
        assert_eq!(result.improvements[0].hashed_case_id, "b");
        assert_eq!(result.unchanged, 1);
        assert_eq!(result.total_compared, 3);
    }

    #[test]
    fn ids_on_only_one_side_are_ignored() {
        let baseline = report("suite", vec![("a", CaseStatus::Pass)]);
        let candidate = report("suite", vec![("b", CaseStatus::Pass)]);
        let result = diff(&baseline, &candidate, Utc::now());
        assert!(result.regressions.is_empty());
        assert!(result.improvements.is_empty());
        assert_eq!(result.unchanged, 0);
        assert_eq!(result.total_compared, 2);
    }
}
