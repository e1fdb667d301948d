use serde::Serialize;

/// Carried across the parent/worker IPC boundary so a tool handler can see
/// which case and suite it's running for without leaking the raw case id
/// into logs. `raw_case_id` is included because some handlers need it to
/// address per-case fixtures.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecutionContext {
    pub suite_id: String,
    pub hashed_case_id: String,
    pub raw_case_id: String,
    pub provider: String,
    pub model: String,
}
