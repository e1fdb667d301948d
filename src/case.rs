use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// One input/expected pair in a dataset. Immutable after load, identified
/// externally by `case_id` and in reports by `hashed_case_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalCase {
    pub case_id: String,
    pub input: Value,
    pub expected: Value,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl EvalCase {
    pub fn new(case_id: impl Into<String>, input: Value, expected: Value) -> Self {
        Self {
            case_id: case_id.into(),
            input,
            expected,
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// First 16 hex characters of SHA-256(case_id), used everywhere a report
    /// must avoid leaking the raw case identifier.
    pub fn hashed_case_id(&self) -> String {
        hash_case_id(&self.case_id)
    }
}

pub fn hash_case_id(raw_case_id: &str) -> String {
    let digest = Sha256::digest(raw_case_id.as_bytes());
    let hex = digest.iter().fold(String::with_capacity(64), |mut acc, byte| {
        use std::fmt::Write;
        let _ = write!(acc, "{byte:02x}");
        acc
    });
    hex[..16].to_string()
}

/// Rejects a dataset containing two cases with the same raw `case_id`.
/// Implementers are expected to call this after loading a dataset; the core
/// itself never silently accepts a duplicate.
pub fn reject_duplicate_case_ids(cases: &[EvalCase]) -> Result<(), crate::error::EvalError> {
    let mut seen = std::collections::HashSet::with_capacity(cases.len());
    for case in cases {
        if !seen.insert(case.case_id.as_str()) {
            return Err(crate::error::EvalError::DuplicateCaseId(case.case_id.clone()));
        }
    }
    Ok(())
}
