use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::assertion::AssertionSpec;
use crate::case::EvalCase;
use crate::providers::{ProviderId, ToolSpec};

/// A named bundle of prompt, dataset, schema, assertions, and tools module.
/// Loading one from disk is an external collaborator's job; the core only
/// consumes the already-resolved value.
#[derive(Debug, Clone)]
pub struct Suite {
    pub id: String,
    pub prompt: PromptRecord,
    pub cases: Vec<EvalCase>,
    pub schema: Value,
    pub assertions: AssertionSpec,
    pub tools_module_path: String,
    pub tool_definitions: Vec<ToolDefinition>,
    pub model_by_provider: HashMap<ProviderId, String>,
    /// Backend-O-only request config, forwarded verbatim when present.
    pub tool_choice: Option<Value>,
    pub parallel_tool_calls: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRecord {
    pub prompt_id: String,
    pub version: String,
    pub body: String,
}

/// One tool exposed to the model for a suite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

impl From<&ToolDefinition> for ToolSpec {
    fn from(def: &ToolDefinition) -> Self {
        Self {
            name: def.name.clone(),
            description: def.description.clone(),
            input_schema: def.input_schema.clone().unwrap_or_else(|| Value::Object(Default::default())),
            strict: def.strict,
        }
    }
}
