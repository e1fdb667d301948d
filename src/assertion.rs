use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One matcher attached to a field path in an `AssertionSpec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMatcher {
    pub op: AssertionOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "expectedPath")]
    pub expected_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssertionOperator {
    Equals,
    OneOf,
    Contains,
    Regex,
    NumericRange,
    Exists,
    Absent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionSpec {
    #[serde(default)]
    pub required_keys: Vec<String>,
    #[serde(default)]
    pub allow_additional_keys: bool,
    #[serde(default)]
    pub variable_fields: Vec<String>,
    #[serde(default)]
    pub field_matchers: HashMap<String, Vec<FieldMatcher>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionCheckResult {
    pub field: String,
    pub op: AssertionOperator,
    pub passed: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    pub passed: bool,
    pub checks: Vec<AssertionCheckResult>,
    pub missing_keys: Vec<String>,
    pub unexpected_keys: Vec<String>,
}

/// Splits a dot-delimited field path into tokens, discarding empty tokens.
fn path_tokens(path: &str) -> Vec<&str> {
    path.split('.').filter(|token| !token.is_empty()).collect()
}

/// Resolves a dot-path against a JSON value. Missing keys or indexing through
/// a non-object/non-array yields `Value::Null` (undefined is not distinguished
/// from null at this layer; `exists`/`absent` treat both as absent).
pub fn get_by_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for token in path_tokens(path) {
        match current {
            Value::Object(map) => current = map.get(token)?,
            Value::Array(items) => {
                let index: usize = token.parse().ok()?;
                current = items.get(index)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

fn is_present(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null))
}

fn as_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn json_eq(a: &Value, b: &Value) -> bool {
    a == b
}

/// Runs one `FieldMatcher` against `actual`, resolving the expected-side value
/// via its `value` field, a `$expected.`-prefixed path, or (by default) the
/// mirror path in the expected document.
fn resolve_expected_value<'a>(
    matcher: &'a FieldMatcher,
    field: &str,
    expected_root: &'a Value,
) -> Option<std::borrow::Cow<'a, Value>> {
    if let Some(value) = &matcher.value {
        return Some(std::borrow::Cow::Borrowed(value));
    }
    if let Some(path) = &matcher.expected_path {
        if let Some(stripped) = path.strip_prefix("$expected.") {
            return get_by_path(expected_root, stripped).map(std::borrow::Cow::Borrowed);
        }
    }
    get_by_path(expected_root, field).map(std::borrow::Cow::Borrowed)
}

fn run_operator(
    op: AssertionOperator,
    actual: Option<&Value>,
    expected_value: Option<&Value>,
) -> (bool, String) {
    match op {
        AssertionOperator::Equals => {
            let passed = match (actual, expected_value) {
                (Some(a), Some(e)) => json_eq(a, e),
                (None | Some(Value::Null), None | Some(Value::Null)) => true,
                _ => false,
            };
            (passed, format!("equals {:?}", expected_value))
        }
        AssertionOperator::OneOf => match expected_value {
            Some(Value::Array(items)) => {
                let actual = actual.unwrap_or(&Value::Null);
                let passed = items.iter().any(|item| json_eq(item, actual));
                (passed, format!("oneOf {:?}", items))
            }
            _ => (false, "oneOf requires an array expected value".to_string()),
        },
        AssertionOperator::Contains => {
            let passed = match (actual, expected_value) {
                (Some(Value::String(a)), Some(Value::String(e))) => a.contains(e.as_str()),
                (Some(Value::Array(items)), Some(e)) => items.iter().any(|item| json_eq(item, e)),
                _ => false,
            };
            (passed, "contains".to_string())
        }
        AssertionOperator::Regex => match expected_value {
            Some(Value::String(pattern)) => match Regex::new(pattern) {
                Ok(re) => {
                    let hay = as_string(actual);
                    (re.is_match(&hay), format!("regex /{pattern}/"))
                }
                Err(err) => (false, format!("invalid regex /{pattern}/: {err}")),
            },
            _ => (false, "regex requires a string pattern".to_string()),
        },
        AssertionOperator::NumericRange => {
            let actual_num = actual.and_then(Value::as_f64).filter(|n| n.is_finite());
            match (actual_num, expected_value) {
                (Some(n), Some(Value::Object(range))) => {
                    let min = range.get("min").and_then(Value::as_f64);
                    let max = range.get("max").and_then(Value::as_f64);
                    let passed = min.map_or(true, |min| min <= n) && max.map_or(true, |max| n <= max);
                    (passed, format!("numericRange min={min:?} max={max:?}"))
                }
                _ => (false, "numericRange requires a finite number and a range".to_string()),
            }
        }
        AssertionOperator::Exists => (is_present(actual), "exists".to_string()),
        AssertionOperator::Absent => (!is_present(actual), "absent".to_string()),
    }
}

/// Deterministic, side-effect-free check of one output against an
/// `AssertionSpec`. Unknown operators never panic; an `AssertionOperator` is
/// a closed enum so that case is unreachable in practice.
pub fn evaluate(output: &Value, expected: &Value, spec: &AssertionSpec) -> AssertionResult {
    let empty_map = serde_json::Map::new();
    let output_map = match output {
        Value::Object(map) => map,
        _ => &empty_map,
    };

    let missing_keys: Vec<String> = spec
        .required_keys
        .iter()
        .filter(|key| !output_map.contains_key(key.as_str()))
        .cloned()
        .collect();

    let mut allowed_keys: std::collections::HashSet<&str> = std::collections::HashSet::new();
    allowed_keys.extend(spec.required_keys.iter().map(String::as_str));
    allowed_keys.extend(spec.variable_fields.iter().map(String::as_str));
    allowed_keys.extend(spec.field_matchers.keys().map(String::as_str));

    let unexpected_keys: Vec<String> = if spec.allow_additional_keys {
        Vec::new()
    } else {
        output_map
            .keys()
            .filter(|key| !allowed_keys.contains(key.as_str()))
            .cloned()
            .collect()
    };

    let mut checks = Vec::new();
    for (field, matchers) in &spec.field_matchers {
        let actual = get_by_path(output, field);
        for matcher in matchers {
            let expected_value = resolve_expected_value(matcher, field, expected);
            let (passed, detail) = run_operator(matcher.op, actual, expected_value.as_deref());
            checks.push(AssertionCheckResult {
                field: field.clone(),
                op: matcher.op,
                passed,
                message: detail,
            });
        }
    }

    let passed = missing_keys.is_empty() && unexpected_keys.is_empty() && checks.iter().all(|c| c.passed);

    AssertionResult {
        passed,
        checks,
        missing_keys,
        unexpected_keys,
    }
}
