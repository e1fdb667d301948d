use jsonschema::{Draft, JSONSchema};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct SchemaValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Validates `instance` against a JSON-Schema document. Errors are formatted
/// `"<instance-path-or-(root)> <message>"` in the validator's natural
/// (stable) order.
pub fn validate_schema(schema: &Value, instance: &Value) -> SchemaValidationResult {
    let compiled = match JSONSchema::options().with_draft(Draft::Draft202012).compile(schema) {
        Ok(compiled) => compiled,
        Err(err) => {
            return SchemaValidationResult {
                valid: false,
                errors: vec![format!("(root) invalid schema: {err}")],
            };
        }
    };

    match compiled.validate(instance) {
        Ok(()) => SchemaValidationResult {
            valid: true,
            errors: Vec::new(),
        },
        Err(errors) => {
            let errors = errors
                .map(|err| {
                    let path = err.instance_path.to_string();
                    let path = if path.is_empty() { "(root)".to_string() } else { path };
                    format!("{path} {err}")
                })
                .collect();
            SchemaValidationResult {
                valid: false,
                errors,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_instance_has_no_errors() {
        let schema = json!({
            "type": "object",
            "properties": {"booking_status": {"type": "string"}},
            "required": ["booking_status"],
        });
        let result = validate_schema(&schema, &json!({"booking_status": "confirmed"}));
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn missing_required_property_is_reported() {
        let schema = json!({
            "type": "object",
            "properties": {"booking_status": {"type": "string"}},
            "required": ["booking_status"],
        });
        let result = validate_schema(&schema, &json!({}));
        assert!(!result.valid);
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn wrong_type_is_reported_with_instance_path() {
        let schema = json!({
            "type": "object",
            "properties": {"score": {"type": "number"}},
        });
        let result = validate_schema(&schema, &json!({"score": "not a number"}));
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.starts_with("/score")));
    }
}
