//! Two-phase configuration boundary.
//!
//! Phase one checks the raw document against the step type's JSON schema and
//! reports every violation (`config.schema_violation`). Phase two decodes the
//! document into the step's typed config (`config.decode_failed`). Both run
//! before a step touches anything.

use jsonschema::Validator;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result, SchemaViolation};

/// Compile a step type's schema once, at registration.
pub fn compile_schema(step_type: &str, schema: &Value) -> Result<Validator> {
    jsonschema::options()
        .should_validate_formats(true)
        .build(schema)
        .map_err(|e| {
            Error::config_invalid_value(
                format!("steps.{}.schema", step_type),
                None,
                format!("invalid JSON schema for step type '{}': {}", step_type, e),
            )
        })
}

pub fn validate(step_type: &str, validator: &Validator, config: &Value) -> Result<()> {
    let violations: Vec<SchemaViolation> = validator
        .iter_errors(config)
        .map(|e| SchemaViolation {
            instance_path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(Error::config_schema_violation(step_type, violations))
    }
}

pub fn decode<T: DeserializeOwned>(step_type: &str, config: &Value) -> Result<T> {
    T::deserialize(config).map_err(|e| Error::config_decode_failed(step_type, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde::Deserialize;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "path": { "type": "string", "minLength": 1 },
                "mode": { "type": "string", "enum": ["fast", "slow"] },
                "contact": { "type": "string", "format": "email" },
                "tags": {}
            },
            "required": ["path"]
        })
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Typed {
        path: String,
        #[serde(default)]
        tags: Vec<String>,
    }

    #[test]
    fn valid_config_passes() {
        let v = compile_schema("demo", &schema()).unwrap();
        assert!(validate("demo", &v, &json!({"path": "repo", "mode": "fast"})).is_ok());
    }

    #[test]
    fn every_violation_is_reported() {
        let v = compile_schema("demo", &schema()).unwrap();
        let err = validate("demo", &v, &json!({"mode": "medium", "extra": 1})).unwrap_err();

        assert_eq!(err.code, ErrorCode::ConfigSchemaViolation);
        let violations = err.details["violations"].as_array().unwrap();
        assert!(violations.len() >= 3, "got {:?}", violations);
        assert!(violations.iter().any(|v| v["instancePath"] == "/mode"));
    }

    #[test]
    fn formats_are_enforced() {
        let v = compile_schema("demo", &schema()).unwrap();
        let config = json!({"path": "x", "contact": "not an email"});
        let err = validate("demo", &v, &config).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigSchemaViolation);
    }

    #[test]
    fn decode_failure_is_distinct_from_schema_violation() {
        let v = compile_schema("demo", &schema()).unwrap();
        let config = json!({"path": "repo", "tags": "not-a-list"});

        assert!(validate("demo", &v, &config).is_ok());
        let err = decode::<Typed>("demo", &config).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigDecodeFailed);
        assert!(err.message.contains("demo"));
    }

    #[test]
    fn broken_schema_fails_to_compile() {
        let err = compile_schema("demo", &json!({"type": 12})).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidValue);
    }
}
