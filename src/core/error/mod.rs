mod codes;
pub mod help;

pub use codes::{all_codes, parse_code};

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInvalidJson,
    ConfigInvalidValue,
    ConfigSchemaViolation,
    ConfigDecodeFailed,

    ValidationInvalidArgument,

    StepNotFound,
    StepAlreadyRegistered,

    StateAliasExists,
    StateTypeMismatch,

    SandboxPathEscape,

    RunCancelled,

    GitCommandFailed,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

/// Failure classes a controller can act on without inspecting individual codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigurationInvalid,
    PathEscape,
    TypeMismatch,
    UnderlyingOperationFailed,
    Engine,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",
            ErrorCode::ConfigSchemaViolation => "config.schema_violation",
            ErrorCode::ConfigDecodeFailed => "config.decode_failed",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::StepNotFound => "step.not_found",
            ErrorCode::StepAlreadyRegistered => "step.already_registered",

            ErrorCode::StateAliasExists => "state.alias_exists",
            ErrorCode::StateTypeMismatch => "state.type_mismatch",

            ErrorCode::SandboxPathEscape => "sandbox.path_escape",

            ErrorCode::RunCancelled => "run.cancelled",

            ErrorCode::GitCommandFailed => "git.command_failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::ConfigSchemaViolation | ErrorCode::ConfigDecodeFailed => {
                ErrorKind::ConfigurationInvalid
            }
            ErrorCode::SandboxPathEscape => ErrorKind::PathEscape,
            ErrorCode::StateTypeMismatch => ErrorKind::TypeMismatch,
            ErrorCode::GitCommandFailed | ErrorCode::InternalIoError => {
                ErrorKind::UnderlyingOperationFailed
            }
            _ => ErrorKind::Engine,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidJsonDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaViolation {
    /// JSON pointer into the configuration document ("" for the root).
    pub instance_path: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaViolationDetails {
    pub step_type: String,
    pub violations: Vec<SchemaViolation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodeFailedDetails {
    pub step_type: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepNotFoundDetails {
    pub step_type: String,
    pub registered: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDetails {
    pub alias: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathEscapeDetails {
    pub root: String,
    pub path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitCommandFailedDetails {
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let problem = problem.into();
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.clone(),
            id,
            tried,
        });

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            format!("Invalid argument: {}", problem),
            details,
        )
    }

    pub fn config_invalid_json(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        let path = path.into();
        let details = to_details(ConfigInvalidJsonDetails {
            path: path.clone(),
            error: err.to_string(),
        });

        Self::new(
            ErrorCode::ConfigInvalidJson,
            format!("Invalid configuration in {}: {}", path, err),
            details,
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let problem = problem.into();
        let details = to_details(ConfigInvalidValueDetails {
            key: key.into(),
            value,
            problem: problem.clone(),
        });

        Self::new(
            ErrorCode::ConfigInvalidValue,
            format!("Invalid configuration value: {}", problem),
            details,
        )
    }

    /// Structural failure of a step configuration against its declared schema.
    pub fn config_schema_violation(
        step_type: impl Into<String>,
        violations: Vec<SchemaViolation>,
    ) -> Self {
        let step_type = step_type.into();
        let summary = violations
            .iter()
            .map(|v| {
                if v.instance_path.is_empty() {
                    v.message.clone()
                } else {
                    format!("{}: {}", v.instance_path, v.message)
                }
            })
            .collect::<Vec<_>>()
            .join("; ");
        let message = format!("invalid {} config: {}", step_type, summary);
        let details = to_details(SchemaViolationDetails {
            step_type,
            violations,
        });

        let mut err = Self::new(ErrorCode::ConfigSchemaViolation, message, details);
        err.retryable = Some(false);
        err
    }

    /// Schema-valid configuration that still could not be decoded into the
    /// step's typed configuration.
    pub fn config_decode_failed(step_type: impl Into<String>, err: impl std::fmt::Display) -> Self {
        let step_type = step_type.into();
        let message = format!("could not convert config into {} config: {}", step_type, err);
        let details = to_details(DecodeFailedDetails {
            step_type,
            error: err.to_string(),
        });

        let mut err = Self::new(ErrorCode::ConfigDecodeFailed, message, details);
        err.retryable = Some(false);
        err
    }

    pub fn step_not_found(step_type: impl Into<String>, registered: Vec<String>) -> Self {
        let step_type = step_type.into();
        let message = format!("no runner registered for step type '{}'", step_type);
        Self::new(
            ErrorCode::StepNotFound,
            message,
            to_details(StepNotFoundDetails {
                step_type,
                registered,
            }),
        )
        .with_hint("Run 'promoter steps' to see registered step types")
    }

    pub fn step_already_registered(step_type: impl Into<String>) -> Self {
        let step_type = step_type.into();
        Self::new(
            ErrorCode::StepAlreadyRegistered,
            format!("step type '{}' is already registered", step_type),
            serde_json::json!({ "stepType": step_type }),
        )
    }

    pub fn state_alias_exists(alias: impl Into<String>) -> Self {
        let alias = alias.into();
        Self::new(
            ErrorCode::StateAliasExists,
            format!("shared state already holds output for alias '{}'", alias),
            to_details(StateDetails {
                alias,
                field: None,
                expected: None,
                found: None,
            }),
        )
    }

    /// A previous step's output does not have the shape the reader expects.
    pub fn state_type_mismatch(
        alias: impl Into<String>,
        field: Option<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        let alias = alias.into();
        let expected = expected.into();
        let found = found.into();
        let message = match &field {
            Some(field) => format!(
                "field '{}' in output from step with alias '{}' is {}, expected {}",
                field, alias, found, expected
            ),
            None => format!(
                "output from step with alias '{}' is {}, expected {}",
                alias, found, expected
            ),
        };

        let mut err = Self::new(
            ErrorCode::StateTypeMismatch,
            message,
            to_details(StateDetails {
                alias,
                field,
                expected: Some(expected),
                found: Some(found),
            }),
        );
        err.retryable = Some(false);
        err
    }

    pub fn sandbox_path_escape(root: impl Into<String>, path: impl Into<String>) -> Self {
        let root = root.into();
        let path = path.into();
        let message = format!("path '{}' escapes sandbox root '{}'", path, root);

        let mut err = Self::new(
            ErrorCode::SandboxPathEscape,
            message,
            to_details(PathEscapeDetails { root, path }),
        )
        .with_hint("Configured paths must stay inside the pipeline working directory");
        err.retryable = Some(false);
        err
    }

    pub fn run_cancelled(context: impl Into<String>) -> Self {
        let context = context.into();
        Self::new(
            ErrorCode::RunCancelled,
            format!("run cancelled during {}", context),
            serde_json::json!({ "context": context }),
        )
    }

    pub fn git_command_failed(
        operation: impl Into<String>,
        path: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        let operation = operation.into();
        let error = error.into();
        let message = format!("{} failed: {}", operation, error);
        Self::new(
            ErrorCode::GitCommandFailed,
            message,
            to_details(GitCommandFailedDetails {
                operation,
                path,
                error,
            }),
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let error = error.into();
        let message = match &context {
            Some(ctx) => format!("IO error ({}): {}", ctx, error),
            None => format!("IO error: {}", error),
        };
        Self::new(
            ErrorCode::InternalIoError,
            message,
            to_details(InternalIoErrorDetails { error, context }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let error = error.into();
        let message = format!("JSON error: {}", error);
        Self::new(
            ErrorCode::InternalJsonError,
            message,
            to_details(InternalJsonErrorDetails { error, context }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        let error = error.into();
        Self::new(
            ErrorCode::InternalUnexpected,
            format!("Unexpected error: {}", error),
            serde_json::json!({ "error": error }),
        )
    }

    /// Prefix the message with the operation that failed, keeping code and details.
    pub fn with_context(mut self, operation: impl std::fmt::Display) -> Self {
        self.message = format!("{}: {}", operation, self.message);
        self
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_violation_lists_every_path() {
        let err = Error::config_schema_violation(
            "git-commit",
            vec![
                SchemaViolation {
                    instance_path: String::new(),
                    message: "\"path\" is a required property".to_string(),
                },
                SchemaViolation {
                    instance_path: "/message".to_string(),
                    message: "42 is not of type \"string\"".to_string(),
                },
            ],
        );

        assert_eq!(err.code, ErrorCode::ConfigSchemaViolation);
        assert_eq!(err.kind(), ErrorKind::ConfigurationInvalid);
        assert!(err.message.contains("required property"));
        assert!(err.message.contains("/message: 42"));
        assert_eq!(err.details["violations"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn schema_and_decode_failures_have_distinct_codes() {
        let schema = Error::config_schema_violation("x", Vec::new());
        let decode = Error::config_decode_failed("x", "invalid type");
        assert_ne!(schema.code, decode.code);
        assert_eq!(schema.kind(), decode.kind());
    }

    #[test]
    fn type_mismatch_names_alias_and_field() {
        let err = Error::state_type_mismatch(
            "update",
            Some("commitMessage".to_string()),
            "a string",
            "a number",
        );
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(err.message.contains("'update'"));
        assert!(err.message.contains("'commitMessage'"));
        assert_eq!(err.details["alias"], "update");
    }

    #[test]
    fn path_escape_is_never_retryable() {
        let err = Error::sandbox_path_escape("/work", "../etc");
        assert_eq!(err.kind(), ErrorKind::PathEscape);
        assert_eq!(err.retryable, Some(false));
        assert!(!err.hints.is_empty());
    }

    #[test]
    fn with_context_prefixes_message_only() {
        let err = Error::git_command_failed("git commit", None, "nothing added")
            .with_context("error committing");
        assert_eq!(err.code, ErrorCode::GitCommandFailed);
        assert!(err.message.starts_with("error committing: git commit failed"));
    }
}
