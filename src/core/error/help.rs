use super::{codes, ErrorCode, Hint};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorHelpSummary {
    pub code: String,
    pub summary: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorHelp {
    pub code: String,
    pub summary: String,
    pub details_schema: serde_json::Value,
    pub hints: Vec<Hint>,
}

pub fn list() -> Vec<ErrorHelpSummary> {
    codes::all_codes()
        .iter()
        .copied()
        .map(|code| {
            let help = explain(code);
            ErrorHelpSummary {
                code: help.code,
                summary: help.summary,
            }
        })
        .collect()
}

fn help(
    code: ErrorCode,
    summary: &str,
    details_schema: serde_json::Value,
    hint: &str,
) -> ErrorHelp {
    ErrorHelp {
        code: code.as_str().to_string(),
        summary: summary.to_string(),
        details_schema,
        hints: vec![Hint {
            message: hint.to_string(),
        }],
    }
}

pub fn explain(code: ErrorCode) -> ErrorHelp {
    use serde_json::json;

    match code {
        ErrorCode::ConfigInvalidJson => help(
            code,
            "Configuration or pipeline file could not be parsed",
            json!({"path":"string","error":"string"}),
            "Fix the JSON/YAML syntax in the referenced file",
        ),
        ErrorCode::ConfigInvalidValue => help(
            code,
            "Configuration value is invalid",
            json!({"key":"string","value":"string?","problem":"string"}),
            "Correct the config value to match the expected type/format",
        ),
        ErrorCode::ConfigSchemaViolation => help(
            code,
            "Step configuration does not match the step type's schema",
            json!({"stepType":"string","violations":"{instancePath,message}[]"}),
            "Run 'promoter steps' to see the schema for each step type",
        ),
        ErrorCode::ConfigDecodeFailed => help(
            code,
            "Step configuration could not be converted into the step's typed config",
            json!({"stepType":"string","error":"string"}),
            "Check field types in the step config against the step's schema",
        ),
        ErrorCode::ValidationInvalidArgument => help(
            code,
            "Invalid argument or pipeline definition",
            json!({"field":"string","problem":"string","id":"string?","tried":"string[]?"}),
            "Verify the argument value and try again",
        ),
        ErrorCode::StepNotFound => help(
            code,
            "No runner is registered for the step type",
            json!({"stepType":"string","registered":"string[]"}),
            "Run 'promoter steps' and verify the step type name",
        ),
        ErrorCode::StepAlreadyRegistered => help(
            code,
            "A step type name was registered twice",
            json!({"stepType":"string"}),
            "Give each step runner a unique name",
        ),
        ErrorCode::StateAliasExists => help(
            code,
            "A step alias already has output in the shared state",
            json!({"alias":"string"}),
            "Give every step in a pipeline a unique alias",
        ),
        ErrorCode::StateTypeMismatch => help(
            code,
            "A previous step's output has an unexpected shape",
            json!({"alias":"string","field":"string?","expected":"string","found":"string"}),
            "Check the output of the referenced step",
        ),
        ErrorCode::SandboxPathEscape => help(
            code,
            "A configured path resolves outside the working directory",
            json!({"root":"string","path":"string"}),
            "Use a relative path that stays inside the working directory",
        ),
        ErrorCode::RunCancelled => help(
            code,
            "The pipeline run was cancelled",
            json!({"context":"string"}),
            "Re-run the pipeline; completed steps are safe to run again",
        ),
        ErrorCode::GitCommandFailed => help(
            code,
            "A git operation on the working tree failed",
            json!({"operation":"string","path":"string?","error":"string"}),
            "Inspect error.details for the underlying git output",
        ),
        ErrorCode::InternalIoError => help(
            code,
            "Filesystem or process IO failed",
            json!({"error":"string","context":"string?"}),
            "Check file permissions and that required binaries are installed",
        ),
        ErrorCode::InternalJsonError => help(
            code,
            "Internal JSON serialization failed",
            json!({"error":"string","context":"string?"}),
            "Report a bug with the failing command",
        ),
        ErrorCode::InternalUnexpected => help(
            code,
            "Unexpected internal error",
            json!({"error":"string"}),
            "Report a bug with the failing command",
        ),
    }
}
