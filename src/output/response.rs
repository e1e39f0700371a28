//! The JSON document every `promoter` command prints on stdout.
//!
//! A command either succeeds with `{"success": true, "data": ...}` or fails
//! with `{"success": false, "error": {...}}`, where `error` mirrors the coded
//! [`Error`]. The process exit code is picked from the error's code, so
//! scripts can branch on it without parsing the body:
//!
//! | exit | meaning |
//! |---|---|
//! | 0 | command succeeded |
//! | 1 | internal failure, or a `run` that halted on an Errored step |
//! | 2 | bad input (config, pipeline file, step config), or a `validate` plan that is not ready |
//! | 3 | a configured path, or the repository owning it, lies outside the working directory |
//! | 4 | unknown or doubly registered step type |
//! | 5 | shared state rejected a write or held output of the wrong shape |
//! | 20 | a `git` invocation failed |
//! | 130 | the run was cancelled (Ctrl-C) |

use promoter::error::Hint;
use promoter::{Error, ErrorCode, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CliResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CliError>,
}

/// Wire form of [`Error`]: the dotted code string instead of the enum.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Hint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl From<&Error> for CliError {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code.as_str().to_string(),
            message: err.message.clone(),
            details: err.details.clone(),
            hints: err.hints.clone(),
            retryable: err.retryable,
        }
    }
}

impl<T: Serialize> CliResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl CliResponse<()> {
    pub fn from_error(err: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(CliError::from(err)),
        }
    }
}

fn write_stdout<T: Serialize>(response: &CliResponse<T>) -> Result<()> {
    use std::io::{self, Write};

    let payload = serde_json::to_string_pretty(response).map_err(|e| {
        Error::internal_json(e.to_string(), Some("serialize response".to_string()))
    })?;

    let mut out = io::stdout().lock();
    match writeln!(out, "{}", payload) {
        // Reader went away (`promoter run ... | head`).
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(e) => Err(Error::internal_io(e.to_string(), Some("write stdout".to_string()))),
        Ok(()) => Ok(()),
    }
}

/// Serialize a command's data, keeping the exit code it chose; errors take
/// the exit code of their class.
pub fn map_cmd_result_to_json<T: Serialize>(
    result: Result<(T, i32)>,
) -> (Result<serde_json::Value>, i32) {
    let (data, exit_code) = match result {
        Ok(ok) => ok,
        Err(err) => {
            let exit_code = exit_code_for_error(err.code);
            return (Err(err), exit_code);
        }
    };

    match serde_json::to_value(data) {
        Ok(value) => (Ok(value), exit_code),
        Err(err) => (
            Err(Error::internal_json(
                err.to_string(),
                Some("serialize response".to_string()),
            )),
            1,
        ),
    }
}

fn exit_code_for_error(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ConfigInvalidJson
        | ErrorCode::ConfigInvalidValue
        | ErrorCode::ConfigSchemaViolation
        | ErrorCode::ConfigDecodeFailed
        | ErrorCode::ValidationInvalidArgument => 2,

        ErrorCode::SandboxPathEscape => 3,

        ErrorCode::StepNotFound | ErrorCode::StepAlreadyRegistered => 4,

        ErrorCode::StateAliasExists | ErrorCode::StateTypeMismatch => 5,

        ErrorCode::GitCommandFailed => 20,

        ErrorCode::RunCancelled => 130,

        ErrorCode::InternalIoError
        | ErrorCode::InternalJsonError
        | ErrorCode::InternalUnexpected => 1,
    }
}

/// Print the envelope for a command's outcome.
pub fn print_json_result(result: Result<serde_json::Value>) -> Result<()> {
    match result {
        Ok(data) => write_stdout(&CliResponse::success(data)),
        Err(err) => write_stdout(&CliResponse::<()>::from_error(&err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_carries_code_and_hints() {
        let err = Error::sandbox_path_escape("/work", "../x");
        let value = serde_json::to_value(CliResponse::<()>::from_error(&err)).unwrap();

        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "sandbox.path_escape");
        assert_eq!(value["error"]["retryable"], false);
        assert!(value["error"]["hints"].as_array().is_some());
        assert!(value.get("data").is_none());
    }

    #[test]
    fn hintless_error_omits_hints() {
        let err = Error::internal_unexpected("boom");
        let value = serde_json::to_value(CliResponse::<()>::from_error(&err)).unwrap();
        assert!(value["error"].get("hints").is_none());
    }

    #[test]
    fn exit_codes_follow_error_class() {
        let (_, code) = map_cmd_result_to_json::<()>(Err(Error::run_cancelled("step start")));
        assert_eq!(code, 130);

        let (_, code) = map_cmd_result_to_json::<()>(Err(Error::step_not_found("x", vec![])));
        assert_eq!(code, 4);

        let escape = Error::sandbox_path_escape("/work", "/outer");
        let (_, code) = map_cmd_result_to_json::<()>(Err(escape));
        assert_eq!(code, 3);

        let mismatch = Error::state_type_mismatch("a", None, "an object", "an array");
        let (_, code) = map_cmd_result_to_json::<()>(Err(mismatch));
        assert_eq!(code, 5);

        let (value, code) = map_cmd_result_to_json(Ok((serde_json::json!({"ok": true}), 1)));
        assert_eq!(code, 1);
        assert_eq!(value.unwrap()["ok"], true);
    }
}
