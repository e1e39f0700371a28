use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

use super::context::StepContext;

/// Terminal outcome of one step invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Errored,
}

/// What a runner hands back to the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub status: StepStatus,
    /// Merged into shared state under the step's alias when the step succeeded.
    pub output: Option<Value>,
}

impl StepResult {
    pub fn succeeded(output: Option<Value>) -> Self {
        Self {
            status: StepStatus::Succeeded,
            output,
        }
    }

    pub fn errored() -> Self {
        Self {
            status: StepStatus::Errored,
            output: None,
        }
    }
}

/// One step type.
///
/// The driver validates the raw config against the registered schema before
/// calling `run`. Runners decode their typed config first thing (see
/// [`StepContext::decode_config`]) and return `Err` for any failure; the
/// driver turns that into an Errored result and halts the run.
pub trait StepRunner: Send + Sync {
    /// Registered type name; unique across the registry.
    fn name(&self) -> &str;

    fn run(&self, ctx: &StepContext<'_>) -> Result<StepResult>;
}
