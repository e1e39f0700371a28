use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;
use crate::utils::cancel::CancellationToken;

use super::state::SharedState;
use super::validation;

pub const DEFAULT_ALIAS_PREFIX: &str = "step";

/// Per-run template the driver builds every step context from.
///
/// Concurrent runs must each get their own `work_dir`.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub work_dir: PathBuf,
    pub cancel: CancellationToken,
    /// Prefix for aliases of steps that don't name one (`step-0`, `step-1`, ...).
    pub alias_prefix: String,
}

impl RunContext {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            cancel: CancellationToken::new(),
            alias_prefix: DEFAULT_ALIAS_PREFIX.to_string(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_alias_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.alias_prefix = prefix.into();
        self
    }
}

/// Everything one step invocation may see. Borrowed from the driver for the
/// duration of the call; shared state is read-only here.
#[derive(Debug)]
pub struct StepContext<'a> {
    pub alias: &'a str,
    pub step_type: &'a str,
    pub work_dir: &'a Path,
    pub state: &'a SharedState,
    /// Raw config, already checked against the step type's schema.
    pub config: &'a Value,
    pub cancel: &'a CancellationToken,
}

impl StepContext<'_> {
    /// Decode the validated config into the step's typed representation.
    pub fn decode_config<T: DeserializeOwned>(&self) -> Result<T> {
        validation::decode(self.step_type, self.config)
    }
}
