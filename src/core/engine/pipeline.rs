use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Error, ErrorCode, Hint, Result};

use super::context::{RunContext, StepContext};
use super::registry::StepRegistry;
use super::runner::{StepResult, StepStatus};
use super::state::SharedState;
use super::validation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    /// Shared-state key for this step's output. Defaults to `{prefix}-{index}`.
    #[serde(default, alias = "as", skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
}

impl PipelineStep {
    pub fn new(step_type: impl Into<String>) -> Self {
        Self {
            alias: None,
            step_type: step_type.into(),
            config: Map::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        if let Value::Object(map) = config {
            self.config = map;
        }
        self
    }
}

/// Pipeline file body: either `{"steps": [...]}` or a bare step list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PipelineDefinition {
    Wrapped { steps: Vec<PipelineStep> },
    Bare(Vec<PipelineStep>),
}

impl PipelineDefinition {
    fn into_steps(self) -> Vec<PipelineStep> {
        match self {
            PipelineDefinition::Wrapped { steps } | PipelineDefinition::Bare(steps) => steps,
        }
    }
}

/// Read a pipeline definition. `.yaml`/`.yml` files are YAML, anything else JSON.
pub fn load_steps(path: &Path) -> Result<Vec<PipelineStep>> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );

    let definition: PipelineDefinition = if is_yaml {
        serde_yml::from_str(&content)
            .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))?
    } else {
        serde_json::from_str(&content)
            .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))?
    };

    Ok(definition.into_steps())
}

/// Resolve every step's alias and reject duplicates.
pub fn resolve_aliases(steps: &[PipelineStep], prefix: &str) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut aliases = Vec::with_capacity(steps.len());

    for (idx, step) in steps.iter().enumerate() {
        let alias = match step.alias.as_deref() {
            Some(alias) if !alias.is_empty() => alias.to_string(),
            _ => format!("{}-{}", prefix, idx),
        };
        if !seen.insert(alias.clone()) {
            return Err(Error::validation_invalid_argument(
                "steps",
                format!("Duplicate step alias '{}'", alias),
                None,
                None,
            ));
        }
        aliases.push(alias);
    }

    Ok(aliases)
}

// =============================================================================
// Plan
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelinePlan {
    pub steps: Vec<PipelinePlanStep>,
}

impl PipelinePlan {
    pub fn is_ready(&self) -> bool {
        self.steps
            .iter()
            .all(|step| step.status == PipelinePlanStatus::Ready)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelinePlanStep {
    pub alias: String,
    #[serde(rename = "type")]
    pub step_type: String,
    pub status: PipelinePlanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePlanStatus {
    Ready,
    /// No runner is registered for the step type.
    Missing,
    /// The configuration fails the step type's schema.
    Invalid,
}

/// Pre-flight check: resolve aliases, look up every step type and validate
/// every configuration against its schema. Nothing is executed.
pub fn plan(
    steps: &[PipelineStep],
    registry: &StepRegistry,
    ctx: &RunContext,
) -> Result<PipelinePlan> {
    let aliases = resolve_aliases(steps, &ctx.alias_prefix)?;

    let planned = steps
        .iter()
        .zip(aliases)
        .map(|(step, alias)| {
            let (status, err) = match registry.lookup(&step.step_type) {
                Err(err) => (PipelinePlanStatus::Missing, Some(err)),
                Ok(entry) => {
                    let config = Value::Object(step.config.clone());
                    match validation::validate(&step.step_type, entry.validator(), &config) {
                        Ok(()) => (PipelinePlanStatus::Ready, None),
                        Err(err) => (PipelinePlanStatus::Invalid, Some(err)),
                    }
                }
            };
            PipelinePlanStep {
                alias,
                step_type: step.step_type.clone(),
                status,
                error: err.as_ref().map(|e| e.message.clone()),
                details: err.map(|e| e.details),
            }
        })
        .collect();

    Ok(PipelinePlan { steps: planned })
}

// =============================================================================
// Run
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStepResult {
    pub alias: String,
    #[serde(rename = "type")]
    pub step_type: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Hint>,
}

impl PipelineStepResult {
    fn succeeded(alias: &str, step_type: &str, output: Option<Value>) -> Self {
        Self {
            alias: alias.to_string(),
            step_type: step_type.to_string(),
            status: StepStatus::Succeeded,
            output,
            error: None,
            error_code: None,
            hints: Vec::new(),
        }
    }

    fn errored(alias: &str, step_type: &str, err: Error) -> Self {
        let err = err.with_context(format!("step '{}' ({})", alias, step_type));
        Self {
            alias: alias.to_string(),
            step_type: step_type.to_string(),
            status: StepStatus::Errored,
            output: None,
            error: Some(err.message),
            error_code: Some(err.code.as_str().to_string()),
            hints: err.hints,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineRunStatus {
    Succeeded,
    Errored,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRunSummary {
    pub total_steps: usize,
    pub succeeded: usize,
    pub errored: usize,
    /// Steps after the halting step; they have no result.
    pub not_run: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRunResult {
    pub run_id: Uuid,
    pub status: PipelineRunStatus,
    pub steps: Vec<PipelineStepResult>,
    pub summary: PipelineRunSummary,
    /// Shared state as it stood when the run ended.
    pub state: SharedState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineRunResult {
    pub fn succeeded(&self) -> bool {
        self.status == PipelineRunStatus::Succeeded
    }

    /// The step that halted the run, if any.
    pub fn failed_step(&self) -> Option<&PipelineStepResult> {
        self.steps
            .iter()
            .find(|step| step.status == StepStatus::Errored)
    }
}

/// Execute `steps` in order against one working directory and a fresh
/// shared state, halting at the first Errored step.
///
/// Returns `Err` only when the step list itself is unusable (duplicate
/// aliases). Every per-step failure is reported in the result.
pub fn run(
    steps: &[PipelineStep],
    registry: &StepRegistry,
    ctx: &RunContext,
) -> Result<PipelineRunResult> {
    let aliases = resolve_aliases(steps, &ctx.alias_prefix)?;
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();

    log_status!(
        "pipeline",
        "Run {} started: {} step(s) in {}",
        run_id,
        steps.len(),
        ctx.work_dir.display()
    );

    let mut state = SharedState::new();
    let mut results = Vec::with_capacity(steps.len());

    for (step, alias) in steps.iter().zip(aliases.iter()) {
        log_status!("pipeline", "Running '{}' ({})", alias, step.step_type);

        let outcome = execute_step(step, alias, registry, &state, ctx).and_then(|result| {
            if result.status == StepStatus::Succeeded {
                if let Some(output) = &result.output {
                    state.merge(alias, output.clone())?;
                }
            }
            Ok(result)
        });

        let step_result = match outcome {
            Ok(result) if result.status == StepStatus::Succeeded => {
                PipelineStepResult::succeeded(alias, &step.step_type, result.output)
            }
            Ok(_) => PipelineStepResult::errored(
                alias,
                &step.step_type,
                Error::internal_unexpected("step reported Errored without an error"),
            ),
            Err(err) => PipelineStepResult::errored(alias, &step.step_type, err),
        };

        let halted = step_result.status == StepStatus::Errored;
        if halted {
            log_status!(
                "pipeline",
                "Halted at '{}': {}",
                alias,
                step_result.error.as_deref().unwrap_or("errored")
            );
        }
        results.push(step_result);
        if halted {
            break;
        }
    }

    let status = if results.iter().any(|r| r.status == StepStatus::Errored) {
        PipelineRunStatus::Errored
    } else {
        PipelineRunStatus::Succeeded
    };
    let summary = build_summary(steps.len(), &results, status);

    log_status!(
        "pipeline",
        "Run {} finished: {} succeeded, {} errored, {} not run",
        run_id,
        summary.succeeded,
        summary.errored,
        summary.not_run
    );

    Ok(PipelineRunResult {
        run_id,
        status,
        steps: results,
        summary,
        state,
        started_at,
        finished_at: Utc::now(),
    })
}

fn execute_step(
    step: &PipelineStep,
    alias: &str,
    registry: &StepRegistry,
    state: &SharedState,
    ctx: &RunContext,
) -> Result<StepResult> {
    if ctx.cancel.is_cancelled() {
        return Err(Error::run_cancelled("step start"));
    }

    let entry = registry.lookup(&step.step_type)?;
    let config = Value::Object(step.config.clone());
    validation::validate(&step.step_type, entry.validator(), &config)?;

    let step_ctx = StepContext {
        alias,
        step_type: &step.step_type,
        work_dir: &ctx.work_dir,
        state,
        config: &config,
        cancel: &ctx.cancel,
    };
    let result = entry.runner().run(&step_ctx)?;

    // A step that finished while the run was being cancelled does not count.
    if ctx.cancel.is_cancelled() {
        return Err(Error::run_cancelled("step execution"));
    }

    Ok(result)
}

fn build_summary(
    total_steps: usize,
    results: &[PipelineStepResult],
    status: PipelineRunStatus,
) -> PipelineRunSummary {
    let succeeded = results
        .iter()
        .filter(|r| r.status == StepStatus::Succeeded)
        .count();
    let errored = results
        .iter()
        .filter(|r| r.status == StepStatus::Errored)
        .count();

    let cancelled = results
        .iter()
        .any(|r| r.error_code.as_deref() == Some(ErrorCode::RunCancelled.as_str()));

    let next_actions = match status {
        PipelineRunStatus::Errored if cancelled => {
            vec!["Run was cancelled; re-run the pipeline to finish the remaining steps".to_string()]
        }
        PipelineRunStatus::Errored => vec![
            "Fix the failing step and re-run; steps that already succeeded must be idempotent"
                .to_string(),
        ],
        PipelineRunStatus::Succeeded => Vec::new(),
    };

    PipelineRunSummary {
        total_steps,
        succeeded,
        errored,
        not_run: total_steps - results.len(),
        next_actions,
    }
}
