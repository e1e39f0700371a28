//! Generic step pipeline execution infrastructure.
//!
//! - `registry` - Step type name -> runner + compiled config schema
//! - `validation` - Schema validation and strict decoding of step configs
//! - `state` - Write-once shared state keyed by step alias
//! - `context` - Per-step execution context and the run template
//! - `runner` - The capability every step type implements
//! - `pipeline` - Sequential driver with halt-on-error semantics
//!
//! Concrete step types live in `crate::steps`.

pub mod context;
pub mod pipeline;
pub mod registry;
pub mod runner;
pub mod state;
pub mod validation;

pub use context::{RunContext, StepContext};
pub use pipeline::{
    load_steps, plan, resolve_aliases, run, PipelinePlan, PipelinePlanStatus, PipelinePlanStep,
    PipelineRunResult, PipelineRunStatus, PipelineRunSummary, PipelineStep, PipelineStepResult,
};
pub use registry::{RegistryEntry, StepRegistry};
pub use runner::{StepResult, StepRunner, StepStatus};
pub use state::SharedState;
