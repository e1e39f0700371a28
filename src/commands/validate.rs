use clap::Args;

use promoter::defaults;
use promoter::engine::{self, PipelinePlan, RunContext};

use super::CmdResult;

#[derive(Args)]
pub struct ValidateArgs {
    /// Pipeline definition (JSON, or YAML with a .yaml/.yml extension)
    pub file: String,

    /// Prefix for aliases of steps that don't name one (overrides config)
    #[arg(long, value_name = "PREFIX")]
    pub alias_prefix: Option<String>,
}

pub fn run(args: ValidateArgs, global: &crate::commands::GlobalArgs) -> CmdResult<PipelinePlan> {
    let config = global.load_config()?;
    let steps = engine::load_steps(&defaults::expand_path(&args.file))?;
    let registry = super::install_registry(&config)?;

    let prefix = args
        .alias_prefix
        .unwrap_or_else(|| config.defaults.pipeline.alias_prefix.clone());
    // Nothing runs, so the working directory is irrelevant.
    let ctx = RunContext::new(".").with_alias_prefix(prefix);

    let plan = engine::plan(&steps, registry, &ctx)?;
    let exit_code = if plan.is_ready() { 0 } else { 2 };
    Ok((plan, exit_code))
}
