use clap::Args;

use promoter::defaults;
use promoter::engine::{self, PipelineRunResult, RunContext};
use promoter::utils::cancel::CancellationToken;
use promoter::Error;

use super::CmdResult;

#[derive(Args)]
pub struct RunArgs {
    /// Pipeline definition (JSON, or YAML with a .yaml/.yml extension)
    pub file: String,

    /// Working directory every step is sandboxed to
    #[arg(long, short = 'w', value_name = "DIR", default_value = ".")]
    pub work_dir: String,

    /// Prefix for aliases of steps that don't name one (overrides config)
    #[arg(long, value_name = "PREFIX")]
    pub alias_prefix: Option<String>,
}

pub fn run(args: RunArgs, global: &crate::commands::GlobalArgs) -> CmdResult<PipelineRunResult> {
    let config = global.load_config()?;
    let steps = engine::load_steps(&defaults::expand_path(&args.file))?;
    let registry = super::install_registry(&config)?;

    let work_dir = defaults::expand_path(&args.work_dir);
    if !work_dir.is_dir() {
        return Err(Error::validation_invalid_argument(
            "work_dir",
            format!("'{}' is not a directory", work_dir.display()),
            None,
            None,
        ));
    }

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .map_err(|e| Error::internal_unexpected(format!("install Ctrl-C handler: {}", e)))?;

    let prefix = args
        .alias_prefix
        .unwrap_or_else(|| config.defaults.pipeline.alias_prefix.clone());
    let ctx = RunContext::new(work_dir)
        .with_cancel(cancel)
        .with_alias_prefix(prefix);

    let result = engine::run(&steps, registry, &ctx)?;
    let exit_code = if result.succeeded() { 0 } else { 1 };
    Ok((result, exit_code))
}
