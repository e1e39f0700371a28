use promoter::defaults::{self, PromoterConfig};
use promoter::engine::StepRegistry;

pub type CmdResult<T> = promoter::Result<(T, i32)>;

pub(crate) struct GlobalArgs {
    pub config: Option<String>,
}

impl GlobalArgs {
    pub fn load_config(&self) -> promoter::Result<PromoterConfig> {
        let path = self.config.as_deref().map(defaults::expand_path);
        defaults::load_config(path.as_deref())
    }
}

/// Build the built-in registry from config and freeze it for the process.
pub(crate) fn install_registry(config: &PromoterConfig) -> promoter::Result<&'static StepRegistry> {
    promoter::steps::builtin_registry(config)?.install()
}

pub mod errors;
pub mod run;
pub mod steps;
pub mod validate;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run_json($args))
    };
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (promoter::Result<serde_json::Value>, i32) {
    crate::tty::status("promoter is working...");

    match command {
        // Commands without global context
        crate::Commands::Errors(args) => dispatch!(args, errors),

        // Commands with global context
        crate::Commands::Run(args) => dispatch!(args, global, run),
        crate::Commands::Validate(args) => dispatch!(args, global, validate),
        crate::Commands::Steps(args) => dispatch!(args, global, steps),
    }
}
