use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;
mod tty;

use commands::{errors, run, steps, validate};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "promoter")]
#[command(version = VERSION)]
#[command(about = "Run promotion step pipelines against a working directory")]
struct Cli {
    /// Path to promoter.json (defaults to ~/.config/promoter/promoter.json)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline definition
    Run(run::RunArgs),
    /// Check a pipeline definition without running it
    Validate(validate::ValidateArgs),
    /// List registered step types and their config schemas
    Steps(steps::StepsArgs),
    /// List error codes or explain one
    Errors(errors::ErrorsArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let global = GlobalArgs {
        config: cli.config.clone(),
    };

    let (json_result, exit_code) = commands::run_json(cli.command, &global);
    // Nothing useful can be reported if stdout itself is gone.
    let _ = output::print_json_result(json_result);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
