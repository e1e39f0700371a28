use clap::Args;
use serde::Serialize;

use promoter::error::help::{self, ErrorHelp, ErrorHelpSummary};
use promoter::error::parse_code;
use promoter::Error;

use super::CmdResult;

#[derive(Args)]
pub struct ErrorsArgs {
    /// Error code to explain (e.g. sandbox.path_escape)
    pub code: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum ErrorsOutput {
    List(Vec<ErrorHelpSummary>),
    Explain(ErrorHelp),
}

pub fn run_json(args: ErrorsArgs) -> CmdResult<ErrorsOutput> {
    match args.code.as_deref() {
        None => Ok((ErrorsOutput::List(help::list()), 0)),
        Some(raw) => {
            let code = parse_code(raw).ok_or_else(|| {
                Error::validation_invalid_argument(
                    "code",
                    format!("Unknown error code '{}'", raw),
                    Some(raw.to_string()),
                    None,
                )
                .with_hint("Run 'promoter errors' to list every code")
            })?;
            Ok((ErrorsOutput::Explain(help::explain(code)), 0))
        }
    }
}
