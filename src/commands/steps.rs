use clap::Args;
use serde::Serialize;

use super::CmdResult;

#[derive(Args)]
pub struct StepsArgs {
    /// Show a single step type
    pub step_type: Option<String>,
}

#[derive(Serialize)]
pub struct StepTypeOutput {
    #[serde(rename = "type")]
    pub step_type: String,
    pub schema: serde_json::Value,
}

pub fn run(
    args: StepsArgs,
    global: &crate::commands::GlobalArgs,
) -> CmdResult<Vec<StepTypeOutput>> {
    let config = global.load_config()?;
    let registry = super::install_registry(&config)?;

    let output = match args.step_type.as_deref() {
        Some(step_type) => {
            let entry = registry.lookup(step_type)?;
            vec![StepTypeOutput {
                step_type: step_type.to_string(),
                schema: entry.schema().clone(),
            }]
        }
        None => registry
            .entries()
            .map(|(name, entry)| StepTypeOutput {
                step_type: name.to_string(),
                schema: entry.schema().clone(),
            })
            .collect(),
    };

    Ok((output, 0))
}
