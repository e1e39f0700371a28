//! Built-in step types.

mod git_commit;

pub use git_commit::{build_commit_message, GitCommitConfig, GitCommitter, GIT_COMMIT_SCHEMA};

use std::sync::Arc;

use serde_json::Value;

use crate::defaults::PromoterConfig;
use crate::engine::StepRegistry;
use crate::error::{Error, Result};
use crate::git::{GitCli, WorkTreeLoader};

/// Registry holding every built-in step type, wired to the `git` CLI.
pub fn builtin_registry(config: &PromoterConfig) -> Result<StepRegistry> {
    let loader: Arc<dyn WorkTreeLoader> = Arc::new(GitCli::new(config.defaults.git.identity()));
    registry_with_loader(loader)
}

/// Same as [`builtin_registry`] with a caller-supplied working-tree loader.
pub fn registry_with_loader(loader: Arc<dyn WorkTreeLoader>) -> Result<StepRegistry> {
    let mut registry = StepRegistry::new();
    registry.register(
        Arc::new(GitCommitter::new(loader)),
        parse_schema("git-commit", GIT_COMMIT_SCHEMA)?,
    )?;
    Ok(registry)
}

fn parse_schema(step_type: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|e| {
        Error::internal_json(e.to_string(), Some(format!("parse {} schema", step_type)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_git_commit() {
        let registry = builtin_registry(&PromoterConfig::default()).unwrap();
        assert_eq!(registry.step_types(), vec!["git-commit".to_string()]);
        assert_eq!(
            registry.lookup("git-commit").unwrap().schema()["required"],
            serde_json::json!(["path"])
        );
    }
}
