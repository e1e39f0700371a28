use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::context::DEFAULT_ALIAS_PREFIX;
use crate::error::{Error, Result};
use crate::git::GitUser;

pub const CONFIG_FILE: &str = "promoter.json";
pub const ENV_GIT_AUTHOR_NAME: &str = "PROMOTER_GIT_AUTHOR_NAME";
pub const ENV_GIT_AUTHOR_EMAIL: &str = "PROMOTER_GIT_AUTHOR_EMAIL";

/// Root configuration structure for promoter.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromoterConfig {
    #[serde(default)]
    pub defaults: Defaults,
}

/// All configurable defaults that can be overridden via promoter.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Defaults {
    #[serde(default)]
    pub git: GitDefaults,

    #[serde(default)]
    pub pipeline: PipelineDefaults,
}

/// Identity used for commits that carry no author override
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GitDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
}

impl GitDefaults {
    pub fn identity(&self) -> GitUser {
        GitUser {
            name: self.author_name.clone(),
            email: self.author_email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDefaults {
    #[serde(default = "default_alias_prefix")]
    pub alias_prefix: String,
}

impl Default for PipelineDefaults {
    fn default() -> Self {
        Self {
            alias_prefix: default_alias_prefix(),
        }
    }
}

fn default_alias_prefix() -> String {
    DEFAULT_ALIAS_PREFIX.to_string()
}

// =============================================================================
// Loading functions
// =============================================================================

/// Global promoter config directory (~/.config/promoter/)
pub fn config_dir() -> Result<PathBuf> {
    let home = env::var("HOME").map_err(|_| {
        Error::internal_unexpected("HOME environment variable not set".to_string())
    })?;
    Ok(PathBuf::from(home).join(".config").join("promoter"))
}

/// Get the path to the global promoter.json
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Load configuration and apply environment overrides.
///
/// An explicit `path` must exist and parse. Without one, the global
/// promoter.json is used when present; if it is missing or invalid, built-in
/// defaults are used instead.
pub fn load_config(path: Option<&Path>) -> Result<PromoterConfig> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => config_path()
            .ok()
            .filter(|p| p.exists())
            .and_then(|p| read_config(&p).ok())
            .unwrap_or_default(),
    };
    apply_env_overrides(&mut config, |key| env::var(key).ok());
    Ok(config)
}

fn read_config(path: &Path) -> Result<PromoterConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))
}

/// Environment wins over file values. Empty variables are ignored.
pub fn apply_env_overrides(config: &mut PromoterConfig, lookup: impl Fn(&str) -> Option<String>) {
    let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(name) = var(ENV_GIT_AUTHOR_NAME) {
        config.defaults.git.author_name = Some(name);
    }
    if let Some(email) = var(ENV_GIT_AUTHOR_EMAIL) {
        config.defaults.git.author_email = Some(email);
    }
}

/// Expand a leading `~` in a user-supplied path.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_uses_builtin_defaults() {
        let config: PromoterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.defaults.pipeline.alias_prefix, "step");
        assert_eq!(config.defaults.git, GitDefaults::default());
    }

    #[test]
    fn reads_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"{"defaults": {"git": {"authorName": "Bot", "authorEmail": "bot@example.com"},
                             "pipeline": {"aliasPrefix": "stage"}}}"#,
        )
        .unwrap();

        let config = read_config(&path).unwrap();
        assert_eq!(config.defaults.git.author_name.as_deref(), Some("Bot"));
        assert_eq!(config.defaults.pipeline.alias_prefix, "stage");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = load_config(Some(&dir.path().join("absent.json"))).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InternalIoError);
    }

    #[test]
    fn explicit_invalid_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ConfigInvalidJson);
    }

    #[test]
    fn env_overrides_win_and_empty_values_are_ignored() {
        let mut config = PromoterConfig::default();
        config.defaults.git.author_name = Some("File".to_string());
        config.defaults.git.author_email = Some("file@example.com".to_string());

        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_GIT_AUTHOR_NAME, "Env"),
            (ENV_GIT_AUTHOR_EMAIL, ""),
        ]);
        apply_env_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()));

        let identity = config.defaults.git.identity();
        assert_eq!(identity.name.as_deref(), Some("Env"));
        assert_eq!(identity.email.as_deref(), Some("file@example.com"));
    }

    #[test]
    fn tilde_is_expanded() {
        let expanded = expand_path("~/pipelines/a.yaml");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.ends_with("pipelines/a.yaml"));
    }
}
