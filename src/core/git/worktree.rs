use std::fs;
use std::path::{Path, PathBuf};
use std::process::Output;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::cancel::CancellationToken;
use crate::utils::command;

/// Commit identity. Either half may be left empty to fall back to the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl GitUser {
    pub fn is_empty(&self) -> bool {
        self.name.as_deref().is_none_or(str::is_empty)
            && self.email.as_deref().is_none_or(str::is_empty)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    /// Author override for this commit only.
    pub author: Option<GitUser>,
}

/// A checked-out working tree.
pub trait WorkTree {
    fn path(&self) -> &Path;

    /// Stage every pending change, including deletions and untracked files.
    fn add_all(&self) -> Result<()>;

    /// Whether the index differs from `HEAD` (or holds anything at all on an unborn branch).
    fn has_diffs(&self) -> Result<bool>;

    fn commit(&self, message: &str, options: &CommitOptions) -> Result<()>;

    fn last_commit_id(&self) -> Result<String>;
}

/// Opens working trees. Implementations must be shareable across runs.
pub trait WorkTreeLoader: Send + Sync {
    /// Open the tree at `path`. The repository owning it must live under `root`.
    fn load(
        &self,
        root: &Path,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn WorkTree>>;
}

/// Loader backed by the `git` binary.
#[derive(Debug, Clone, Default)]
pub struct GitCli {
    /// Identity used when a commit carries no override. Unset halves defer
    /// to the repository's own git configuration.
    pub default_identity: GitUser,
}

impl GitCli {
    pub fn new(default_identity: GitUser) -> Self {
        Self { default_identity }
    }
}

impl WorkTreeLoader for GitCli {
    fn load(
        &self,
        root: &Path,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn WorkTree>> {
        if !path.is_dir() {
            return Err(Error::git_command_failed(
                "load working tree",
                Some(path.display().to_string()),
                "directory does not exist",
            ));
        }

        let tree = GitWorkTree {
            path: path.to_path_buf(),
            default_identity: self.default_identity.clone(),
            cancel: cancel.clone(),
        };
        let inside = tree.git("git rev-parse", &["rev-parse", "--is-inside-work-tree"], &[])?;
        if String::from_utf8_lossy(&inside.stdout).trim() != "true" {
            return Err(Error::git_command_failed(
                "load working tree",
                Some(path.display().to_string()),
                "not a git working tree",
            ));
        }

        // Git walks up to parent directories; a repository found above the
        // root would have its objects and HEAD written outside it.
        let toplevel = tree.git("git rev-parse", &["rev-parse", "--show-toplevel"], &[])?;
        let toplevel = canonical(Path::new(String::from_utf8_lossy(&toplevel.stdout).trim()))?;
        let root = canonical(root)?;
        if !toplevel.starts_with(&root) {
            return Err(Error::sandbox_path_escape(
                root.display().to_string(),
                toplevel.display().to_string(),
            )
            .with_context("repository owning the working tree")
            .with_hint("Initialise a repository inside the working directory"));
        }

        Ok(Box::new(tree))
    }
}

fn canonical(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("resolve {}", path.display())))
    })
}

#[derive(Debug)]
pub struct GitWorkTree {
    path: PathBuf,
    default_identity: GitUser,
    cancel: CancellationToken,
}

impl GitWorkTree {
    /// Run git and fail on non-zero exit, keeping the output for callers that parse it.
    fn git(&self, operation: &str, args: &[&str], envs: &[(&str, &str)]) -> Result<Output> {
        let output =
            command::run_cancellable(&self.path, "git", args, envs, operation, &self.cancel)?;
        if !output.status.success() {
            return Err(Error::git_command_failed(
                operation,
                Some(self.path.display().to_string()),
                command::error_text(&output),
            ));
        }
        Ok(output)
    }

    /// Identity env for a commit: override halves first, then default halves.
    fn identity_env(&self, author: Option<&GitUser>) -> Vec<(&'static str, String)> {
        let mut envs = Vec::new();
        let pick = |over: Option<&String>, default: Option<&String>| {
            over.filter(|s| !s.is_empty())
                .or(default.filter(|s| !s.is_empty()))
                .cloned()
        };

        let default_name = self.default_identity.name.as_ref();
        let default_email = self.default_identity.email.as_ref();

        if let Some(name) = pick(author.and_then(|a| a.name.as_ref()), default_name) {
            envs.push(("GIT_AUTHOR_NAME", name));
        }
        if let Some(email) = pick(author.and_then(|a| a.email.as_ref()), default_email) {
            envs.push(("GIT_AUTHOR_EMAIL", email));
        }
        if let Some(name) = default_name.filter(|s| !s.is_empty()) {
            envs.push(("GIT_COMMITTER_NAME", name.clone()));
        }
        if let Some(email) = default_email.filter(|s| !s.is_empty()) {
            envs.push(("GIT_COMMITTER_EMAIL", email.clone()));
        }
        envs
    }
}

impl WorkTree for GitWorkTree {
    fn path(&self) -> &Path {
        &self.path
    }

    fn add_all(&self) -> Result<()> {
        self.git("git add", &["add", "--all", "."], &[])?;
        Ok(())
    }

    fn has_diffs(&self) -> Result<bool> {
        let output = self.git("git status", &["status", "--porcelain=v1", "--", "."], &[])?;
        Ok(!output.stdout.iter().all(u8::is_ascii_whitespace))
    }

    fn commit(&self, message: &str, options: &CommitOptions) -> Result<()> {
        let envs = self.identity_env(options.author.as_ref());
        let env_refs: Vec<(&str, &str)> = envs.iter().map(|(k, v)| (*k, v.as_str())).collect();
        // Limited to this tree so changes staged elsewhere in the repository stay out.
        self.git(
            "git commit",
            &["commit", "--no-verify", "-m", message, "--", "."],
            &env_refs,
        )?;
        Ok(())
    }

    fn last_commit_id(&self) -> Result<String> {
        let output = self.git("git rev-parse", &["rev-parse", "HEAD"], &[])?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
