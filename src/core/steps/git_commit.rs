use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::engine::{SharedState, StepContext, StepResult, StepRunner};
use crate::error::Result;
use crate::git::{CommitOptions, GitUser, WorkTreeLoader};
use crate::utils::paths::secure_join;

pub const GIT_COMMIT_SCHEMA: &str = include_str!("schemas/git-commit.json");

/// Output key holding the id of the working tree's `HEAD` after the step.
pub const COMMIT_OUTPUT_KEY: &str = "commit";
/// Output field of earlier steps that contributes to an aggregated message.
pub const COMMIT_MESSAGE_FIELD: &str = "commitMessage";

const FALLBACK_MESSAGE: &str = "Promoter made some changes";
const MULTIPLE_CHANGES_HEADER: &str = "Promoter applied multiple changes\n\nIncluding:\n";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitCommitConfig {
    /// Working tree location, relative to the run's working directory.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub message_from_steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<GitUser>,
}

/// `git-commit`: stage everything under `path` and commit it when there is a diff.
pub struct GitCommitter {
    loader: Arc<dyn WorkTreeLoader>,
}

impl GitCommitter {
    pub fn new(loader: Arc<dyn WorkTreeLoader>) -> Self {
        Self { loader }
    }
}

impl StepRunner for GitCommitter {
    fn name(&self) -> &str {
        "git-commit"
    }

    fn run(&self, ctx: &StepContext<'_>) -> Result<StepResult> {
        let cfg: GitCommitConfig = ctx.decode_config()?;

        let path = secure_join(ctx.work_dir, &cfg.path)?;
        let tree = self
            .loader
            .load(ctx.work_dir, &path, ctx.cancel)
            .map_err(|e| e.with_context(format!("load working tree '{}'", cfg.path)))?;

        tree.add_all()?;

        if tree.has_diffs()? {
            let message = build_commit_message(ctx.state, &cfg)
                .map_err(|e| e.with_context("build commit message"))?;
            let options = CommitOptions {
                author: cfg.author.clone().filter(|author| !author.is_empty()),
            };
            tree.commit(&message, &options)?;
        } else {
            log_status!("git-commit", "Nothing to commit in '{}'", cfg.path);
        }

        let commit = tree.last_commit_id()?;
        log_status!("git-commit", "'{}' is at {}", cfg.path, commit);

        Ok(StepResult::succeeded(Some(json!({ COMMIT_OUTPUT_KEY: commit }))))
    }
}

/// Commit message for `cfg`.
///
/// A literal message wins. Otherwise the `commitMessage` field of each step
/// named in `messageFromSteps` is collected in order; steps without output
/// or without the field are skipped, wrongly shaped output is an error.
pub fn build_commit_message(state: &SharedState, cfg: &GitCommitConfig) -> Result<String> {
    if let Some(message) = cfg.message.as_deref().filter(|m| !m.is_empty()) {
        return Ok(message.to_string());
    }

    let mut parts = Vec::with_capacity(cfg.message_from_steps.len());
    for alias in &cfg.message_from_steps {
        if let Some(part) = state.string_field(alias, COMMIT_MESSAGE_FIELD)? {
            parts.push(part);
        }
    }

    Ok(match parts.as_slice() {
        [] => FALLBACK_MESSAGE.to_string(),
        [only] => only.to_string(),
        many => many.iter().fold(MULTIPLE_CHANGES_HEADER.to_string(), |mut msg, part| {
            msg.push_str("\n  * ");
            msg.push_str(part);
            msg
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StepStatus;
    use crate::error::{Error, ErrorCode};
    use crate::git::WorkTree;
    use crate::utils::cancel::CancellationToken;
    use serde_json::Value;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorded {
        loaded: Vec<PathBuf>,
        staged: usize,
        commits: Vec<(String, Option<GitUser>)>,
    }

    struct FakeLoader {
        dirty: bool,
        fail_commit: bool,
        log: Arc<Mutex<Recorded>>,
    }

    struct FakeTree {
        path: PathBuf,
        dirty: bool,
        fail_commit: bool,
        log: Arc<Mutex<Recorded>>,
    }

    impl WorkTreeLoader for FakeLoader {
        fn load(
            &self,
            _root: &Path,
            path: &Path,
            _cancel: &CancellationToken,
        ) -> Result<Box<dyn WorkTree>> {
            self.log.lock().unwrap().loaded.push(path.to_path_buf());
            Ok(Box::new(FakeTree {
                path: path.to_path_buf(),
                dirty: self.dirty,
                fail_commit: self.fail_commit,
                log: Arc::clone(&self.log),
            }))
        }
    }

    impl WorkTree for FakeTree {
        fn path(&self) -> &Path {
            &self.path
        }

        fn add_all(&self) -> Result<()> {
            self.log.lock().unwrap().staged += 1;
            Ok(())
        }

        fn has_diffs(&self) -> Result<bool> {
            Ok(self.dirty)
        }

        fn commit(&self, message: &str, options: &CommitOptions) -> Result<()> {
            if self.fail_commit {
                return Err(Error::git_command_failed("git commit", None, "hook rejected"));
            }
            self.log
                .lock()
                .unwrap()
                .commits
                .push((message.to_string(), options.author.clone()));
            Ok(())
        }

        fn last_commit_id(&self) -> Result<String> {
            Ok("abc123".to_string())
        }
    }

    fn committer(dirty: bool) -> (GitCommitter, Arc<Mutex<Recorded>>) {
        let log = Arc::new(Mutex::new(Recorded::default()));
        let loader = FakeLoader {
            dirty,
            fail_commit: false,
            log: Arc::clone(&log),
        };
        (GitCommitter::new(Arc::new(loader)), log)
    }

    fn run_step(
        step: &GitCommitter,
        root: &Path,
        state: &SharedState,
        config: Value,
    ) -> Result<StepResult> {
        let cancel = CancellationToken::new();
        let ctx = StepContext {
            alias: "commit",
            step_type: "git-commit",
            work_dir: root,
            state,
            config: &config,
            cancel: &cancel,
        };
        step.run(&ctx)
    }

    fn cfg(from: &[&str]) -> GitCommitConfig {
        GitCommitConfig {
            path: ".".to_string(),
            message_from_steps: from.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn literal_message_wins() {
        let mut state = SharedState::new();
        state.merge("a", json!({"commitMessage": "from a"})).unwrap();

        let mut config = cfg(&["a"]);
        config.message = Some("literal".to_string());
        assert_eq!(build_commit_message(&state, &config).unwrap(), "literal");
    }

    #[test]
    fn single_fragment_is_used_verbatim() {
        let mut state = SharedState::new();
        state.merge("a", json!({"commitMessage": "bump image to v2"})).unwrap();
        assert_eq!(
            build_commit_message(&state, &cfg(&["a", "ghost"])).unwrap(),
            "bump image to v2"
        );
    }

    #[test]
    fn multiple_fragments_are_listed_in_alias_order() {
        let mut state = SharedState::new();
        state.merge("a", json!({"commitMessage": "fix X"})).unwrap();
        state.merge("b", json!({"other": true})).unwrap();
        state.merge("c", json!({"commitMessage": "fix Y"})).unwrap();

        let message = build_commit_message(&state, &cfg(&["a", "b", "c"])).unwrap();
        assert_eq!(
            message,
            "Promoter applied multiple changes\n\nIncluding:\n\n  * fix X\n  * fix Y"
        );
    }

    #[test]
    fn no_fragments_falls_back() {
        let state = SharedState::new();
        assert_eq!(build_commit_message(&state, &cfg(&[])).unwrap(), FALLBACK_MESSAGE);
        assert_eq!(build_commit_message(&state, &cfg(&["ghost"])).unwrap(), FALLBACK_MESSAGE);
    }

    #[test]
    fn non_map_output_is_type_mismatch() {
        let mut state = SharedState::new();
        state.merge("a", json!("just a string")).unwrap();

        let err = build_commit_message(&state, &cfg(&["a"])).unwrap_err();
        assert_eq!(err.code, ErrorCode::StateTypeMismatch);
        assert!(err.message.contains("'a'"));
    }

    #[test]
    fn non_string_fragment_is_type_mismatch() {
        let mut state = SharedState::new();
        state.merge("a", json!({"commitMessage": ["x"]})).unwrap();

        let err = build_commit_message(&state, &cfg(&["a"])).unwrap_err();
        assert_eq!(err.code, ErrorCode::StateTypeMismatch);
        assert_eq!(err.details["field"], "commitMessage");
    }

    #[test]
    fn commits_when_dirty_and_reports_id() {
        let root = tempfile::TempDir::new().unwrap();
        let (step, log) = committer(true);

        let result = run_step(
            &step,
            root.path(),
            &SharedState::new(),
            json!({"path": ".", "message": "promote", "author": {"name": "Bot"}}),
        )
        .unwrap();

        assert_eq!(result.status, StepStatus::Succeeded);
        assert_eq!(result.output, Some(json!({"commit": "abc123"})));

        let log = log.lock().unwrap();
        assert_eq!(log.staged, 1);
        assert_eq!(log.commits.len(), 1);
        assert_eq!(log.commits[0].0, "promote");
        let author = log.commits[0].1.as_ref().unwrap();
        assert_eq!(author.name.as_deref(), Some("Bot"));
        assert_eq!(author.email, None);
    }

    #[test]
    fn clean_tree_skips_commit_but_reports_head() {
        let root = tempfile::TempDir::new().unwrap();
        let (step, log) = committer(false);

        let state = SharedState::new();
        let result = run_step(&step, root.path(), &state, json!({"path": "."})).unwrap();

        assert_eq!(result.output, Some(json!({"commit": "abc123"})));
        assert!(log.lock().unwrap().commits.is_empty());
    }

    #[test]
    fn empty_author_override_defers_to_default_identity() {
        let root = tempfile::TempDir::new().unwrap();
        let (step, log) = committer(true);

        let config = json!({"path": ".", "author": {}});
        run_step(&step, root.path(), &SharedState::new(), config).unwrap();
        assert_eq!(log.lock().unwrap().commits[0].1, None);
    }

    #[test]
    fn escaping_path_never_loads_a_tree() {
        let root = tempfile::TempDir::new().unwrap();
        let (step, log) = committer(true);

        let err = run_step(&step, root.path(), &SharedState::new(), json!({"path": "../elsewhere"}))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::SandboxPathEscape);
        assert!(log.lock().unwrap().loaded.is_empty());
    }

    #[test]
    fn type_mismatch_makes_no_commit() {
        let root = tempfile::TempDir::new().unwrap();
        let (step, log) = committer(true);
        let mut state = SharedState::new();
        state.merge("a", json!([1, 2])).unwrap();

        let config = json!({"path": ".", "messageFromSteps": ["a"]});
        let err = run_step(&step, root.path(), &state, config).unwrap_err();
        assert_eq!(err.code, ErrorCode::StateTypeMismatch);
        assert!(err.message.starts_with("build commit message: "));
        assert!(log.lock().unwrap().commits.is_empty());
    }

    #[test]
    fn undecodable_config_fails_before_touching_the_tree() {
        let root = tempfile::TempDir::new().unwrap();
        let (step, log) = committer(true);

        let state = SharedState::new();
        let err = run_step(&step, root.path(), &state, json!({"path": 7})).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigDecodeFailed);
        assert!(log.lock().unwrap().loaded.is_empty());
    }

    #[test]
    fn commit_failure_propagates() {
        let root = tempfile::TempDir::new().unwrap();
        let log = Arc::new(Mutex::new(Recorded::default()));
        let step = GitCommitter::new(Arc::new(FakeLoader {
            dirty: true,
            fail_commit: true,
            log,
        }));

        let state = SharedState::new();
        let err = run_step(&step, root.path(), &state, json!({"path": "."})).unwrap_err();
        assert_eq!(err.code, ErrorCode::GitCommandFailed);
        assert!(err.message.contains("hook rejected"));
    }
}
