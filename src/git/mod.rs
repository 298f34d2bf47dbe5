//! Local git operations.
//!
//! This module executes [`GitEffect`](crate::effects::GitEffect)s against a
//! working copy by spawning `git` subprocesses:
//! - Command construction and error mapping (this file)
//! - Merge, squash-merge and rebase operations plus conflict inspection
//!   ([`merge`])
//! - Fetch, push and remote-branch operations ([`push`])
//! - The [`LocalRepository`] interpreter that dispatches effects ([`local`])
//!
//! Every mutation is echoed to stdout as `[branch] git ...` so users can
//! follow (and reproduce by hand) what a workflow does to their repository.

pub mod local;
pub mod merge;
pub mod push;

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use thiserror::Error;

pub use local::LocalRepository;

/// Environment variable overriding where run state files are kept.
pub const STATE_DIR_ENV: &str = "GIT_SHIPYARD_STATE_DIR";

/// Errors from git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Git command failed.
    #[error("git command failed: {command}\nstderr: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// Invalid SHA format.
    #[error("invalid SHA: {0}")]
    InvalidSha(String),

    /// IO error (e.g. git binary missing).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ref not found.
    #[error("ref not found: {refspec}")]
    RefNotFound { refspec: String },

    /// The branch to ship has no changes relative to its parent.
    #[error("the branch '{branch}' has no shippable changes")]
    NoShippableChanges { branch: String },

    /// A branch-specific operation found a different branch checked out.
    #[error("expected branch '{expected}' to be checked out, found '{actual}'")]
    UnexpectedBranch { expected: String, actual: String },

    /// A branch hierarchy entry could not be read or written.
    #[error("branch hierarchy error: {details}")]
    Hierarchy { details: String },

    /// An interpreter answered an effect with the wrong kind of response.
    #[error("unexpected response to {effect}: {response}")]
    UnexpectedResponse { effect: String, response: String },
}

/// Result type for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Identity used for creating commits.
///
/// Passed via `-c` flags so commits can be created even when global git
/// config is disabled (see [`GitConfig::isolate_config`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    /// The committer/author name (git `user.name`).
    pub name: String,

    /// The committer/author email (git `user.email`).
    pub email: String,
}

/// Configuration for git operations against one working copy.
#[derive(Debug, Clone)]
pub struct GitConfig {
    /// Directory the tool was started from.
    pub workdir: PathBuf,

    /// Name of the remote to sync with.
    pub remote: String,

    /// Directory holding persisted run states (one file per repository).
    pub state_dir: PathBuf,

    /// Identity for commits. `None` uses whatever git config provides.
    pub commit_identity: Option<CommitIdentity>,

    /// Ignore system and global git config (reproducible behavior in tests).
    pub isolate_config: bool,

    /// Print each mutating git command before running it.
    pub echo_commands: bool,

    /// Skip all network operations (fetch, push, remote deletes).
    pub offline: bool,
}

impl GitConfig {
    /// Creates a configuration with defaults for the given directory.
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        GitConfig {
            workdir: workdir.into(),
            remote: "origin".to_string(),
            state_dir: default_state_dir(),
            commit_identity: None,
            isolate_config: false,
            echo_commands: true,
            offline: false,
        }
    }

    /// Builds the configuration for the repository containing `workdir`,
    /// reading `git-town.offline` from git config and the state directory
    /// from [`STATE_DIR_ENV`].
    pub fn discover(workdir: impl Into<PathBuf>) -> GitResult<Self> {
        let mut config = GitConfig::new(workdir);
        if let Ok(dir) = std::env::var(STATE_DIR_ENV)
            && !dir.is_empty()
        {
            config.state_dir = PathBuf::from(dir);
        }
        config.offline = read_config_bool(&config, "git-town.offline")?.unwrap_or(false);
        Ok(config)
    }

    pub fn with_identity(mut self, identity: CommitIdentity) -> Self {
        self.commit_identity = Some(identity);
        self
    }

    pub fn with_state_dir(mut self, state_dir: impl Into<PathBuf>) -> Self {
        self.state_dir = state_dir.into();
        self
    }

    /// Disables system/global config and command echo.
    pub fn isolated(mut self) -> Self {
        self.isolate_config = true;
        self.echo_commands = false;
        self
    }
}

/// Default location for run state files: `<tmp>/git-shipyard`.
pub fn default_state_dir() -> PathBuf {
    std::env::temp_dir().join("git-shipyard")
}

/// Create a git Command for the given working directory.
///
/// Terminal prompts are always disabled so a missing credential fails the
/// step instead of hanging it. With `isolate_config`, system and user config
/// are ignored (e.g. rerere, hooks, aliases) and the configured identity is
/// passed via `-c` flags.
pub(crate) fn git_command(config: &GitConfig, workdir: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(workdir);
    cmd.env("GIT_TERMINAL_PROMPT", "0");

    if config.isolate_config {
        cmd.env("GIT_CONFIG_NOSYSTEM", "1");
        cmd.env("GIT_CONFIG_GLOBAL", "/dev/null");
    }

    if let Some(ref identity) = config.commit_identity {
        cmd.arg("-c");
        cmd.arg(format!("user.name={}", identity.name));
        cmd.arg("-c");
        cmd.arg(format!("user.email={}", identity.email));
    }

    cmd
}

/// Run a git command, returning its output on success.
pub fn run_git_sync(config: &GitConfig, workdir: &Path, args: &[&str]) -> GitResult<Output> {
    let output = git_command(config, workdir).args(args).output()?;

    if output.status.success() {
        Ok(output)
    } else {
        Err(command_failed(args, &output))
    }
}

/// Run a git command and return stdout as a trimmed string.
pub fn run_git_stdout(config: &GitConfig, workdir: &Path, args: &[&str]) -> GitResult<String> {
    let output = run_git_sync(config, workdir, args)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run a git command whose exit status answers a yes/no question.
///
/// Exit 0 = yes, exit 1 = no, anything else = error. Used for
/// `show-ref --verify`, `diff --quiet` and friends.
pub fn run_git_predicate(config: &GitConfig, workdir: &Path, args: &[&str]) -> GitResult<bool> {
    let output = git_command(config, workdir).args(args).output()?;
    match output.status.code() {
        Some(0) => Ok(true),
        Some(1) => Ok(false),
        _ => Err(command_failed(args, &output)),
    }
}

pub(crate) fn command_failed(args: &[&str], output: &Output) -> GitError {
    GitError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

/// Read a boolean git config value; `None` when unset.
pub fn read_config_bool(config: &GitConfig, key: &str) -> GitResult<Option<bool>> {
    let output = git_command(config, &config.workdir)
        .args(["config", "--type=bool", "--get", key])
        .output()?;
    match output.status.code() {
        Some(0) => Ok(Some(String::from_utf8_lossy(&output.stdout).trim() == "true")),
        Some(1) => Ok(None),
        _ => Err(command_failed(&["config", "--type=bool", "--get", key], &output)),
    }
}

/// Render a command line the way a user would type it, quoting arguments
/// that contain spaces.
pub fn format_command(args: &[&str]) -> String {
    std::iter::once("git")
        .chain(args.iter().copied())
        .map(|part| {
            if part.contains(' ') {
                format!("\"{}\"", part.replace('"', "\\\""))
            } else {
                part.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
