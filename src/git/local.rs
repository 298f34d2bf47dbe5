//! The subprocess-backed [`GitInterpreter`] for a local working copy.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use super::{
    GitConfig, GitResult, command_failed, format_command, git_command, run_git_predicate,
    run_git_stdout, run_git_sync,
};
use crate::effects::{GitEffect, GitInterpreter, GitResponse};
use crate::types::Sha;

/// A working copy operated on through `git` subprocesses.
///
/// The repository tracks its own working directory instead of calling
/// `std::env::set_current_dir`, so a `ChangeDirectory` effect only affects
/// the git commands issued through this instance.
#[derive(Debug, Clone)]
pub struct LocalRepository {
    config: GitConfig,
    workdir: PathBuf,
}

impl LocalRepository {
    /// Opens the repository containing `config.workdir`.
    pub fn open(config: GitConfig) -> GitResult<Self> {
        run_git_sync(&config, &config.workdir, &["rev-parse", "--git-dir"])?;
        let workdir = config.workdir.clone();
        Ok(LocalRepository { config, workdir })
    }

    pub fn config(&self) -> &GitConfig {
        &self.config
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub(super) fn stdout(&self, args: &[&str]) -> GitResult<String> {
        run_git_stdout(&self.config, &self.workdir, args)
    }

    pub(super) fn predicate(&self, args: &[&str]) -> GitResult<bool> {
        run_git_predicate(&self.config, &self.workdir, args)
    }

    /// Runs a mutating command, echoing it first.
    ///
    /// `GIT_EDITOR` is forced to `true` so commits and rebase continuations
    /// keep their prepared messages instead of opening an editor.
    pub(super) fn mutate(&self, args: &[&str]) -> GitResult<()> {
        if self.config.echo_commands {
            let branch = self.current_branch().unwrap_or_default();
            println!("\n[{}] {}", branch, format_command(args));
        }
        debug!(command = %format_command(args), "running git mutation");

        let output = git_command(&self.config, &self.workdir)
            .env("GIT_EDITOR", "true")
            .args(args)
            .output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(command_failed(args, &output))
        }
    }

    /// Absolute path of the `.git` directory.
    pub fn git_dir(&self) -> GitResult<PathBuf> {
        let dir = PathBuf::from(self.stdout(&["rev-parse", "--git-dir"])?);
        Ok(if dir.is_absolute() {
            dir
        } else {
            self.workdir.join(dir)
        })
    }

    /// Name of the checked-out branch.
    ///
    /// While a rebase is stopped HEAD is detached, so the branch being
    /// rebased is read from the rebase state directory instead. A detached
    /// HEAD outside a rebase is reported as `HEAD`.
    pub fn current_branch(&self) -> GitResult<String> {
        let git_dir = self.git_dir()?;
        for state_dir in ["rebase-merge", "rebase-apply"] {
            let head_name = git_dir.join(state_dir).join("head-name");
            if let Ok(contents) = std::fs::read_to_string(&head_name) {
                let name = contents.trim();
                return Ok(name.strip_prefix("refs/heads/").unwrap_or(name).to_string());
            }
        }

        let output = git_command(&self.config, &self.workdir)
            .args(["symbolic-ref", "--short", "-q", "HEAD"])
            .output()?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Ok("HEAD".to_string())
        }
    }

    /// Resolve a revision to a commit, `None` if it does not exist.
    pub fn rev_parse(&self, rev: &str) -> GitResult<Option<Sha>> {
        let spec = format!("{}^{{commit}}", rev);
        let output = git_command(&self.config, &self.workdir)
            .args(["rev-parse", "--verify", "--quiet", &spec])
            .output()?;
        if !output.status.success() {
            return Ok(None);
        }
        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Sha::parse(&sha)
            .map(Some)
            .map_err(|_| super::GitError::InvalidSha(sha))
    }

    pub fn has_open_changes(&self) -> GitResult<bool> {
        Ok(!self.stdout(&["status", "--porcelain"])?.is_empty())
    }

    pub fn has_branch(&self, branch: &str) -> GitResult<bool> {
        self.predicate(&[
            "show-ref",
            "--verify",
            "--quiet",
            &format!("refs/heads/{}", branch),
        ])
    }

    pub fn root_directory(&self) -> GitResult<PathBuf> {
        Ok(PathBuf::from(self.stdout(&["rev-parse", "--show-toplevel"])?))
    }

    pub fn checkout(&self, branch: &str) -> GitResult<()> {
        self.mutate(&["checkout", branch])
    }

    pub fn reset(&self, target: &str, hard: bool) -> GitResult<()> {
        if hard {
            self.mutate(&["reset", "--hard", target])
        } else {
            self.mutate(&["reset", target])
        }
    }

    pub fn delete_local_branch(&self, branch: &str, force: bool) -> GitResult<()> {
        let flag = if force { "-D" } else { "-d" };
        self.mutate(&["branch", flag, branch])
    }

    /// Stage everything, including untracked files, and stash it.
    pub fn stash_save(&self, message: &str) -> GitResult<()> {
        self.mutate(&["add", "-A"])?;
        self.mutate(&["stash", "push", "-m", message])
    }

    /// Message of `stash@{0}`, without the `On <branch>: ` prefix git adds.
    pub fn stash_top_message(&self) -> GitResult<Option<String>> {
        let subject = self.stdout(&["stash", "list", "--max-count=1", "--format=%s"])?;
        if subject.is_empty() {
            return Ok(None);
        }
        let message = match subject.split_once(": ") {
            Some((_, message)) => message.to_string(),
            None => subject,
        };
        Ok(Some(message))
    }

    pub fn stash_pop(&self) -> GitResult<()> {
        self.mutate(&["stash", "pop"])
    }

    fn change_directory(&mut self, directory: PathBuf) -> GitResult<()> {
        if !directory.is_dir() {
            return Err(super::GitError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("directory {} does not exist", directory.display()),
            )));
        }
        if self.config.echo_commands {
            println!("\ncd {}", directory.display());
        }
        self.workdir = directory;
        Ok(())
    }
}

impl GitInterpreter for LocalRepository {
    fn interpret(&mut self, effect: GitEffect) -> GitResult<GitResponse> {
        trace!(?effect, "interpreting git effect");
        let response = match effect {
            GitEffect::Fetch => {
                self.fetch()?;
                GitResponse::Ok
            }
            GitEffect::Checkout { branch } => {
                self.checkout(&branch)?;
                GitResponse::Ok
            }
            GitEffect::Merge { target } => {
                self.merge(&target)?;
                GitResponse::Ok
            }
            GitEffect::MergeSquash { branch } => {
                self.merge_squash(&branch)?;
                GitResponse::Ok
            }
            GitEffect::Commit { message } => {
                self.commit(message.as_deref())?;
                GitResponse::Ok
            }
            GitEffect::MergeAbort => {
                self.merge_abort()?;
                GitResponse::Ok
            }
            GitEffect::Rebase { target } => {
                self.rebase(&target)?;
                GitResponse::Ok
            }
            GitEffect::RebaseContinue => {
                self.rebase_continue()?;
                GitResponse::Ok
            }
            GitEffect::RebaseAbort => {
                self.rebase_abort()?;
                GitResponse::Ok
            }
            GitEffect::Push {
                branch,
                force,
                set_upstream,
            } => {
                self.push_branch(&branch, force, set_upstream)?;
                GitResponse::Ok
            }
            GitEffect::PushSha { sha, branch } => {
                self.push_sha(&sha, &branch)?;
                GitResponse::Ok
            }
            GitEffect::DeleteRemoteBranch { branch } => {
                self.delete_remote_branch(&branch)?;
                GitResponse::Ok
            }
            GitEffect::DeleteLocalBranch { branch, force } => {
                self.delete_local_branch(&branch, force)?;
                GitResponse::Ok
            }
            GitEffect::Reset { target, hard } => {
                self.reset(&target, hard)?;
                GitResponse::Ok
            }
            GitEffect::StashSave { message } => {
                self.stash_save(&message)?;
                GitResponse::Ok
            }
            GitEffect::StashPop => {
                self.stash_pop()?;
                GitResponse::Ok
            }
            GitEffect::ChangeDirectory { directory } => {
                self.change_directory(directory)?;
                GitResponse::Ok
            }
            GitEffect::CurrentBranch => GitResponse::Text(self.current_branch()?),
            GitEffect::RevParse { rev } => match self.rev_parse(&rev)? {
                Some(sha) => GitResponse::Sha(sha),
                None => GitResponse::Missing,
            },
            GitEffect::HasOpenChanges => GitResponse::Bool(self.has_open_changes()?),
            GitEffect::ConflictingFiles => GitResponse::Files(self.conflicting_files()?),
            GitEffect::MergeInProgress => GitResponse::Bool(self.merge_in_progress()?),
            GitEffect::RebaseInProgress => GitResponse::Bool(self.rebase_in_progress()?),
            GitEffect::HasBranch { branch } => GitResponse::Bool(self.has_branch(&branch)?),
            GitEffect::HasTrackingBranch { branch } => {
                GitResponse::Bool(self.has_tracking_branch(&branch)?)
            }
            GitEffect::HasRemote => GitResponse::Bool(self.has_remote()?),
            GitEffect::HasShippableChanges { branch, parent } => {
                GitResponse::Bool(self.has_shippable_changes(&branch, &parent)?)
            }
            GitEffect::RootDirectory => GitResponse::Path(self.root_directory()?),
            GitEffect::CurrentDirectory => GitResponse::Path(self.workdir.clone()),
            GitEffect::StashTopMessage => match self.stash_top_message()? {
                Some(message) => GitResponse::Text(message),
                None => GitResponse::Missing,
            },
        };
        Ok(response)
    }
}
