//! Effect interpreter traits.
//!
//! [`GitInterpreter`] is the single seam between the step engine and git.
//! Implementations:
//! - [`crate::git::LocalRepository`]: runs `git` subprocesses in a working copy
//! - `test_utils::FakeRepository`: an in-memory model used by unit tests
//!
//! [`GitQueries`] layers typed helpers over the raw effect/response protocol
//! so steps never match on [`GitResponse`] themselves.

use std::path::PathBuf;

use super::git::{GitEffect, GitResponse};
use crate::git::{GitError, GitResult};
use crate::types::Sha;

/// Interprets Git effects against a repository.
///
/// Implementations are constructed for one working copy, so all effects
/// executed through a single interpreter instance operate on that repository.
/// Mutations that leave conflicts behind may return either `Ok` or an error;
/// callers detect conflicts by querying status afterwards.
pub trait GitInterpreter {
    /// Execute a Git effect and return its response.
    fn interpret(&mut self, effect: GitEffect) -> GitResult<GitResponse>;
}

/// Typed wrappers around [`GitInterpreter::interpret`].
pub trait GitQueries {
    /// Execute a mutation, discarding its response.
    fn apply(&mut self, effect: GitEffect) -> GitResult<()>;

    fn current_branch(&mut self) -> GitResult<String>;

    /// Resolve a revision, returning `None` if it does not exist.
    fn rev_parse(&mut self, rev: &str) -> GitResult<Option<Sha>>;

    fn head_sha(&mut self) -> GitResult<Sha>;

    fn has_open_changes(&mut self) -> GitResult<bool>;

    fn conflicting_files(&mut self) -> GitResult<Vec<String>>;

    fn merge_in_progress(&mut self) -> GitResult<bool>;

    fn rebase_in_progress(&mut self) -> GitResult<bool>;

    fn has_branch(&mut self, branch: &str) -> GitResult<bool>;

    fn has_tracking_branch(&mut self, branch: &str) -> GitResult<bool>;

    fn has_remote(&mut self) -> GitResult<bool>;

    fn has_shippable_changes(&mut self, branch: &str, parent: &str) -> GitResult<bool>;

    fn root_directory(&mut self) -> GitResult<PathBuf>;

    fn current_directory(&mut self) -> GitResult<PathBuf>;

    /// Message of the most recent stash entry, `None` if there is none.
    fn stash_top_message(&mut self) -> GitResult<Option<String>>;
}

fn unexpected(effect: &str, response: GitResponse) -> GitError {
    GitError::UnexpectedResponse {
        effect: effect.to_string(),
        response: format!("{:?}", response),
    }
}

fn expect_bool<I: GitInterpreter + ?Sized>(
    interpreter: &mut I,
    effect: GitEffect,
) -> GitResult<bool> {
    let name = format!("{:?}", effect);
    match interpreter.interpret(effect)? {
        GitResponse::Bool(value) => Ok(value),
        other => Err(unexpected(&name, other)),
    }
}

fn expect_path<I: GitInterpreter + ?Sized>(
    interpreter: &mut I,
    effect: GitEffect,
) -> GitResult<PathBuf> {
    let name = format!("{:?}", effect);
    match interpreter.interpret(effect)? {
        GitResponse::Path(path) => Ok(path),
        other => Err(unexpected(&name, other)),
    }
}

impl<I: GitInterpreter + ?Sized> GitQueries for I {
    fn apply(&mut self, effect: GitEffect) -> GitResult<()> {
        self.interpret(effect).map(|_| ())
    }

    fn current_branch(&mut self) -> GitResult<String> {
        match self.interpret(GitEffect::CurrentBranch)? {
            GitResponse::Text(branch) => Ok(branch),
            other => Err(unexpected("CurrentBranch", other)),
        }
    }

    fn rev_parse(&mut self, rev: &str) -> GitResult<Option<Sha>> {
        match self.interpret(GitEffect::RevParse {
            rev: rev.to_string(),
        })? {
            GitResponse::Sha(sha) => Ok(Some(sha)),
            GitResponse::Missing => Ok(None),
            other => Err(unexpected("RevParse", other)),
        }
    }

    fn head_sha(&mut self) -> GitResult<Sha> {
        self.rev_parse("HEAD")?.ok_or_else(|| GitError::RefNotFound {
            refspec: "HEAD".to_string(),
        })
    }

    fn has_open_changes(&mut self) -> GitResult<bool> {
        expect_bool(self, GitEffect::HasOpenChanges)
    }

    fn conflicting_files(&mut self) -> GitResult<Vec<String>> {
        match self.interpret(GitEffect::ConflictingFiles)? {
            GitResponse::Files(files) => Ok(files),
            other => Err(unexpected("ConflictingFiles", other)),
        }
    }

    fn merge_in_progress(&mut self) -> GitResult<bool> {
        expect_bool(self, GitEffect::MergeInProgress)
    }

    fn rebase_in_progress(&mut self) -> GitResult<bool> {
        expect_bool(self, GitEffect::RebaseInProgress)
    }

    fn has_branch(&mut self, branch: &str) -> GitResult<bool> {
        expect_bool(
            self,
            GitEffect::HasBranch {
                branch: branch.to_string(),
            },
        )
    }

    fn has_tracking_branch(&mut self, branch: &str) -> GitResult<bool> {
        expect_bool(
            self,
            GitEffect::HasTrackingBranch {
                branch: branch.to_string(),
            },
        )
    }

    fn has_remote(&mut self) -> GitResult<bool> {
        expect_bool(self, GitEffect::HasRemote)
    }

    fn has_shippable_changes(&mut self, branch: &str, parent: &str) -> GitResult<bool> {
        expect_bool(
            self,
            GitEffect::HasShippableChanges {
                branch: branch.to_string(),
                parent: parent.to_string(),
            },
        )
    }

    fn root_directory(&mut self) -> GitResult<PathBuf> {
        expect_path(self, GitEffect::RootDirectory)
    }

    fn current_directory(&mut self) -> GitResult<PathBuf> {
        expect_path(self, GitEffect::CurrentDirectory)
    }

    fn stash_top_message(&mut self) -> GitResult<Option<String>> {
        match self.interpret(GitEffect::StashTopMessage)? {
            GitResponse::Text(message) => Ok(Some(message)),
            GitResponse::Missing => Ok(None),
            other => Err(unexpected("StashTopMessage", other)),
        }
    }
}
