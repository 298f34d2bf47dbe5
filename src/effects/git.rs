//! Git operation effect types.
//!
//! These types describe git operations as data, without executing them.
//! Steps express every repository mutation and status query as a
//! [`GitEffect`]; an interpreter (see [`super::interpreter`]) executes them
//! against a working copy, or against an in-memory fake in tests.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::Sha;

/// A git operation effect.
///
/// Variants are split into mutations (which change the working tree, index,
/// refs, stash or remote) and queries (which only inspect state). See
/// [`GitEffect::is_mutation`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GitEffect {
    // ─── Mutations ───
    /// Fetch all branches (and prune deleted ones) from the remote.
    Fetch,

    /// Check out a local branch.
    Checkout { branch: String },

    /// Merge a branch or commit into HEAD, keeping git's default message.
    Merge { target: String },

    /// Stage a squash of `branch` onto HEAD without committing.
    MergeSquash { branch: String },

    /// Commit the index. `None` keeps the prepared message (MERGE_MSG/SQUASH_MSG).
    Commit { message: Option<String> },

    /// Abort an in-progress merge.
    MergeAbort,

    /// Rebase the current branch onto a target.
    Rebase { target: String },

    /// Continue an in-progress rebase after conflicts were resolved.
    RebaseContinue,

    /// Abort an in-progress rebase.
    RebaseAbort,

    /// Push a local branch to the remote.
    Push {
        branch: String,
        force: bool,
        /// Create the remote branch and record it as the upstream.
        set_upstream: bool,
    },

    /// Force the remote branch to point at a specific commit.
    PushSha { sha: Sha, branch: String },

    /// Delete a branch on the remote.
    DeleteRemoteBranch { branch: String },

    /// Delete a local branch.
    DeleteLocalBranch { branch: String, force: bool },

    /// Reset the current branch to a target.
    Reset { target: String, hard: bool },

    /// Stash everything, including untracked files, under `message`.
    StashSave { message: String },

    /// Pop the most recent stash entry.
    StashPop,

    /// Run subsequent git commands from another directory.
    ChangeDirectory { directory: PathBuf },

    // ─── Queries ───
    /// Name of the checked-out branch.
    CurrentBranch,

    /// Resolve a revision to a SHA; `Missing` if it does not exist.
    RevParse { rev: String },

    /// Whether the working tree or index has uncommitted changes.
    HasOpenChanges,

    /// Paths with unresolved merge conflicts.
    ConflictingFiles,

    /// Whether a merge is waiting to be committed (MERGE_HEAD exists).
    MergeInProgress,

    /// Whether a rebase is stopped mid-way.
    RebaseInProgress,

    /// Whether a local branch exists.
    HasBranch { branch: String },

    /// Whether `<remote>/<branch>` exists.
    HasTrackingBranch { branch: String },

    /// Whether the configured remote exists.
    HasRemote,

    /// Whether `branch` differs in content from `parent`.
    HasShippableChanges { branch: String, parent: String },

    /// Top-level directory of the working copy.
    RootDirectory,

    /// Directory git commands currently run in.
    CurrentDirectory,

    /// Message of the most recent stash entry; `Missing` if the stash is empty.
    StashTopMessage,
}

impl GitEffect {
    /// Returns true if this effect changes repository state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            GitEffect::Fetch
                | GitEffect::Checkout { .. }
                | GitEffect::Merge { .. }
                | GitEffect::MergeSquash { .. }
                | GitEffect::Commit { .. }
                | GitEffect::MergeAbort
                | GitEffect::Rebase { .. }
                | GitEffect::RebaseContinue
                | GitEffect::RebaseAbort
                | GitEffect::Push { .. }
                | GitEffect::PushSha { .. }
                | GitEffect::DeleteRemoteBranch { .. }
                | GitEffect::DeleteLocalBranch { .. }
                | GitEffect::Reset { .. }
                | GitEffect::StashSave { .. }
                | GitEffect::StashPop
                | GitEffect::ChangeDirectory { .. }
        )
    }
}

/// Response from a git effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GitResponse {
    /// Operation completed with no specific return value.
    Ok,
    /// A resolved SHA (from `RevParse`).
    Sha(Sha),
    /// The queried object does not exist.
    Missing,
    /// A boolean answer.
    Bool(bool),
    /// A single line of text (e.g. a branch name).
    Text(String),
    /// A list of paths.
    Files(Vec<String>),
    /// A filesystem path.
    Path(PathBuf),
}
