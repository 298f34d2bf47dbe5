//! The closed set of repository operations a workflow is built from.
//!
//! Every [`Step`] knows how to run itself, and how to compute the step that
//! reverses it (before it runs), the step that finishes it after a manual
//! conflict resolution, and the step that backs it out mid-conflict.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::effects::{GitEffect, GitInterpreter, GitQueries};
use crate::git::{GitError, GitResult};
use crate::hierarchy::BranchHierarchy;
use crate::types::Sha;

/// Message of stash entries created by [`Step::StashOpenChanges`].
///
/// [`Step::RestoreOpenChanges`] only pops an entry carrying it.
pub const OPEN_CHANGES_STASH_MESSAGE: &str = "git-shipyard: open changes";

/// Collaborators a step runs against.
pub struct StepContext<'a> {
    pub git: &'a mut dyn GitInterpreter,

    pub hierarchy: &'a mut dyn BranchHierarchy,

    /// Name of the remote tracking branches live under.
    pub remote: String,
}

impl<'a> StepContext<'a> {
    pub fn new(git: &'a mut dyn GitInterpreter, hierarchy: &'a mut dyn BranchHierarchy) -> Self {
        StepContext {
            git,
            hierarchy,
            remote: "origin".to_string(),
        }
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// `<remote>/<branch>`
    pub fn tracking_ref(&self, branch: &str) -> String {
        format!("{}/{}", self.remote, branch)
    }
}

/// Non-error result of running a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,

    /// The mutation stopped with unmerged paths that a human must resolve.
    ConflictDetected { conflicting_files: Vec<String> },
}

/// One atomic repository operation.
///
/// Serialized adjacently tagged (`{"type": "MergeBranch", "data": {...}}`)
/// so persisted run states stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Step {
    CheckoutBranch {
        branch_name: String,
    },
    MergeBranch {
        branch_name: String,
    },
    /// Merges `<remote>/<current>` into the current branch, if it is tracked.
    MergeTrackingBranch,
    /// Rebases the current branch onto `<remote>/<current>`, if it is tracked.
    RebaseTrackingBranch,
    SquashMergeBranch {
        branch_name: String,
        commit_message: Option<String>,
    },
    /// Pushes a branch, creating the remote branch when it is not tracked yet.
    PushBranch {
        branch_name: String,
        force: bool,
        /// Whether undo should move the remote branch back.
        undoable: bool,
    },
    ForcePushRef {
        branch_name: String,
        sha: Sha,
    },
    DeleteLocalBranch {
        branch_name: String,
        force: bool,
    },
    DeleteRemoteBranch {
        branch_name: String,
        is_tracking: bool,
    },
    SetParentBranch {
        branch_name: String,
        parent_branch_name: String,
    },
    DeleteParentBranch {
        branch_name: String,
    },
    DeleteAncestorBranches,
    /// Fails unless the branch differs from its parent.
    EnsureHasShippableChanges {
        branch_name: String,
    },
    StashOpenChanges,
    RestoreOpenChanges,
    ChangeDirectory {
        directory: PathBuf,
    },
    /// Teardown counterpart of [`Step::ChangeDirectory`].
    RestoreDirectory {
        directory: PathBuf,
    },
    ContinueMerge,
    ContinueRebase,
    CommitSquashMerge {
        branch_name: String,
        commit_message: Option<String>,
    },
    AbortMerge,
    AbortRebase,
    DiscardOpenChanges,
    /// Moves `branch_name` back to `sha`. Refuses to touch any other branch.
    ResetToSha {
        branch_name: String,
        sha: Sha,
        hard: bool,
    },
    NoOp,
    /// Stands in for the inverse of an operation that cannot be reversed.
    Irreversible {
        operation: String,
    },
}

impl Step {
    /// Performs the operation.
    ///
    /// Merges, rebases and squash merges report conflicts as
    /// [`StepOutcome::ConflictDetected`] after inspecting the index. Any other
    /// failure is an error.
    pub fn run(&self, ctx: &mut StepContext) -> GitResult<StepOutcome> {
        debug!(step = %self, "running step");
        match self {
            Step::CheckoutBranch { branch_name } => {
                if ctx.git.current_branch()? != *branch_name {
                    ctx.git.apply(GitEffect::Checkout {
                        branch: branch_name.clone(),
                    })?;
                }
            }
            Step::MergeBranch { branch_name } => {
                return apply_watching_conflicts(
                    ctx,
                    GitEffect::Merge {
                        target: branch_name.clone(),
                    },
                );
            }
            Step::MergeTrackingBranch => {
                let branch = ctx.git.current_branch()?;
                if ctx.git.has_tracking_branch(&branch)? {
                    let target = ctx.tracking_ref(&branch);
                    return apply_watching_conflicts(ctx, GitEffect::Merge { target });
                }
            }
            Step::RebaseTrackingBranch => {
                let branch = ctx.git.current_branch()?;
                if ctx.git.has_tracking_branch(&branch)? {
                    let target = ctx.tracking_ref(&branch);
                    return apply_watching_conflicts(ctx, GitEffect::Rebase { target });
                }
            }
            Step::SquashMergeBranch {
                branch_name,
                commit_message,
            } => {
                let outcome = apply_watching_conflicts(
                    ctx,
                    GitEffect::MergeSquash {
                        branch: branch_name.clone(),
                    },
                )?;
                if outcome != StepOutcome::Completed {
                    return Ok(outcome);
                }
                ctx.git.apply(GitEffect::Commit {
                    message: commit_message.clone(),
                })?;
            }
            Step::PushBranch {
                branch_name, force, ..
            } => {
                let set_upstream = !ctx.git.has_tracking_branch(branch_name)?;
                ctx.git.apply(GitEffect::Push {
                    branch: branch_name.clone(),
                    force: *force,
                    set_upstream,
                })?;
            }
            Step::ForcePushRef { branch_name, sha } => {
                ctx.git.apply(GitEffect::PushSha {
                    sha: sha.clone(),
                    branch: branch_name.clone(),
                })?;
            }
            Step::DeleteLocalBranch { branch_name, force } => {
                ctx.git.apply(GitEffect::DeleteLocalBranch {
                    branch: branch_name.clone(),
                    force: *force,
                })?;
            }
            Step::DeleteRemoteBranch { branch_name, .. } => {
                ctx.git.apply(GitEffect::DeleteRemoteBranch {
                    branch: branch_name.clone(),
                })?;
            }
            Step::SetParentBranch {
                branch_name,
                parent_branch_name,
            } => ctx
                .hierarchy
                .set_parent_branch(branch_name, parent_branch_name)?,
            Step::DeleteParentBranch { branch_name } => {
                ctx.hierarchy.delete_parent_branch(branch_name)?
            }
            Step::DeleteAncestorBranches => ctx.hierarchy.delete_ancestor_branches()?,
            Step::EnsureHasShippableChanges { branch_name } => {
                let parent = ctx
                    .hierarchy
                    .parent_branch(branch_name)
                    .unwrap_or_else(|| ctx.hierarchy.main_branch().to_string());
                if !ctx.git.has_shippable_changes(branch_name, &parent)? {
                    return Err(GitError::NoShippableChanges {
                        branch: branch_name.clone(),
                    });
                }
            }
            Step::StashOpenChanges => {
                if ctx.git.has_open_changes()? {
                    ctx.git.apply(GitEffect::StashSave {
                        message: OPEN_CHANGES_STASH_MESSAGE.to_string(),
                    })?;
                } else {
                    debug!("working tree clean, nothing to stash");
                }
            }
            Step::RestoreOpenChanges => {
                let top = ctx.git.stash_top_message()?;
                if top.as_deref() == Some(OPEN_CHANGES_STASH_MESSAGE) {
                    ctx.git.apply(GitEffect::StashPop)?;
                } else {
                    debug!(top = ?top, "no stash entry of ours to restore");
                }
            }
            Step::ChangeDirectory { directory } | Step::RestoreDirectory { directory } => {
                if ctx.git.current_directory()? != *directory {
                    ctx.git.apply(GitEffect::ChangeDirectory {
                        directory: directory.clone(),
                    })?;
                }
            }
            Step::ContinueMerge => {
                if ctx.git.merge_in_progress()? {
                    ctx.git.apply(GitEffect::Commit { message: None })?;
                }
            }
            Step::ContinueRebase => {
                if ctx.git.rebase_in_progress()? {
                    return apply_watching_conflicts(ctx, GitEffect::RebaseContinue);
                }
            }
            Step::CommitSquashMerge { commit_message, .. } => {
                if ctx.git.has_open_changes()? {
                    ctx.git.apply(GitEffect::Commit {
                        message: commit_message.clone(),
                    })?;
                }
            }
            Step::AbortMerge => {
                if ctx.git.merge_in_progress()? {
                    ctx.git.apply(GitEffect::MergeAbort)?;
                }
            }
            Step::AbortRebase => {
                if ctx.git.rebase_in_progress()? {
                    ctx.git.apply(GitEffect::RebaseAbort)?;
                }
            }
            Step::DiscardOpenChanges => ctx.git.apply(GitEffect::Reset {
                target: "HEAD".to_string(),
                hard: true,
            })?,
            Step::ResetToSha {
                branch_name,
                sha,
                hard,
            } => {
                let current = ctx.git.current_branch()?;
                if current != *branch_name {
                    return Err(GitError::UnexpectedBranch {
                        expected: branch_name.clone(),
                        actual: current,
                    });
                }
                ctx.git.apply(GitEffect::Reset {
                    target: sha.to_string(),
                    hard: *hard,
                })?;
            }
            Step::NoOp | Step::Irreversible { .. } => {}
        }
        Ok(StepOutcome::Completed)
    }

    /// Computes the step that reverses this one.
    ///
    /// Must be called before [`Step::run`]: most inverses capture the
    /// repository state the step is about to change.
    pub fn create_undo_step(&self, ctx: &mut StepContext) -> GitResult<Step> {
        let undo = match self {
            Step::CheckoutBranch { .. } => Step::CheckoutBranch {
                branch_name: ctx.git.current_branch()?,
            },
            Step::MergeBranch { .. }
            | Step::MergeTrackingBranch
            | Step::RebaseTrackingBranch
            | Step::SquashMergeBranch { .. }
            | Step::ResetToSha { .. } => {
                let branch_name = ctx.git.current_branch()?;
                let sha = ctx.git.head_sha()?;
                let hard = match self {
                    Step::ResetToSha { hard, .. } => *hard,
                    _ => true,
                };
                Step::ResetToSha {
                    branch_name,
                    sha,
                    hard,
                }
            }
            Step::PushBranch {
                branch_name,
                undoable,
                ..
            } => {
                let tracking = ctx.tracking_ref(branch_name);
                let remote_sha = ctx.git.rev_parse(&tracking)?;
                let local_sha = ctx.git.rev_parse(branch_name)?;
                match remote_sha {
                    Some(remote) if Some(&remote) == local_sha.as_ref() => Step::NoOp,
                    _ if !undoable => Step::Irreversible {
                        operation: format!("push of branch '{}'", branch_name),
                    },
                    Some(remote) => Step::ForcePushRef {
                        branch_name: branch_name.clone(),
                        sha: remote,
                    },
                    None => Step::DeleteRemoteBranch {
                        branch_name: branch_name.clone(),
                        is_tracking: false,
                    },
                }
            }
            Step::ForcePushRef { branch_name, .. } => {
                let tracking = ctx.tracking_ref(branch_name);
                match ctx.git.rev_parse(&tracking)? {
                    Some(sha) => Step::ForcePushRef {
                        branch_name: branch_name.clone(),
                        sha,
                    },
                    None => Step::Irreversible {
                        operation: format!("force push of branch '{}'", branch_name),
                    },
                }
            }
            Step::DeleteLocalBranch { branch_name, .. } => Step::Irreversible {
                operation: format!("deletion of local branch '{}'", branch_name),
            },
            Step::DeleteRemoteBranch { branch_name, .. } => Step::Irreversible {
                operation: format!("deletion of remote branch '{}'", branch_name),
            },
            Step::SetParentBranch { branch_name, .. } => {
                match ctx.hierarchy.parent_branch(branch_name) {
                    Some(parent) => Step::SetParentBranch {
                        branch_name: branch_name.clone(),
                        parent_branch_name: parent,
                    },
                    None => Step::DeleteParentBranch {
                        branch_name: branch_name.clone(),
                    },
                }
            }
            Step::DeleteParentBranch { branch_name } => {
                match ctx.hierarchy.parent_branch(branch_name) {
                    Some(parent) => Step::SetParentBranch {
                        branch_name: branch_name.clone(),
                        parent_branch_name: parent,
                    },
                    None => Step::NoOp,
                }
            }
            Step::StashOpenChanges => Step::RestoreOpenChanges,
            Step::RestoreOpenChanges => Step::StashOpenChanges,
            Step::ChangeDirectory { .. } => Step::RestoreDirectory {
                directory: ctx.git.current_directory()?,
            },
            Step::RestoreDirectory { .. } => Step::ChangeDirectory {
                directory: ctx.git.current_directory()?,
            },
            Step::DeleteAncestorBranches
            | Step::EnsureHasShippableChanges { .. }
            | Step::ContinueMerge
            | Step::ContinueRebase
            | Step::CommitSquashMerge { .. }
            | Step::AbortMerge
            | Step::AbortRebase
            | Step::DiscardOpenChanges
            | Step::NoOp
            | Step::Irreversible { .. } => Step::NoOp,
        };
        trace!(step = %self, undo = %undo, "computed undo step");
        Ok(undo)
    }

    /// The step that finishes this one once its conflicts are resolved.
    ///
    /// Steps that cannot be left half-applied are simply re-run.
    pub fn create_continue_step(&self) -> Step {
        match self {
            Step::MergeBranch { .. } | Step::MergeTrackingBranch => Step::ContinueMerge,
            Step::RebaseTrackingBranch => Step::ContinueRebase,
            Step::SquashMergeBranch {
                branch_name,
                commit_message,
            } => Step::CommitSquashMerge {
                branch_name: branch_name.clone(),
                commit_message: commit_message.clone(),
            },
            other => other.clone(),
        }
    }

    /// The step that backs this one out while it is stopped on a conflict.
    pub fn create_abort_step(&self) -> Step {
        match self {
            Step::MergeBranch { .. } | Step::MergeTrackingBranch | Step::ContinueMerge => {
                Step::AbortMerge
            }
            Step::RebaseTrackingBranch | Step::ContinueRebase => Step::AbortRebase,
            Step::SquashMergeBranch { .. }
            | Step::CommitSquashMerge { .. }
            | Step::RestoreOpenChanges => Step::DiscardOpenChanges,
            _ => Step::NoOp,
        }
    }

    /// Guards whose failure should unwind the run instead of leaving it
    /// pending.
    pub fn should_automatically_abort_on_error(&self) -> bool {
        matches!(self, Step::EnsureHasShippableChanges { .. })
    }

    /// Setup and teardown steps inserted by [`StepList::wrap`](super::StepList::wrap).
    pub fn is_wrap_step(&self) -> bool {
        matches!(
            self,
            Step::StashOpenChanges
                | Step::RestoreOpenChanges
                | Step::ChangeDirectory { .. }
                | Step::RestoreDirectory { .. }
        )
    }

    /// Teardown steps release resources acquired by setup steps.
    pub fn is_teardown(&self) -> bool {
        matches!(self, Step::RestoreOpenChanges | Step::RestoreDirectory { .. })
    }
}

/// Runs a mutation and inspects the index afterwards.
///
/// Unmerged paths mean a conflict regardless of how the command exited.
fn apply_watching_conflicts(ctx: &mut StepContext, effect: GitEffect) -> GitResult<StepOutcome> {
    let result = ctx.git.apply(effect);
    let conflicting_files = ctx.git.conflicting_files()?;
    if !conflicting_files.is_empty() {
        if let Err(err) = &result {
            debug!(error = %err, "mutation stopped with conflicts");
        }
        return Ok(StepOutcome::ConflictDetected { conflicting_files });
    }
    result.map(|()| StepOutcome::Completed)
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::CheckoutBranch { branch_name } => write!(f, "checkout {}", branch_name),
            Step::MergeBranch { branch_name } => write!(f, "merge {}", branch_name),
            Step::MergeTrackingBranch => write!(f, "merge tracking branch"),
            Step::RebaseTrackingBranch => write!(f, "rebase onto tracking branch"),
            Step::SquashMergeBranch { branch_name, .. } => {
                write!(f, "squash-merge {}", branch_name)
            }
            Step::PushBranch {
                branch_name, force, ..
            } => {
                if *force {
                    write!(f, "force-push {}", branch_name)
                } else {
                    write!(f, "push {}", branch_name)
                }
            }
            Step::ForcePushRef { branch_name, sha } => {
                write!(f, "force-push {} to {}", branch_name, sha.short())
            }
            Step::DeleteLocalBranch { branch_name, .. } => {
                write!(f, "delete local branch {}", branch_name)
            }
            Step::DeleteRemoteBranch { branch_name, .. } => {
                write!(f, "delete remote branch {}", branch_name)
            }
            Step::SetParentBranch {
                branch_name,
                parent_branch_name,
            } => write!(f, "set parent of {} to {}", branch_name, parent_branch_name),
            Step::DeleteParentBranch { branch_name } => {
                write!(f, "delete parent of {}", branch_name)
            }
            Step::DeleteAncestorBranches => write!(f, "delete ancestor branches"),
            Step::EnsureHasShippableChanges { branch_name } => {
                write!(f, "ensure {} has shippable changes", branch_name)
            }
            Step::StashOpenChanges => write!(f, "stash open changes"),
            Step::RestoreOpenChanges => write!(f, "restore open changes"),
            Step::ChangeDirectory { directory } => write!(f, "cd {}", directory.display()),
            Step::RestoreDirectory { directory } => {
                write!(f, "cd back to {}", directory.display())
            }
            Step::ContinueMerge => write!(f, "continue merge"),
            Step::ContinueRebase => write!(f, "continue rebase"),
            Step::CommitSquashMerge { branch_name, .. } => {
                write!(f, "commit squash of {}", branch_name)
            }
            Step::AbortMerge => write!(f, "abort merge"),
            Step::AbortRebase => write!(f, "abort rebase"),
            Step::DiscardOpenChanges => write!(f, "discard open changes"),
            Step::ResetToSha {
                branch_name, sha, ..
            } => write!(f, "reset {} to {}", branch_name, sha.short()),
            Step::NoOp => write!(f, "no-op"),
            Step::Irreversible { operation } => write!(f, "irreversible: {}", operation),
        }
    }
}
