//! Shared test utilities: an in-memory repository and arbitrary generators
//! for property-based testing.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use proptest::prelude::*;

use crate::effects::{GitEffect, GitInterpreter, GitResponse};
use crate::git::{GitError, GitResult};
use crate::persistence::{RunState, UnfinishedDetails};
use crate::steps::{Step, StepList};
use crate::types::Sha;

const REMOTE: &str = "origin";

#[derive(Debug, Clone)]
struct Commit {
    parents: Vec<usize>,
    /// Every change label reachable from this commit.
    tree: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Merge { theirs: usize },
    Rebase { onto: usize },
}

/// An in-memory repository that interprets [`GitEffect`]s.
///
/// Commits carry a set of change labels instead of file contents. A merge
/// unions the labels of both sides, so "does branch X contain change Y" is
/// answerable without diffing. Conflicts and failures are never inferred;
/// tests script them for a specific effect.
#[derive(Debug, Clone)]
pub struct FakeRepository {
    commits: Vec<Commit>,
    branches: BTreeMap<String, usize>,
    remote_branches: BTreeMap<String, usize>,
    tracking: BTreeMap<String, usize>,
    current: String,
    root: PathBuf,
    cwd: PathBuf,
    open_changes: BTreeSet<String>,
    stash: Vec<(String, BTreeSet<String>)>,
    pending: Option<Pending>,
    conflicts: Vec<String>,
    scripted_conflicts: Vec<(GitEffect, Vec<String>)>,
    scripted_failures: Vec<GitEffect>,
    mutations: Vec<GitEffect>,
    has_remote: bool,
}

impl FakeRepository {
    /// A repository with one commit on `main_branch`, pushed to `origin`.
    pub fn new(main_branch: &str) -> Self {
        let mut tree = BTreeSet::new();
        tree.insert("initial".to_string());
        let root = PathBuf::from("/repo");
        FakeRepository {
            commits: vec![Commit {
                parents: Vec::new(),
                tree,
            }],
            branches: BTreeMap::from([(main_branch.to_string(), 0)]),
            remote_branches: BTreeMap::from([(main_branch.to_string(), 0)]),
            tracking: BTreeMap::from([(main_branch.to_string(), 0)]),
            current: main_branch.to_string(),
            cwd: root.clone(),
            root,
            open_changes: BTreeSet::new(),
            stash: Vec::new(),
            pending: None,
            conflicts: Vec::new(),
            scripted_conflicts: Vec::new(),
            scripted_failures: Vec::new(),
            mutations: Vec::new(),
            has_remote: true,
        }
    }

    // ─── Arrangement ───

    pub fn create_branch(&mut self, name: &str, from: &str) {
        let tip = self.tip(from);
        self.branches.insert(name.to_string(), tip);
    }

    /// Commits `label` on top of `branch` without checking it out.
    pub fn commit(&mut self, branch: &str, label: &str) -> Sha {
        let tip = self.tip(branch);
        let mut tree = self.commits[tip].tree.clone();
        tree.insert(label.to_string());
        let id = self.add_commit(vec![tip], tree);
        self.branches.insert(branch.to_string(), id);
        commit_sha(id)
    }

    /// Simulates someone else pushing `label` to the remote branch.
    ///
    /// The tracking ref only moves on the next fetch.
    pub fn push_remote_commit(&mut self, branch: &str, label: &str) -> Sha {
        let tip = *self
            .remote_branches
            .get(branch)
            .unwrap_or_else(|| panic!("no remote branch {}", branch));
        let mut tree = self.commits[tip].tree.clone();
        tree.insert(label.to_string());
        let id = self.add_commit(vec![tip], tree);
        self.remote_branches.insert(branch.to_string(), id);
        commit_sha(id)
    }

    /// Pushes `branch` as it is now and tracks it.
    pub fn publish(&mut self, branch: &str) {
        let tip = self.tip(branch);
        self.remote_branches.insert(branch.to_string(), tip);
        self.tracking.insert(branch.to_string(), tip);
    }

    pub fn set_current(&mut self, branch: &str) {
        assert!(self.branches.contains_key(branch), "no branch {}", branch);
        self.current = branch.to_string();
    }

    pub fn set_current_dir(&mut self, dir: impl Into<PathBuf>) {
        self.cwd = dir.into();
    }

    pub fn set_has_remote(&mut self, has_remote: bool) {
        self.has_remote = has_remote;
    }

    pub fn add_open_changes(&mut self, labels: &[&str]) {
        self.open_changes
            .extend(labels.iter().map(|label| label.to_string()));
    }

    /// An older stash entry the run under test did not create.
    pub fn push_stash_entry(&mut self, message: &str, labels: &[&str]) {
        let changes = labels.iter().map(|label| label.to_string()).collect();
        self.stash.push((message.to_string(), changes));
    }

    /// The next interpretation of exactly `effect` stops with conflicts.
    pub fn script_conflict(&mut self, effect: GitEffect, files: &[&str]) {
        self.scripted_conflicts
            .push((effect, files.iter().map(|f| f.to_string()).collect()));
    }

    /// The next interpretation of exactly `effect` fails.
    pub fn script_failure(&mut self, effect: GitEffect) {
        self.scripted_failures.push(effect);
    }

    /// Marks all conflicts as resolved, leaving the operation in progress.
    pub fn resolve_conflicts(&mut self) {
        self.conflicts.clear();
    }

    // ─── Inspection ───

    /// Every mutation attempted, in order. Queries are not recorded.
    pub fn mutations(&self) -> &[GitEffect] {
        &self.mutations
    }

    pub fn clear_mutations(&mut self) {
        self.mutations.clear();
    }

    pub fn sha(&self, branch: &str) -> Option<Sha> {
        self.branches.get(branch).map(|&id| commit_sha(id))
    }

    pub fn tracking_sha(&self, branch: &str) -> Option<Sha> {
        self.tracking.get(branch).map(|&id| commit_sha(id))
    }

    pub fn remote_sha(&self, branch: &str) -> Option<Sha> {
        self.remote_branches.get(branch).map(|&id| commit_sha(id))
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn has_local(&self, branch: &str) -> bool {
        self.branches.contains_key(branch)
    }

    pub fn current_dir(&self) -> PathBuf {
        self.cwd.clone()
    }

    pub fn open_changes(&self) -> Vec<String> {
        self.open_changes.iter().cloned().collect()
    }

    pub fn stash_len(&self) -> usize {
        self.stash.len()
    }

    pub fn contains_change(&self, branch: &str, label: &str) -> bool {
        self.branches
            .get(branch)
            .is_some_and(|&id| self.commits[id].tree.contains(label))
    }

    pub fn remote_contains_change(&self, branch: &str, label: &str) -> bool {
        self.remote_branches
            .get(branch)
            .is_some_and(|&id| self.commits[id].tree.contains(label))
    }

    /// Number of parents of the tip of `branch`.
    pub fn parent_count(&self, branch: &str) -> usize {
        self.commits[self.tip(branch)].parents.len()
    }

    // ─── Internals ───

    fn tip(&self, branch: &str) -> usize {
        *self
            .branches
            .get(branch)
            .unwrap_or_else(|| panic!("no branch {}", branch))
    }

    fn head(&self) -> usize {
        self.tip(&self.current)
    }

    fn add_commit(&mut self, parents: Vec<usize>, tree: BTreeSet<String>) -> usize {
        self.commits.push(Commit { parents, tree });
        self.commits.len() - 1
    }

    fn resolve(&self, rev: &str) -> Option<usize> {
        if rev == "HEAD" {
            return Some(self.head());
        }
        if let Some(branch) = rev
            .strip_prefix(REMOTE)
            .and_then(|rest| rest.strip_prefix('/'))
            && let Some(&id) = self.tracking.get(branch)
        {
            return Some(id);
        }
        if let Some(&id) = self.branches.get(rev) {
            return Some(id);
        }
        (0..self.commits.len()).find(|&id| commit_sha(id).as_str() == rev)
    }

    fn is_ancestor(&self, ancestor: usize, of: usize) -> bool {
        let mut seen = HashSet::new();
        let mut queue = vec![of];
        while let Some(id) = queue.pop() {
            if id == ancestor {
                return true;
            }
            if seen.insert(id) {
                queue.extend(self.commits[id].parents.iter().copied());
            }
        }
        false
    }

    fn union_tree(&self, a: usize, b: usize) -> BTreeSet<String> {
        self.commits[a]
            .tree
            .union(&self.commits[b].tree)
            .cloned()
            .collect()
    }

    /// Merges `theirs` into the current branch: no-op, fast-forward or merge
    /// commit.
    fn merge_into_current(&mut self, theirs: usize) {
        let head = self.head();
        if self.is_ancestor(theirs, head) {
            return;
        }
        let result = if self.is_ancestor(head, theirs) {
            theirs
        } else {
            let tree = self.union_tree(head, theirs);
            self.add_commit(vec![head, theirs], tree)
        };
        self.branches.insert(self.current.clone(), result);
    }

    fn rebase_current(&mut self, onto: usize) {
        let head = self.head();
        if self.is_ancestor(onto, head) {
            return;
        }
        let result = if self.is_ancestor(head, onto) {
            onto
        } else {
            let tree = self.union_tree(head, onto);
            self.add_commit(vec![onto], tree)
        };
        self.branches.insert(self.current.clone(), result);
    }

    fn take_scripted_conflict(&mut self, effect: &GitEffect) -> Option<Vec<String>> {
        let index = self
            .scripted_conflicts
            .iter()
            .position(|(scripted, _)| scripted == effect)?;
        Some(self.scripted_conflicts.remove(index).1)
    }

    fn resolve_or_fail(&self, effect: &GitEffect, rev: &str) -> GitResult<usize> {
        self.resolve(rev)
            .ok_or_else(|| failure(effect, format!("unknown revision '{}'", rev)))
    }

    fn mutate(&mut self, effect: GitEffect) -> GitResult<GitResponse> {
        self.mutations.push(effect.clone());
        if let Some(index) = self.scripted_failures.iter().position(|e| *e == effect) {
            self.scripted_failures.remove(index);
            return Err(failure(&effect, "scripted failure"));
        }

        match &effect {
            GitEffect::Fetch => {
                self.tracking = self.remote_branches.clone();
            }
            GitEffect::Checkout { branch } => {
                if self.pending.is_some() || !self.conflicts.is_empty() {
                    return Err(failure(&effect, "you need to resolve your current index first"));
                }
                if !self.branches.contains_key(branch) {
                    let Some(&tracked) = self.tracking.get(branch) else {
                        return Err(failure(&effect, format!("pathspec '{}' did not match", branch)));
                    };
                    self.branches.insert(branch.clone(), tracked);
                }
                self.current = branch.clone();
            }
            GitEffect::Merge { target } => {
                let theirs = self.resolve_or_fail(&effect, target)?;
                if let Some(files) = self.take_scripted_conflict(&effect) {
                    self.pending = Some(Pending::Merge { theirs });
                    self.conflicts = files;
                    return Err(failure(&effect, "automatic merge failed"));
                }
                self.merge_into_current(theirs);
            }
            GitEffect::MergeSquash { branch } => {
                let theirs = self.resolve_or_fail(&effect, branch)?;
                let head = self.head();
                let incoming: Vec<String> = self.commits[theirs]
                    .tree
                    .difference(&self.commits[head].tree)
                    .cloned()
                    .collect();
                self.open_changes.extend(incoming);
                if let Some(files) = self.take_scripted_conflict(&effect) {
                    self.conflicts = files;
                    return Err(failure(&effect, "automatic merge failed"));
                }
            }
            GitEffect::Commit { .. } => {
                if !self.conflicts.is_empty() {
                    return Err(failure(&effect, "unmerged files"));
                }
                let head = self.head();
                let result = match self.pending.take() {
                    Some(Pending::Merge { theirs }) => {
                        let tree = self.union_tree(head, theirs);
                        self.add_commit(vec![head, theirs], tree)
                    }
                    Some(pending @ Pending::Rebase { .. }) => {
                        self.pending = Some(pending);
                        return Err(failure(&effect, "rebase in progress"));
                    }
                    None if self.open_changes.is_empty() => {
                        return Err(failure(&effect, "nothing to commit"));
                    }
                    None => {
                        let mut tree = self.commits[head].tree.clone();
                        tree.extend(std::mem::take(&mut self.open_changes));
                        self.add_commit(vec![head], tree)
                    }
                };
                self.branches.insert(self.current.clone(), result);
            }
            GitEffect::MergeAbort => {
                if !matches!(self.pending, Some(Pending::Merge { .. })) {
                    return Err(failure(&effect, "there is no merge to abort"));
                }
                self.pending = None;
                self.conflicts.clear();
            }
            GitEffect::Rebase { target } => {
                let onto = self.resolve_or_fail(&effect, target)?;
                if let Some(files) = self.take_scripted_conflict(&effect) {
                    self.pending = Some(Pending::Rebase { onto });
                    self.conflicts = files;
                    return Err(failure(&effect, "could not apply commit"));
                }
                self.rebase_current(onto);
            }
            GitEffect::RebaseContinue => {
                let Some(Pending::Rebase { onto }) = self.pending else {
                    return Err(failure(&effect, "no rebase in progress"));
                };
                if let Some(files) = self.take_scripted_conflict(&effect) {
                    self.conflicts = files;
                    return Err(failure(&effect, "could not apply commit"));
                }
                if !self.conflicts.is_empty() {
                    return Err(failure(&effect, "you must edit all merge conflicts"));
                }
                self.pending = None;
                self.rebase_current(onto);
            }
            GitEffect::RebaseAbort => {
                if !matches!(self.pending, Some(Pending::Rebase { .. })) {
                    return Err(failure(&effect, "no rebase in progress"));
                }
                self.pending = None;
                self.conflicts.clear();
            }
            GitEffect::Push {
                branch,
                force,
                set_upstream: _,
            } => {
                let Some(&local) = self.branches.get(branch) else {
                    return Err(failure(&effect, format!("src refspec {} does not match any", branch)));
                };
                if let Some(&remote) = self.remote_branches.get(branch)
                    && !force
                    && !self.is_ancestor(remote, local)
                {
                    return Err(failure(&effect, "rejected (non-fast-forward)"));
                }
                self.remote_branches.insert(branch.clone(), local);
                self.tracking.insert(branch.clone(), local);
            }
            GitEffect::PushSha { sha, branch } => {
                let id = self.resolve_or_fail(&effect, sha.as_str())?;
                self.remote_branches.insert(branch.clone(), id);
                self.tracking.insert(branch.clone(), id);
            }
            GitEffect::DeleteRemoteBranch { branch } => {
                if self.remote_branches.remove(branch).is_none() {
                    return Err(failure(&effect, "remote ref does not exist"));
                }
                self.tracking.remove(branch);
            }
            GitEffect::DeleteLocalBranch { branch, force } => {
                if *branch == self.current {
                    return Err(failure(&effect, "cannot delete the checked out branch"));
                }
                let Some(&tip) = self.branches.get(branch) else {
                    return Err(failure(&effect, format!("branch '{}' not found", branch)));
                };
                if !force && !self.is_ancestor(tip, self.head()) {
                    return Err(failure(&effect, "the branch is not fully merged"));
                }
                self.branches.remove(branch);
            }
            GitEffect::Reset { target, hard } => {
                let id = self.resolve_or_fail(&effect, target)?;
                self.branches.insert(self.current.clone(), id);
                if *hard {
                    self.open_changes.clear();
                    self.conflicts.clear();
                    self.pending = None;
                }
            }
            GitEffect::StashSave { message } => {
                if !self.open_changes.is_empty() {
                    let changes = std::mem::take(&mut self.open_changes);
                    self.stash.push((message.clone(), changes));
                }
            }
            GitEffect::StashPop => {
                let Some((_, changes)) = self.stash.pop() else {
                    return Err(failure(&effect, "no stash entries found"));
                };
                self.open_changes.extend(changes);
            }
            GitEffect::ChangeDirectory { directory } => {
                self.cwd = directory.clone();
            }
            _ => unreachable!("queries are answered by query()"),
        }
        Ok(GitResponse::Ok)
    }

    fn query(&self, effect: &GitEffect) -> GitResult<GitResponse> {
        let response = match effect {
            GitEffect::CurrentBranch => GitResponse::Text(self.current.clone()),
            GitEffect::RevParse { rev } => match self.resolve(rev) {
                Some(id) => GitResponse::Sha(commit_sha(id)),
                None => GitResponse::Missing,
            },
            GitEffect::HasOpenChanges => {
                GitResponse::Bool(!self.open_changes.is_empty() || !self.conflicts.is_empty())
            }
            GitEffect::ConflictingFiles => GitResponse::Files(self.conflicts.clone()),
            GitEffect::MergeInProgress => {
                GitResponse::Bool(matches!(self.pending, Some(Pending::Merge { .. })))
            }
            GitEffect::RebaseInProgress => {
                GitResponse::Bool(matches!(self.pending, Some(Pending::Rebase { .. })))
            }
            GitEffect::HasBranch { branch } => GitResponse::Bool(self.branches.contains_key(branch)),
            GitEffect::HasTrackingBranch { branch } => {
                GitResponse::Bool(self.tracking.contains_key(branch))
            }
            GitEffect::HasRemote => GitResponse::Bool(self.has_remote),
            GitEffect::HasShippableChanges { branch, parent } => {
                let lookup = |name: &str| {
                    self.branches
                        .get(name)
                        .copied()
                        .ok_or_else(|| GitError::RefNotFound {
                            refspec: name.to_string(),
                        })
                };
                let ours = lookup(branch)?;
                let theirs = lookup(parent)?;
                GitResponse::Bool(self.commits[ours].tree != self.commits[theirs].tree)
            }
            GitEffect::RootDirectory => GitResponse::Path(self.root.clone()),
            GitEffect::CurrentDirectory => GitResponse::Path(self.cwd.clone()),
            GitEffect::StashTopMessage => match self.stash.last() {
                Some((message, _)) => GitResponse::Text(message.clone()),
                None => GitResponse::Missing,
            },
            _ => unreachable!("mutations are applied by mutate()"),
        };
        Ok(response)
    }
}

impl GitInterpreter for FakeRepository {
    fn interpret(&mut self, effect: GitEffect) -> GitResult<GitResponse> {
        if effect.is_mutation() {
            self.mutate(effect)
        } else {
            self.query(&effect)
        }
    }
}

fn commit_sha(id: usize) -> Sha {
    Sha::parse(format!("{:040x}", id + 1)).expect("formatted ids are valid shas")
}

fn failure(effect: &GitEffect, stderr: impl Into<String>) -> GitError {
    GitError::CommandFailed {
        command: format!("{:?}", effect),
        stderr: stderr.into(),
    }
}

/// A fixed repository root for store keys in tests.
pub fn repo_root() -> &'static Path {
    Path::new("/repo")
}

// ─── Generators ───

pub fn arb_sha() -> impl Strategy<Value = Sha> {
    "[0-9a-f]{40}".prop_map(|s| Sha::parse(s).unwrap())
}

pub fn arb_branch_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9/-]{0,30}".prop_map(String::from)
}

fn arb_branch_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        arb_branch_name().prop_map(|b| Step::CheckoutBranch { branch_name: b }),
        arb_branch_name().prop_map(|b| Step::MergeBranch { branch_name: b }),
        Just(Step::MergeTrackingBranch),
        Just(Step::RebaseTrackingBranch),
        (arb_branch_name(), proptest::option::of("[a-zA-Z0-9 ]{1,40}")).prop_map(|(b, m)| {
            Step::SquashMergeBranch {
                branch_name: b,
                commit_message: m,
            }
        }),
        (arb_branch_name(), any::<bool>(), any::<bool>()).prop_map(|(b, force, undoable)| {
            Step::PushBranch {
                branch_name: b,
                force,
                undoable,
            }
        }),
        (arb_branch_name(), arb_sha())
            .prop_map(|(b, sha)| Step::ForcePushRef { branch_name: b, sha }),
        (arb_branch_name(), any::<bool>())
            .prop_map(|(b, force)| Step::DeleteLocalBranch { branch_name: b, force }),
        (arb_branch_name(), any::<bool>()).prop_map(|(b, is_tracking)| {
            Step::DeleteRemoteBranch {
                branch_name: b,
                is_tracking,
            }
        }),
        (arb_branch_name(), arb_sha(), any::<bool>()).prop_map(|(b, sha, hard)| {
            Step::ResetToSha {
                branch_name: b,
                sha,
                hard,
            }
        }),
    ]
}

fn arb_bookkeeping_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (arb_branch_name(), arb_branch_name()).prop_map(|(b, p)| Step::SetParentBranch {
            branch_name: b,
            parent_branch_name: p,
        }),
        arb_branch_name().prop_map(|b| Step::DeleteParentBranch { branch_name: b }),
        Just(Step::DeleteAncestorBranches),
        arb_branch_name().prop_map(|b| Step::EnsureHasShippableChanges { branch_name: b }),
        Just(Step::ContinueMerge),
        Just(Step::ContinueRebase),
        Just(Step::AbortMerge),
        Just(Step::AbortRebase),
        Just(Step::DiscardOpenChanges),
        Just(Step::NoOp),
    ]
}

pub fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => arb_branch_step(),
        3 => arb_bookkeeping_step(),
        1 => "[a-z ]{1,30}".prop_map(|operation| Step::Irreversible { operation }),
    ]
}

pub fn arb_step_list() -> impl Strategy<Value = StepList> {
    prop::collection::vec(arb_step(), 0..8).prop_map(StepList::from)
}

pub fn arb_unfinished_details() -> impl Strategy<Value = UnfinishedDetails> {
    (
        arb_step(),
        prop::collection::vec("[a-z]{1,10}\\.txt", 0..3),
        any::<bool>(),
        arb_branch_name(),
        0i64..4_000_000_000,
    )
        .prop_map(
            |(suspended_step, conflicting_files, can_skip, end_branch, secs)| UnfinishedDetails {
                suspended_step,
                conflicting_files,
                can_skip,
                end_branch,
                end_time: DateTime::<Utc>::from_timestamp(secs, 0).unwrap(),
            },
        )
}

pub fn arb_teardown_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::RestoreOpenChanges),
        "/[a-z]{1,8}".prop_map(|dir| Step::RestoreDirectory {
            directory: PathBuf::from(dir),
        }),
    ]
}

pub fn arb_run_state() -> impl Strategy<Value = RunState> {
    (
        prop_oneof![Just("ship"), Just("sync")],
        arb_branch_name(),
        arb_step_list(),
        arb_step_list(),
        arb_step_list(),
        proptest::collection::vec(arb_teardown_step(), 0..=2),
        proptest::option::of(arb_unfinished_details()),
    )
        .prop_map(
            |(command, initial_branch, run_steps, undo_steps, abort_steps, released, unfinished)| {
                let mut state = RunState::new(command, initial_branch);
                state.run_steps = run_steps;
                state.undo_steps = undo_steps;
                state.abort_steps = abort_steps;
                state.released_teardown = released.into();
                state.unfinished = unfinished;
                state
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::GitQueries;

    #[test]
    fn merge_of_diverged_branches_creates_merge_commit() {
        let mut git = FakeRepository::new("main");
        git.create_branch("feature", "main");
        git.commit("main", "a");
        git.commit("feature", "b");
        git.set_current("feature");

        git.apply(GitEffect::Merge {
            target: "main".to_string(),
        })
        .unwrap();

        assert_eq!(git.parent_count("feature"), 2);
        assert!(git.contains_change("feature", "a"));
        assert!(git.contains_change("feature", "b"));
    }

    #[test]
    fn squash_merge_stages_changes_until_commit() {
        let mut git = FakeRepository::new("main");
        git.create_branch("feature", "main");
        git.commit("feature", "f");

        git.apply(GitEffect::MergeSquash {
            branch: "feature".to_string(),
        })
        .unwrap();
        assert!(git.has_open_changes().unwrap());

        git.apply(GitEffect::Commit { message: None }).unwrap();
        assert!(git.contains_change("main", "f"));
        assert_eq!(git.parent_count("main"), 1);
        assert!(!git.has_open_changes().unwrap());
    }

    #[test]
    fn rev_parse_understands_remote_refs() {
        let mut git = FakeRepository::new("main");
        let pushed = git.sha("main");
        git.commit("main", "local");

        assert_eq!(git.rev_parse("origin/main").unwrap(), pushed);
        assert_eq!(git.rev_parse("origin/feature").unwrap(), None);
        assert_eq!(git.rev_parse("HEAD").unwrap(), git.sha("main"));
    }

    #[test]
    fn fetch_updates_tracking_refs() {
        let mut git = FakeRepository::new("main");
        let remote = git.push_remote_commit("main", "theirs");
        assert_ne!(git.tracking_sha("main"), Some(remote.clone()));

        git.apply(GitEffect::Fetch).unwrap();
        assert_eq!(git.tracking_sha("main"), Some(remote));
    }

    #[test]
    fn scripted_failures_fire_once() {
        let mut git = FakeRepository::new("main");
        let stash = GitEffect::StashSave {
            message: "wip".to_string(),
        };
        git.script_failure(stash.clone());

        assert!(git.apply(stash.clone()).is_err());
        assert!(git.apply(stash).is_ok());
        assert_eq!(git.mutations().len(), 2);
    }
}
