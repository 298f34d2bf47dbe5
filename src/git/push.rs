//! Fetch, push and remote-branch operations.
//!
//! All functions talk to the remote named in [`GitConfig::remote`](super::GitConfig).
//! Callers are expected to skip them when the repository is offline.

use crate::types::Sha;

use super::{GitResult, LocalRepository};

impl LocalRepository {
    /// Fetch all branches, pruning remote-tracking refs of deleted ones.
    pub fn fetch(&self) -> GitResult<()> {
        let remote = self.config().remote.clone();
        self.mutate(&["fetch", "--prune", &remote])
    }

    /// Push a local branch.
    ///
    /// With `set_upstream` the remote branch is created and recorded as the
    /// upstream of the local branch.
    pub fn push_branch(&self, branch: &str, force: bool, set_upstream: bool) -> GitResult<()> {
        let remote = self.config().remote.clone();
        let mut args = vec!["push"];
        if force {
            args.push("--force-with-lease");
        }
        if set_upstream {
            args.push("-u");
        }
        args.push(&remote);
        args.push(branch);
        self.mutate(&args)
    }

    /// Force the remote branch to point at `sha`.
    pub fn push_sha(&self, sha: &Sha, branch: &str) -> GitResult<()> {
        let remote = self.config().remote.clone();
        let refspec = format!("{}:refs/heads/{}", sha, branch);
        self.mutate(&["push", "--force", &remote, &refspec])
    }

    /// Delete a branch on the remote.
    pub fn delete_remote_branch(&self, branch: &str) -> GitResult<()> {
        let remote = self.config().remote.clone();
        self.mutate(&["push", &remote, "--delete", branch])
    }

    /// Whether the configured remote exists.
    pub fn has_remote(&self) -> GitResult<bool> {
        let remotes = self.stdout(&["remote"])?;
        Ok(remotes.lines().any(|r| r == self.config().remote))
    }

    /// Whether `<remote>/<branch>` exists locally.
    pub fn has_tracking_branch(&self, branch: &str) -> GitResult<bool> {
        self.predicate(&[
            "show-ref",
            "--verify",
            "--quiet",
            &format!("refs/remotes/{}/{}", self.config().remote, branch),
        ])
    }
}
