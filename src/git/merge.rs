//! Merge, squash-merge and rebase operations, plus conflict inspection.
//!
//! None of these functions parse git's output to decide whether a conflict
//! happened. A failing merge simply returns the command error; callers then
//! ask [`LocalRepository::conflicting_files`] (unmerged index entries) to
//! tell a content conflict apart from a hard failure.

use super::{GitResult, LocalRepository};

impl LocalRepository {
    /// Merge a branch or commit into HEAD with git's default message.
    pub fn merge(&self, target: &str) -> GitResult<()> {
        self.mutate(&["merge", "--no-edit", target])
    }

    /// Stage a squash of `branch` on top of HEAD (no commit is created).
    pub fn merge_squash(&self, branch: &str) -> GitResult<()> {
        self.mutate(&["merge", "--squash", branch])
    }

    /// Commit the index.
    ///
    /// Without a message the prepared MERGE_MSG/SQUASH_MSG is used.
    pub fn commit(&self, message: Option<&str>) -> GitResult<()> {
        match message {
            Some(message) => self.mutate(&["commit", "-m", message]),
            None => self.mutate(&["commit", "--no-edit"]),
        }
    }

    pub fn merge_abort(&self) -> GitResult<()> {
        self.mutate(&["merge", "--abort"])
    }

    pub fn rebase(&self, target: &str) -> GitResult<()> {
        self.mutate(&["rebase", target])
    }

    pub fn rebase_continue(&self) -> GitResult<()> {
        self.mutate(&["rebase", "--continue"])
    }

    pub fn rebase_abort(&self) -> GitResult<()> {
        self.mutate(&["rebase", "--abort"])
    }

    /// Get the list of files with unresolved merge conflicts.
    pub fn conflicting_files(&self) -> GitResult<Vec<String>> {
        // git diff --name-only --diff-filter=U lists unmerged files
        match self.stdout(&["diff", "--name-only", "--diff-filter=U"]) {
            Ok(output) => Ok(output
                .lines()
                .filter(|l| !l.is_empty())
                .map(|s| s.to_string())
                .collect()),
            Err(_) => {
                // Fallback: unmerged entries straight from the index
                let output = self.stdout(&["ls-files", "-u"])?;
                let mut files: Vec<String> = output
                    .lines()
                    .filter_map(|line| line.split('\t').nth(1))
                    .map(|s| s.to_string())
                    .collect();
                files.dedup();
                Ok(files)
            }
        }
    }

    /// Whether a merge is waiting to be committed.
    pub fn merge_in_progress(&self) -> GitResult<bool> {
        Ok(self.git_dir()?.join("MERGE_HEAD").exists())
    }

    /// Whether a rebase is stopped mid-way.
    pub fn rebase_in_progress(&self) -> GitResult<bool> {
        let git_dir = self.git_dir()?;
        Ok(git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists())
    }

    /// Whether `branch` has content that `parent` does not.
    pub fn has_shippable_changes(&self, branch: &str, parent: &str) -> GitResult<bool> {
        // diff --quiet exits 1 when there are differences
        let identical = self.predicate(&["diff", "--quiet", &format!("{}..{}", parent, branch)])?;
        Ok(!identical)
    }
}
