//! Branch hierarchy stored in repository git config.
//!
//! Keys:
//! - `git-town.main-branch-name`
//! - `git-town.perennial-branch-names` (space separated)
//! - `git-town-branch.<branch>.parent`
//! - `git-town-branch.<branch>.ancestors` (space separated cache)
//!
//! All keys are read once when the hierarchy is loaded. Writes go to git
//! config first and update the in-memory copy only when git succeeded.

use tracing::debug;

use super::{BranchHierarchy, MemoryHierarchy};
use crate::git::{GitConfig, GitError, GitResult, command_failed, git_command, run_git_sync};

const MAIN_BRANCH_KEY: &str = "git-town.main-branch-name";
const PERENNIAL_BRANCHES_KEY: &str = "git-town.perennial-branch-names";
const BRANCH_SECTION: &str = "git-town-branch.";

/// Exit code of `git config --unset` when the key does not exist.
const CONFIG_KEY_MISSING: i32 = 5;

/// Write-through hierarchy backed by `git config`.
#[derive(Debug, Clone)]
pub struct GitConfigHierarchy {
    config: GitConfig,
    entries: MemoryHierarchy,
}

impl GitConfigHierarchy {
    /// Reads every hierarchy key from the repository at `config.workdir`.
    ///
    /// Fails when no main branch is configured.
    pub fn load(config: GitConfig) -> GitResult<Self> {
        let output = git_command(&config, &config.workdir)
            .args(["config", "--get-regexp", "^git-town"])
            .output()?;
        let listing = match output.status.code() {
            Some(0) => String::from_utf8_lossy(&output.stdout).to_string(),
            // no matching keys
            Some(1) => String::new(),
            _ => {
                return Err(command_failed(
                    &["config", "--get-regexp", "^git-town"],
                    &output,
                ));
            }
        };

        let entries = parse_entries(&listing)?;
        debug!(
            main = entries.main_branch(),
            perennial = ?entries.perennial_branches(),
            "loaded branch hierarchy"
        );
        Ok(GitConfigHierarchy { config, entries })
    }

    pub fn entries(&self) -> &MemoryHierarchy {
        &self.entries
    }

    fn set_key(&self, key: &str, value: &str) -> GitResult<()> {
        run_git_sync(&self.config, &self.config.workdir, &["config", key, value])?;
        Ok(())
    }

    fn unset_key(&self, key: &str) -> GitResult<()> {
        let args = ["config", "--unset", key];
        let output = git_command(&self.config, &self.config.workdir)
            .args(args)
            .output()?;
        match output.status.code() {
            Some(0) | Some(CONFIG_KEY_MISSING) => Ok(()),
            _ => Err(command_failed(&args, &output)),
        }
    }
}

/// Parses `git config --get-regexp` output (`<key> <value>` per line).
fn parse_entries(listing: &str) -> GitResult<MemoryHierarchy> {
    let mut main_branch = None;
    let mut entries = MemoryHierarchy::default();

    for line in listing.lines() {
        let (key, value) = line.split_once(' ').unwrap_or((line, ""));
        let value = value.trim();
        if key == MAIN_BRANCH_KEY {
            main_branch = Some(value.to_string());
        } else if key == PERENNIAL_BRANCHES_KEY {
            entries.set_perennial_branches(value.split_whitespace().map(String::from).collect());
        } else if let Some(rest) = key.strip_prefix(BRANCH_SECTION) {
            if let Some(branch) = rest.strip_suffix(".parent") {
                entries.set_parent_branch(branch, value)?;
            } else if let Some(branch) = rest.strip_suffix(".ancestors") {
                entries.cache_ancestors(branch, value.split_whitespace().map(String::from).collect());
            }
        }
    }

    match main_branch {
        Some(main) if !main.is_empty() => {
            entries.set_main_branch(main);
            Ok(entries)
        }
        _ => Err(GitError::Hierarchy {
            details: format!("no main branch configured; run `git config {} <branch>`", MAIN_BRANCH_KEY),
        }),
    }
}

fn parent_key(branch: &str) -> String {
    format!("{}{}.parent", BRANCH_SECTION, branch)
}

fn ancestors_key(branch: &str) -> String {
    format!("{}{}.ancestors", BRANCH_SECTION, branch)
}

impl BranchHierarchy for GitConfigHierarchy {
    fn main_branch(&self) -> &str {
        self.entries.main_branch()
    }

    fn perennial_branches(&self) -> &[String] {
        self.entries.perennial_branches()
    }

    fn parent_branch(&self, branch: &str) -> Option<String> {
        self.entries.parent_branch(branch)
    }

    fn child_branches(&self, branch: &str) -> Vec<String> {
        self.entries.child_branches(branch)
    }

    fn set_parent_branch(&mut self, branch: &str, parent: &str) -> GitResult<()> {
        self.set_key(&parent_key(branch), parent)?;
        self.entries.set_parent_branch(branch, parent)
    }

    fn delete_parent_branch(&mut self, branch: &str) -> GitResult<()> {
        self.unset_key(&parent_key(branch))?;
        self.entries.delete_parent_branch(branch)
    }

    fn delete_ancestor_branches(&mut self) -> GitResult<()> {
        for branch in self.entries.cached_ancestor_branches() {
            self.unset_key(&ancestors_key(&branch))?;
        }
        self.entries.delete_ancestor_branches()
    }
}
