//! Branch hierarchy: which branch each feature branch was cut from.
//!
//! The engine never owns the storage format. Steps and generators go through
//! the [`BranchHierarchy`] trait; [`MemoryHierarchy`] keeps the relationships
//! in memory (tests, and the read cache of [`GitConfigHierarchy`]).

pub mod git_config;

use std::collections::{BTreeMap, HashSet};

use crate::git::GitResult;

pub use git_config::GitConfigHierarchy;

/// Parent/child relationships between branches.
///
/// Reads are served from memory and cannot fail; writes may have to reach
/// persistent storage and therefore return a [`GitResult`].
pub trait BranchHierarchy {
    fn main_branch(&self) -> &str;

    fn perennial_branches(&self) -> &[String];

    /// A feature branch is any branch that is neither main nor perennial.
    fn is_feature_branch(&self, branch: &str) -> bool {
        branch != self.main_branch() && !self.perennial_branches().iter().any(|p| p == branch)
    }

    fn parent_branch(&self, branch: &str) -> Option<String>;

    /// Direct children of `branch`, sorted by name.
    fn child_branches(&self, branch: &str) -> Vec<String>;

    /// All ancestors of `branch`, oldest first (the root is usually main).
    ///
    /// Walks parent links; a cycle in the stored data ends the walk.
    fn ancestor_branches(&self, branch: &str) -> Vec<String> {
        let mut ancestors = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(branch.to_string());
        let mut current = branch.to_string();
        while let Some(parent) = self.parent_branch(&current) {
            if !visited.insert(parent.clone()) {
                break;
            }
            ancestors.push(parent.clone());
            current = parent;
        }
        ancestors.reverse();
        ancestors
    }

    fn set_parent_branch(&mut self, branch: &str, parent: &str) -> GitResult<()>;

    fn delete_parent_branch(&mut self, branch: &str) -> GitResult<()>;

    /// Drops every cached ancestor list. Parent links are kept.
    fn delete_ancestor_branches(&mut self) -> GitResult<()>;
}

/// In-memory branch hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryHierarchy {
    main_branch: String,
    perennial_branches: Vec<String>,
    parents: BTreeMap<String, String>,
    cached_ancestors: BTreeMap<String, Vec<String>>,
}

impl MemoryHierarchy {
    pub fn new(main_branch: impl Into<String>) -> Self {
        MemoryHierarchy {
            main_branch: main_branch.into(),
            ..Default::default()
        }
    }

    pub fn with_perennial(mut self, branch: impl Into<String>) -> Self {
        self.perennial_branches.push(branch.into());
        self
    }

    pub fn with_parent(mut self, branch: impl Into<String>, parent: impl Into<String>) -> Self {
        self.parents.insert(branch.into(), parent.into());
        self
    }

    /// Records an ancestor list as read from storage.
    pub fn cache_ancestors(&mut self, branch: impl Into<String>, ancestors: Vec<String>) {
        self.cached_ancestors.insert(branch.into(), ancestors);
    }

    /// Branches that currently have a cached ancestor list.
    pub fn cached_ancestor_branches(&self) -> Vec<String> {
        self.cached_ancestors.keys().cloned().collect()
    }

    pub(crate) fn set_main_branch(&mut self, branch: impl Into<String>) {
        self.main_branch = branch.into();
    }

    pub(crate) fn set_perennial_branches(&mut self, branches: Vec<String>) {
        self.perennial_branches = branches;
    }
}

impl BranchHierarchy for MemoryHierarchy {
    fn main_branch(&self) -> &str {
        &self.main_branch
    }

    fn perennial_branches(&self) -> &[String] {
        &self.perennial_branches
    }

    fn parent_branch(&self, branch: &str) -> Option<String> {
        self.parents.get(branch).cloned()
    }

    fn child_branches(&self, branch: &str) -> Vec<String> {
        self.parents
            .iter()
            .filter(|(_, parent)| parent.as_str() == branch)
            .map(|(child, _)| child.clone())
            .collect()
    }

    fn set_parent_branch(&mut self, branch: &str, parent: &str) -> GitResult<()> {
        self.parents.insert(branch.to_string(), parent.to_string());
        Ok(())
    }

    fn delete_parent_branch(&mut self, branch: &str) -> GitResult<()> {
        self.parents.remove(branch);
        Ok(())
    }

    fn delete_ancestor_branches(&mut self) -> GitResult<()> {
        self.cached_ancestors.clear();
        Ok(())
    }
}
