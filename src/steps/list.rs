//! Ordered step plans and the setup/teardown bracket around them.

use std::collections::VecDeque;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::Step;

/// Where a wrapped plan should run, and where to return afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryChange {
    pub repository_root: PathBuf,
    pub initial_directory: PathBuf,
}

/// Setup/teardown requested from [`StepList::wrap`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrapOptions {
    /// Stash uncommitted changes first and restore them last.
    pub stash_open_changes: bool,

    /// Run from the repository root, returning to the initial directory last.
    pub run_in_repository_root: Option<DirectoryChange>,
}

/// An ordered plan of steps. Insertion order is execution order.
///
/// Serializes as a plain JSON array. Whether the list was wrapped is
/// in-memory bookkeeping only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepList {
    steps: VecDeque<Step>,

    #[serde(skip)]
    wrapped: bool,
}

impl PartialEq for StepList {
    fn eq(&self, other: &Self) -> bool {
        self.steps == other.steps
    }
}

impl Eq for StepList {}

impl StepList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, step: Step) {
        self.steps.push_back(step);
    }

    pub fn prepend(&mut self, step: Step) {
        self.steps.push_front(step);
    }

    /// Splices `other` onto the end of this list.
    pub fn append_list(&mut self, other: StepList) {
        self.steps.extend(other.steps);
    }

    pub fn pop_front(&mut self) -> Option<Step> {
        self.steps.pop_front()
    }

    pub fn front(&self) -> Option<&Step> {
        self.steps.front()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }

    /// Brackets the list with setup steps at the head and matching teardown
    /// steps at the tail.
    ///
    /// The directory bracket is left out when the initial directory already
    /// is the repository root.
    ///
    /// # Panics
    ///
    /// If the list was wrapped before.
    pub fn wrap(&mut self, options: WrapOptions) {
        assert!(!self.wrapped, "step list wrapped twice");
        self.wrapped = true;

        if options.stash_open_changes {
            self.prepend(Step::StashOpenChanges);
            self.append(Step::RestoreOpenChanges);
        }
        if let Some(change) = options.run_in_repository_root
            && change.repository_root != change.initial_directory
        {
            self.prepend(Step::ChangeDirectory {
                directory: change.repository_root,
            });
            self.append(Step::RestoreDirectory {
                directory: change.initial_directory,
            });
        }
    }

    /// Drops every setup/teardown step, keeping the domain steps in order.
    pub fn without_wrap_steps(self) -> StepList {
        self.steps
            .into_iter()
            .filter(|step| !step.is_wrap_step())
            .collect()
    }

    /// Removes the first step equal to `step`. Returns whether one was found.
    pub fn remove_first(&mut self, step: &Step) -> bool {
        match self.steps.iter().position(|queued| queued == step) {
            Some(index) => {
                self.steps.remove(index);
                true
            }
            None => false,
        }
    }

    /// The teardown steps still queued, in order.
    pub fn teardown_steps(&self) -> Vec<Step> {
        self.steps
            .iter()
            .filter(|step| step.is_teardown())
            .cloned()
            .collect()
    }
}

impl From<Vec<Step>> for StepList {
    fn from(steps: Vec<Step>) -> Self {
        StepList {
            steps: steps.into(),
            wrapped: false,
        }
    }
}

impl FromIterator<Step> for StepList {
    fn from_iter<T: IntoIterator<Item = Step>>(iter: T) -> Self {
        StepList {
            steps: iter.into_iter().collect(),
            wrapped: false,
        }
    }
}

impl IntoIterator for StepList {
    type Item = Step;
    type IntoIter = std::collections::vec_deque::IntoIter<Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}
