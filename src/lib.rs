//! git-shipyard - resumable, undoable multi-step git workflows.
//!
//! A command compiles into a [`StepList`](steps::StepList) of atomic
//! repository operations. The [`Runner`](runner::Runner) executes it,
//! suspends on conflicts with a persisted run state, and implements
//! continue, skip, abort and undo on top of that state.

pub mod commands;
pub mod effects;
pub mod git;
pub mod hierarchy;
pub mod persistence;
pub mod runner;
pub mod steps;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;
