//! Steps and step lists.
//!
//! A workflow is a [`StepList`] of [`Step`]s. Each step runs against a
//! [`StepContext`] and can produce its own undo, continue and abort steps;
//! the runner strings those together into the lists it persists.

pub mod list;
pub mod step;
pub mod sync;

pub use list::{DirectoryChange, StepList, WrapOptions};
pub use step::{Step, StepContext, StepOutcome};
pub use sync::sync_branch_steps;
