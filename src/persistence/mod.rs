//! Persistence for run states.
//!
//! # File Layout
//!
//! ```text
//! <state_dir>/
//!   <sanitized repository root>.json   # at most one run state per repository
//! ```
//!
//! The state directory defaults to `<tmp>/git-shipyard` and can be moved with
//! `GIT_SHIPYARD_STATE_DIR`.
//!
//! # Crash Safety
//!
//! Saves use write-to-temp-then-rename with fsync on both the file and the
//! directory, so an interrupted save never corrupts the stored state.

pub mod fsync;
pub mod run_state;

pub use run_state::{RunState, RunStateError, RunStateStore, SCHEMA_VERSION, UnfinishedDetails};
