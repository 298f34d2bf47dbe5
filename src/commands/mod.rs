//! Step list generators for user-facing commands.
//!
//! A generator decides, for one command, which steps to run. It is handed to
//! the [`Runner`](crate::runner::Runner) inside [`RunOptions`](crate::runner::RunOptions)
//! and only invoked for fresh runs: `--continue`, `--abort` and `--undo`
//! work from the persisted run state.
//!
//! # Supported Commands
//!
//! - `ship [BRANCH] [-m MESSAGE]` - squash-merges a feature branch into main

pub mod ship;

pub use ship::{ShipArgs, ShipConfig, ship_options};
