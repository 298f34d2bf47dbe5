//! Effects-as-data for git operations.
//!
//! Steps never spawn processes themselves. They describe each operation as a
//! [`GitEffect`] and hand it to a [`GitInterpreter`]. This enables:
//! - Testability via an in-memory interpreter
//! - Logging/echoing of every mutation in one place
//! - Post-hoc conflict detection through status queries

pub mod git;
pub mod interpreter;

pub use git::{GitEffect, GitResponse};
pub use interpreter::{GitInterpreter, GitQueries};
