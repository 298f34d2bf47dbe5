//! The persisted record of a suspended or just-finished workflow.
//!
//! # File Format
//!
//! One pretty-printed JSON file per repository:
//! `<state_dir>/<escaped repository root>.json`. Step lists are arrays of
//! adjacently tagged steps. Writes go through [`write_atomic`], so readers
//! see either the previous state or the new one.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::fsync::{remove_durable, write_atomic};
use crate::steps::{Step, StepList};

/// Current schema version. Increment when making breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors from reading or writing run state.
#[derive(Debug, Error)]
pub enum RunStateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema version mismatch: expected {expected}, got {got}")]
    SchemaMismatch { expected: u32, got: u32 },
}

pub type Result<T> = std::result::Result<T, RunStateError>;

/// Why a run stopped before finishing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnfinishedDetails {
    /// The step that conflicted or failed. `continue` runs its continue step.
    pub suspended_step: Step,

    /// Unmerged paths at suspension time (empty after a hard failure).
    pub conflicting_files: Vec<String>,

    /// Whether the command allows skipping the suspended step.
    pub can_skip: bool,

    /// Branch checked out when the run stopped.
    pub end_branch: String,

    pub end_time: DateTime<Utc>,
}

/// Everything needed to continue, abort or undo a run.
///
/// A state with `unfinished` set is *pending* and blocks fresh runs. Without
/// it the state is a finished record kept only for `undo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub schema_version: u32,

    /// Command that created this state (e.g. `ship`).
    pub command: String,

    /// Branch checked out when the command started.
    pub initial_branch: String,

    /// Steps still to run.
    pub run_steps: StepList,

    /// Inverses of the steps already run, last applied first.
    pub undo_steps: StepList,

    /// Steps that unwind a suspended run back to its starting point.
    pub abort_steps: StepList,

    /// Teardown steps already run when the run suspended on a conflict.
    /// Continue and skip acquire the matching setup again.
    #[serde(default)]
    pub released_teardown: StepList,

    #[serde(default)]
    pub unfinished: Option<UnfinishedDetails>,
}

impl RunState {
    pub fn new(command: impl Into<String>, initial_branch: impl Into<String>) -> Self {
        RunState {
            schema_version: SCHEMA_VERSION,
            command: command.into(),
            initial_branch: initial_branch.into(),
            run_steps: StepList::new(),
            undo_steps: StepList::new(),
            abort_steps: StepList::new(),
            released_teardown: StepList::new(),
            unfinished: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.unfinished.is_some()
    }
}

/// Run state storage for one repository.
#[derive(Debug, Clone)]
pub struct RunStateStore {
    path: PathBuf,
}

impl RunStateStore {
    /// The store for the repository rooted at `repository_root`.
    pub fn for_repository(state_dir: &Path, repository_root: &Path) -> Self {
        let file_name = format!("{}.json", sanitize(repository_root));
        RunStateStore {
            path: state_dir.join(file_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saves `state`, replacing whatever was stored.
    pub fn save(&self, state: &RunState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        write_atomic(&self.path, &bytes)?;
        debug!(
            path = %self.path.display(),
            command = %state.command,
            pending = state.is_pending(),
            "saved run state"
        );
        Ok(())
    }

    /// Loads the stored state, `None` if there is none.
    ///
    /// Malformed JSON and schema mismatches are errors.
    pub fn load(&self) -> Result<Option<RunState>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let state: RunState = serde_json::from_slice(&bytes)?;
        if state.schema_version != SCHEMA_VERSION {
            return Err(RunStateError::SchemaMismatch {
                expected: SCHEMA_VERSION,
                got: state.schema_version,
            });
        }
        Ok(Some(state))
    }

    /// Removes the stored state. Clearing an empty store is fine.
    pub fn clear(&self) -> Result<()> {
        remove_durable(&self.path)?;
        debug!(path = %self.path.display(), "cleared run state");
        Ok(())
    }
}

/// Turns a path into a file name, one name per path.
///
/// ASCII alphanumerics, `.` and `_` are kept; every other byte, `-`
/// included, becomes `-xx` in lowercase hex.
fn sanitize(path: &Path) -> String {
    let mut name = String::new();
    for byte in path.as_os_str().as_encoded_bytes() {
        if byte.is_ascii_alphanumeric() || *byte == b'.' || *byte == b'_' {
            name.push(char::from(*byte));
        } else {
            name.push_str(&format!("-{:02x}", byte));
        }
    }
    name
}
