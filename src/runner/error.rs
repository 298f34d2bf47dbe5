//! Engine errors.

use thiserror::Error;

use super::messages::PROGRAM;
use super::report::RestorationReport;
use crate::git::GitError;
use crate::persistence::RunStateError;

/// A control request that does not fit the stored run state.
///
/// Always raised before any step runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("there is no unfinished '{command}' run to continue, skip or abort")]
    NoPendingRun { command: String },

    #[error(
        "a previous '{command}' run is unfinished; run \"{program} {command} --continue\" or \"{program} {command} --abort\" first",
        program = PROGRAM
    )]
    PendingRun { command: String },

    #[error("the stored run belongs to '{stored}', not '{requested}'")]
    CommandMismatch { requested: String, stored: String },

    #[error("'{command}' does not allow skipping the current step")]
    SkipNotAllowed { command: String },

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("cannot undo while a '{command}' run is unfinished; continue or abort it first")]
    CannotUndoPending { command: String },

    #[error("you must resolve the conflicts in {} before continuing", .files.join(", "))]
    UnresolvedConflicts { files: Vec<String> },

    #[error("invalid flag combination: {reason}")]
    InvalidFlags { reason: String },
}

/// Errors returned by [`Runner::run`](super::Runner::run).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("run state error: {0}")]
    State(#[from] RunStateError),

    /// A step failed for a reason other than a conflict.
    ///
    /// With `resumable` the run state was persisted and can be continued or
    /// aborted.
    #[error("step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: GitError,
        resumable: bool,
    },

    /// A guard step failed and everything done so far was rolled back.
    #[error("step '{step}' failed: {source}; the run was aborted")]
    AbortedAfterFailure {
        step: String,
        #[source]
        source: GitError,
        report: RestorationReport,
    },

    /// The plan generator refused to build a plan.
    #[error("{message}")]
    Precondition {
        message: String,
        hint: Option<String>,
    },
}

impl EngineError {
    pub fn precondition(message: impl Into<String>) -> Self {
        EngineError::Precondition {
            message: message.into(),
            hint: None,
        }
    }

    pub fn precondition_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        EngineError::Precondition {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_run_names_the_way_out() {
        let err = ProtocolError::PendingRun {
            command: "ship".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("git-shipyard ship --continue"));
        assert!(text.contains("git-shipyard ship --abort"));
    }

    #[test]
    fn unresolved_conflicts_lists_files() {
        let err = ProtocolError::UnresolvedConflicts {
            files: vec!["a.txt".to_string(), "b.txt".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "you must resolve the conflicts in a.txt, b.txt before continuing"
        );
    }

    #[test]
    fn protocol_errors_convert_into_engine_errors() {
        let err: EngineError = ProtocolError::NothingToUndo.into();
        assert!(matches!(err, EngineError::Protocol(ProtocolError::NothingToUndo)));
    }
}
