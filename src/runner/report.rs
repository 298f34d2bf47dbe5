//! Outcome of a best-effort abort or undo.

/// A restoration step that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorationFailure {
    pub step: String,
    pub reason: String,
}

/// What an abort or undo could not restore.
///
/// Abort and undo never stop early. Steps without an inverse and steps
/// that fail are collected here so the user learns that the restoration is
/// partial.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestorationReport {
    /// Operations that could not be reversed.
    pub irreversible: Vec<String>,

    pub failures: Vec<RestorationFailure>,
}

impl RestorationReport {
    /// True when every step was restored.
    pub fn is_complete(&self) -> bool {
        self.irreversible.is_empty() && self.failures.is_empty()
    }

    pub(crate) fn record_failure(&mut self, step: impl ToString, reason: impl Into<String>) {
        self.failures.push(RestorationFailure {
            step: step.to_string(),
            reason: reason.into(),
        });
    }
}
