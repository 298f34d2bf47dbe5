//! The runner: executes step lists and implements continue, skip, abort
//! and undo.
//!
//! # State machine
//!
//! ```text
//! Idle ──fresh run──► Running ──all steps done──────► Completed
//!                       │  ▲
//!                       │  └──continue / skip──┐
//!                       ▼                      │
//!            AwaitingUserResolution ───────────┘
//!                       │
//!                       └──abort──► Aborted
//! Completed ──undo──► UndoCompleted
//! ```
//!
//! # Key Invariants
//!
//! 1. **One run state per repository**: a fresh run refuses to start while a
//!    pending state exists, before touching the repository.
//!
//! 2. **Undo before run**: each step's inverse is computed and prepended to
//!    the undo list before the step runs, so a conflict never loses progress.
//!
//! 3. **Release on every exit**: teardown steps queued by
//!    [`StepList::wrap`] run on completion and right away when a run stops,
//!    whether on a conflict or a hard failure. A suspended run records what
//!    it released; continue and skip acquire it again. The stash is the one
//!    exception: it stays put while the suspended step's abort would discard
//!    the working tree.
//!
//! 4. **Lazy generation**: the step list generator only runs for fresh runs.

pub mod error;
pub mod messages;
pub mod report;


use chrono::Utc;
use tracing::{debug, info, warn};

use crate::effects::{GitInterpreter, GitQueries};
use crate::git::GitError;
use crate::hierarchy::BranchHierarchy;
use crate::persistence::{RunState, RunStateStore, UnfinishedDetails};
use crate::steps::{DirectoryChange, Step, StepContext, StepList, StepOutcome, WrapOptions};

pub use error::{EngineError, ProtocolError};
pub use report::{RestorationFailure, RestorationReport};

/// Control flags as given on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlFlags {
    pub abort: bool,
    pub continue_run: bool,
    pub skip: bool,
    pub undo: bool,
}

/// What the runner was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Fresh,
    Continue,
    /// Continue, dropping the suspended step.
    Skip,
    Abort,
    Undo,
}

impl ControlFlags {
    /// Resolves the flags into a single mode.
    ///
    /// At most one of `--abort`, `--continue` and `--undo` may be given.
    /// `--skip` is only valid as `--continue --skip`.
    pub fn mode(&self) -> Result<RunMode, ProtocolError> {
        let requested: Vec<&str> = [
            (self.abort, "--abort"),
            (self.continue_run, "--continue"),
            (self.undo, "--undo"),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, flag)| *flag)
        .collect();

        if requested.len() > 1 {
            return Err(ProtocolError::InvalidFlags {
                reason: format!("{} cannot be combined", requested.join(" and ")),
            });
        }
        if self.skip {
            if !self.continue_run {
                return Err(ProtocolError::InvalidFlags {
                    reason: "--skip can only be used together with --continue".to_string(),
                });
            }
            return Ok(RunMode::Skip);
        }

        Ok(if self.abort {
            RunMode::Abort
        } else if self.continue_run {
            RunMode::Continue
        } else if self.undo {
            RunMode::Undo
        } else {
            RunMode::Fresh
        })
    }
}

/// Builds the step list for a fresh run. May query the repository.
pub type StepListGenerator<'a> =
    Box<dyn FnOnce(&mut StepContext<'_>) -> Result<StepList, EngineError> + 'a>;

/// Everything the runner needs from the command being run.
pub struct RunOptions<'a> {
    /// Command name, stored with the run state (e.g. `ship`).
    pub command: String,

    pub flags: ControlFlags,

    /// Whether the suspended step may be skipped.
    pub can_skip: Box<dyn Fn() -> bool + 'a>,

    /// Explanation printed when a step is skipped.
    pub skip_message: Box<dyn Fn() -> String + 'a>,

    /// Only invoked for fresh runs.
    pub step_list_generator: StepListGenerator<'a>,

    /// Keep a pending run state after a hard failure instead of releasing
    /// and forgetting the run.
    pub persist_on_failure: bool,
}

impl<'a> RunOptions<'a> {
    pub fn new(
        command: impl Into<String>,
        flags: ControlFlags,
        generator: impl FnOnce(&mut StepContext<'_>) -> Result<StepList, EngineError> + 'a,
    ) -> Self {
        RunOptions {
            command: command.into(),
            flags,
            can_skip: Box::new(|| false),
            skip_message: Box::new(String::new),
            step_list_generator: Box::new(generator),
            persist_on_failure: false,
        }
    }

    pub fn with_can_skip(mut self, can_skip: impl Fn() -> bool + 'a) -> Self {
        self.can_skip = Box::new(can_skip);
        self
    }

    pub fn with_skip_message(mut self, skip_message: impl Fn() -> String + 'a) -> Self {
        self.skip_message = Box::new(skip_message);
        self
    }

    pub fn with_persist_on_failure(mut self, persist: bool) -> Self {
        self.persist_on_failure = persist;
        self
    }
}

/// How a runner invocation ended, short of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,

    /// A step stopped on conflicts. The run state was saved.
    AwaitingUserResolution {
        step: Step,
        conflicting_files: Vec<String>,
        guidance: String,
    },

    Aborted {
        report: RestorationReport,
    },

    UndoCompleted {
        report: RestorationReport,
    },
}

/// Per-run behavior the execution loop needs after the generator is gone.
struct FailurePolicy<'o> {
    can_skip: &'o dyn Fn() -> bool,
    persist_on_failure: bool,
}

/// Drives step lists against one repository.
pub struct Runner<'r> {
    git: &'r mut dyn GitInterpreter,
    hierarchy: &'r mut dyn BranchHierarchy,
    store: RunStateStore,
    remote: String,
}

impl<'r> Runner<'r> {
    pub fn new(
        git: &'r mut dyn GitInterpreter,
        hierarchy: &'r mut dyn BranchHierarchy,
        store: RunStateStore,
    ) -> Self {
        Runner {
            git,
            hierarchy,
            store,
            remote: "origin".to_string(),
        }
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    pub fn store(&self) -> &RunStateStore {
        &self.store
    }

    fn context(&mut self) -> StepContext<'_> {
        StepContext::new(&mut *self.git, &mut *self.hierarchy).with_remote(self.remote.clone())
    }

    /// Runs, continues, skips, aborts or undoes according to `options.flags`.
    ///
    /// Protocol errors are raised before any step runs.
    pub fn run(&mut self, options: RunOptions<'_>) -> Result<RunOutcome, EngineError> {
        let mode = options.flags.mode()?;
        let stored = self.store.load()?;
        debug!(command = %options.command, ?mode, stored = stored.is_some(), "runner invoked");

        let RunOptions {
            command,
            can_skip,
            skip_message,
            step_list_generator,
            persist_on_failure,
            ..
        } = options;
        let policy = FailurePolicy {
            can_skip: &*can_skip,
            persist_on_failure,
        };

        match mode {
            RunMode::Fresh => self.fresh_run(stored, command, step_list_generator, &policy),
            RunMode::Continue => {
                let (mut state, details) = require_pending(stored, &command)?;
                let conflicts = self.git.conflicting_files()?;
                if !conflicts.is_empty() {
                    return Err(ProtocolError::UnresolvedConflicts { files: conflicts }.into());
                }
                info!(command = %command, step = %details.suspended_step, "continuing run");
                self.reacquire_setup(&mut state)?;
                state
                    .run_steps
                    .prepend(details.suspended_step.create_continue_step());
                self.execute(state, &policy)
            }
            RunMode::Skip => {
                let (mut state, details) = require_pending(stored, &command)?;
                if !can_skip() {
                    return Err(ProtocolError::SkipNotAllowed { command }.into());
                }
                let message = skip_message();
                if !message.is_empty() {
                    println!("\n{}", message);
                }
                info!(command = %command, step = %details.suspended_step, "skipping step");
                self.reacquire_setup(&mut state)?;
                state
                    .run_steps
                    .prepend(details.suspended_step.create_abort_step());
                self.execute(state, &policy)
            }
            RunMode::Abort => {
                let (state, details) = require_pending(stored, &command)?;
                info!(command = %command, step = %details.suspended_step, "aborting run");
                let report = self.restore(state.abort_steps);
                self.store.clear()?;
                Ok(RunOutcome::Aborted { report })
            }
            RunMode::Undo => self.undo(stored, &command),
        }
    }

    fn fresh_run(
        &mut self,
        stored: Option<RunState>,
        command: String,
        generator: StepListGenerator<'_>,
        policy: &FailurePolicy<'_>,
    ) -> Result<RunOutcome, EngineError> {
        if let Some(state) = stored {
            if state.is_pending() {
                return Err(ProtocolError::PendingRun {
                    command: state.command,
                }
                .into());
            }
            debug!(command = %state.command, "discarding finished run record");
            self.store.clear()?;
        }

        let initial_branch = self.git.current_branch()?;
        let steps = generator(&mut self.context())?;
        info!(command = %command, steps = steps.len(), initial_branch = %initial_branch, "starting run");

        let mut state = RunState::new(command, initial_branch);
        state.run_steps = steps;
        self.execute(state, policy)
    }

    fn undo(&mut self, stored: Option<RunState>, command: &str) -> Result<RunOutcome, EngineError> {
        let state = stored.ok_or(ProtocolError::NothingToUndo)?;
        if state.is_pending() {
            return Err(ProtocolError::CannotUndoPending {
                command: state.command,
            }
            .into());
        }
        if state.command != command {
            return Err(ProtocolError::CommandMismatch {
                requested: command.to_string(),
                stored: state.command,
            }
            .into());
        }

        // setup/teardown is re-derived from the repository as it is now
        let mut steps = state.undo_steps.without_wrap_steps();
        if steps.iter().all(|step| *step == Step::NoOp) {
            return Err(ProtocolError::NothingToUndo.into());
        }
        steps.wrap(WrapOptions {
            stash_open_changes: self.git.has_open_changes()?,
            run_in_repository_root: Some(DirectoryChange {
                repository_root: self.git.root_directory()?,
                initial_directory: self.git.current_directory()?,
            }),
        });

        info!(command = %command, steps = steps.len(), "undoing run");
        let report = self.restore(steps);
        self.store.clear()?;
        Ok(RunOutcome::UndoCompleted { report })
    }

    /// Runs steps in order until one conflicts or fails.
    fn execute(
        &mut self,
        mut state: RunState,
        policy: &FailurePolicy<'_>,
    ) -> Result<RunOutcome, EngineError> {
        while let Some(step) = state.run_steps.pop_front() {
            let mut ctx = self.context();
            let result = match step.create_undo_step(&mut ctx) {
                Ok(undo) => {
                    state.undo_steps.prepend(undo);
                    step.run(&mut ctx)
                }
                Err(err) => Err(err),
            };

            match result {
                Ok(StepOutcome::Completed) => {}
                Ok(StepOutcome::ConflictDetected { conflicting_files }) => {
                    return self.suspend(state, step, conflicting_files, policy);
                }
                Err(err) => return self.fail(state, step, err, policy),
            }
        }

        state.unfinished = None;
        state.abort_steps = StepList::new();
        self.store.save(&state)?;
        info!(command = %state.command, "run completed");
        Ok(RunOutcome::Completed)
    }

    fn suspend(
        &mut self,
        mut state: RunState,
        step: Step,
        conflicting_files: Vec<String>,
        policy: &FailurePolicy<'_>,
    ) -> Result<RunOutcome, EngineError> {
        let can_skip = (policy.can_skip)();
        self.release_teardown(&mut state, &step);
        self.persist_pending(&mut state, &step, conflicting_files.clone(), can_skip)?;
        warn!(
            command = %state.command,
            step = %step,
            files = ?conflicting_files,
            "run suspended on conflicts"
        );

        let guidance =
            messages::conflict_guidance(&state.command, &step, &conflicting_files, can_skip);
        Ok(RunOutcome::AwaitingUserResolution {
            step,
            conflicting_files,
            guidance,
        })
    }

    fn fail(
        &mut self,
        mut state: RunState,
        step: Step,
        err: GitError,
        policy: &FailurePolicy<'_>,
    ) -> Result<RunOutcome, EngineError> {
        if step.should_automatically_abort_on_error() {
            warn!(step = %step, error = %err, "guard failed, aborting run");
            let mut abort_steps = StepList::new();
            abort_steps.append(step.create_abort_step());
            abort_steps.append_list(state.undo_steps);
            let report = self.restore(abort_steps);
            self.store.clear()?;
            return Err(EngineError::AbortedAfterFailure {
                step: step.to_string(),
                source: err,
                report,
            });
        }

        if policy.persist_on_failure {
            let can_skip = (policy.can_skip)();
            self.release_teardown(&mut state, &step);
            self.persist_pending(&mut state, &step, Vec::new(), can_skip)?;
            warn!(step = %step, error = %err, "run suspended after failure");
            return Err(EngineError::StepFailed {
                step: step.to_string(),
                source: err,
                resumable: true,
            });
        }

        warn!(step = %step, error = %err, "step failed, releasing wrapped resources");
        let teardown: StepList = state.run_steps.teardown_steps().into();
        let report = self.restore(teardown);
        if !report.is_complete() {
            warn!(failures = ?report.failures, "teardown after failure was incomplete");
        }
        self.store.clear()?;
        Err(EngineError::StepFailed {
            step: step.to_string(),
            source: err,
            resumable: false,
        })
    }

    /// Runs the queued teardown steps of a run that is about to suspend.
    ///
    /// Released steps leave `run_steps` and their inverses leave
    /// `undo_steps`, so an abort does not release them a second time. A
    /// teardown that fails stays queued.
    fn release_teardown(&mut self, state: &mut RunState, suspended: &Step) {
        // aborting this step resets the working tree, popped changes included
        let keep_stash = suspended.create_abort_step() == Step::DiscardOpenChanges;

        for teardown in state.run_steps.teardown_steps() {
            if keep_stash && teardown == Step::RestoreOpenChanges {
                debug!(step = %suspended, "keeping open changes stashed");
                continue;
            }
            match teardown.run(&mut self.context()) {
                Ok(StepOutcome::Completed) => {
                    state.run_steps.remove_first(&teardown);
                    state.undo_steps.remove_first(&teardown);
                    debug!(step = %teardown, "released on suspension");
                    state.released_teardown.append(teardown);
                }
                Ok(StepOutcome::ConflictDetected { conflicting_files }) => {
                    warn!(step = %teardown, files = ?conflicting_files, "release conflicted, keeping it queued");
                }
                Err(err) => {
                    warn!(step = %teardown, error = %err, "release failed, keeping it queued");
                }
            }
        }
    }

    /// Wraps the remaining steps again with the setup whose teardown ran
    /// when the run suspended.
    fn reacquire_setup(&mut self, state: &mut RunState) -> Result<(), EngineError> {
        let released = std::mem::take(&mut state.released_teardown);
        if released.is_empty() {
            return Ok(());
        }

        let stash_open_changes = released.iter().any(|step| *step == Step::RestoreOpenChanges);
        let run_in_repository_root = if released
            .iter()
            .any(|step| matches!(step, Step::RestoreDirectory { .. }))
        {
            Some(DirectoryChange {
                repository_root: self.git.root_directory()?,
                initial_directory: self.git.current_directory()?,
            })
        } else {
            None
        };

        let mut steps = std::mem::take(&mut state.run_steps);
        steps.wrap(WrapOptions {
            stash_open_changes,
            run_in_repository_root,
        });
        debug!(steps = steps.len(), stash_open_changes, "re-acquired setup");
        state.run_steps = steps;
        Ok(())
    }

    fn persist_pending(
        &mut self,
        state: &mut RunState,
        step: &Step,
        conflicting_files: Vec<String>,
        can_skip: bool,
    ) -> Result<(), EngineError> {
        let stash_released = state
            .released_teardown
            .iter()
            .any(|released| *released == Step::RestoreOpenChanges);

        let mut abort_steps = StepList::new();
        abort_steps.append(step.create_abort_step());
        // released changes sit in the working tree; keep them clear of the
        // resets and checkouts that unwind the run
        if stash_released {
            abort_steps.append(Step::StashOpenChanges);
        }
        abort_steps.append_list(state.undo_steps.clone());
        if stash_released {
            abort_steps.append(Step::RestoreOpenChanges);
        }
        state.abort_steps = abort_steps;
        state.unfinished = Some(UnfinishedDetails {
            suspended_step: step.clone(),
            conflicting_files,
            can_skip,
            end_branch: self.git.current_branch()?,
            end_time: Utc::now(),
        });
        self.store.save(state)?;
        Ok(())
    }

    /// Runs restoration steps best-effort: nothing here suspends or stops
    /// early.
    fn restore(&mut self, steps: StepList) -> RestorationReport {
        let mut report = RestorationReport::default();
        for step in steps {
            match &step {
                Step::NoOp => continue,
                Step::Irreversible { operation } => {
                    warn!(operation = %operation, "cannot reverse operation");
                    report.irreversible.push(operation.clone());
                    continue;
                }
                _ => {}
            }

            match step.run(&mut self.context()) {
                Ok(StepOutcome::Completed) => {}
                Ok(StepOutcome::ConflictDetected { conflicting_files }) => {
                    warn!(step = %step, files = ?conflicting_files, "restoration step conflicted");
                    report.record_failure(
                        &step,
                        format!("conflicts in {}", conflicting_files.join(", ")),
                    );
                }
                Err(err) => {
                    warn!(step = %step, error = %err, "restoration step failed");
                    report.record_failure(&step, err.to_string());
                }
            }
        }
        report
    }
}

/// Splits a stored state into the state and its suspension details.
fn require_pending(
    stored: Option<RunState>,
    command: &str,
) -> Result<(RunState, UnfinishedDetails), ProtocolError> {
    let no_pending = || ProtocolError::NoPendingRun {
        command: command.to_string(),
    };
    let mut state = stored.ok_or_else(no_pending)?;
    let details = state.unfinished.take().ok_or_else(no_pending)?;
    if state.command != command {
        return Err(ProtocolError::CommandMismatch {
            requested: command.to_string(),
            stored: state.command,
        });
    }
    Ok((state, details))
}
