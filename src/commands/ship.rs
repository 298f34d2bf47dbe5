//! `ship`: squash-merges a completed feature branch into the main branch.
//!
//! The main branch is synced first, the feature branch is brought up to date
//! with its tracking branch and with main, and then its changes land on main
//! as a single commit. Afterwards the feature branch is deleted locally and
//! remotely and its children are re-parented onto main.
//!
//! Only direct children of the main branch can be shipped. A nested branch
//! would carry its unshipped ancestors along.

use tracing::{debug, info};

use crate::effects::{GitEffect, GitQueries};
use crate::runner::{ControlFlags, EngineError, RunOptions};
use crate::steps::{DirectoryChange, Step, StepContext, StepList, WrapOptions, sync_branch_steps};

/// Command name stored with the run state.
pub const COMMAND: &str = "ship";

/// User input for a fresh ship.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShipArgs {
    /// Branch to ship. Defaults to the current branch.
    pub branch: Option<String>,

    /// Message for the squash commit. Git's default message when absent.
    pub commit_message: Option<String>,

    /// Skip everything that talks to the remote.
    pub offline: bool,
}

/// Facts established by [`check_ship_preconditions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipConfig {
    pub branch_to_ship: String,
    pub initial_branch: String,
}

impl ShipConfig {
    pub fn is_shipping_initial_branch(&self) -> bool {
        self.branch_to_ship == self.initial_branch
    }
}

/// Builds the runner options for `ship`. Ship never allows skipping.
pub fn ship_options<'a>(args: ShipArgs, flags: ControlFlags) -> RunOptions<'a> {
    RunOptions::new(COMMAND, flags, move |ctx| {
        let config = check_ship_preconditions(ctx, &args)?;
        ship_step_list(ctx, &config, &args)
    })
}

/// Validates that the requested branch can be shipped.
///
/// Fetches from the remote (unless offline) so later checks and the plan see
/// current tracking branches.
pub fn check_ship_preconditions(
    ctx: &mut StepContext<'_>,
    args: &ShipArgs,
) -> Result<ShipConfig, EngineError> {
    let initial_branch = ctx.git.current_branch()?;
    let branch_to_ship = args
        .branch
        .clone()
        .unwrap_or_else(|| initial_branch.clone());
    let config = ShipConfig {
        branch_to_ship,
        initial_branch,
    };

    if config.is_shipping_initial_branch() && ctx.git.has_open_changes()? {
        return Err(EngineError::precondition(
            "You have uncommitted changes. Did you mean to commit them before shipping?",
        ));
    }

    if ctx.git.has_remote()? && !args.offline {
        debug!("fetching before ship");
        ctx.git.apply(GitEffect::Fetch)?;
    }

    let branch = &config.branch_to_ship;
    if !config.is_shipping_initial_branch() && !ctx.git.has_branch(branch)? {
        return Err(EngineError::precondition(format!(
            "There is no branch named '{}'",
            branch
        )));
    }

    if !ctx.hierarchy.is_feature_branch(branch) {
        return Err(EngineError::precondition(format!(
            "The branch '{}' is not a feature branch. Only feature branches can be shipped.",
            branch
        )));
    }

    let main_branch = ctx.hierarchy.main_branch().to_string();
    let Some(parent) = ctx.hierarchy.parent_branch(branch) else {
        return Err(EngineError::precondition_with_hint(
            format!("The parent branch of '{}' is unknown.", branch),
            format!(
                "Run \"git config git-town-branch.{}.parent <parent>\" to set it.",
                branch
            ),
        ));
    };

    if parent != main_branch {
        let ancestors: Vec<String> = ctx
            .hierarchy
            .ancestor_branches(branch)
            .into_iter()
            .filter(|ancestor| *ancestor != main_branch)
            .collect();
        let oldest = ancestors.first().cloned().unwrap_or(parent);
        return Err(EngineError::precondition_with_hint(
            format!(
                "Shipping this branch would ship {} as well.",
                ancestors.join(", ")
            ),
            format!("Please ship \"{}\" first.", oldest),
        ));
    }

    Ok(config)
}

/// The ship plan, wrapped to run in the repository root.
///
/// Local changes are stashed when shipping a branch other than the current
/// one. Shipping the current branch requires a clean tree.
pub fn ship_step_list(
    ctx: &mut StepContext<'_>,
    config: &ShipConfig,
    args: &ShipArgs,
) -> Result<StepList, EngineError> {
    let main_branch = ctx.hierarchy.main_branch().to_string();
    let branch = config.branch_to_ship.clone();
    let has_remote = ctx.git.has_remote()?;

    let mut list = sync_branch_steps(ctx, &main_branch, args.offline)?;
    list.append(Step::CheckoutBranch {
        branch_name: branch.clone(),
    });
    list.append(Step::MergeTrackingBranch);
    list.append(Step::MergeBranch {
        branch_name: main_branch.clone(),
    });
    list.append(Step::EnsureHasShippableChanges {
        branch_name: branch.clone(),
    });
    list.append(Step::CheckoutBranch {
        branch_name: main_branch.clone(),
    });
    list.append(Step::SquashMergeBranch {
        branch_name: branch.clone(),
        commit_message: args.commit_message.clone(),
    });
    if has_remote && !args.offline {
        list.append(Step::PushBranch {
            branch_name: main_branch.clone(),
            force: false,
            undoable: true,
        });
    }

    let children = ctx.hierarchy.child_branches(&branch);
    if !args.offline && children.is_empty() && ctx.git.has_tracking_branch(&branch)? {
        list.append(Step::DeleteRemoteBranch {
            branch_name: branch.clone(),
            is_tracking: true,
        });
    }
    // squash merges never look merged to `git branch -d`
    list.append(Step::DeleteLocalBranch {
        branch_name: branch.clone(),
        force: true,
    });
    list.append(Step::DeleteParentBranch {
        branch_name: branch.clone(),
    });
    for child in children {
        list.append(Step::SetParentBranch {
            branch_name: child,
            parent_branch_name: main_branch.clone(),
        });
    }
    list.append(Step::DeleteAncestorBranches);
    if !config.is_shipping_initial_branch() {
        list.append(Step::CheckoutBranch {
            branch_name: config.initial_branch.clone(),
        });
    }

    let stash_open_changes = !config.is_shipping_initial_branch();
    list.wrap(WrapOptions {
        stash_open_changes,
        run_in_repository_root: Some(DirectoryChange {
            repository_root: ctx.git.root_directory()?,
            initial_directory: ctx.git.current_directory()?,
        }),
    });

    info!(branch = %branch, steps = list.len(), stash_open_changes, "planned ship");
    Ok(list)
}
