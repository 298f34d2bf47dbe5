//! Steps that bring one branch up to date.

use crate::effects::GitQueries;
use crate::git::GitResult;

use super::{Step, StepContext, StepList};

/// Steps that sync `branch` with its tracking branch and, for feature
/// branches, with its parent.
///
/// - main and perennial branches are rebased onto their tracking branch
/// - feature branches merge their tracking branch, then their parent
///
/// Tracked branches are pushed afterwards. Nothing touches the remote when
/// `offline` is set.
pub fn sync_branch_steps(ctx: &mut StepContext, branch: &str, offline: bool) -> GitResult<StepList> {
    let mut list = StepList::new();
    list.append(Step::CheckoutBranch {
        branch_name: branch.to_string(),
    });

    let tracked = !offline && ctx.git.has_tracking_branch(branch)?;

    if ctx.hierarchy.is_feature_branch(branch) {
        list.append(Step::MergeTrackingBranch);
        let parent = ctx
            .hierarchy
            .parent_branch(branch)
            .unwrap_or_else(|| ctx.hierarchy.main_branch().to_string());
        list.append(Step::MergeBranch {
            branch_name: parent,
        });
    } else if tracked {
        list.append(Step::RebaseTrackingBranch);
    }

    if tracked {
        list.append(Step::PushBranch {
            branch_name: branch.to_string(),
            force: false,
            undoable: false,
        });
    }

    Ok(list)
}
