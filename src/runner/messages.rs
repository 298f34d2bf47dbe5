//! User-facing guidance printed when a run stops or restores.

use super::report::RestorationReport;
use crate::steps::Step;

/// Name users type to invoke the tool.
pub const PROGRAM: &str = "git-shipyard";

/// Guidance for a run suspended on a conflict.
pub fn conflict_guidance(command: &str, step: &Step, files: &[String], can_skip: bool) -> String {
    let mut text = format!("'{}' stopped with conflicts", step);
    if !files.is_empty() {
        text.push_str(&format!(" in:\n  {}", files.join("\n  ")));
    }
    text.push_str(&format!(
        "\n\nTo abort, run \"{p} {c} --abort\".\n\
         To continue after having resolved conflicts, run \"{p} {c} --continue\".",
        p = PROGRAM,
        c = command
    ));
    if can_skip {
        text.push_str(&format!(
            "\nTo skip this step, run \"{} {} --continue --skip\".",
            PROGRAM, command
        ));
    }
    text
}

/// Guidance for a hard failure whose run state was kept.
pub fn resumable_failure_guidance(command: &str) -> String {
    format!(
        "To abort, run \"{p} {c} --abort\".\nTo retry the failed step, run \"{p} {c} --continue\".",
        p = PROGRAM,
        c = command
    )
}

/// Summary of a partial abort or undo. Empty when nothing was lost.
pub fn restoration_summary(report: &RestorationReport) -> String {
    let mut text = String::new();
    if !report.irreversible.is_empty() {
        text.push_str("The following operations could not be reversed:\n");
        for operation in &report.irreversible {
            text.push_str(&format!("  - {}\n", operation));
        }
    }
    if !report.failures.is_empty() {
        text.push_str("The following restoration steps failed:\n");
        for failure in &report.failures {
            text.push_str(&format!("  - {}: {}\n", failure.step, failure.reason));
        }
    }
    text
}
