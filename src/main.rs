use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use git_shipyard::commands::ship::{self, ShipArgs};
use git_shipyard::git::{GitConfig, GitError, LocalRepository};
use git_shipyard::hierarchy::GitConfigHierarchy;
use git_shipyard::persistence::RunStateStore;
use git_shipyard::runner::{ControlFlags, EngineError, RunOutcome, Runner, messages};

#[derive(Parser)]
#[command(name = "git-shipyard", version, about = "Resumable, undoable git workflows")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Deliver a completed feature branch
    ///
    /// Squash-merges the current branch, or <BRANCH> if given, into the main
    /// branch, resulting in linear history on the main branch. Only direct
    /// children of the main branch can be shipped.
    Ship(ShipCommand),
}

#[derive(Args)]
struct ShipCommand {
    /// Branch to ship (defaults to the current branch)
    branch: Option<String>,

    /// Commit message for the squash commit
    #[arg(short, long)]
    message: Option<String>,

    /// Abort a suspended ship and restore the repository
    #[arg(long)]
    abort: bool,

    /// Continue a suspended ship after resolving conflicts
    #[arg(long = "continue")]
    continue_run: bool,

    /// Undo the last completed ship
    #[arg(long)]
    undo: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "git_shipyard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Ship(command) => run_ship(command),
    };

    match result {
        Ok(outcome) => report_outcome(outcome),
        Err(err) => {
            report_error(ship::COMMAND, &err);
            ExitCode::FAILURE
        }
    }
}

fn run_ship(command: ShipCommand) -> Result<RunOutcome, EngineError> {
    let cwd = std::env::current_dir().map_err(GitError::from)?;
    let config = GitConfig::discover(cwd)?;
    let mut repository = LocalRepository::open(config.clone())?;
    let root = repository.root_directory()?;
    let store = RunStateStore::for_repository(&config.state_dir, &root);
    let mut hierarchy = GitConfigHierarchy::load(config.clone())?;

    let args = ShipArgs {
        branch: command.branch,
        commit_message: command.message,
        offline: config.offline,
    };
    let flags = ControlFlags {
        abort: command.abort,
        continue_run: command.continue_run,
        skip: false,
        undo: command.undo,
    };

    Runner::new(&mut repository, &mut hierarchy, store)
        .with_remote(config.remote.clone())
        .run(ship::ship_options(args, flags))
}

fn report_outcome(outcome: RunOutcome) -> ExitCode {
    match outcome {
        RunOutcome::Completed => ExitCode::SUCCESS,
        RunOutcome::AwaitingUserResolution { guidance, .. } => {
            eprintln!("\n{}", guidance);
            ExitCode::FAILURE
        }
        RunOutcome::Aborted { report } | RunOutcome::UndoCompleted { report } => {
            let summary = messages::restoration_summary(&report);
            if !summary.is_empty() {
                eprintln!("\n{}", summary);
            }
            ExitCode::SUCCESS
        }
    }
}

fn report_error(command: &str, err: &EngineError) {
    eprintln!("\n  Error\n  {}\n", err);
    match err {
        EngineError::Precondition {
            hint: Some(hint), ..
        } => eprintln!("  {}\n", hint),
        EngineError::StepFailed {
            resumable: true, ..
        } => eprintln!("{}", messages::resumable_failure_guidance(command)),
        EngineError::AbortedAfterFailure { report, .. } => {
            let summary = messages::restoration_summary(report);
            if !summary.is_empty() {
                eprintln!("{}", summary);
            }
        }
        _ => {}
    }
}
