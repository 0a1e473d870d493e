// swarm-coord CLI entry point
// One subcommand per coordination operation; exit 0 on success, 1 on
// conflict, not-found, invalid transition, or store failure.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use swarm_coord_lib::commands::{self, CommandContext};
use swarm_coord_lib::error::CoordError;
use swarm_coord_lib::TaskStatus;

#[derive(Parser)]
#[command(
    name = "swarm-coord",
    version,
    about = "Task coordination for parallel autonomous agents"
)]
struct Cli {
    /// Directory holding the persisted coordination documents
    #[arg(long, env = "SWARM_COORD_STORE", default_value = ".swarm", global = true)]
    store_dir: PathBuf,

    /// Repository root scanned by the keyword file matcher
    #[arg(long, env = "SWARM_COORD_REPO", default_value = ".", global = true)]
    repo_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// File lock operations
    Lock {
        #[command(subcommand)]
        command: LockCommands,
    },
    /// Task queue operations
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Overlap analysis
    Overlap {
        #[command(subcommand)]
        command: OverlapCommands,
    },
    /// Parallelization planning
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
}

#[derive(Subcommand)]
enum LockCommands {
    /// Claim files for a task, all-or-nothing
    Claim {
        #[arg(long)]
        task: String,
        #[arg(long)]
        agent: String,
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Release every lock held by a task
    Release {
        #[arg(long)]
        task: String,
    },
    /// Report which of the given files are locked
    Check {
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// List all current locks
    List,
}

#[derive(Subcommand)]
enum QueueCommands {
    /// Hand the next approved task to an agent
    GetNext {
        #[arg(long)]
        agent: String,
    },
    /// Report a task finished by its agent
    Complete {
        #[arg(long)]
        agent: String,
        #[arg(long)]
        task: String,
    },
    /// Manually override a task's status (state machine still applies)
    SetStatus {
        #[arg(long)]
        task: String,
        #[arg(long)]
        status: String,
    },
    /// Rebuild the queue partition from the registry
    Refresh,
    /// Show status counts and the current queue partition
    Status,
}

#[derive(Subcommand)]
enum OverlapCommands {
    /// Recompute the pairwise overlap matrix
    Analyze,
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Build safe groups and a concurrency recommendation
    Calculate {
        /// Overlap threshold(s) to evaluate; defaults to the configured set
        #[arg(long = "threshold")]
        thresholds: Vec<f64>,
    },
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = CommandContext::new(cli.store_dir, cli.repo_root)
        .context("Failed to open coordination store")?;

    match cli.command {
        Commands::Lock { command } => match command {
            LockCommands::Claim { task, agent, files } => {
                commands::lock::claim(&ctx, &task, &agent, &files)?
            }
            LockCommands::Release { task } => commands::lock::release(&ctx, &task)?,
            LockCommands::Check { files } => commands::lock::check(&ctx, &files)?,
            LockCommands::List => commands::lock::list(&ctx)?,
        },
        Commands::Queue { command } => match command {
            QueueCommands::GetNext { agent } => commands::queue::get_next(&ctx, &agent)?,
            QueueCommands::Complete { agent, task } => {
                commands::queue::complete(&ctx, &agent, &task)?
            }
            QueueCommands::SetStatus { task, status } => {
                let status: TaskStatus = status.parse().map_err(anyhow::Error::msg)?;
                commands::queue::set_status(&ctx, &task, status)?
            }
            QueueCommands::Refresh => commands::queue::refresh(&ctx)?,
            QueueCommands::Status => commands::queue::status(&ctx)?,
        },
        Commands::Overlap { command } => match command {
            OverlapCommands::Analyze => commands::overlap::analyze(&ctx)?,
        },
        Commands::Plan { command } => match command {
            PlanCommands::Calculate { thresholds } => {
                commands::plan::calculate(&ctx, &thresholds)?
            }
        },
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        match err.downcast_ref::<CoordError>() {
            Some(CoordError::LockConflict { conflicts }) => {
                eprintln!("Lock conflict on {} file(s):", conflicts.len());
                for conflict in conflicts {
                    eprintln!("  {}", conflict);
                }
            }
            _ => eprintln!("Error: {:#}", err),
        }
        std::process::exit(1);
    }
}
