//! Command-line client for the agentpool coordinator.
//!
//! Talks directly to the Postgres backend the coordinator uses for its
//! task store and durable queue — there is no separate admin API. This
//! means `snapshot` can report queue depth and task counts but not live
//! agent state, since the agent registry lives only in the coordinator
//! process's memory.

mod commands;
mod output;

use agentpool_shared::types::{Priority, TaskId};
use clap::{Parser, Subcommand};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "agentpool-ctl", version, about = "Inspect and drive an agentpool coordinator")]
struct Cli {
    /// Postgres connection string. Falls back to $DATABASE_URL.
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a new task and print its assigned id.
    Submit {
        /// The task's natural-language description.
        prompt: String,
        #[arg(long, value_enum, default_value = "normal")]
        priority: PriorityArg,
        #[arg(long)]
        codebase_id: Option<String>,
        #[arg(long)]
        worktree_path: Option<String>,
    },
    /// Print a task's current status and result, if any.
    Status {
        task_id: String,
    },
    /// Best-effort cancel: removes a queued task or asks its agent to stop.
    Stop {
        task_id: String,
    },
    /// Print queue depth and task counts by status.
    Snapshot,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum PriorityArg {
    Low,
    Normal,
    High,
    Critical,
}

impl From<PriorityArg> for Priority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::Low => Priority::Low,
            PriorityArg::Normal => Priority::Normal,
            PriorityArg::High => Priority::High,
            PriorityArg::Critical => Priority::Critical,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    agentpool_shared::logging::init_tracing();
    let cli = Cli::parse();

    let pool = sqlx::PgPool::connect(&cli.database_url).await?;
    let op_timeout = Duration::from_secs(5);
    let store = agentpool_store::TaskStore::new(pool.clone(), op_timeout);
    let queue = agentpool_bus::DurableQueue::new(pool.clone(), op_timeout);
    let bus = agentpool_bus::MessageBus::new(pool, op_timeout);

    match cli.command {
        Commands::Submit { prompt, priority, codebase_id, worktree_path } => {
            commands::submit(&store, &queue, prompt, priority.into(), codebase_id, worktree_path)
                .await?
        }
        Commands::Status { task_id } => commands::status(&store, TaskId::from(task_id)).await?,
        Commands::Stop { task_id } => {
            commands::stop(&store, &queue, &bus, TaskId::from(task_id)).await?
        }
        Commands::Snapshot => commands::snapshot(&store, &queue).await?,
    }

    Ok(())
}
