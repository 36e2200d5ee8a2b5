use clap::Subcommand;
use serde::{Deserialize, Serialize};

/// Task management subcommands
#[derive(Subcommand, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskCommands {
    /// List all tasks
    List,
    /// Create a task (cron: 6/7 fields with seconds, or 5-field crontab)
    Create {
        /// Task id, unique across the cluster
        id: String,
        /// Cron expression, e.g. '*/5 * * * * *'
        cron: String,
    },
    /// Put a task on hold
    Pause {
        id: String,
        /// Update the registry only; the scheduler catches up at the next occurrence
        #[arg(long)]
        only_db: bool,
    },
    /// Take a task off hold
    Resume {
        id: String,
        /// Update the registry only; the scheduler catches up at the next occurrence
        #[arg(long)]
        only_db: bool,
    },
    /// Delete a task and its schedule
    Delete { id: String },
    /// Show a task with its execution state
    Show { id: String },
}
