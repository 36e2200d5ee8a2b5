use clap::{Parser, Subcommand};

mod subcommands;

pub use subcommands::TaskCommands;

/// `cronhold` - multi-instance cron task scheduler.
#[derive(Parser, Debug)]
#[command(name = "cronhold")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cron tasks shared across instances, with pause/resume.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the long-running runtime (gateway + scheduler)
    Daemon {
        /// Port to listen on (defaults to [gateway] port; use 0 for a random port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to [gateway] host)
        #[arg(long)]
        host: Option<String>,
    },

    /// Manage scheduled tasks in the shared database
    Task {
        #[command(subcommand)]
        task_command: TaskCommands,
    },

    /// Show configuration and database location
    Status,
}
