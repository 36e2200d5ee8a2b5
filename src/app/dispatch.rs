use crate::cli::commands::{Cli, Commands, TaskCommands};
use crate::config::Config;
use crate::platform::Platform;
use crate::platform::tasks::TaskService;
use anyhow::Result;
use std::sync::Arc;

use crate::app::status::render_status;

pub async fn dispatch(cli: Cli, config: Arc<Config>) -> Result<()> {
    match cli.command {
        Commands::Daemon { port, host } => {
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            let port = port.unwrap_or(config.gateway.port);
            crate::platform::daemon::run(config, host, port).await
        }
        Commands::Status => {
            println!("{}", render_status(&config));
            Ok(())
        }
        Commands::Task { task_command } => {
            let platform = Platform::from_config(&config).await?;
            handle_task_command(task_command, &platform.service).await
        }
    }
}

pub async fn handle_task_command(command: TaskCommands, service: &TaskService) -> Result<()> {
    match command {
        TaskCommands::List => {
            let tasks = service.list_tasks().await?;
            if tasks.is_empty() {
                println!("No tasks yet.");
                println!("\nUsage:");
                println!("  cronhold task create my-task '*/5 * * * * *'");
                return Ok(());
            }

            println!("Tasks ({}):", tasks.len());
            for task in tasks {
                let state = if task.paused { "on hold" } else { "active" };
                println!("- {} | {} | {}", task.id, task.cron, state);
            }
            Ok(())
        }
        TaskCommands::Create { id, cron } => {
            let task = service.create_task(&id, &cron).await?;
            println!("Task created successfully: {}", task.id);
            println!("  Cron: {}", task.cron);
            Ok(())
        }
        TaskCommands::Pause { id, only_db } => {
            service.pause_or_resume(&id, true, only_db).await?;
            println!("Task put on hold successfully: {id}");
            Ok(())
        }
        TaskCommands::Resume { id, only_db } => {
            service.pause_or_resume(&id, false, only_db).await?;
            println!("Task resumed successfully: {id}");
            Ok(())
        }
        TaskCommands::Delete { id } => {
            service.delete_task(&id).await?;
            println!("Task deleted successfully: {id}");
            Ok(())
        }
        TaskCommands::Show { id } => {
            let view = service.inspect_task(&id).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
            Ok(())
        }
    }
}
