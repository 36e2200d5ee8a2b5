use crate::config::Config;

pub fn render_status(config: &Config) -> String {
    let scheduler = if config.scheduler.enabled {
        format!(
            "every {}ms, up to {} claims per poll",
            config.scheduler.poll_interval().as_millis(),
            config.scheduler.claim_batch_size
        )
    } else {
        "disabled".to_string()
    };

    let lines = [
        "◆ cronhold status".to_string(),
        String::new(),
        format!("  Version:     {}", env!("CARGO_PKG_VERSION")),
        format!("  Instance:    {}", config.instance_id),
        format!("  Workspace:   {}", config.workspace_dir.display()),
        format!("  Config:      {}", config.config_path.display()),
        format!("  Database:    {}", config.database_path().display()),
        format!(
            "  State file:  {}",
            crate::platform::daemon::state_file_path(config).display()
        ),
        format!("  Log level:   {}", config.log_level),
        String::new(),
        format!(
            "  Gateway:     http://{}:{}",
            config.gateway.host, config.gateway.port
        ),
        format!("  Scheduler:   {scheduler}"),
        format!(
            "  Supervisor:  backoff {}s..{}s, max restarts {}",
            config.reliability.initial_backoff_secs,
            config.reliability.max_backoff_secs,
            config.reliability.max_restarts
        ),
    ];

    lines.join("\n")
}
