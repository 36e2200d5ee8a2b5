use super::Config;
use std::path::PathBuf;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(instance_id) = std::env::var("CRONHOLD_INSTANCE_ID")
            && !instance_id.is_empty()
        {
            self.instance_id = instance_id;
        }

        if let Ok(workspace) = std::env::var("CRONHOLD_WORKSPACE")
            && !workspace.is_empty()
        {
            self.workspace_dir = PathBuf::from(workspace);
        }

        if let Ok(database) = std::env::var("CRONHOLD_DATABASE")
            && !database.is_empty()
        {
            self.database.path = Some(PathBuf::from(database));
        }

        if let Ok(port_str) =
            std::env::var("CRONHOLD_GATEWAY_PORT").or_else(|_| std::env::var("PORT"))
            && let Ok(port) = port_str.parse::<u16>()
        {
            self.gateway.port = port;
        }

        if let Ok(host) = std::env::var("CRONHOLD_GATEWAY_HOST").or_else(|_| std::env::var("HOST"))
            && !host.is_empty()
        {
            self.gateway.host = host;
        }

        if let Ok(interval) = std::env::var("CRONHOLD_POLL_INTERVAL_MS")
            && let Ok(interval) = interval.parse::<u64>()
        {
            self.scheduler.poll_interval_ms = interval;
        }

        if let Ok(timeout) = std::env::var("CRONHOLD_CLAIM_TIMEOUT_SECS")
            && let Ok(timeout) = timeout.parse::<u64>()
        {
            self.scheduler.claim_timeout_secs = timeout;
        }
    }
}
