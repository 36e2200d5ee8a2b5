use crate::config::Config;
use crate::diagnostics::health;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

#[derive(Debug, Clone, serde::Serialize)]
pub(super) struct DaemonStatus {
    #[serde(flatten)]
    snapshot: serde_json::Map<String, serde_json::Value>,
    database: String,
    written_at: String,
}

/// One state file per instance so several daemons can share a config directory.
pub(super) fn state_file_path(config: &Config) -> PathBuf {
    config
        .config_path
        .parent()
        .map_or_else(|| PathBuf::from("."), PathBuf::from)
        .join(format!("daemon_state.{}.json", sanitize(&config.instance_id)))
}

fn sanitize(instance_id: &str) -> String {
    instance_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn render_status(config: &Config) -> serde_json::Value {
    let json = health::snapshot_json();
    let Some(snapshot) = json.as_object().cloned() else {
        return json;
    };
    let status = DaemonStatus {
        snapshot,
        database: config.database_path().display().to_string(),
        written_at: Utc::now().to_rfc3339(),
    };
    serde_json::to_value(status).unwrap_or_else(|_| serde_json::json!({}))
}

pub(super) fn spawn_state_writer(config: Arc<Config>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let path = state_file_path(&config);
        if let Some(parent) = path.parent()
            && let Err(error) = tokio::fs::create_dir_all(parent).await
        {
            tracing::warn!(%error, "failed to create state file directory");
        }

        let mut interval = tokio::time::interval(Duration::from_secs(super::STATUS_FLUSH_SECONDS));
        loop {
            interval.tick().await;
            let json = render_status(&config);
            let data = serde_json::to_vec_pretty(&json).unwrap_or_else(|_| b"{}".to_vec());
            if let Err(error) = tokio::fs::write(&path, data).await {
                tracing::warn!(%error, "failed to write daemon state file");
            }
        }
    })
}
