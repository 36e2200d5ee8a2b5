use crate::config::Config;
use crate::diagnostics::health;
use crate::platform::Platform;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, timeout};

mod state;
mod supervisor;

use state::spawn_state_writer;
use supervisor::spawn_supervised_components;

const STATUS_FLUSH_SECONDS: u64 = 5;
const SHUTDOWN_GRACE_SECONDS: u64 = 30;

/// Run the gateway and the scheduler under supervision until Ctrl-C.
pub async fn run(config: Arc<Config>, host: String, port: u16) -> Result<()> {
    health::set_instance_id(&config.instance_id);
    health::mark_component_ok("daemon");

    let platform = Platform::from_config(&config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state_writer = spawn_state_writer(Arc::clone(&config));
    let components =
        spawn_supervised_components(&config, &platform, host.clone(), port, &shutdown_rx);

    println!("◆ cronhold daemon started");
    println!("   Instance: {}", config.instance_id);
    println!("   Gateway:  http://{host}:{port}");
    println!("   Database: {}", config.database_path().display());
    println!("   Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    health::mark_component_error("daemon", "shutdown requested");
    tracing::info!("Shutdown requested; stopping components");

    let _ = shutdown_tx.send(true);
    stop_components(components, Duration::from_secs(SHUTDOWN_GRACE_SECONDS)).await;

    state_writer.abort();
    let _ = state_writer.await;

    Ok(())
}

/// Wait for each component to finish its current unit of work. Components
/// still running after `grace` are aborted; any claim they hold is recovered
/// once the claim timeout passes.
async fn stop_components(handles: Vec<JoinHandle<()>>, grace: Duration) {
    for handle in handles {
        let abort = handle.abort_handle();
        if timeout(grace, handle).await.is_err() {
            tracing::warn!("Component did not stop within {grace:?}; aborting");
            abort.abort();
        }
    }
}

pub fn state_file_path(config: &Config) -> PathBuf {
    state::state_file_path(config)
}
