use crate::config::Config;
use crate::diagnostics::health;
use crate::platform::Platform;
use crate::platform::engine::LoggingTaskRunner;
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Duration;

/// Each component receives its own copy of `shutdown` and is expected to
/// return once it reads `true`. The supervisor never restarts a component
/// after shutdown was requested.
pub(super) fn spawn_component_supervisor<F, Fut>(
    name: &'static str,
    initial_backoff_secs: u64,
    max_backoff_secs: u64,
    max_restarts: u32,
    mut shutdown: watch::Receiver<bool>,
    mut run_component: F,
) -> JoinHandle<()>
where
    F: FnMut(watch::Receiver<bool>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut backoff = initial_backoff_secs.max(1);
        let max_backoff = max_backoff_secs.max(backoff);
        let mut consecutive_failures: u32 = 0;

        loop {
            tracing::info!("Daemon component '{name}' starting");
            let result = run_component(shutdown.clone()).await;

            let stopping = *shutdown.borrow();
            if stopping {
                if let Err(e) = result {
                    tracing::warn!("Daemon component '{name}' failed while stopping: {e}");
                }
                tracing::info!("Daemon component '{name}' stopped");
                health::mark_component_stopped(name);
                break;
            }

            match result {
                Ok(()) => {
                    tracing::warn!("Daemon component '{name}' exited unexpectedly");
                    health::mark_component_error(name, "component exited unexpectedly");
                    backoff = initial_backoff_secs.max(1);
                }
                Err(e) => {
                    tracing::error!("Daemon component '{name}' failed: {e}");
                    health::mark_component_error(name, e.to_string());
                }
            }
            consecutive_failures = consecutive_failures.saturating_add(1);

            if max_restarts > 0 && consecutive_failures > max_restarts {
                tracing::error!(
                    "Daemon component '{name}' exceeded max restarts ({max_restarts}), circuit open"
                );
                break;
            }
            health::bump_component_restart(name);
            tokio::select! {
                () = tokio::time::sleep(Duration::from_secs(backoff)) => {}
                _ = shutdown.changed() => {
                    health::mark_component_stopped(name);
                    break;
                }
            }
            backoff = backoff.saturating_mul(2).min(max_backoff);
        }
    })
}

pub(super) fn spawn_supervised_components(
    config: &Config,
    platform: &Platform,
    host: String,
    port: u16,
    shutdown: &watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let reliability = &config.reliability;
    let initial_backoff = reliability.initial_backoff_secs.max(1);
    let max_backoff = reliability.max_backoff_secs.max(initial_backoff);
    let max_restarts = reliability.max_restarts;

    let mut handles = Vec::new();

    let gateway_service = platform.service.clone();
    handles.push(spawn_component_supervisor(
        "gateway",
        initial_backoff,
        max_backoff,
        max_restarts,
        shutdown.clone(),
        move |stop| {
            let service = gateway_service.clone();
            let host = host.clone();
            async move { crate::transport::gateway::run_gateway(&host, port, service, stop).await }
        },
    ));

    if config.scheduler.enabled {
        let scheduler = Arc::new(
            platform
                .scheduler(Arc::new(LoggingTaskRunner))
                .poll_interval(config.scheduler.poll_interval())
                .batch_size(config.scheduler.claim_batch_size)
                .build(),
        );
        handles.push(spawn_component_supervisor(
            "scheduler",
            initial_backoff,
            max_backoff,
            max_restarts,
            shutdown.clone(),
            move |stop| {
                let scheduler = Arc::clone(&scheduler);
                async move { scheduler.run(stop).await }
            },
        ));
    } else {
        tracing::info!("Scheduler disabled; this instance only serves the gateway");
    }

    handles
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::diagnostics::health::{ComponentStatus, snapshot};
    use tokio::time::timeout;

    #[tokio::test(start_paused = true)]
    async fn supervisor_restarts_on_failure() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let (_stop, stopped) = watch::channel(false);
        let handle = spawn_component_supervisor("daemon-test-fail", 1, 1, 0, stopped, move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("boom")
            }
        });

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        handle.abort();
        let _ = handle.await;
        assert!(attempts.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn supervisor_handles_unexpected_exit() {
        let (_stop, stopped) = watch::channel(false);
        let handle =
            spawn_component_supervisor("daemon-test-exit", 1, 1, 0, stopped, |_| async { Ok(()) });

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();
        let _ = handle.await;
    }

    #[tokio::test(start_paused = true)]
    async fn supervisor_opens_circuit_after_max_restarts() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let (_stop, stopped) = watch::channel(false);
        let handle =
            spawn_component_supervisor("daemon-test-circuit", 1, 1, 2, stopped, move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    anyhow::bail!("boom")
                }
            });

        handle.await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn shutdown_stops_component_without_restart() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let (stop, stopped) = watch::channel(false);
        let handle = spawn_component_supervisor(
            "daemon-test-shutdown",
            1,
            1,
            0,
            stopped,
            move |mut component_stop| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let _ = component_stop.changed().await;
                    Ok(())
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        stop.send(true).unwrap();

        timeout(Duration::from_secs(5), handle)
            .await
            .expect("supervisor should stop")
            .unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(
            snapshot().components["daemon-test-shutdown"].status,
            ComponentStatus::Stopped
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_restart_backoff() {
        let (stop, stopped) = watch::channel(false);
        let handle = spawn_component_supervisor("daemon-test-backoff", 60, 60, 0, stopped, |_| async {
            anyhow::bail!("boom")
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        stop.send(true).unwrap();

        timeout(Duration::from_secs(5), handle)
            .await
            .expect("backoff should be cut short")
            .unwrap();
    }
}
