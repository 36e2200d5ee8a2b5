pub mod daemon;
pub mod db;
pub mod engine;
pub mod reconcile;
pub mod registry;
pub mod tasks;

use crate::config::Config;
use anyhow::{Context, Result};
use engine::{
    DEFAULT_CLAIM_TIMEOUT, ExecutionEngine, Scheduler, SchedulerBuilder, SqliteExecutionEngine,
    TaskRunner,
};
use reconcile::PauseReconciler;
use registry::{SqliteTaskRegistry, TaskRegistry};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tasks::TaskService;

/// Both stores opened on one shared database, plus the service over them.
#[derive(Clone)]
pub struct Platform {
    pub registry: Arc<dyn TaskRegistry>,
    pub engine: Arc<dyn ExecutionEngine>,
    pub service: TaskService,
    instance_id: String,
}

impl Platform {
    pub async fn open(db_path: &Path, instance_id: impl Into<String>) -> Result<Self> {
        Self::open_with_claim_timeout(db_path, instance_id, DEFAULT_CLAIM_TIMEOUT).await
    }

    pub async fn open_with_claim_timeout(
        db_path: &Path,
        instance_id: impl Into<String>,
        claim_timeout: Duration,
    ) -> Result<Self> {
        let pool = db::open_pool(db_path).await?;
        let registry: Arc<dyn TaskRegistry> = Arc::new(
            SqliteTaskRegistry::new(pool.clone())
                .await
                .context("Failed to initialize task registry")?,
        );
        let engine: Arc<dyn ExecutionEngine> = Arc::new(
            SqliteExecutionEngine::new(pool)
                .await
                .context("Failed to initialize execution engine")?
                .with_claim_timeout(claim_timeout),
        );

        Ok(Self {
            service: TaskService::new(Arc::clone(&registry), Arc::clone(&engine)),
            registry,
            engine,
            instance_id: instance_id.into(),
        })
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::open_with_claim_timeout(
            &config.database_path(),
            config.instance_id.clone(),
            config.scheduler.claim_timeout(),
        )
        .await
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Scheduler for this instance with pause reconciliation installed.
    pub fn scheduler(&self, runner: Arc<dyn TaskRunner>) -> SchedulerBuilder {
        Scheduler::builder(Arc::clone(&self.engine), runner, self.instance_id.clone())
            .intercept_execution(Arc::new(PauseReconciler::new(Arc::clone(&self.registry))))
    }
}
