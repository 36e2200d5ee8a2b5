use crate::error::{EngineError, Result, TaskError};
use crate::platform::engine::{ExecutionEngine, ExecutionRecord, SchedulePayload, next_run_for};
use chrono::Utc;
use crate::platform::registry::{Task, TaskRegistry};
use serde::Serialize;
use std::sync::Arc;


/// A task together with the engine's view of it.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub execution: Option<ExecutionRecord>,
}

/// Task lifecycle operations. Sequences registry writes before engine writes;
/// there is no transaction spanning the two stores.
#[derive(Clone)]
pub struct TaskService {
    registry: Arc<dyn TaskRegistry>,
    engine: Arc<dyn ExecutionEngine>,
}

impl TaskService {
    pub fn new(registry: Arc<dyn TaskRegistry>, engine: Arc<dyn ExecutionEngine>) -> Self {
        Self { registry, engine }
    }

    pub async fn create_task(&self, id: &str, cron: &str) -> Result<Task> {
        let id = id.trim();
        if id.is_empty() {
            return Err(TaskError::InvalidId("task id must not be empty".into()));
        }
        // The engine needs a next occurrence to schedule; checking here keeps
        // an expression that has none from leaving a registry row behind.
        if let Err(e) = next_run_for(cron, Utc::now()) {
            return Err(TaskError::InvalidSchedule {
                expression: cron.to_string(),
                reason: e.to_string(),
            });
        }

        let task = Task::new(id, cron.trim());
        self.registry.insert(&task).await?;
        // A failure here leaves the registry row without an execution.
        self.engine
            .schedule_if_absent(&task.id, &SchedulePayload::new(&task.cron, false))
            .await?;

        tracing::info!(task_id = %task.id, cron = %task.cron, "task created");
        Ok(task)
    }

    /// Set the pause flag. With `registry_only` the engine copy is left stale
    /// until the next occurrence reconciles it.
    pub async fn pause_or_resume(&self, id: &str, pause: bool, registry_only: bool) -> Result<Task> {
        let task = self
            .registry
            .set_paused(id, pause)
            .await?
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;

        if registry_only {
            tracing::info!(task_id = %id, paused = pause, "pause flag updated in registry only");
            return Ok(task);
        }

        self.cancel_tolerant(id).await?;
        self.engine
            .schedule_if_absent(id, &SchedulePayload::new(&task.cron, pause))
            .await?;

        tracing::info!(task_id = %id, paused = pause, "pause flag updated");
        Ok(task)
    }

    /// Remove the execution, then the registry row. Unknown ids are not an error.
    pub async fn delete_task(&self, id: &str) -> Result<()> {
        self.cancel_tolerant(id).await?;
        if self.registry.delete(id).await? {
            tracing::info!(task_id = %id, "task deleted");
        } else {
            tracing::debug!(task_id = %id, "delete requested for unknown task");
        }
        Ok(())
    }

    pub async fn get_task(&self, id: &str) -> Result<Task> {
        self.registry
            .get(id)
            .await?
            .ok_or_else(|| TaskError::NotFound(id.to_string()))
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.registry.list().await
    }

    pub async fn inspect_task(&self, id: &str) -> Result<TaskView> {
        let task = self.get_task(id).await?;
        let execution = self.engine.get(id).await?;
        Ok(TaskView { task, execution })
    }

    async fn cancel_tolerant(&self, id: &str) -> Result<()> {
        match self.engine.cancel(id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_benign_cancel() => {
                log_benign_cancel(id, &e);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn log_benign_cancel(id: &str, error: &EngineError) {
    tracing::warn!(task_id = %id, "Ignoring cancel failure: {error}");
}
