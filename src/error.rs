use thiserror::Error;

// ─── Task lifecycle errors ───────────────────────────────────────────────────

/// Errors surfaced by the task registry and the orchestration service.
///
/// `NotFound` and `Conflict` are caller-facing outcomes; `Engine` and `Store`
/// wrap failures of the two backing stores and abort the in-flight operation.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("task already exists: {0}")]
    Conflict(String),

    #[error("invalid cron expression {expression}: {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("invalid task id: {0}")]
    InvalidId(String),

    #[error("engine: {0}")]
    Engine(#[from] EngineError),

    #[error("store: {0}")]
    Store(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Execution engine errors ─────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngineError {
    /// No execution record exists for the task.
    #[error("execution not found: {0}")]
    NotFound(String),

    /// The execution is claimed by an instance right now and cannot be removed.
    #[error("execution currently running: {0}")]
    CurrentlyExecuting(String),

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("corrupt execution payload for {task_id}: {message}")]
    Payload { task_id: String, message: String },

    #[error("store: {0}")]
    Store(#[from] sqlx::Error),
}

impl EngineError {
    /// Cancel outcomes that the orchestration layer logs and discards.
    pub fn is_benign_cancel(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::CurrentlyExecuting(_))
    }
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for task operations.
pub type Result<T> = std::result::Result<T, TaskError>;
