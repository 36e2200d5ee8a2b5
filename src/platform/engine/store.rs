use super::expression::{millis_to_datetime, next_run_for};
use super::types::{Completion, ExecutionRecord, SchedulePayload};
use crate::error::EngineError;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub type EngineFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, EngineError>> + Send + 'a>>;

const CANCEL_ATTEMPTS: usize = 3;

/// How long a claim may be held before another instance may take it over.
pub const DEFAULT_CLAIM_TIMEOUT: Duration = Duration::from_secs(300);

/// Persisted recurring-execution contract shared by every instance.
///
/// Claims are exclusive: for a given due occurrence, `claim_due` hands the
/// record to exactly one caller across all processes using the same store.
pub trait ExecutionEngine: Send + Sync {
    /// Create the execution unless one already exists. Returns `true` when a
    /// record was inserted.
    fn schedule_if_absent<'a>(
        &'a self,
        task_id: &'a str,
        payload: &'a SchedulePayload,
    ) -> EngineFuture<'a, bool>;

    /// Remove the execution. `NotFound` when absent, `CurrentlyExecuting`
    /// when an instance holds a claim that has not yet timed out.
    fn cancel<'a>(&'a self, task_id: &'a str) -> EngineFuture<'a, ()>;

    fn get<'a>(&'a self, task_id: &'a str) -> EngineFuture<'a, Option<ExecutionRecord>>;

    /// Claim up to `limit` occurrences due at `now`. Claims older than the
    /// claim timeout are treated as abandoned and may be taken over.
    fn claim_due<'a>(
        &'a self,
        now: DateTime<Utc>,
        owner: &'a str,
        limit: u32,
    ) -> EngineFuture<'a, Vec<ExecutionRecord>>;

    /// Release a claim, moving the execution to its next due time. Returns
    /// `false` if the claim was no longer held.
    fn complete<'a>(
        &'a self,
        claimed: &'a ExecutionRecord,
        completion: Completion,
    ) -> EngineFuture<'a, bool>;

    /// Drop a claim without touching the schedule so the occurrence is
    /// picked up again by the next poll.
    fn release<'a>(&'a self, claimed: &'a ExecutionRecord) -> EngineFuture<'a, bool>;
}

/// SQLite-backed execution store.
pub struct SqliteExecutionEngine {
    pool: SqlitePool,
    claim_timeout: Duration,
}

impl SqliteExecutionEngine {
    /// Create the engine on an existing pool and ensure its table exists.
    pub async fn new(pool: SqlitePool) -> Result<Self, EngineError> {
        ensure_schema(&pool).await?;
        Ok(Self {
            pool,
            claim_timeout: DEFAULT_CLAIM_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_claim_timeout(mut self, claim_timeout: Duration) -> Self {
        self.claim_timeout = claim_timeout;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Claims taken before this instant (epoch millis) are abandoned.
    fn stale_before(&self, now: DateTime<Utc>) -> i64 {
        let timeout_ms = i64::try_from(self.claim_timeout.as_millis()).unwrap_or(i64::MAX);
        now.timestamp_millis().saturating_sub(timeout_ms)
    }
}

async fn ensure_schema(pool: &SqlitePool) -> Result<(), EngineError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS scheduled_executions (
            task_id              TEXT PRIMARY KEY,
            task_data            TEXT NOT NULL,
            execution_time_ms    INTEGER NOT NULL,
            picked               INTEGER NOT NULL DEFAULT 0,
            picked_by            TEXT,
            picked_at_ms         INTEGER,
            last_success_ms      INTEGER,
            last_failure_ms      INTEGER,
            consecutive_failures INTEGER NOT NULL DEFAULT 0,
            version              INTEGER NOT NULL DEFAULT 1
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_scheduled_executions_due
             ON scheduled_executions(picked, execution_time_ms)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn encode_payload(task_id: &str, payload: &SchedulePayload) -> Result<String, EngineError> {
    serde_json::to_string(payload).map_err(|e| EngineError::Payload {
        task_id: task_id.to_string(),
        message: e.to_string(),
    })
}

fn row_to_record(row: &SqliteRow) -> Result<ExecutionRecord, EngineError> {
    let task_id: String = row.try_get("task_id")?;
    let task_data: String = row.try_get("task_data")?;
    let execution_time_ms: i64 = row.try_get("execution_time_ms")?;
    let picked: bool = row.try_get("picked")?;
    let picked_by: Option<String> = row.try_get("picked_by")?;
    let last_success_ms: Option<i64> = row.try_get("last_success_ms")?;
    let last_failure_ms: Option<i64> = row.try_get("last_failure_ms")?;
    let consecutive_failures: i64 = row.try_get("consecutive_failures")?;
    let version: i64 = row.try_get("version")?;

    let payload: SchedulePayload =
        serde_json::from_str(&task_data).map_err(|e| EngineError::Payload {
            task_id: task_id.clone(),
            message: e.to_string(),
        })?;
    let next_due = millis_to_datetime(execution_time_ms).ok_or_else(|| EngineError::Payload {
        task_id: task_id.clone(),
        message: format!("execution time out of range: {execution_time_ms}"),
    })?;

    Ok(ExecutionRecord {
        task_id,
        payload,
        next_due,
        picked_by: if picked { picked_by } else { None },
        version,
        last_success: last_success_ms.and_then(millis_to_datetime),
        last_failure: last_failure_ms.and_then(millis_to_datetime),
        consecutive_failures: u32::try_from(consecutive_failures).unwrap_or(0),
    })
}

const SELECT_COLUMNS: &str = "task_id, task_data, execution_time_ms, picked, picked_by,
     last_success_ms, last_failure_ms, consecutive_failures, version";

impl ExecutionEngine for SqliteExecutionEngine {
    fn schedule_if_absent<'a>(
        &'a self,
        task_id: &'a str,
        payload: &'a SchedulePayload,
    ) -> EngineFuture<'a, bool> {
        Box::pin(async move {
            let next_due = next_run_for(&payload.cron, Utc::now())?;
            let task_data = encode_payload(task_id, payload)?;

            let result = sqlx::query(
                "INSERT INTO scheduled_executions (task_id, task_data, execution_time_ms)
                 VALUES ($1, $2, $3)
                 ON CONFLICT(task_id) DO NOTHING",
            )
            .bind(task_id)
            .bind(task_data)
            .bind(next_due.timestamp_millis())
            .execute(&self.pool)
            .await?;

            let created = result.rows_affected() == 1;
            if created {
                tracing::debug!(task_id, next_due = %next_due, "execution scheduled");
            } else {
                tracing::debug!(task_id, "execution already exists; schedule skipped");
            }
            Ok(created)
        })
    }

    fn cancel<'a>(&'a self, task_id: &'a str) -> EngineFuture<'a, ()> {
        Box::pin(async move {
            for _ in 0..CANCEL_ATTEMPTS {
                let deleted = sqlx::query(
                    "DELETE FROM scheduled_executions
                     WHERE task_id = $1 AND (picked = 0 OR picked_at_ms < $2)",
                )
                .bind(task_id)
                .bind(self.stale_before(Utc::now()))
                .execute(&self.pool)
                .await?;
                if deleted.rows_affected() == 1 {
                    return Ok(());
                }

                let picked: Option<(bool,)> =
                    sqlx::query_as("SELECT picked FROM scheduled_executions WHERE task_id = $1")
                        .bind(task_id)
                        .fetch_optional(&self.pool)
                        .await?;
                match picked {
                    None => return Err(EngineError::NotFound(task_id.to_string())),
                    Some((true,)) => {
                        return Err(EngineError::CurrentlyExecuting(task_id.to_string()));
                    }
                    // The claim was released or timed out between the two
                    // statements; try again.
                    Some((false,)) => {}
                }
            }
            Err(EngineError::CurrentlyExecuting(task_id.to_string()))
        })
    }

    fn get<'a>(&'a self, task_id: &'a str) -> EngineFuture<'a, Option<ExecutionRecord>> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM scheduled_executions WHERE task_id = $1"
            ))
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
            row.as_ref().map(row_to_record).transpose()
        })
    }

    fn claim_due<'a>(
        &'a self,
        now: DateTime<Utc>,
        owner: &'a str,
        limit: u32,
    ) -> EngineFuture<'a, Vec<ExecutionRecord>> {
        Box::pin(async move {
            let stale_before = self.stale_before(now);
            let candidates: Vec<(String, i64, Option<String>)> = sqlx::query_as(
                "SELECT task_id, version, CASE WHEN picked = 1 THEN picked_by END
                 FROM scheduled_executions
                 WHERE execution_time_ms <= $1 AND (picked = 0 OR picked_at_ms < $2)
                 ORDER BY execution_time_ms ASC
                 LIMIT $3",
            )
            .bind(now.timestamp_millis())
            .bind(stale_before)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

            let mut claimed = Vec::with_capacity(candidates.len());
            for (task_id, version, abandoned_by) in candidates {
                // Compare-and-swap on version: a competing instance that read
                // the same candidate loses here and sees no row.
                let row = sqlx::query(&format!(
                    "UPDATE scheduled_executions
                     SET picked = 1, picked_by = $1, picked_at_ms = $2, version = version + 1
                     WHERE task_id = $3 AND version = $4
                       AND (picked = 0 OR picked_at_ms < $5)
                     RETURNING {SELECT_COLUMNS}"
                ))
                .bind(owner)
                .bind(now.timestamp_millis())
                .bind(&task_id)
                .bind(version)
                .bind(stale_before)
                .fetch_optional(&self.pool)
                .await?;

                match row {
                    Some(row) => {
                        if let Some(previous) = abandoned_by {
                            tracing::warn!(
                                task_id,
                                owner,
                                previous_owner = %previous,
                                "took over an abandoned claim"
                            );
                        }
                        claimed.push(row_to_record(&row)?);
                    }
                    None => tracing::trace!(task_id, owner, "claim lost to another instance"),
                }
            }
            Ok(claimed)
        })
    }

    fn complete<'a>(
        &'a self,
        claimed: &'a ExecutionRecord,
        completion: Completion,
    ) -> EngineFuture<'a, bool> {
        Box::pin(async move {
            let task_data = completion
                .payload
                .as_ref()
                .map(|payload| encode_payload(&claimed.task_id, payload))
                .transpose()?;

            let result = sqlx::query(
                "UPDATE scheduled_executions
                 SET task_data = COALESCE($1, task_data),
                     execution_time_ms = $2,
                     picked = 0,
                     picked_by = NULL,
                     picked_at_ms = NULL,
                     last_success_ms = CASE $3 WHEN 'succeeded' THEN $4 ELSE last_success_ms END,
                     last_failure_ms = CASE $3 WHEN 'failed' THEN $4 ELSE last_failure_ms END,
                     consecutive_failures = CASE $3
                         WHEN 'succeeded' THEN 0
                         WHEN 'failed' THEN consecutive_failures + 1
                         ELSE consecutive_failures
                     END,
                     version = version + 1
                 WHERE task_id = $5 AND version = $6 AND picked = 1",
            )
            .bind(task_data)
            .bind(completion.next_due.timestamp_millis())
            .bind(completion.outcome.as_db())
            .bind(completion.finished_at.timestamp_millis())
            .bind(&claimed.task_id)
            .bind(claimed.version)
            .execute(&self.pool)
            .await?;

            Ok(result.rows_affected() == 1)
        })
    }

    fn release<'a>(&'a self, claimed: &'a ExecutionRecord) -> EngineFuture<'a, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE scheduled_executions
                 SET picked = 0, picked_by = NULL, picked_at_ms = NULL, version = version + 1
                 WHERE task_id = $1 AND version = $2 AND picked = 1",
            )
            .bind(&claimed.task_id)
            .bind(claimed.version)
            .execute(&self.pool)
            .await?;

            Ok(result.rows_affected() == 1)
        })
    }
}
