use super::types::Task;
use crate::error::{Result, TaskError};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use std::future::Future;
use std::pin::Pin;

pub type RegistryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Keyed store of canonical task records.
pub trait TaskRegistry: Send + Sync {
    /// Insert a new task. `Conflict` if the id is taken.
    fn insert<'a>(&'a self, task: &'a Task) -> RegistryFuture<'a, ()>;

    fn get<'a>(&'a self, id: &'a str) -> RegistryFuture<'a, Option<Task>>;

    fn list(&self) -> RegistryFuture<'_, Vec<Task>>;

    /// Update the pause flag, returning the updated task or `None` when the id
    /// is unknown.
    fn set_paused<'a>(&'a self, id: &'a str, paused: bool) -> RegistryFuture<'a, Option<Task>>;

    /// Returns `true` if a row was removed.
    fn delete<'a>(&'a self, id: &'a str) -> RegistryFuture<'a, bool>;

    /// Live pause flag. An unknown id reads as not paused.
    fn is_paused<'a>(&'a self, id: &'a str) -> RegistryFuture<'a, bool> {
        Box::pin(async move { Ok(self.get(id).await?.is_some_and(|task| task.paused)) })
    }
}

pub struct SqliteTaskRegistry {
    pool: SqlitePool,
}

impl SqliteTaskRegistry {
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS scheduled_task (
                id      TEXT PRIMARY KEY,
                cron    TEXT NOT NULL,
                on_hold INTEGER NOT NULL DEFAULT 0
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

fn row_to_task(row: &SqliteRow) -> Result<Task> {
    Ok(Task {
        id: row.try_get("id")?,
        cron: row.try_get("cron")?,
        paused: row.try_get("on_hold")?,
    })
}

impl TaskRegistry for SqliteTaskRegistry {
    fn insert<'a>(&'a self, task: &'a Task) -> RegistryFuture<'a, ()> {
        Box::pin(async move {
            let result = sqlx::query(
                "INSERT INTO scheduled_task (id, cron, on_hold) VALUES (?, ?, ?)
                 ON CONFLICT(id) DO NOTHING",
            )
            .bind(&task.id)
            .bind(&task.cron)
            .bind(task.paused)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(TaskError::Conflict(task.id.clone()));
            }
            Ok(())
        })
    }

    fn get<'a>(&'a self, id: &'a str) -> RegistryFuture<'a, Option<Task>> {
        Box::pin(async move {
            let row = sqlx::query("SELECT id, cron, on_hold FROM scheduled_task WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            row.as_ref().map(row_to_task).transpose()
        })
    }

    fn list(&self) -> RegistryFuture<'_, Vec<Task>> {
        Box::pin(async move {
            let rows = sqlx::query("SELECT id, cron, on_hold FROM scheduled_task ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await?;

            let mut tasks = Vec::with_capacity(rows.len());
            for row in rows {
                tasks.push(row_to_task(&row)?);
            }
            Ok(tasks)
        })
    }

    fn set_paused<'a>(&'a self, id: &'a str, paused: bool) -> RegistryFuture<'a, Option<Task>> {
        Box::pin(async move {
            let row = sqlx::query(
                "UPDATE scheduled_task SET on_hold = ? WHERE id = ?
                 RETURNING id, cron, on_hold",
            )
            .bind(paused)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            row.as_ref().map(row_to_task).transpose()
        })
    }

    fn delete<'a>(&'a self, id: &'a str) -> RegistryFuture<'a, bool> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM scheduled_task WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
    }
}
