use super::expression::next_run_for;
use super::store::ExecutionEngine;
use super::types::{Completion, Decision, ExecutionRecord, RunOutcome};
use crate::diagnostics::health;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{self, Duration, MissedTickBehavior};


const COMPONENT: &str = "scheduler";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_BATCH_SIZE: u32 = 16;

pub type InterceptFuture<'a> = Pin<Box<dyn Future<Output = Result<Decision>> + Send + 'a>>;
pub type RunFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Hook invoked on every claimed occurrence before the job body runs.
///
/// An error leaves the occurrence unexecuted; the claim is released so the
/// next poll on any instance can retry it.
pub trait ExecutionInterceptor: Send + Sync {
    fn intercept<'a>(&'a self, record: &'a ExecutionRecord) -> InterceptFuture<'a>;
}

/// The job body for one occurrence.
pub trait TaskRunner: Send + Sync {
    fn run<'a>(
        &'a self,
        instance_id: &'a str,
        task_id: &'a str,
        fired_at: DateTime<Utc>,
    ) -> RunFuture<'a>;
}

/// Default body: reports which instance ran which task and when.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingTaskRunner;

impl TaskRunner for LoggingTaskRunner {
    fn run<'a>(
        &'a self,
        instance_id: &'a str,
        task_id: &'a str,
        fired_at: DateTime<Utc>,
    ) -> RunFuture<'a> {
        Box::pin(async move {
            tracing::info!(
                "INSTANCE ID: {instance_id} -> Task {task_id} started at {}",
                fired_at.to_rfc3339()
            );
            Ok(())
        })
    }
}

/// Counters for one poll of the execution store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct PollReport {
    pub claimed: usize,
    pub executed: usize,
    pub failed: usize,
    pub rescheduled: usize,
    pub replaced: usize,
    pub released: usize,
}

pub struct SchedulerBuilder {
    engine: Arc<dyn ExecutionEngine>,
    runner: Arc<dyn TaskRunner>,
    instance_id: String,
    interceptors: Vec<Arc<dyn ExecutionInterceptor>>,
    poll_interval: Duration,
    batch_size: u32,
}

impl SchedulerBuilder {
    /// Register a hook run on every claimed occurrence, in registration order.
    /// The first hook returning something other than `Proceed` decides.
    pub fn intercept_execution(mut self, interceptor: Arc<dyn ExecutionInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn build(self) -> Scheduler {
        Scheduler {
            engine: self.engine,
            runner: self.runner,
            instance_id: self.instance_id,
            interceptors: self.interceptors,
            poll_interval: self.poll_interval,
            batch_size: self.batch_size,
        }
    }
}

/// Poll-based runtime: claims due occurrences from the shared store, asks the
/// interceptors what to do, runs the body and moves the execution on.
pub struct Scheduler {
    engine: Arc<dyn ExecutionEngine>,
    runner: Arc<dyn TaskRunner>,
    instance_id: String,
    interceptors: Vec<Arc<dyn ExecutionInterceptor>>,
    poll_interval: Duration,
    batch_size: u32,
}

impl Scheduler {
    pub fn builder(
        engine: Arc<dyn ExecutionEngine>,
        runner: Arc<dyn TaskRunner>,
        instance_id: impl Into<String>,
    ) -> SchedulerBuilder {
        SchedulerBuilder {
            engine,
            runner,
            instance_id: instance_id.into(),
            interceptors: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Poll until `shutdown` flips to `true` or its sender goes away. The
    /// signal is only observed between polls, so an occurrence that has been
    /// claimed always reaches `complete` or `release`. Store errors are logged
    /// and retried on the next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut interval = time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            instance_id = %self.instance_id,
            poll_interval = ?self.poll_interval,
            "scheduler started"
        );
        health::mark_component_ok(COMPONENT);

        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = interval.tick() => {}
            }

            match self.poll_once(Utc::now()).await {
                Ok(report) => {
                    health::mark_component_ok(COMPONENT);
                    if report.claimed > 0 {
                        tracing::debug!(?report, "scheduler poll finished");
                    }
                }
                Err(e) => {
                    health::mark_component_error(COMPONENT, e.to_string());
                    tracing::warn!("Scheduler poll failed: {e}");
                }
            }
        }

        tracing::info!(instance_id = %self.instance_id, "scheduler stopped");
        Ok(())
    }

    /// Claim and process every occurrence due at `now`.
    pub async fn poll_once(&self, now: DateTime<Utc>) -> Result<PollReport> {
        let claimed = self
            .engine
            .claim_due(now, &self.instance_id, self.batch_size)
            .await?;

        let mut report = PollReport {
            claimed: claimed.len(),
            ..PollReport::default()
        };

        for record in claimed {
            self.process(&record, now, &mut report).await;
        }

        health::record_poll(&report);
        Ok(report)
    }

    async fn process(&self, record: &ExecutionRecord, now: DateTime<Utc>, report: &mut PollReport) {
        let decision = match self.decide(record).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(
                    task_id = %record.task_id,
                    "Interceptor failed; releasing claim: {e:#}"
                );
                self.release(record, report).await;
                return;
            }
        };

        let (outcome, payload) = match decision {
            Decision::Proceed => {
                let outcome = match self
                    .runner
                    .run(&self.instance_id, &record.task_id, record.next_due)
                    .await
                {
                    Ok(()) => {
                        report.executed += 1;
                        RunOutcome::Succeeded
                    }
                    Err(e) => {
                        report.failed += 1;
                        health::mark_component_error(
                            COMPONENT,
                            format!("task {} failed", record.task_id),
                        );
                        tracing::warn!(task_id = %record.task_id, "Task body failed: {e:#}");
                        RunOutcome::Failed
                    }
                };
                (outcome, None)
            }
            Decision::Reschedule => {
                report.rescheduled += 1;
                (RunOutcome::Skipped, None)
            }
            Decision::Replace(payload) => {
                report.replaced += 1;
                (RunOutcome::Skipped, Some(payload))
            }
        };

        let cron = match &payload {
            Some(replacement) => replacement.cron.as_str(),
            None => record.payload.cron.as_str(),
        };
        let next_due = match next_run_for(cron, now) {
            Ok(next_due) => next_due,
            Err(e) => {
                tracing::warn!(task_id = %record.task_id, "Cannot compute next run: {e}");
                self.release(record, report).await;
                return;
            }
        };

        let completion = Completion {
            next_due,
            payload,
            outcome,
            finished_at: now,
        };
        match self.engine.complete(record, completion).await {
            Ok(true) => {}
            Ok(false) => {
                health::record_claim_lost(&record.task_id);
                tracing::warn!(task_id = %record.task_id, "Claim was lost before completion");
            }
            Err(e) => {
                health::mark_component_error(COMPONENT, e.to_string());
                tracing::warn!(task_id = %record.task_id, "Failed to persist run result: {e}");
            }
        }
    }

    async fn decide(&self, record: &ExecutionRecord) -> Result<Decision> {
        for interceptor in &self.interceptors {
            let decision = interceptor.intercept(record).await?;
            if decision != Decision::Proceed {
                return Ok(decision);
            }
        }
        Ok(Decision::Proceed)
    }

    async fn release(&self, record: &ExecutionRecord, report: &mut PollReport) {
        match self.engine.release(record).await {
            Ok(true) => {
                report.released += 1;
                health::record_release(&record.task_id);
            }
            Ok(false) => {
                health::record_claim_lost(&record.task_id);
                tracing::warn!(task_id = %record.task_id, "Claim was lost before release");
            }
            Err(e) => {
                health::mark_component_error(COMPONENT, e.to_string());
                tracing::warn!(task_id = %record.task_id, "Failed to release claim: {e}");
            }
        }
    }
}
