//! Pause-state reconciliation between the registry and the execution engine.
//!
//! The engine keeps its own copy of the pause flag inside the execution
//! payload. On every claimed occurrence the interceptor reads the registry
//! live and decides whether the engine copy must be corrected before anything
//! runs. Divergence is corrected lazily, one occurrence at a time.

use crate::platform::engine::{Decision, ExecutionInterceptor, ExecutionRecord, InterceptFuture};
use crate::platform::registry::TaskRegistry;
use std::sync::Arc;

/// Outcome of comparing the two pause flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Both flags say active: run the job body.
    Proceed,
    /// Both flags say paused: skip and keep the schedule.
    Reschedule,
    /// Flags disagree: skip this occurrence and rewrite the engine flag.
    Resync { paused: bool },
}

/// Registry wins on disagreement.
pub fn decide(engine_paused: bool, registry_paused: bool) -> Reconciliation {
    match (engine_paused, registry_paused) {
        (true, true) => Reconciliation::Reschedule,
        (false, false) => Reconciliation::Proceed,
        (_, registry_paused) => Reconciliation::Resync {
            paused: registry_paused,
        },
    }
}

impl Reconciliation {
    pub fn into_decision(self, record: &ExecutionRecord) -> Decision {
        match self {
            Self::Proceed => Decision::Proceed,
            Self::Reschedule => Decision::Reschedule,
            Self::Resync { paused } => Decision::Replace(record.payload.with_paused(paused)),
        }
    }
}

pub struct PauseReconciler {
    registry: Arc<dyn TaskRegistry>,
}

impl PauseReconciler {
    pub fn new(registry: Arc<dyn TaskRegistry>) -> Self {
        Self { registry }
    }
}

impl ExecutionInterceptor for PauseReconciler {
    fn intercept<'a>(&'a self, record: &'a ExecutionRecord) -> InterceptFuture<'a> {
        Box::pin(async move {
            let engine_paused = record.payload.paused;
            let registry_paused = self.registry.is_paused(&record.task_id).await?;
            let reconciliation = decide(engine_paused, registry_paused);

            match reconciliation {
                Reconciliation::Proceed => {}
                Reconciliation::Reschedule => {
                    tracing::debug!(task_id = %record.task_id, "task on hold; occurrence skipped");
                }
                Reconciliation::Resync { paused } => {
                    tracing::info!(
                        task_id = %record.task_id,
                        engine_paused,
                        registry_paused,
                        "pause flag out of sync with registry; resyncing to {paused}"
                    );
                }
            }

            Ok(reconciliation.into_decision(record))
        })
    }
}
