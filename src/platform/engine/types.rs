use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Data the engine stores with every execution: the schedule and the
/// engine's own copy of the pause flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulePayload {
    pub cron: String,
    #[serde(rename = "on_hold")]
    pub paused: bool,
}

impl SchedulePayload {
    pub fn new(cron: impl Into<String>, paused: bool) -> Self {
        Self {
            cron: cron.into(),
            paused,
        }
    }

    pub fn with_paused(&self, paused: bool) -> Self {
        Self {
            cron: self.cron.clone(),
            paused,
        }
    }
}

/// One persisted execution per task id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionRecord {
    pub task_id: String,
    pub payload: SchedulePayload,
    pub next_due: DateTime<Utc>,
    /// Instance holding the claim, set only while an occurrence is in flight.
    pub picked_by: Option<String>,
    pub version: i64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

impl ExecutionRecord {
    pub fn is_claimed(&self) -> bool {
        self.picked_by.is_some()
    }
}

/// What an interceptor tells the scheduler to do with a claimed occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Run the job body, then reschedule from the stored payload.
    Proceed,
    /// Skip the body and reschedule from the unchanged payload.
    Reschedule,
    /// Skip the body, overwrite the stored payload and reschedule from it.
    Replace(SchedulePayload),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed,
    Skipped,
}

impl RunOutcome {
    pub(crate) fn as_db(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Applied to a claimed record when its occurrence is done.
#[derive(Debug, Clone)]
pub struct Completion {
    pub next_due: DateTime<Utc>,
    pub payload: Option<SchedulePayload>,
    pub outcome: RunOutcome,
    pub finished_at: DateTime<Utc>,
}
