//! Process-wide health for this instance: supervised component states plus a
//! running account of scheduler activity. Served by the gateway `/health`
//! route and flushed to the per-instance daemon state file.

use crate::platform::engine::PollReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Starting,
    Ok,
    Error,
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    /// When `status` last changed.
    pub since: DateTime<Utc>,
    pub last_ok: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub restarts: u64,
}

impl ComponentHealth {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            status: ComponentStatus::Starting,
            since: now,
            last_ok: None,
            last_error: None,
            restarts: 0,
        }
    }

    fn transition(&mut self, status: ComponentStatus, now: DateTime<Utc>) {
        if self.status != status {
            self.status = status;
            self.since = now;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskEvent {
    pub task_id: String,
    pub at: DateTime<Utc>,
}

/// What this instance's scheduler has done since the process started.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerActivity {
    pub polls: u64,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub last_report: Option<PollReport>,
    pub executed_total: u64,
    pub failed_total: u64,
    pub rescheduled_total: u64,
    pub replaced_total: u64,
    pub released_total: u64,
    pub claims_lost: u64,
    pub last_claim_lost: Option<TaskEvent>,
    pub last_release: Option<TaskEvent>,
}

fn widen(count: usize) -> u64 {
    u64::try_from(count).unwrap_or(u64::MAX)
}

impl SchedulerActivity {
    fn apply_poll(&mut self, report: &PollReport, at: DateTime<Utc>) {
        self.polls = self.polls.saturating_add(1);
        self.last_poll_at = Some(at);
        self.last_report = Some(*report);
        self.executed_total = self.executed_total.saturating_add(widen(report.executed));
        self.failed_total = self.failed_total.saturating_add(widen(report.failed));
        self.rescheduled_total = self
            .rescheduled_total
            .saturating_add(widen(report.rescheduled));
        self.replaced_total = self.replaced_total.saturating_add(widen(report.replaced));
        self.released_total = self.released_total.saturating_add(widen(report.released));
    }

    fn apply_claim_lost(&mut self, task_id: &str, at: DateTime<Utc>) {
        self.claims_lost = self.claims_lost.saturating_add(1);
        self.last_claim_lost = Some(TaskEvent {
            task_id: task_id.to_string(),
            at,
        });
    }

    fn apply_release(&mut self, task_id: &str, at: DateTime<Utc>) {
        self.last_release = Some(TaskEvent {
            task_id: task_id.to_string(),
            at,
        });
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub instance_id: Option<String>,
    pub pid: u32,
    pub uptime_seconds: u64,
    pub components: BTreeMap<String, ComponentHealth>,
    pub scheduler: SchedulerActivity,
}

#[derive(Default)]
struct State {
    components: BTreeMap<String, ComponentHealth>,
    scheduler: SchedulerActivity,
}

struct InstanceHealth {
    started_at: Instant,
    instance_id: OnceLock<String>,
    state: Mutex<State>,
}

static HEALTH: OnceLock<InstanceHealth> = OnceLock::new();

fn health() -> &'static InstanceHealth {
    HEALTH.get_or_init(|| InstanceHealth {
        started_at: Instant::now(),
        instance_id: OnceLock::new(),
        state: Mutex::new(State::default()),
    })
}

fn with_state<R>(update: impl FnOnce(&mut State) -> R) -> R {
    let mut state = health()
        .state
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    update(&mut state)
}

fn with_component(component: &str, update: impl FnOnce(&mut ComponentHealth, DateTime<Utc>)) {
    let now = Utc::now();
    with_state(|state| {
        let entry = state
            .components
            .entry(component.to_string())
            .or_insert_with(|| ComponentHealth::new(now));
        update(entry, now);
    });
}

/// Record which instance this process runs as. First call wins.
pub fn set_instance_id(instance_id: &str) {
    let _ = health().instance_id.set(instance_id.to_string());
}

pub fn mark_component_ok(component: &str) {
    with_component(component, |entry, now| {
        entry.transition(ComponentStatus::Ok, now);
        entry.last_ok = Some(now);
        entry.last_error = None;
    });
}

#[allow(clippy::needless_pass_by_value)]
pub fn mark_component_error(component: &str, error: impl ToString) {
    let error = error.to_string();
    with_component(component, move |entry, now| {
        entry.transition(ComponentStatus::Error, now);
        entry.last_error = Some(error);
    });
}

/// The component shut down on request and will not be restarted.
pub fn mark_component_stopped(component: &str) {
    with_component(component, |entry, now| {
        entry.transition(ComponentStatus::Stopped, now);
    });
}

pub fn bump_component_restart(component: &str) {
    with_component(component, |entry, _| {
        entry.restarts = entry.restarts.saturating_add(1);
    });
}

pub fn record_poll(report: &PollReport) {
    let now = Utc::now();
    with_state(|state| state.scheduler.apply_poll(report, now));
}

/// A completion found its claim already taken over or released.
pub fn record_claim_lost(task_id: &str) {
    let now = Utc::now();
    with_state(|state| state.scheduler.apply_claim_lost(task_id, now));
}

pub fn record_release(task_id: &str) {
    let now = Utc::now();
    with_state(|state| state.scheduler.apply_release(task_id, now));
}

pub fn snapshot() -> HealthSnapshot {
    let (components, scheduler) =
        with_state(|state| (state.components.clone(), state.scheduler.clone()));

    HealthSnapshot {
        instance_id: health().instance_id.get().cloned(),
        pid: std::process::id(),
        uptime_seconds: health().started_at.elapsed().as_secs(),
        components,
        scheduler,
    }
}

pub fn snapshot_json() -> serde_json::Value {
    serde_json::to_value(snapshot()).unwrap_or_else(|e| {
        serde_json::json!({
            "status": "error",
            "message": format!("health snapshot not serializable: {e}")
        })
    })
}
