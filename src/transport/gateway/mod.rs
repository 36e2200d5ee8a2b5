//! Axum-based HTTP gateway for task lifecycle operations, with body limits
//! and request timeouts.

mod handlers;
mod server;

pub use server::{build_app, run_gateway, run_gateway_with_listener};

use crate::platform::tasks::TaskService;
use serde::Deserialize;

#[cfg(test)]
use handlers::{
    handle_create, handle_delete, handle_get_task, handle_health, handle_hold, handle_list,
};

/// Maximum request body size (64KB) -- prevents memory exhaustion
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s) -- prevents slow-loris attacks
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub service: TaskService,
}

/// `POST /task/create` body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskBody {
    pub task_id: String,
    pub cron: String,
}

/// `POST /task/hold` query
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldQuery {
    pub task_id: String,
    pub on_hold: bool,
    #[serde(default)]
    pub only_db: bool,
}

/// `taskId` query shared by lookup and delete
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskIdQuery {
    pub task_id: String,
}
