use serde::{Deserialize, Serialize};

/// Canonical task record. The registry owns the pause flag; the engine only
/// mirrors it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "taskId")]
    pub id: String,
    pub cron: String,
    #[serde(rename = "onHold")]
    pub paused: bool,
}

impl Task {
    pub fn new(id: impl Into<String>, cron: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cron: cron.into(),
            paused: false,
        }
    }
}
