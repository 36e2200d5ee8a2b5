use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Run the poll loop on this instance (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Delay between polls of the execution store (default: 1000ms)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound on occurrences claimed per poll (default: 16)
    #[serde(default = "default_claim_batch_size")]
    pub claim_batch_size: u32,
    /// Age after which a claim left by a stopped instance may be taken over
    /// by another one (default: 300s)
    #[serde(default = "default_claim_timeout_secs")]
    pub claim_timeout_secs: u64,
}

const MIN_POLL_INTERVAL_MS: u64 = 100;
const MIN_CLAIM_TIMEOUT_SECS: u64 = 5;

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_claim_batch_size() -> u32 {
    16
}

fn default_claim_timeout_secs() -> u64 {
    300
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }

    pub fn claim_timeout(&self) -> Duration {
        Duration::from_secs(self.claim_timeout_secs.max(MIN_CLAIM_TIMEOUT_SECS))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: default_poll_interval_ms(),
            claim_batch_size: default_claim_batch_size(),
            claim_timeout_secs: default_claim_timeout_secs(),
        }
    }
}
