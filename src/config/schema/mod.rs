mod core;
mod gateway;
mod scheduler;

pub use self::core::{Config, DatabaseConfig, ReliabilityConfig};
pub use gateway::GatewayConfig;
pub use scheduler::SchedulerConfig;
