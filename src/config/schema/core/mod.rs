mod env_overrides;
mod loader;
mod types;

pub use types::{Config, DatabaseConfig, ReliabilityConfig};
