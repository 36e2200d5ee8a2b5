mod store;
mod types;

pub use store::{RegistryFuture, SqliteTaskRegistry, TaskRegistry};
pub use types::Task;
