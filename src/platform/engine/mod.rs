mod expression;
mod scheduler;
mod store;
mod types;

pub use expression::next_run_for;
pub use scheduler::{
    ExecutionInterceptor, InterceptFuture, LoggingTaskRunner, PollReport, RunFuture, Scheduler,
    SchedulerBuilder, TaskRunner,
};
pub use store::{DEFAULT_CLAIM_TIMEOUT, EngineFuture, ExecutionEngine, SqliteExecutionEngine};
pub use types::{Completion, Decision, ExecutionRecord, RunOutcome, SchedulePayload};
