#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unnecessary_literal_bound,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod app;
pub mod cli;
pub mod config;
#[doc(hidden)]
pub mod diagnostics;
pub mod error;
pub mod platform;
pub mod transport;

pub use config::Config;
pub use error::{EngineError, TaskError};
pub use platform::Platform;
