pub mod config;
pub mod error;
pub mod executor;
mod file;
mod shell;

pub use config::RunConfig;
pub use error::{ExecutionError, RunError, ShellFailure};
pub use executor::{RunSummary, execute_block, run};
