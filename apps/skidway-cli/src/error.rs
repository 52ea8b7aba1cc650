//! CLI error types and exit codes

use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: Job failure
/// - 2: Configuration or secrets problem
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Job failed: {0}")]
    Job(#[from] skidway_jobs::JobError),
}

impl From<skidway_core::CoreError> for CliError {
    fn from(err: skidway_core::CoreError) -> Self {
        CliError::Config(err.to_string())
    }
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::Job(_) => 1,
        }
    }

    /// Print the error to stderr
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();
        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {self}");
        } else {
            eprintln!("Error: {self}");
        }
    }
}
