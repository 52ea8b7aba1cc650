//! Job-level error type.

use thiserror::Error;

/// Result alias for job operations.
pub type JobResult<T> = Result<T, JobError>;

/// Error that aborts a job run.
///
/// Row-level problems never surface here; they are logged and counted by
/// the jobs. This type covers failures of the run itself.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Core(#[from] skidway_core::CoreError),

    #[error(transparent)]
    Sheets(#[from] skidway_sheets::SheetsError),

    #[error(transparent)]
    Features(#[from] skidway_features::FeatureServiceError),

    /// Summary email could not be sent. Callers log this, never abort.
    #[error("notification failed: {0}")]
    Notify(String),
}
