//! Shared foundation for the skidway ETL jobs.
//!
//! Holds the pieces both jobs need: the tabular row model read out of
//! spreadsheet tabs and feature queries, the field transforms applied
//! between the two systems, run configuration and secrets loading, and
//! the retry policy used by the HTTP clients.

pub mod config;
pub mod error;
pub mod record;
pub mod retry;
pub mod secrets;
pub mod transform;

pub use config::SkidConfig;
pub use error::{CoreError, CoreResult};
pub use record::RowSet;
pub use retry::{Retryable, RetryPolicy};
pub use secrets::Secrets;
