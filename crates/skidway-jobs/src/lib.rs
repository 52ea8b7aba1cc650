//! Job orchestrators for the two skids.
//!
//! [`Importer`] pushes spreadsheet rows into the feature service,
//! [`Exporter`] pulls survey responses back into the spreadsheet. Both
//! produce a [`RunSummary`] that the CLI logs and optionally emails.

pub mod error;
pub mod exporter;
pub mod importer;
pub mod notify;
pub mod summary;

pub use error::{JobError, JobResult};
pub use exporter::{ExportCounts, Exporter};
pub use importer::{ImportCounts, Importer};
pub use notify::Notifier;
pub use summary::RunSummary;
