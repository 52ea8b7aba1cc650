//! Google Sheets v4 REST client used by the skidway jobs.
//!
//! Covers the handful of operations the two jobs need (read a tab,
//! append rows, overwrite or clear a range, make sure a tab exists)
//! with service-account JWT-bearer authentication on top.

pub mod auth;
pub mod client;
pub mod error;

pub use auth::{SheetsAuth, SheetsCredentials};
pub use client::SheetsClient;
pub use error::{SheetsError, SheetsResult};
