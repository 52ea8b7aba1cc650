//! Hosted feature-service REST client used by the skidway jobs.
//!
//! Speaks the ArcGIS-style REST dialect the survey platform exposes:
//! `f=json` everywhere, offset-paginated `query`, `applyEdits` for
//! adds/updates, errors tunneled inside HTTP 200 bodies, and a portal
//! `generateToken` credential flow.

pub mod auth;
pub mod client;
pub mod error;
pub mod geometry;

pub use auth::{PortalAuth, PortalToken};
pub use client::{EditOutcome, Feature, FeatureServiceClient, LayerField};
pub use error::{FeatureServiceError, FeatureServiceResult};
pub use geometry::PointGeometry;
