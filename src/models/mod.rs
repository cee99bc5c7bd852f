//! Data models for the ingestion pipeline
//!
//! - Coordinate: named geographic point of interest
//! - Artifact: fetched forecast payload and its destination blob name

pub mod artifact;
pub mod coordinate;

// Re-export all public types for convenient access
pub use artifact::ForecastArtifact;
pub use coordinate::{ARTIFACT_SUFFIX, Coordinate};
