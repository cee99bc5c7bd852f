//! `meteomatics-ingest` - hourly Meteomatics forecast ingestion
//!
//! This library fetches a seven-day hourly wind and precipitation forecast for
//! each point of a fixed coordinate registry and stores every response,
//! verbatim, as a blob named after the point.

pub mod auth;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod registry;
pub mod scheduler;
pub mod storage;
pub mod telemetry;
pub mod weather;

// Re-export core types for public API
pub use auth::{AccessToken, MeteomaticsTokenProvider, ProviderCredentials, TokenSource};
pub use config::{IngestConfig, TokenReuse};
pub use error::{FailureStage, IngestError};
pub use ingest::{ForecastIngestor, IngestService};
pub use models::{Coordinate, ForecastArtifact};
pub use registry::CoordinateRegistry;
pub use storage::{AzureBlobSink, BlobSink, MemorySink};
pub use weather::ForecastClient;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, IngestError>;
