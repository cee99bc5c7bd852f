//! Forecast artifact: one fetched payload bound for storage

use chrono::{DateTime, Utc};

use super::Coordinate;

/// Raw forecast payload for one coordinate and one run window
///
/// The content is passed through unmodified; nothing here parses it.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastArtifact {
    /// Destination blob name
    pub blob_name: String,
    /// Provider payload, verbatim
    pub content: String,
    /// Start of the requested forecast window
    pub window_start: DateTime<Utc>,
}

impl ForecastArtifact {
    #[must_use]
    pub fn new(coordinate: &Coordinate, content: String, window_start: DateTime<Utc>) -> Self {
        Self {
            blob_name: coordinate.artifact_name(),
            content,
            window_start,
        }
    }

    /// Payload size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
