//! Coordinate model for named forecast points

use serde::{Deserialize, Serialize};

/// Suffix appended to a coordinate name to form its blob name
pub const ARTIFACT_SUFFIX: &str = "_MeteomaticsWeatherData.json";

/// Named geographic point of interest
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Coordinate {
    /// Unique, human-readable identifier (used in blob names)
    pub name: String,
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
}

impl Coordinate {
    /// Create a new coordinate
    #[must_use]
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }

    /// Point segment as the provider expects it: `{lat},{lon}`
    ///
    /// Uses the shortest representation that round-trips, so no precision is lost.
    #[must_use]
    pub fn point(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }

    /// Blob name of the artifact stored for this coordinate
    #[must_use]
    pub fn artifact_name(&self) -> String {
        format!("{}{}", self.name, ARTIFACT_SUFFIX)
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Whether latitude and longitude are inside WGS84 bounds
    #[must_use]
    pub fn is_within_bounds(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}
